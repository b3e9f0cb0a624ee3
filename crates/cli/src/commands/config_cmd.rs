//! `ragstream config` — Configuration management commands.

use ragstream_config::AppConfig;
use std::collections::BTreeSet;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };
    println!("   ✅ Config parsed successfully");

    let warnings = warnings(&config);
    if warnings.is_empty() {
        println!("   ✅ All checks passed");
    } else {
        println!();
        for w in &warnings {
            println!("   ⚠️  {w}");
        }
    }

    let pipeline = &config.pipeline;
    println!();
    println!("   Model:      {}", config.default_model);
    println!(
        "   Retrieval:  {} candidates → {} passages",
        pipeline.candidate_count, pipeline.final_count
    );
    println!("   Rerankers:  {}", pipeline.rerankers.join(" → "));
    println!("   History:    {:.0}% of context window", pipeline.history_ratio * 100.0);
    let registry = config.tool_registry();
    let mut tools = registry.names();
    tools.sort_unstable();
    println!("   Tools:      {}", tools.join(", "));

    Ok(())
}

/// Settings that load fine but will degrade every run.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.pipeline.rerankers.is_empty() {
        warnings.push("No rerankers configured; selection always truncates".to_string());
    }

    let registry = config.tool_registry();
    let enabled: BTreeSet<String> = registry.names().into_iter().map(String::from).collect();
    let (_, errors) = registry.resolve(&enabled);
    warnings.extend(errors.into_iter().map(|e| e.to_string()));

    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
