//! `ragstream model` — Resolve a model's capability profile.

use ragstream_config::AppConfig;
use ragstream_core::message::TemperaturePreset;
use ragstream_pipeline::HistoryTrimmer;
use tracing::debug;

pub async fn run(model_id: &str, preset: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let preset = parse_preset(preset)?;

    let table = config.capability_table();
    let caps = table.lookup(model_id);
    debug!(model = %model_id, preset = ?preset, "Resolved capability profile");
    let generation = caps.generation_config(
        model_id,
        config.temperature.value(preset),
        config.default_max_tokens,
    );

    println!("🧠 {model_id}");
    println!("   Temperature:     {}", if caps.supports_temperature { "supported" } else { "not supported" });
    println!("   Token limit key: {}", caps.max_tokens_param);
    println!("   Context window:  {} tokens", caps.context_window);
    println!(
        "   History budget:  {} tokens",
        history_budget(&config, caps.context_window)
    );
    println!();
    println!("{}", serde_json::to_string_pretty(&generation.to_params())?);
    Ok(())
}

/// The same budget the pipeline trims history to.
fn history_budget(config: &AppConfig, context_window: usize) -> usize {
    HistoryTrimmer::new(config.pipeline.history_ratio).budget(context_window)
}

fn parse_preset(raw: &str) -> Result<TemperaturePreset, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_lowercase()))
        .map_err(|_| format!("Unknown temperature preset '{raw}' (expected precise, balanced or creative)"))
}
