//! The RAG pipeline — retrieval through generation for one query.
//!
//! ```text
//! Query ─► retrieve ─► rerank/select ─► cite ─► sources event
//!                                             │
//!              trim history ─► assemble prompt ─► generate ─► final_response
//!                                             │
//!                         (fatal failure) ─► fallback controller
//! ```
//!
//! Collaborators are injected through [`RagPipelineBuilder`]; the pipeline
//! holds no global clients. A run always ends with a `final_response`
//! event unless the caller cancelled it.

use std::sync::Arc;
use std::time::Duration;

use ragstream_config::{AppConfig, CapabilityTable, TemperatureConfig};
use ragstream_core::error::{Error, Result};
use ragstream_core::event::{EventSink, GenerationResult, StreamEvent};
use ragstream_core::message::Query;
use ragstream_core::provider::{GenerationBackend, GenerationConfig, GenerationRequest, ToolDefinition};
use ragstream_core::retrieval::{RetrievalStore, Reranker};
use ragstream_core::template::PromptTemplate;
use ragstream_core::tool::ToolRegistry;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::citation::EnrichedContext;
use crate::emitter::EventEmitter;
use crate::fallback::FallbackController;
use crate::generation::{GenerationOrchestrator, GenerationOutcome};
use crate::history::HistoryTrimmer;
use crate::prompt::PromptAssembler;
use crate::rerank::RerankerSelector;
use crate::retriever::QueryRetriever;

/// Retrieval-augmented generation over injected collaborators.
pub struct RagPipeline {
    retriever: QueryRetriever,
    selector: RerankerSelector,
    trimmer: HistoryTrimmer,
    assembler: PromptAssembler,
    orchestrator: GenerationOrchestrator,
    capabilities: CapabilityTable,
    temperature: TemperatureConfig,
    tools: ToolRegistry,
    default_model: String,
    default_max_tokens: u32,
}

impl RagPipeline {
    pub fn builder(config: AppConfig) -> RagPipelineBuilder {
        RagPipelineBuilder::new(config)
    }

    /// Answer `query`, streaming events to `sink`.
    ///
    /// Never fails: fatal stage errors go through one secondary attempt
    /// and, failing that, become the response text.
    pub async fn run(
        &self,
        query: &Query,
        sink: Arc<dyn EventSink>,
        cancel: CancellationToken,
    ) -> GenerationResult {
        let emitter = EventEmitter::new(sink, cancel);
        let session_id = query
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let config = self.generation_config(query);

        info!(
            session = %session_id,
            model = %config.model,
            history = query.history.len(),
            tools = query.tool_names.len(),
            "Pipeline run started"
        );

        let mut context = EnrichedContext::default();
        let outcome = match self.primary(query, &config, &emitter, &mut context).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancelled() => GenerationOutcome {
                cancelled: true,
                ..GenerationOutcome::default()
            },
            Err(e) => {
                FallbackController::new(&self.assembler, &self.orchestrator)
                    .recover(&e, &query.text, &context, config, &emitter)
                    .await
            }
        };

        let result = GenerationResult {
            accumulated_text: outcome.text,
            tool_invocations: outcome.tool_invocations,
            session_id,
        };

        if outcome.cancelled {
            info!(session = %result.session_id, "Pipeline run cancelled");
        } else {
            emitter.emit(result.to_event());
            info!(
                session = %result.session_id,
                chars = result.accumulated_text.len(),
                events = emitter.sent(),
                "Pipeline run complete"
            );
        }
        result
    }

    /// Retrieval through generation. `context` keeps whatever passages
    /// were selected before a failure, for the secondary run.
    async fn primary(
        &self,
        query: &Query,
        config: &GenerationConfig,
        emitter: &EventEmitter,
        context: &mut EnrichedContext,
    ) -> Result<GenerationOutcome> {
        ensure_open(emitter)?;
        let search = self
            .retriever
            .retrieve(&query.text, query.session_id.as_deref());
        let candidates = tokio::select! {
            biased;
            _ = emitter.cancellation().cancelled() => return Err(Error::Cancelled),
            candidates = search => candidates?,
        };

        let selected = if candidates.is_empty() {
            info!("No candidates retrieved, answering without context");
            Vec::new()
        } else {
            self.selector
                .select(&query.text, candidates, emitter.cancellation())
                .await
                .passages
        };
        ensure_open(emitter)?;
        *context = EnrichedContext::enrich(selected);
        emitter.emit(StreamEvent::Sources {
            sources: context.sources(),
        });

        let tools = self.resolve_tools(query, emitter);
        ensure_open(emitter)?;

        let window = self.capabilities.lookup(&config.model).context_window;
        let history = self.trimmer.trim(&query.history, window);
        let prompt = self.assembler.assemble(&query.text, &history, context).await;
        ensure_open(emitter)?;

        let request = GenerationRequest {
            messages: prompt.messages,
            tools,
            config: config.clone(),
        };
        Ok(self.orchestrator.generate(request, emitter).await?)
    }

    /// Resolve the query's tool names, reporting each unusable tool as a
    /// non-fatal `error` event.
    fn resolve_tools(&self, query: &Query, emitter: &EventEmitter) -> Vec<ToolDefinition> {
        let (definitions, errors) = self.tools.resolve(&query.tool_names);
        for e in errors {
            warn!(error = %e, "Tool dropped from request");
            emitter.emit(StreamEvent::error(e.to_string()));
        }
        definitions
    }

    fn generation_config(&self, query: &Query) -> GenerationConfig {
        let model = query.model_id.as_deref().unwrap_or(&self.default_model);
        self.capabilities.lookup(model).generation_config(
            model,
            self.temperature.value(query.temperature_preset),
            query.max_tokens.unwrap_or(self.default_max_tokens),
        )
    }
}

fn ensure_open(emitter: &EventEmitter) -> Result<()> {
    if emitter.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Wires configuration and collaborators into a [`RagPipeline`].
pub struct RagPipelineBuilder {
    config: AppConfig,
    store: Option<Arc<dyn RetrievalStore>>,
    rerankers: Vec<Arc<dyn Reranker>>,
    template: Option<Arc<dyn PromptTemplate>>,
    backend: Option<Arc<dyn GenerationBackend>>,
    tools: Option<ToolRegistry>,
}

impl RagPipelineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: None,
            rerankers: Vec::new(),
            template: None,
            backend: None,
            tools: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn RetrievalStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Register a reranking backend; its `name()` is matched against the
    /// configured reranker order.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.rerankers.push(reranker);
        self
    }

    pub fn template(mut self, template: Arc<dyn PromptTemplate>) -> Self {
        self.template = Some(template);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Use this tool table instead of the one resolved from config.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn build(self) -> Result<RagPipeline> {
        self.config.validate().map_err(|e| Error::Config {
            message: e.to_string(),
        })?;

        let store = self.store.ok_or_else(|| Error::Config {
            message: "a retrieval store is required".into(),
        })?;
        let backend = self.backend.ok_or_else(|| Error::Config {
            message: "a generation backend is required".into(),
        })?;

        let pipeline = &self.config.pipeline;
        let tools = self.tools.unwrap_or_else(|| self.config.tool_registry());

        Ok(RagPipeline {
            retriever: QueryRetriever::new(
                store,
                pipeline.candidate_count,
                Duration::from_secs(pipeline.retrieval_timeout_secs),
            ),
            selector: RerankerSelector::new(
                &pipeline.rerankers,
                &self.rerankers,
                pipeline.final_count,
                Duration::from_secs(pipeline.rerank_timeout_secs),
            ),
            trimmer: HistoryTrimmer::new(pipeline.history_ratio),
            assembler: PromptAssembler::new(pipeline.system_prompt.clone(), self.template),
            orchestrator: GenerationOrchestrator::new(backend),
            capabilities: self.config.capability_table(),
            temperature: self.config.temperature.clone(),
            tools,
            default_model: self.config.default_model.clone(),
            default_max_tokens: self.config.default_max_tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FAILURE_PREFIX;
    use crate::test_helpers::{
        CancellingSink, FailingReranker, FailingStore, RecordingSink, ReversingReranker,
        ScriptedBackend, ScriptedStore, passages,
    };
    use ragstream_core::message::{Message, TemperaturePreset};
    use ragstream_core::provider::{Chunk, FinalResult};
    use ragstream_core::tool::BuiltinTool;

    fn config(rerankers: &[&str]) -> AppConfig {
        let mut config = AppConfig::default();
        config.pipeline.rerankers = rerankers.iter().map(|s| s.to_string()).collect();
        config
    }

    fn answering(text: &str) -> Arc<ScriptedBackend> {
        Arc::new(ScriptedBackend::new(vec![Chunk::text(text)], FinalResult::text(text)))
    }

    async fn run(pipeline: &RagPipeline, query: &Query) -> (GenerationResult, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let result = pipeline.run(query, sink.clone(), CancellationToken::new()).await;
        (result, sink)
    }

    #[tokio::test]
    async fn happy_path_event_order() {
        let pipeline = RagPipeline::builder(config(&[]))
            .store(Arc::new(ScriptedStore::new(passages(3))))
            .backend(answering("X is a letter."))
            .build()
            .unwrap();

        let (result, sink) = run(&pipeline, &Query::new("what is X").with_session("s1")).await;
        assert_eq!(result.accumulated_text, "X is a letter.");
        assert_eq!(result.session_id, "s1");
        assert_eq!(sink.names(), vec!["sources", "chunk", "final_response"]);
    }

    #[tokio::test]
    async fn missing_session_gets_generated_id() {
        let pipeline = RagPipeline::builder(config(&[]))
            .store(Arc::new(ScriptedStore::new(vec![])))
            .backend(answering("hi"))
            .build()
            .unwrap();
        let (result, _) = run(&pipeline, &Query::new("q")).await;
        assert!(uuid::Uuid::parse_str(&result.session_id).is_ok());
    }

    #[tokio::test]
    async fn selection_is_capped_at_final_count() {
        let reranker = Arc::new(ReversingReranker::new("semantic"));
        let pipeline = RagPipeline::builder(config(&["semantic"]))
            .store(Arc::new(ScriptedStore::new(passages(12))))
            .reranker(reranker.clone())
            .backend(answering("ok"))
            .build()
            .unwrap();

        let (_, sink) = run(&pipeline, &Query::new("q")).await;
        match &sink.events()[0] {
            StreamEvent::Sources { sources } => {
                assert_eq!(sources.len(), 5);
                assert_eq!(sources[0].document_id, "doc-11");
            }
            other => panic!("expected sources, got {other:?}"),
        }
        assert_eq!(reranker.calls(), 1);
    }

    #[tokio::test]
    async fn reranker_failure_is_not_user_visible() {
        let pipeline = RagPipeline::builder(config(&["a", "b"]))
            .store(Arc::new(ScriptedStore::new(passages(8))))
            .reranker(Arc::new(FailingReranker::new("a")))
            .reranker(Arc::new(FailingReranker::new("b")))
            .backend(answering("ok"))
            .build()
            .unwrap();

        let (_, sink) = run(&pipeline, &Query::new("q")).await;
        assert!(!sink.names().contains(&"error"));
    }

    #[tokio::test]
    async fn history_and_tools_reach_the_backend() {
        let backend = answering("ok");
        let mut tools = ToolRegistry::new();
        tools.register(BuiltinTool::UrlFetch, |_| None);
        let pipeline = RagPipeline::builder(config(&[]))
            .store(Arc::new(ScriptedStore::new(passages(1))))
            .backend(backend.clone())
            .tools(tools)
            .build()
            .unwrap();

        let query = Query::new("q")
            .with_history(vec![Message::user("before"), Message::model("reply")])
            .with_tools(["url_fetch"]);
        run(&pipeline, &query).await;

        let sent = &backend.requests()[0];
        assert_eq!(sent.tools.len(), 1);
        assert_eq!(sent.messages[1].text(), "before");
        assert_eq!(sent.messages.iter().filter(|m| m.is_system()).count(), 1);
    }

    #[tokio::test]
    async fn misconfigured_tool_emits_error_and_continues() {
        let mut tools = ToolRegistry::new();
        tools.register(BuiltinTool::WebSearch, |_| None);
        let backend = answering("ok");
        let pipeline = RagPipeline::builder(config(&[]))
            .store(Arc::new(ScriptedStore::new(passages(1))))
            .backend(backend.clone())
            .tools(tools)
            .build()
            .unwrap();

        let (result, sink) = run(&pipeline, &Query::new("q").with_tools(["web_search"])).await;
        assert_eq!(result.accumulated_text, "ok");
        assert_eq!(sink.names(), vec!["sources", "error", "chunk", "final_response"]);
        match &sink.events()[1] {
            StreamEvent::Error { error } => assert!(error.contains("SEARCH_API_KEY")),
            other => panic!("expected error, got {other:?}"),
        }
        assert!(backend.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn generation_config_follows_model_profile() {
        let backend = answering("ok");
        let pipeline = RagPipeline::builder(config(&[]))
            .store(Arc::new(ScriptedStore::new(vec![])))
            .backend(backend.clone())
            .build()
            .unwrap();

        let mut query = Query::new("q").with_model("o3-mini");
        query.temperature_preset = TemperaturePreset::Creative;
        query.max_tokens = Some(100);
        run(&pipeline, &query).await;

        let sent = &backend.requests()[0].config;
        assert_eq!(sent.model, "o3-mini");
        assert_eq!(sent.temperature, None);
        assert_eq!(sent.max_tokens_param, "max_completion_tokens");
        assert_eq!(sent.max_tokens, 100);
    }

    #[tokio::test]
    async fn retrieval_failure_triggers_secondary_run() {
        let backend = answering("answered without documents");
        let pipeline = RagPipeline::builder(config(&[]))
            .store(Arc::new(FailingStore))
            .backend(backend.clone())
            .build()
            .unwrap();

        let (result, sink) = run(&pipeline, &Query::new("q").with_tools(["url_fetch"])).await;
        assert_eq!(result.accumulated_text, "answered without documents");
        assert_eq!(sink.names(), vec!["error", "chunk", "final_response"]);
        assert!(backend.requests()[0].tools.is_empty());
    }

    #[tokio::test]
    async fn secondary_run_reuses_selected_passages() {
        let backend = Arc::new(
            ScriptedBackend::new(vec![Chunk::text("second")], FinalResult::text("second"))
                .failing_first(1),
        );
        let store = Arc::new(ScriptedStore::new(passages(2)));
        let pipeline = RagPipeline::builder(config(&[]))
            .store(store.clone())
            .backend(backend.clone())
            .build()
            .unwrap();

        let (result, sink) = run(&pipeline, &Query::new("q")).await;
        assert_eq!(result.accumulated_text, "second");
        assert_eq!(sink.names(), vec!["sources", "error", "chunk", "final_response"]);
        assert_eq!(store.calls(), 1);

        let secondary = &backend.requests()[1];
        assert!(secondary.messages[1].text().contains("[Source: file-1.pdf, Chunk: 1]"));
    }

    #[tokio::test]
    async fn double_failure_still_ends_with_final_response() {
        let pipeline = RagPipeline::builder(config(&[]))
            .store(Arc::new(ScriptedStore::new(passages(1))))
            .backend(Arc::new(ScriptedBackend::failing()))
            .build()
            .unwrap();

        let (result, sink) = run(&pipeline, &Query::new("q")).await;
        assert!(result.accumulated_text.starts_with(FAILURE_PREFIX));
        assert_eq!(sink.names().last(), Some(&"final_response"));
    }

    #[tokio::test]
    async fn cancelled_run_emits_nothing() {
        let backend = answering("ok");
        let pipeline = RagPipeline::builder(config(&[]))
            .store(Arc::new(ScriptedStore::new(passages(1))))
            .backend(backend.clone())
            .build()
            .unwrap();

        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pipeline.run(&Query::new("q"), sink.clone(), cancel).await;

        assert!(sink.events().is_empty());
        assert!(result.accumulated_text.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_run_never_queries_the_store() {
        let store = Arc::new(ScriptedStore::new(passages(8)));
        let reranker = Arc::new(ReversingReranker::new("semantic"));
        let pipeline = RagPipeline::builder(config(&["semantic"]))
            .store(store.clone())
            .reranker(reranker.clone())
            .backend(answering("ok"))
            .build()
            .unwrap();

        let sink = Arc::new(RecordingSink::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        pipeline.run(&Query::new("q"), sink.clone(), cancel).await;

        assert_eq!(store.calls(), 0);
        assert_eq!(reranker.calls(), 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_rerank_stops_the_run() {
        let slow = Arc::new(ReversingReranker::new("a").with_delay(Duration::from_secs(3)));
        let next = Arc::new(ReversingReranker::new("b"));
        let backend = answering("ok");
        let pipeline = RagPipeline::builder(config(&["a", "b"]))
            .store(Arc::new(ScriptedStore::new(passages(8))))
            .reranker(slow.clone())
            .reranker(next.clone())
            .backend(backend.clone())
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let sink = Arc::new(RecordingSink::default());
        pipeline.run(&Query::new("q"), sink.clone(), cancel).await;

        assert_eq!(slow.calls(), 1);
        assert_eq!(next.calls(), 0);
        assert_eq!(backend.calls(), 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn cancel_mid_stream_ends_without_final_response() {
        let backend = Arc::new(ScriptedBackend::new(
            vec![Chunk::text("a"), Chunk::text("b"), Chunk::text("c")],
            FinalResult::text("abc"),
        ));
        let pipeline = RagPipeline::builder(config(&[]))
            .store(Arc::new(ScriptedStore::new(passages(2))))
            .backend(backend.clone())
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let sink = Arc::new(CancellingSink::on("chunk", cancel.clone()));
        let result = pipeline.run(&Query::new("q"), sink.clone(), cancel).await;

        assert_eq!(sink.names(), vec!["sources", "chunk"]);
        assert_eq!(result.accumulated_text, "a");
        assert_eq!(backend.calls(), 1);
    }

    #[test]
    fn build_requires_store_and_backend() {
        assert!(RagPipeline::builder(AppConfig::default()).build().is_err());
        let err = RagPipeline::builder(AppConfig::default())
            .store(Arc::new(ScriptedStore::new(vec![])))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("generation backend"));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.pipeline.final_count = 0;
        let result = RagPipeline::builder(config)
            .store(Arc::new(ScriptedStore::new(vec![])))
            .backend(answering("x"))
            .build();
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
