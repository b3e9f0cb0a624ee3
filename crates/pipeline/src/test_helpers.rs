//! Shared test doubles for pipeline stage tests.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use ragstream_core::error::{GenerationError, RerankError, RetrievalError, TemplateError};
use ragstream_core::event::{EventSink, SinkClosed, StreamEvent};
use ragstream_core::message::Message;
use ragstream_core::passage::{Passage, SessionFilter};
use ragstream_core::provider::{
    Chunk, FinalResult, GenerationBackend, GenerationConfig, GenerationRequest, GenerationStream,
};
use ragstream_core::retrieval::{RetrievalStore, Reranker};
use ragstream_core::template::{PromptTemplate, TemplateVars};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// `n` passages with document ids `doc-0..`, files `file-0.pdf..` and
/// descending scores.
pub fn passages(n: usize) -> Vec<Passage> {
    (0..n)
        .map(|i| {
            let mut p = Passage::new(
                format!("doc-{i}"),
                format!("file-{i}.pdf"),
                format!("Passage {i} text."),
            )
            .with_page(i as u32 + 1)
            .with_score(1.0 - i as f32 * 0.01);
            p.chunk_ordinal = i;
            p
        })
        .collect()
}

/// A minimal generation request.
pub fn request() -> GenerationRequest {
    GenerationRequest {
        messages: vec![Message::system("sys"), Message::user("q")],
        tools: vec![],
        config: GenerationConfig {
            model: "test-model".into(),
            temperature: Some(0.7),
            max_tokens_param: "max_tokens".into(),
            max_tokens: 256,
        },
    }
}

// ── Retrieval ────────────────────────────────────────────────────────────

/// Returns a fixed passage list and records what it was asked.
pub struct ScriptedStore {
    passages: Vec<Passage>,
    delay: Option<Duration>,
    last_filter: Mutex<Option<SessionFilter>>,
    last_k: Mutex<Option<usize>>,
    call_count: Mutex<usize>,
}

impl ScriptedStore {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            delay: None,
            last_filter: Mutex::new(None),
            last_k: Mutex::new(None),
            call_count: Mutex::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn last_filter(&self) -> Option<SessionFilter> {
        self.last_filter.lock().unwrap().clone()
    }

    pub fn last_k(&self) -> Option<usize> {
        *self.last_k.lock().unwrap()
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl RetrievalStore for ScriptedStore {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(
        &self,
        _query: &str,
        k: usize,
        filter: Option<&SessionFilter>,
    ) -> Result<Vec<Passage>, RetrievalError> {
        *self.call_count.lock().unwrap() += 1;
        *self.last_filter.lock().unwrap() = filter.cloned();
        *self.last_k.lock().unwrap() = Some(k);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.passages.clone())
    }
}

pub struct FailingStore;

#[async_trait]
impl RetrievalStore for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(
        &self,
        _query: &str,
        _k: usize,
        _filter: Option<&SessionFilter>,
    ) -> Result<Vec<Passage>, RetrievalError> {
        Err(RetrievalError::Unavailable("connection refused".into()))
    }
}

// ── Reranking ────────────────────────────────────────────────────────────

/// Reverses the candidate order and keeps the first `k`.
pub struct ReversingReranker {
    name: String,
    delay: Option<Duration>,
    honour_k: bool,
    call_count: Mutex<usize>,
}

impl ReversingReranker {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            delay: None,
            honour_k: true,
            call_count: Mutex::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Return every candidate regardless of `k`.
    pub fn ignoring_k(mut self) -> Self {
        self.honour_k = false;
        self
    }

    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }

    /// What this reranker returns for `candidates` and `k`.
    pub fn expected(&self, candidates: &[Passage], k: usize) -> Vec<Passage> {
        let mut out: Vec<Passage> = candidates.iter().rev().cloned().collect();
        if self.honour_k {
            out.truncate(k);
        }
        out
    }
}

#[async_trait]
impl Reranker for ReversingReranker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rerank(
        &self,
        _query: &str,
        passages: &[Passage],
        k: usize,
    ) -> Result<Vec<Passage>, RerankError> {
        *self.call_count.lock().unwrap() += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.expected(passages, k))
    }
}

pub struct FailingReranker {
    name: String,
    call_count: Mutex<usize>,
}

impl FailingReranker {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            call_count: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Reranker for FailingReranker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rerank(
        &self,
        _query: &str,
        _passages: &[Passage],
        _k: usize,
    ) -> Result<Vec<Passage>, RerankError> {
        *self.call_count.lock().unwrap() += 1;
        Err(RerankError::Failed {
            backend: self.name.clone(),
            reason: "model overloaded".into(),
        })
    }
}

// ── Templates ────────────────────────────────────────────────────────────

/// A template that errors or renders nothing.
pub struct FailingTemplate {
    empty: bool,
}

impl FailingTemplate {
    pub fn throwing() -> Self {
        Self { empty: false }
    }

    pub fn empty() -> Self {
        Self { empty: true }
    }
}

#[async_trait]
impl PromptTemplate for FailingTemplate {
    fn name(&self) -> &str {
        "failing"
    }

    async fn render(&self, _vars: &TemplateVars) -> Result<Vec<Message>, TemplateError> {
        if self.empty {
            Ok(vec![])
        } else {
            Err(TemplateError::Render("missing variable 'persona'".into()))
        }
    }
}

// ── Generation ───────────────────────────────────────────────────────────

/// Replays a fixed chunk list and final result.
pub struct ScriptedBackend {
    chunks: Vec<Chunk>,
    final_result: Result<FinalResult, String>,
    stream_error: Option<String>,
    fail_calls: usize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new(chunks: Vec<Chunk>, final_result: FinalResult) -> Self {
        Self {
            chunks,
            final_result: Ok(final_result),
            stream_error: None,
            fail_calls: 0,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails before streaming.
    pub fn failing() -> Self {
        Self::new(vec![], FinalResult::default()).failing_first(usize::MAX)
    }

    /// The first `n` calls fail before streaming.
    pub fn failing_first(mut self, n: usize) -> Self {
        self.fail_calls = n;
        self
    }

    /// Streams `chunks`, then the chunk stream errors.
    pub fn interrupted(chunks: Vec<Chunk>) -> Self {
        let mut backend = Self::new(chunks, FinalResult::default());
        backend.stream_error = Some("connection reset".into());
        backend
    }

    /// Streams `chunks`, then the final result errors.
    pub fn failing_final(chunks: Vec<Chunk>) -> Self {
        let mut backend = Self::new(chunks, FinalResult::default());
        backend.final_result = Err("aggregation failed".into());
        backend
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationStream, GenerationError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        if call <= self.fail_calls {
            return Err(GenerationError::Backend {
                backend: "scripted".into(),
                message: "backend unavailable".into(),
            });
        }

        let (tx, rx) = mpsc::channel(self.chunks.len() + 1);
        for chunk in &self.chunks {
            tx.try_send(Ok(chunk.clone())).unwrap();
        }
        if let Some(e) = &self.stream_error {
            tx.try_send(Err(GenerationError::StreamInterrupted(e.clone())))
                .unwrap();
        }

        let final_result = self
            .final_result
            .clone()
            .map_err(GenerationError::FinalResult);
        Ok(GenerationStream {
            chunks: rx,
            final_result: async move { final_result }.boxed(),
        })
    }
}

// ── Sink ─────────────────────────────────────────────────────────────────

/// Keeps every event it receives.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StreamEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(StreamEvent::event_name).collect()
    }

    /// Text of every `chunk` event, in order.
    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StreamEvent::TextDelta { text } => Some(text),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn send(&self, event: StreamEvent) -> Result<(), SinkClosed> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// Records events and cancels `token` once an event named `trigger` arrives,
/// the way a client disconnecting mid-stream would.
pub struct CancellingSink {
    recorded: RecordingSink,
    trigger: &'static str,
    token: CancellationToken,
}

impl CancellingSink {
    pub fn on(trigger: &'static str, token: CancellationToken) -> Self {
        Self {
            recorded: RecordingSink::default(),
            trigger,
            token,
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.recorded.names()
    }

    pub fn texts(&self) -> Vec<String> {
        self.recorded.texts()
    }
}

impl EventSink for CancellingSink {
    fn send(&self, event: StreamEvent) -> Result<(), SinkClosed> {
        let fire = event.event_name() == self.trigger;
        self.recorded.send(event)?;
        if fire {
            self.token.cancel();
        }
        Ok(())
    }
}
