//! Event emitter — pushes each event straight to the caller's sink.
//!
//! No buffering, no reordering. Once the run is cancelled or the sink
//! reports it is closed, every later event is dropped without touching
//! the sink again.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use ragstream_core::event::{EventSink, StreamEvent};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,
    closed: AtomicBool,
    sent: AtomicUsize,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>, cancel: CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            closed: AtomicBool::new(false),
            sent: AtomicUsize::new(0),
        }
    }

    /// Write one event. Returns `false` if the event was not delivered
    /// because the run is cancelled or the sink has gone away.
    pub fn emit(&self, event: StreamEvent) -> bool {
        if !self.is_open() {
            debug!(event = event.event_name(), "Emitter closed, dropping event");
            return false;
        }

        match self.sink.send(event) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(e) => {
                debug!(error = %e, "Event sink closed by caller");
                self.closed.store(true, Ordering::Release);
                false
            }
        }
    }

    /// False once cancelled or once a write has failed.
    pub fn is_open(&self) -> bool {
        !self.cancel.is_cancelled() && !self.closed.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The cancellation signal this emitter honours.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Events delivered so far.
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::Relaxed)
    }
}
