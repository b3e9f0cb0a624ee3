//! History trimming — bound a conversation history to a token budget.
//!
//! Keeps the longest suffix of the history whose estimated token sum fits
//! in `floor(context_window * ratio)`. The rest of the window is left for
//! the system prompt, retrieved context and the response.

use ragstream_core::message::Message;
use tracing::debug;

use crate::token::estimate_message_tokens;

/// Trims history to the newest messages that fit a per-model budget.
#[derive(Debug, Clone, Copy)]
pub struct HistoryTrimmer {
    ratio: f32,
}

impl HistoryTrimmer {
    pub fn new(ratio: f32) -> Self {
        Self { ratio }
    }

    /// Token budget for history given a model's context window.
    pub fn budget(&self, context_window: usize) -> usize {
        (context_window as f64 * f64::from(self.ratio)).floor() as usize
    }

    /// Keep the newest messages that fit, in chronological order.
    ///
    /// Walks backward from the newest message and stops at the first one
    /// that would push the running sum over budget; that message and
    /// everything older is dropped.
    pub fn trim(&self, history: &[Message], context_window: usize) -> Vec<Message> {
        let budget = self.budget(context_window);
        let mut used = 0usize;
        let mut keep_from = history.len();

        for (i, message) in history.iter().enumerate().rev() {
            let tokens = estimate_message_tokens(message);
            if used + tokens > budget {
                break;
            }
            used += tokens;
            keep_from = i;
        }

        if keep_from > 0 {
            debug!(
                dropped = keep_from,
                kept = history.len() - keep_from,
                tokens = used,
                budget,
                "History trimmed"
            );
        }

        history[keep_from..].to_vec()
    }
}

impl Default for HistoryTrimmer {
    fn default() -> Self {
        Self::new(0.6)
    }
}
