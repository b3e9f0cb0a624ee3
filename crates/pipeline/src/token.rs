//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token, counted on
//! whitespace-normalized text. Not exact; a real tokenizer could replace
//! it without changing any caller.

use ragstream_core::message::{Message, Part};

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters after collapsing whitespace runs. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    let chars = normalized_len(text);
    if chars == 0 {
        return 0;
    }
    chars.div_ceil(4)
}

/// Character count with leading/trailing whitespace dropped and inner runs
/// collapsed to one character.
fn normalized_len(text: &str) -> usize {
    text.split_whitespace()
        .map(|word| word.chars().count())
        .sum::<usize>()
        + text.split_whitespace().count().saturating_sub(1)
}

/// Estimate tokens for a single message: its text parts plus serialized tool parts.
pub fn estimate_message_tokens(message: &Message) -> usize {
    message
        .content
        .iter()
        .map(|part| match part {
            Part::Text { text } => estimate_tokens(text),
            other => estimate_tokens(&serde_json::to_string(other).unwrap_or_default()),
        })
        .sum()
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}
