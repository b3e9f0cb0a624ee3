//! SSE frame encoding with JSON recovery.
//!
//! Every frame's `data:` line is guaranteed to be parseable JSON. A payload
//! that fails validation is repaired by the first tier that succeeds:
//!
//! 1. parse as-is (object or array) and re-serialize compactly
//! 2. undo double-escaping and parse again
//! 3. extract the `response` field into a minimal object
//! 4. a fixed fallback payload
//!
//! Tiers 3 and 4 lose data (tool invocations in particular). They keep the
//! stream readable; they do not make the payload complete.

use ragstream_core::chain::first_ok;
use ragstream_core::error::SerializationError;
use ragstream_core::event::StreamEvent;
use regex_lite::Regex;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// Payload used when nothing could be recovered.
pub const FALLBACK_PAYLOAD: &str =
    r#"{"response":"response could not be formatted","toolInvocations":[]}"#;

const RESPONSE_FIELD: &str = r#""response"\s*:\s*"((?:[^"\\]|\\.)*)""#;

/// How a payload reached the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    Valid,
    Unescaped,
    Extracted,
    Fallback,
}

const TIERS: [Recovery; 3] = [Recovery::Valid, Recovery::Unescaped, Recovery::Extracted];

/// One encoded SSE frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub event: String,
    pub data: String,
    pub recovery: Recovery,
}

impl Frame {
    /// Build a frame, repairing `payload` if it is not valid JSON.
    ///
    /// Line breaks are stripped from `event` so a name can never end the
    /// frame early.
    pub fn new(event: &str, payload: &str) -> Self {
        let name = clean_event_name(event);
        if name != event {
            warn!(event = %name, "Line breaks stripped from event name");
        }
        let (data, recovery) = recover_payload(payload);
        if recovery != Recovery::Valid {
            warn!(event = %name, recovery = ?recovery, "Payload repaired before encoding");
        }
        Self {
            event: name,
            data,
            recovery,
        }
    }

    /// `event: <name>\ndata: <json>\n\n`
    pub fn to_wire(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event, self.data)
    }
}

/// `event` without CR or LF.
pub fn clean_event_name(event: &str) -> String {
    event.chars().filter(|c| !matches!(c, '\r' | '\n')).collect()
}

/// Encode a raw (event-name, JSON payload) pair as a wire frame.
pub fn encode(event: &str, payload: &str) -> String {
    Frame::new(event, payload).to_wire()
}

/// Encode a pipeline event under its own event name.
pub fn encode_event(event: &StreamEvent) -> String {
    let payload = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(event = event.event_name(), error = %e, "Event failed to serialize");
            FALLBACK_PAYLOAD.to_string()
        }
    };
    encode(event.event_name(), &payload)
}

/// Return a well-formed JSON payload for `raw` and the tier that produced it.
pub fn recover_payload(raw: &str) -> (String, Recovery) {
    let attempt = first_ok(&TIERS, |tier| {
        let repaired = match tier {
            Recovery::Valid => reserialize(raw),
            Recovery::Unescaped => unescape(raw),
            Recovery::Extracted => extract_response(raw),
            Recovery::Fallback => Err(SerializationError::Unrecoverable),
        };
        repaired.map(|json| (json, *tier))
    });

    match attempt {
        Ok(recovered) => recovered,
        Err(failures) => {
            for (tier, e) in TIERS.iter().zip(&failures) {
                debug!(tier = ?tier, error = %e, "Recovery tier failed");
            }
            warn!(error = %SerializationError::Unrecoverable, "Using fallback payload");
            (FALLBACK_PAYLOAD.to_string(), Recovery::Fallback)
        }
    }
}

fn reserialize(raw: &str) -> Result<String, SerializationError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| SerializationError::Invalid(e.to_string()))?;
    if !(value.is_object() || value.is_array()) {
        return Err(SerializationError::Invalid(
            "payload is not a JSON object or array".into(),
        ));
    }
    serde_json::to_string(&value).map_err(|e| SerializationError::Invalid(e.to_string()))
}

/// Undo one level of escaping: a JSON document wrapped in a string
/// literal, or one whose quotes and backslashes were escaped again.
fn unescape(raw: &str) -> Result<String, SerializationError> {
    let trimmed = raw.trim();

    if let Ok(Value::String(inner)) = serde_json::from_str::<Value>(trimmed) {
        return reserialize(&inner);
    }

    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    let replaced = unquoted.replace("\\\\", "\u{0}").replace("\\\"", "\"").replace('\u{0}', "\\");
    if replaced == raw {
        return Err(SerializationError::Invalid("nothing to unescape".into()));
    }
    reserialize(&replaced)
}

/// Pull the `response` string out of a malformed payload.
fn extract_response(raw: &str) -> Result<String, SerializationError> {
    let re = Regex::new(RESPONSE_FIELD).map_err(|e| SerializationError::Invalid(e.to_string()))?;
    let captured = re
        .captures(raw)
        .and_then(|c| c.get(1))
        .ok_or_else(|| SerializationError::Invalid("no response field".into()))?
        .as_str();

    // Decode the escapes the capture still carries; raw control characters
    // make that fail, in which case the capture is used verbatim.
    let text = serde_json::from_str::<String>(&format!("\"{captured}\""))
        .unwrap_or_else(|_| captured.to_string());

    Ok(json!({ "response": text, "toolInvocations": [] }).to_string())
}
