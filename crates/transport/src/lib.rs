//! Wire transport for ragstream.
//!
//! Serializes pipeline events into `text/event-stream` frames:
//!
//! ```text
//! event: <name>
//! data: <json-payload>
//!
//! ```
//!
//! The `data:` line is always parseable JSON; see [`encoder`] for the
//! recovery chain applied to malformed payloads.

pub mod encoder;
pub mod stream;

pub use encoder::{
    FALLBACK_PAYLOAD, Frame, Recovery, clean_event_name, encode, encode_event, recover_payload,
};
pub use stream::frames;
