//! `ragstream encode` — Run a payload through the transport encoder.

use std::io::Read;

use ragstream_transport::{Frame, Recovery, clean_event_name};
use tracing::debug;

pub async fn run(event: &str, data: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    if event.is_empty() || clean_event_name(event) != event {
        return Err(format!("Invalid event name {event:?}: must be non-empty and on one line").into());
    }

    let payload = match data {
        Some(data) => data,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    debug!(event, bytes = payload.len(), "Encoding payload");
    let frame = Frame::new(event, payload.trim_end_matches(['\r', '\n']));
    if frame.recovery != Recovery::Valid {
        eprintln!("⚠️  payload repaired ({:?})", frame.recovery);
    }
    print!("{}", frame.to_wire());
    Ok(())
}
