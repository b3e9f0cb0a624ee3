//! Pipeline events in, SSE frames out.

use futures::Stream;
use ragstream_core::event::StreamEvent;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::encoder::encode_event;

/// Encode each event from `rx` as a wire frame, in arrival order.
///
/// The stream ends when every sender is dropped, which is the shape an
/// HTTP layer forwards verbatim as a `text/event-stream` body.
pub fn frames(rx: UnboundedReceiver<StreamEvent>) -> impl Stream<Item = String> {
    UnboundedReceiverStream::new(rx).map(|event| encode_event(&event))
}
