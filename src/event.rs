use bytes::Bytes;
use serde_json::json;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A single client-facing occurrence on the chat stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One incremental fragment of generated text.
    Token(String),
    /// Terminal failure with a user-facing summary and detail.
    Error { error: String, details: String },
    /// Completion sentinel; the connection closes after this.
    Done,
}

impl Event {
    /// Encodes the event as a Server-Sent-Events data line.
    pub fn to_sse(&self) -> Bytes {
        let payload = match self {
            Event::Token(token) => json!({ "token": token }).to_string(),
            Event::Error { error, details } => {
                json!({ "error": error, "details": details }).to_string()
            }
            Event::Done => "[DONE]".to_string(),
        };
        Bytes::from(format!("data: {payload}\n\n"))
    }
}

/// Destination for client events.
///
/// The relay is the only writer; it consults [`is_closed`](EventSink::is_closed)
/// before emitting so nothing is queued for a connection that is gone.
pub trait EventSink: Send + Sync {
    /// Sends one event. Returns `false` if the sink no longer accepts
    /// writes; the caller must skip, not retry.
    fn send(&self, event: &Event) -> bool;

    /// Whether the underlying connection can still be written to.
    fn is_closed(&self) -> bool;

    /// Ends the client connection. Further sends are skipped.
    fn close(&self);
}

/// [`EventSink`] feeding an HTTP response body through an unbounded channel.
///
/// Dropping the sender is what terminates the body stream, so `close` takes
/// it out of the slot rather than signalling in-band.
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that feeds the response body.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl EventSink for ChannelSink {
    fn send(&self, event: &Event) -> bool {
        let guard = self.tx.lock().expect("sink lock poisoned");
        match guard.as_ref() {
            Some(tx) => tx.send(event.to_sse()).is_ok(),
            None => false,
        }
    }

    fn is_closed(&self) -> bool {
        let guard = self.tx.lock().expect("sink lock poisoned");
        match guard.as_ref() {
            Some(tx) => tx.is_closed(),
            None => true,
        }
    }

    fn close(&self) {
        self.tx.lock().expect("sink lock poisoned").take();
    }
}
