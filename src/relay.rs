use std::sync::{Arc, Mutex};

use futures::StreamExt;

use crate::cancel::CancelToken;
use crate::error::RelayError;
use crate::event::{Event, EventSink};
use crate::line_framer::LineFramer;
use crate::ollama::{GenerateChunk, Upstream};

/// Terminal state of one relay session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Upstream signalled end-of-data and the client received `[DONE]`.
    Completed,
    /// The session was superseded by a newer request.
    Aborted,
    /// An unrecoverable upstream failure ended the session.
    Failed,
}

struct ActiveEntry {
    cancel: CancelToken,
    sink: Arc<dyn EventSink>,
}

type Slot = Arc<Mutex<Option<ActiveEntry>>>;

/// Clears the shared slot when a session ends, but only if the slot still
/// belongs to that session. Running on `Drop` makes finalization a single
/// scoped cleanup that covers every exit path exactly once.
struct FinalizeGuard {
    slot: Slot,
    sink: Arc<dyn EventSink>,
}

impl Drop for FinalizeGuard {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().expect("active stream lock poisoned");
        if matches!(slot.as_ref(), Some(entry) if Arc::ptr_eq(&entry.sink, &self.sink)) {
            *slot = None;
        }
    }
}

/// Coordinator for the process-wide single active stream.
///
/// At most one generation stream is live at a time. Accepting a new prompt
/// preempts the previous stream: its cancel token is invoked and its client
/// receives the `[DONE]` sentinel before the slot is handed to the newcomer.
/// The slot mutex is only ever held for synchronous inspect-and-swap, never
/// across an await.
#[derive(Clone, Default)]
pub struct StreamRelay {
    slot: Slot,
}

impl StreamRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sink` as the active stream, preempting any predecessor.
    ///
    /// The predecessor is cancelled and finalized toward its client before
    /// the slot is reassigned, so a half-finished stream can never race the
    /// new session's registration. Returns the new session's cancel token.
    pub fn begin(&self, sink: Arc<dyn EventSink>) -> CancelToken {
        let token = CancelToken::new();
        let mut slot = self.slot.lock().expect("active stream lock poisoned");
        if let Some(prev) = slot.take() {
            prev.cancel.cancel();
            if !prev.sink.is_closed() {
                prev.sink.send(&Event::Done);
                prev.sink.close();
            }
            tracing::info!("preempting in-flight stream");
        }
        *slot = Some(ActiveEntry {
            cancel: token.clone(),
            sink: sink.clone(),
        });
        token
    }

    /// Whether `sink` is still the one registered in the slot.
    fn owns(&self, sink: &Arc<dyn EventSink>) -> bool {
        let slot = self.slot.lock().expect("active stream lock poisoned");
        matches!(slot.as_ref(), Some(entry) if Arc::ptr_eq(&entry.sink, sink))
    }

    /// Runs one streaming session to its terminal state.
    ///
    /// The caller must have obtained `token` from [`begin`](Self::begin)
    /// with this same `sink`. Whatever way the loop exits, the slot is
    /// cleared iff it still belongs to this session.
    pub async fn run(
        &self,
        upstream: Arc<dyn Upstream>,
        prompt: &str,
        sink: Arc<dyn EventSink>,
        token: CancelToken,
    ) -> Outcome {
        let _guard = FinalizeGuard {
            slot: self.slot.clone(),
            sink: sink.clone(),
        };

        let mut chunks = match upstream.stream_generate(prompt).await {
            Ok(chunks) => chunks,
            Err(e) => return self.fail(&sink, &e),
        };
        tracing::debug!("upstream stream opened");

        let mut framer = LineFramer::new();
        loop {
            let next = tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("stream superseded, aborting");
                    return Outcome::Aborted;
                }
                next = chunks.next() => next,
            };
            match next {
                None => break,
                Some(Err(e)) => return self.fail(&sink, &e),
                Some(Ok(bytes)) => {
                    for line in framer.push(&bytes) {
                        if token.is_cancelled() {
                            tracing::info!("stream superseded, aborting");
                            return Outcome::Aborted;
                        }
                        self.forward_line(&line, &sink);
                    }
                }
            }
        }

        // A final record without a trailing newline is still a record.
        if let Some(rest) = framer.take_remainder() {
            if token.is_cancelled() {
                tracing::info!("stream superseded, aborting");
                return Outcome::Aborted;
            }
            self.forward_line(&rest, &sink);
        }

        if self.owns(&sink) {
            sink.send(&Event::Done);
            sink.close();
        }
        tracing::info!("stream completed");
        Outcome::Completed
    }

    /// Parses one upstream line and forwards its token, if any.
    fn forward_line(&self, line: &str, sink: &Arc<dyn EventSink>) {
        if line.trim().is_empty() {
            return;
        }
        let chunk: GenerateChunk = match serde_json::from_str(line) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed upstream line");
                return;
            }
        };
        if let Some(token) = chunk.response {
            if self.owns(sink) && !sink.is_closed() {
                sink.send(&Event::Token(token));
            }
        }
        if chunk.done == Some(true) {
            tracing::debug!(total_duration = ?chunk.total_duration, "generation complete");
        }
    }

    fn fail(&self, sink: &Arc<dyn EventSink>, err: &RelayError) -> Outcome {
        if err.is_cancelled() {
            tracing::info!("stream superseded, aborting");
            return Outcome::Aborted;
        }
        if self.owns(sink) && !sink.is_closed() {
            sink.send(&Event::Error {
                error: "Failed to generate response".into(),
                details: err.details(),
            });
            sink.close();
        } else {
            tracing::warn!(error = %err, "upstream failed after sink closed");
        }
        tracing::error!(error = %err, "stream failed");
        Outcome::Failed
    }
}
