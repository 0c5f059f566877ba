use reqwest::StatusCode;

/// Failure modes of the upstream relay.
///
/// `Cancelled` is the expected outcome of preemption and is logged rather
/// than surfaced to the client; everything else is converted to a
/// best-effort client event or JSON error at the relay boundary.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The backend refused the connection or answered with a non-success
    /// status.
    #[error("upstream unavailable{}: {detail}", status_suffix(.status))]
    UpstreamUnavailable {
        status: Option<StatusCode>,
        detail: String,
    },

    /// The backend answered but violated the expected response shape.
    #[error("upstream protocol error: {0}")]
    UpstreamProtocol(String),

    /// Connection-level failure while the stream was already open.
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The session was preempted by a newer request.
    #[error("stream cancelled")]
    Cancelled,
}

fn status_suffix(status: &Option<StatusCode>) -> String {
    match status {
        Some(code) => format!(" ({code})"),
        None => String::new(),
    }
}

impl RelayError {
    /// Human-readable detail for client-facing error payloads.
    pub fn details(&self) -> String {
        self.to_string()
    }

    /// Whether this outcome is an expected preemption rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RelayError::Cancelled)
    }
}
