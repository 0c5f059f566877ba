//! Chat relay between an HTTP client and a local text-generation backend.
//!
//! The crate streams generated tokens to the client over SSE while
//! guaranteeing that at most one generation stream is live process-wide:
//! a new prompt preempts and finalizes any in-flight one. See
//! [`StreamRelay`] for the coordination protocol.

pub mod args;
mod cancel;
mod error;
mod event;
mod line_framer;
pub mod logger;
mod ollama;
mod relay;
pub mod server;
pub mod shutdown;

pub use cancel::CancelToken;
pub use error::RelayError;
pub use event::{ChannelSink, Event, EventSink};
pub use line_framer::LineFramer;
pub use ollama::{ChunkStream, GenerateChunk, GenerateResponse, OllamaClient, Upstream};
pub use relay::{Outcome, StreamRelay};
pub use server::{AppState, router};
pub use shutdown::shutdown_signal;
