//! Graceful shutdown helper.
//!
//! `shutdown_signal` waits for either `Ctrl+C` or a `SIGTERM` on Unix so
//! the server can stop accepting connections cleanly.

/// Waits for either `Ctrl+C` or `SIGTERM` (on Unix) to be received.
pub async fn shutdown_signal() {
    tracing::debug!("awaiting shutdown signal");
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut term = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
        tracing::debug!("shutdown signal received");
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::debug!("shutdown signal received");
    }
}
