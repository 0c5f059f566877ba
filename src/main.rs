use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;

use chatd::args::Args;
use chatd::{AppState, OllamaClient, StreamRelay, Upstream, logger, router, shutdown_signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    let args = Args::parse();

    let client = OllamaClient::new(args.ollama_url.clone(), args.model.clone());
    let state = AppState {
        relay: StreamRelay::new(),
        upstream: Arc::new(client) as Arc<dyn Upstream>,
        upstream_url: args.ollama_url.clone(),
        model: args.model.clone(),
    };
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(%addr, "chat relay listening");
    tracing::info!(upstream = %args.ollama_url, model = %args.model, "backend configuration");
    tracing::info!("GET  /health       - health check");
    tracing::info!("POST /chat         - streaming chat (SSE)");
    tracing::info!("POST /chat/simple  - non-streaming chat");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}
