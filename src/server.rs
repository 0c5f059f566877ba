use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::event::{ChannelSink, EventSink};
use crate::ollama::Upstream;
use crate::relay::StreamRelay;

const VALIDATION_ERROR: &str = "Message is required and must be a non-empty string";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub relay: StreamRelay,
    pub upstream: Arc<dyn Upstream>,
    pub upstream_url: String,
    pub model: String,
}

impl AppState {
    fn suggestion(&self) -> String {
        format!(
            "Make sure Ollama is running on {} with the {} model",
            self.upstream_url, self.model
        )
    }
}

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: Option<String>,
}

impl ChatRequest {
    /// The trimmed message, or `None` when absent or blank.
    fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/chat/simple", post(chat_simple))
        .fallback(not_found)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(req: axum::extract::Request, next: Next) -> Response {
    tracing::info!(method = %req.method(), path = %req.uri().path(), "request");
    next.run(req).await
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Streaming chat. Registers a new active stream (preempting any running
/// one), spawns the relay loop and hands the client an SSE body fed from
/// the session's sink.
async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let Some(message) = req.message() else {
        return validation_error();
    };
    tracing::info!(preview = %truncate(message, 50), "chat request");

    let (sink, rx) = ChannelSink::new();
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let token = state.relay.begin(sink.clone());

    let relay = state.relay.clone();
    let upstream = state.upstream.clone();
    let prompt = message.to_string();
    tokio::spawn(async move {
        relay.run(upstream, &prompt, sink, token).await;
    });

    let body = async_stream::stream! {
        let mut rx = rx;
        while let Some(bytes) = rx.recv().await {
            yield Ok::<Bytes, std::io::Error>(bytes);
        }
    };
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body))
        .expect("static response headers")
}

/// Non-streaming chat. One blocking upstream call, no interaction with the
/// active-stream slot.
async fn chat_simple(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    let Some(message) = req.message() else {
        return validation_error();
    };
    tracing::info!(preview = %truncate(message, 50), "simple chat request");

    match state.upstream.generate(message).await {
        Ok(out) => {
            let model = if out.model.is_empty() {
                state.model.clone()
            } else {
                out.model
            };
            let created_at = if out.created_at.is_empty() {
                chrono::Utc::now().to_rfc3339()
            } else {
                out.created_at
            };
            Json(json!({
                "response": out.response,
                "model": model,
                "created_at": created_at,
            }))
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "simple chat failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to generate response",
                    "details": e.details(),
                    "suggestion": state.suggestion(),
                })),
            )
                .into_response()
        }
    }
}

async fn not_found(method: Method, uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not Found",
            "message": format!("Route {method} {} not found", uri.path()),
        })),
    )
}

fn validation_error() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": VALIDATION_ERROR })),
    )
        .into_response()
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
