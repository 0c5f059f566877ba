//! End-to-end preemption: a second `/chat` request supersedes the first.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use http_body_util::BodyExt;
use httpmock::prelude::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use chatd::{AppState, OllamaClient, StreamRelay, Upstream, router};

fn app_for(server: &MockServer) -> Router {
    let state = AppState {
        relay: StreamRelay::new(),
        upstream: Arc::new(OllamaClient::new(server.base_url(), "m")) as Arc<dyn Upstream>,
        upstream_url: server.base_url(),
        model: "m".into(),
    };
    router(state)
}

fn chat_request(message: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "message": message }).to_string()))
        .unwrap()
}

#[tokio::test]
async fn second_request_supersedes_first() {
    let server = MockServer::start_async().await;
    // The first upstream call stalls long enough to still be in flight
    // when the second request arrives.
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .json_body(json!({"model": "m", "prompt": "first", "stream": true}));
            then.status(200)
                .body("{\"response\":\"never delivered\"}\n{\"done\":true}\n")
                .delay(Duration::from_secs(2));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .json_body(json!({"model": "m", "prompt": "second", "stream": true}));
            then.status(200)
                .body("{\"response\":\"Hi\"}\n{\"done\":true}\n");
        })
        .await;

    let app = app_for(&server);

    let first_resp = app.clone().oneshot(chat_request("first")).await.unwrap();
    let first_body = tokio::spawn(async move {
        first_resp.into_body().collect().await.unwrap().to_bytes()
    });
    // Let the first relay task register and start its upstream call.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second_resp = app.oneshot(chat_request("second")).await.unwrap();
    let second_body = second_resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        std::str::from_utf8(&second_body).unwrap(),
        "data: {\"token\":\"Hi\"}\n\ndata: [DONE]\n\n"
    );

    // The preempted client got exactly one [DONE] and no tokens.
    let first_body = first_body.await.unwrap();
    assert_eq!(std::str::from_utf8(&first_body).unwrap(), "data: [DONE]\n\n");
}

#[tokio::test]
async fn rapid_requests_leave_only_the_last_streaming() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .json_body(json!({"model": "m", "prompt": "final", "stream": true}));
            then.status(200)
                .body("{\"response\":\"ok\"}\n{\"done\":true}\n");
        })
        .await;
    // The superseded prompts stall.
    for prompt in ["one", "two", "three"] {
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/generate")
                    .json_body(json!({"model": "m", "prompt": prompt, "stream": true}));
                then.status(200)
                    .body("{\"done\":true}\n")
                    .delay(Duration::from_secs(2));
            })
            .await;
    }

    let app = app_for(&server);

    let mut stale_bodies = Vec::new();
    for prompt in ["one", "two", "three"] {
        let resp = app.clone().oneshot(chat_request(prompt)).await.unwrap();
        stale_bodies.push(tokio::spawn(async move {
            resp.into_body().collect().await.unwrap().to_bytes()
        }));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let resp = app.oneshot(chat_request("final")).await.unwrap();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(
        std::str::from_utf8(&body).unwrap(),
        "data: {\"token\":\"ok\"}\n\ndata: [DONE]\n\n"
    );

    for body in stale_bodies {
        let bytes = body.await.unwrap();
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), "data: [DONE]\n\n");
    }
}
