use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tokio::sync::mpsc;
use tower::ServiceExt;

use vetai_backend::config::Config;
use vetai_backend::errors::AppError;
use vetai_backend::models::{ChatMessage, StreamEvent};
use vetai_backend::provider::ChatBackend;
use vetai_backend::routes::build_router;
use vetai_backend::service::relay_service::RelayService;

/// Scripted stand-in for the upstream provider. Deterministic: `complete`
/// always returns `reply`, `stream_chat` replays `fragments` and then either
/// fails with `fail_with` or finishes cleanly.
#[derive(Clone, Default)]
struct MockBackend {
    reply: String,
    fragments: Vec<String>,
    fail_with: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    fn replying(reply: &str) -> Self {
        Self { reply: reply.to_string(), ..Self::default() }
    }

    fn streaming(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            ..Self::default()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChatBackend for MockBackend {
    async fn complete(&self, _messages: Vec<ChatMessage>, _model: String) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.reply.clone())
    }

    async fn stream_chat(
        &self,
        _messages: Vec<ChatMessage>,
        _model: String,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        for fragment in &self.fragments {
            if tx.send(StreamEvent::Delta(fragment.clone())).await.is_err() {
                return;
            }
        }
        if let Some(message) = &self.fail_with {
            let _ = tx.send(StreamEvent::Error(message.clone())).await;
            return;
        }
        let _ = tx.send(StreamEvent::Done).await;
    }
}

fn test_config(api_key: Option<&str>) -> Arc<Config> {
    Arc::new(Config {
        api_key: api_key.map(String::from),
        api_base: "http://127.0.0.1:9".to_string(),
        default_model: "gpt-4".to_string(),
        port: 10000,
        max_tokens: None,
        allowed_origins: vec!["*".to_string()],
    })
}

fn app(backend: MockBackend) -> Router {
    build_router(RelayService::new(test_config(Some("test-key")), backend))
}

fn app_without_key(backend: MockBackend) -> Router {
    build_router(RelayService::new(test_config(None), backend))
}

async fn post_json(app: Router, path: &str, body: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

fn sse_frames(body: &str) -> Vec<&str> {
    body.split("\n\n").filter(|f| !f.is_empty()).collect()
}

const HELLO_REQUEST: &str = r#"{"messages":[{"role":"user","content":"hi"}]}"#;

// ── Non-streaming endpoint ────────────────────────────────────────────────────

#[tokio::test]
async fn chat_returns_mock_reply() {
    let backend = MockBackend::replying("Hi there!");
    let (status, _, body) = post_json(app(backend), "/api/chat", HELLO_REQUEST).await;

    assert_eq!(status, StatusCode::OK);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["response"], "Hi there!");
}

#[tokio::test]
async fn chat_without_messages_is_rejected_before_provider_call() {
    let backend = MockBackend::replying("unused");
    let (status, _, body) =
        post_json(app(backend.clone()), "/api/chat", r#"{"model":"gpt-4"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["error"], "Missing messages in request");
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn chat_without_api_key_fails_fast() {
    let backend = MockBackend::replying("unused");
    let (status, _, body) =
        post_json(app_without_key(backend.clone()), "/api/chat", HELLO_REQUEST).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["error"], "OpenAI API key is not configured");
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn chat_is_idempotent_against_deterministic_backend() {
    let backend = MockBackend::replying("same every time");
    let router = app(backend.clone());

    let (status_a, _, body_a) = post_json(router.clone(), "/api/chat", HELLO_REQUEST).await;
    let (status_b, _, body_b) = post_json(router, "/api/chat", HELLO_REQUEST).await;

    assert_eq!(status_a, StatusCode::OK);
    assert_eq!(status_a, status_b);
    assert_eq!(body_a, body_b);
    assert_eq!(backend.call_count(), 2);
}

// ── Streaming endpoint ────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_relays_fragments_in_order_then_done() {
    let backend = MockBackend::streaming(&["Hello", ", ", "world"]);
    let (status, content_type, body) =
        post_json(app(backend), "/api/chat/stream", HELLO_REQUEST).await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/event-stream"));

    let frames = sse_frames(&body);
    assert_eq!(
        frames,
        vec![
            r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":", "}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"world"}}]}"#,
            "data: [DONE]",
        ]
    );
}

#[tokio::test]
async fn stream_error_after_fragment_suppresses_done() {
    let backend = MockBackend {
        fragments: vec!["Hello".to_string()],
        fail_with: Some("upstream connection dropped".to_string()),
        ..MockBackend::default()
    };
    let (status, _, body) = post_json(app(backend), "/api/chat/stream", HELLO_REQUEST).await;

    assert_eq!(status, StatusCode::OK);
    let frames = sse_frames(&body);
    assert_eq!(
        frames,
        vec![
            r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#,
            r#"data: {"error":"upstream connection dropped"}"#,
        ]
    );
    assert!(!body.contains("[DONE]"));
}

#[tokio::test]
async fn stream_without_messages_emits_single_error_frame() {
    let backend = MockBackend::streaming(&["unused"]);
    let (status, content_type, body) =
        post_json(app(backend.clone()), "/api/chat/stream", r#"{}"#).await;

    // Validation failures stay inside the event stream; the content type
    // never flips to JSON.
    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/event-stream"));
    assert_eq!(
        sse_frames(&body),
        vec![r#"data: {"error":"Missing messages in request"}"#]
    );
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn stream_without_api_key_emits_single_error_frame() {
    let backend = MockBackend::streaming(&["unused"]);
    let (status, _, body) =
        post_json(app_without_key(backend.clone()), "/api/chat/stream", HELLO_REQUEST).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        sse_frames(&body),
        vec![r#"data: {"error":"OpenAI API key is not configured"}"#]
    );
    assert_eq!(backend.call_count(), 0);
}

// ── Liveness & chart ──────────────────────────────────────────────────────────

#[tokio::test]
async fn liveness_endpoint_responds() {
    let response = app(MockBackend::default())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"VetAI is running!");
}

#[tokio::test]
async fn chart_without_values_is_rejected() {
    let (status, _, body) =
        post_json(app(MockBackend::default()), "/generate-chart", r#"{}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["error"], "Missing 'values' in request");
}

#[tokio::test]
async fn chart_renders_svg_payload() {
    let (status, content_type, body) = post_json(
        app(MockBackend::default()),
        "/generate-chart",
        r#"{"values":[["Dogs",3],["Cats",5.5]]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/svg+xml"));
    assert!(body.starts_with("<svg"));
    assert!(body.contains("Dogs"));
    assert!(body.contains("Cats"));
}
