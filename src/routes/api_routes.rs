use std::convert::Infallible;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures_util::{Stream, StreamExt};

use crate::errors::AppError;
use crate::models::{ChatRequest, ChatResponse};
use crate::provider::ChatBackend;
use crate::service::relay_service::RelayService;

/// POST `/api/chat` — single JSON reply.
pub async fn chat_handler<B: ChatBackend>(
    State(service): State<RelayService<B>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    Ok(Json(service.chat(request).await?))
}

/// POST `/api/chat/stream` — relays upstream fragments as SSE frames.
///
/// Every outcome is reported inside the event stream: content frames followed
/// by `[DONE]` on success, or a single error frame (validation, configuration,
/// and upstream failures alike) with no `[DONE]` after it.
pub async fn chat_stream_handler<B: ChatBackend>(
    State(service): State<RelayService<B>>,
    Json(request): Json<ChatRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let events = service.stream(request).map(|event| Ok(event.into_sse()));
    Sse::new(events)
}
