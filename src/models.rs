use axum::response::sse::Event;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One turn of the conversation as sent by the browser client. Only relayed,
/// never interpreted; roles are not validated against a fixed set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of `POST /api/chat` and `POST /api/chat/stream`.
///
/// `messages` is optional at the serde layer so its absence surfaces as the
/// contract error (`Missing messages in request`) instead of a generic
/// deserialization rejection. Presence is the only check performed.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Option<Vec<ChatMessage>>,
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// One frame of the downstream SSE relay.
///
/// Wire format (one `data:` line each, blank-line terminated):
/// - `Delta` → `{"choices":[{"delta":{"content": ...}}]}`
/// - `Done`  → `[DONE]`
/// - `Error` → `{"error": ...}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
    Error(String),
}

impl StreamEvent {
    /// The `data:` payload for this frame. Frames are always built through
    /// serde so content containing quotes or newlines cannot corrupt the
    /// framing.
    pub fn payload(&self) -> String {
        match self {
            StreamEvent::Delta(content) => {
                json!({ "choices": [{ "delta": { "content": content } }] }).to_string()
            }
            StreamEvent::Done => "[DONE]".to_string(),
            StreamEvent::Error(message) => json!({ "error": message }).to_string(),
        }
    }

    pub fn into_sse(self) -> Event {
        Event::default().data(self.payload())
    }
}
