use std::future::Future;

use futures_util::{pin_mut, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{ChatMessage, StreamEvent};

/// Seam between the relay and the upstream provider. The production
/// implementation is [`OpenAiClient`]; tests substitute a scripted mock.
pub trait ChatBackend: Clone + Send + Sync + 'static {
    /// Runs one non-streaming completion and returns the first choice's
    /// message content.
    fn complete(
        &self,
        messages: Vec<ChatMessage>,
        model: String,
    ) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Runs a streaming completion, pushing one [`StreamEvent`] per upstream
    /// fragment into `tx` in arrival order, ending with `Done` on success or
    /// a single `Error` on failure. A closed receiver means the client went
    /// away: the implementation must stop pulling and drop the upstream
    /// connection.
    fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        model: String,
        tx: mpsc::Sender<StreamEvent>,
    ) -> impl Future<Output = ()> + Send;
}

// ── Upstream wire types ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChunkResponse {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

// ── Stream line parsing ───────────────────────────────────────────────────────

/// Outcome of parsing one line of the upstream SSE body.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum UpstreamFrame {
    /// A content fragment to relay.
    Delta(String),
    /// The `[DONE]` terminal marker.
    Done,
    /// Nothing to relay: blank line, comment, non-data field, or a delta
    /// without content (e.g. the role-only first chunk).
    Skip,
}

/// Parses one line of the upstream event stream. Transport errors are handled
/// by the caller; this only distinguishes data frames from noise and flags
/// undecodable JSON as a malformed chunk.
pub(crate) fn parse_stream_line(line: &str) -> Result<UpstreamFrame, AppError> {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return Ok(UpstreamFrame::Skip);
    };
    let payload = payload.trim();
    if payload == "[DONE]" {
        return Ok(UpstreamFrame::Done);
    }

    let chunk: ChunkResponse = serde_json::from_str(payload)
        .map_err(|e| AppError::MalformedChunk(e.to_string()))?;
    match chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
    {
        Some(content) if !content.is_empty() => Ok(UpstreamFrame::Delta(content)),
        _ => Ok(UpstreamFrame::Skip),
    }
}

// ── OpenAI client ─────────────────────────────────────────────────────────────

/// `reqwest`-backed client for an OpenAI-compatible chat-completions API.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    max_tokens: Option<u32>,
}

impl OpenAiClient {
    /// Builds the client from startup configuration. A missing API key is
    /// tolerated here because the relay rejects requests before reaching the
    /// backend when no key is configured.
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            max_tokens: config.max_tokens,
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.api_base)
    }

    async fn send(&self, body: &CompletionRequest<'_>) -> Result<reqwest::Response, AppError> {
        debug!(url = %self.completions_url(), stream = body.stream, "forwarding to upstream");
        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!("upstream returned {status}: {text}")));
        }
        Ok(response)
    }
}

impl ChatBackend for OpenAiClient {
    async fn complete(&self, messages: Vec<ChatMessage>, model: String) -> Result<String, AppError> {
        let body = CompletionRequest {
            model: &model,
            messages: &messages,
            max_tokens: self.max_tokens,
            stream: false,
        };
        let response = self.send(&body).await?;
        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Upstream("upstream response contained no choices".to_string()))
    }

    async fn stream_chat(
        &self,
        messages: Vec<ChatMessage>,
        model: String,
        tx: mpsc::Sender<StreamEvent>,
    ) {
        let body = CompletionRequest {
            model: &model,
            messages: &messages,
            max_tokens: self.max_tokens,
            stream: true,
        };
        let response = match self.send(&body).await {
            Ok(r) => r,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
        };

        relay_sse_body(response.bytes_stream(), &tx).await;
        // Returning drops the response, which aborts the upstream connection.
    }
}

/// Relays a raw SSE response body into `tx`, frame by frame.
///
/// Bytes accumulate untouched until a full line is available, so a multi-byte
/// UTF-8 character whose bytes straddle a network chunk boundary is
/// reassembled before decoding; fragment content passes through exactly as
/// the upstream produced it. An unterminated final line is still parsed when
/// the upstream closes without a trailing newline.
async fn relay_sse_body<S, B, E>(body: S, tx: &mpsc::Sender<StreamEvent>)
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    pin_mut!(body);
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(StreamEvent::Error(e.to_string())).await;
                return;
            }
        };
        buf.extend_from_slice(chunk.as_ref());

        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            if !forward_line(&line, tx).await {
                return;
            }
        }
    }

    // Upstream closed; a final line without a trailing newline may still be
    // buffered.
    if !buf.is_empty() && !forward_line(&buf, tx).await {
        return;
    }

    // No [DONE] marker seen; treat the clean close as normal completion.
    let _ = tx.send(StreamEvent::Done).await;
}

/// Decodes and relays one upstream line. Returns `false` once the stream is
/// finished: terminal frame sent, decode failure, or client disconnect (a
/// closed receiver means the caller must stop pulling).
async fn forward_line(line: &[u8], tx: &mpsc::Sender<StreamEvent>) -> bool {
    let text = match std::str::from_utf8(line) {
        Ok(t) => t,
        Err(e) => {
            let err = AppError::MalformedChunk(e.to_string());
            let _ = tx.send(StreamEvent::Error(err.to_string())).await;
            return false;
        }
    };
    match parse_stream_line(text) {
        Ok(UpstreamFrame::Skip) => true,
        Ok(UpstreamFrame::Delta(content)) => tx.send(StreamEvent::Delta(content)).await.is_ok(),
        Ok(UpstreamFrame::Done) => {
            let _ = tx.send(StreamEvent::Done).await;
            false
        }
        Err(e) => {
            let _ = tx.send(StreamEvent::Error(e.to_string())).await;
            false
        }
    }
}
