use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{ChatMessage, ChatRequest, ChatResponse, StreamEvent};
use crate::provider::ChatBackend;

/// Size of the fragment channel between the upstream-pulling task and the
/// SSE response. Backpressure beyond this bound is inherited from the
/// transports on either side.
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Stateless relay between the HTTP surface and the upstream provider.
/// Holds only read-only configuration and a cloneable backend.
#[derive(Clone)]
pub struct RelayService<B: ChatBackend> {
    config: Arc<Config>,
    backend: B,
}

impl<B: ChatBackend> RelayService<B> {
    pub fn new(config: Arc<Config>, backend: B) -> Self {
        Self { config, backend }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Checks the request preconditions and resolves the model name.
    /// `messages` presence is the only shape check; the credential check
    /// happens before any backend call so a misconfigured process fails fast
    /// without touching the network.
    fn validate(&self, request: ChatRequest) -> Result<(Vec<ChatMessage>, String), AppError> {
        let messages = request.messages.ok_or(AppError::MissingMessages)?;
        if self.config.api_key.is_none() {
            error!("chat request rejected: OPENAI_API_KEY is not configured");
            return Err(AppError::MissingApiKey);
        }
        let model = request
            .model
            .unwrap_or_else(|| self.config.default_model.clone());
        Ok((messages, model))
    }

    /// One synchronous chat turn: forward the conversation, return the first
    /// choice's content.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AppError> {
        let (messages, model) = match self.validate(request) {
            Ok(v) => v,
            Err(e) => {
                error!("chat request rejected: {e}");
                return Err(e);
            }
        };
        info!(model = %model, message_count = messages.len(), "chat request received");
        debug!(?messages, "chat payload");

        match self.backend.complete(messages, model).await {
            Ok(content) => {
                info!(chars = content.len(), "chat completion succeeded");
                Ok(ChatResponse { response: content })
            }
            Err(e) => {
                error!("chat completion failed: {e}");
                Err(e)
            }
        }
    }

    /// One streaming chat turn. Always yields an event stream: validation and
    /// configuration failures surface as a single error frame rather than a
    /// JSON response, so the streaming endpoint never mixes content types.
    ///
    /// Fragments flow through a bounded channel from a spawned forwarding
    /// task (the upstream pull stops as soon as the receiver is dropped).
    pub fn stream(&self, request: ChatRequest) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        match self.validate(request) {
            Err(e) => {
                error!("stream request rejected: {e}");
                // The channel is empty, so this cannot fail on capacity.
                let _ = tx.try_send(StreamEvent::Error(e.to_string()));
            }
            Ok((messages, model)) => {
                info!(model = %model, message_count = messages.len(), "stream request received");
                debug!(?messages, "stream payload");
                let backend = self.backend.clone();
                tokio::spawn(async move {
                    backend.stream_chat(messages, model, tx).await;
                });
            }
        }
        ReceiverStream::new(rx)
    }
}
