pub mod ollama;

pub use ollama::Ollama;

#[cfg(test)]
use mockall::automock;

use crate::{
    config::BackendConfig,
    models::{ChatMessage, LocalModel},
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

/// Request handed to the inference engine. Position in `messages` is
/// conversational order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cannot connect to inference engine at {0}")]
    Connection(String),

    #[error("inference request timed out")]
    Timeout,

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("no model is set")]
    NoModel,

    #[error("inference engine returned HTTP {status}: {message}")]
    Response { status: u16, message: String },

    #[error("decoding inference engine response: {0}")]
    Decode(String),
}

/// The local inference engine, which doubles as the model registry.
#[async_trait]
#[cfg_attr(test, automock)]
pub trait Backend {
    /// Models available locally. An empty list is a valid answer.
    async fn list_models(&self) -> Result<Vec<LocalModel>, BackendError>;
    async fn chat(&self, request: ChatRequest) -> Result<String, BackendError>;
}

pub type ArcBackend = Arc<dyn Backend + Send + Sync>;

pub fn new_backend(config: &BackendConfig) -> ArcBackend {
    let mut ollama = Ollama::default().with_endpoint(&config.endpoint);
    if let Some(timeout) = config.timeout_secs {
        ollama = ollama.with_timeout(Duration::from_secs(timeout as u64));
    }
    log::debug!("Using Ollama backend at {}", ollama.endpoint());
    Arc::new(ollama)
}
