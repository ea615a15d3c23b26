#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;

use crate::backend::{Backend, BackendError, ChatRequest};
use crate::config::{constants::OLLAMA_ENDPOINT, user_agent};
use crate::models::{ChatMessage, LocalModel};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time;

pub struct Ollama {
    endpoint: String,
    timeout: Option<time::Duration>,
}

#[async_trait]
impl Backend for Ollama {
    async fn list_models(&self) -> Result<Vec<LocalModel>, BackendError> {
        let mut req = reqwest::Client::new()
            .get(format!("{}/api/tags", self.endpoint))
            .header("User-Agent", user_agent());

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let res = req.send().await.map_err(|e| self.request_error(e))?;

        if !res.status().is_success() {
            return Err(error_response(res).await);
        }

        let res = res
            .json::<TagsResponse>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let mut models = res
            .models
            .into_iter()
            .map(|m| {
                LocalModel::new(m.name)
                    .with_modified_at(m.modified_at)
                    .with_size(m.size)
            })
            .collect::<Vec<_>>();

        models.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(models)
    }

    async fn chat(&self, request: ChatRequest) -> Result<String, BackendError> {
        if request.model.is_empty() {
            return Err(BackendError::NoModel);
        }

        let chat_req = ChatRequestBody {
            model: &request.model,
            messages: &request.messages,
            stream: false,
        };

        let mut req = reqwest::Client::new()
            .post(format!("{}/api/chat", self.endpoint))
            .header("Content-Type", "application/json")
            .header("User-Agent", user_agent());

        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        log::trace!(
            "Sending chat request: model={} messages={}",
            request.model,
            request.messages.len()
        );

        let res = req
            .json(&chat_req)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = res.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let err = error_response(res).await;
            log::error!("Chat request failed: {}", err);
            return Err(match err {
                BackendError::Response { ref message, .. } if message.contains("not found") => {
                    BackendError::UnknownModel(request.model)
                }
                err => err,
            });
        }

        if !status.is_success() {
            let err = error_response(res).await;
            log::error!("Chat request failed: {}", err);
            return Err(err);
        }

        let res = res
            .json::<ChatResponse>()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        log::trace!("Chat response received, done={}", res.done);

        Ok(res.message.content)
    }
}

impl Default for Ollama {
    fn default() -> Self {
        Self {
            endpoint: OLLAMA_ENDPOINT.to_string(),
            timeout: None,
        }
    }
}

impl Ollama {
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: time::Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_error(&self, err: reqwest::Error) -> BackendError {
        if err.is_timeout() {
            BackendError::Timeout
        } else if err.is_connect() {
            BackendError::Connection(self.endpoint.clone())
        } else {
            BackendError::Response {
                status: err.status().map(|s| s.as_u16()).unwrap_or_default(),
                message: err.to_string(),
            }
        }
    }
}

async fn error_response(res: reqwest::Response) -> BackendError {
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => err.error,
        Err(_) => body,
    };
    BackendError::Response { status, message }
}

#[derive(Serialize, Debug)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize, Serialize, Debug)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize, Serialize, Debug, Default)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize, Serialize, Debug)]
struct ModelTag {
    name: String,
    #[serde(default)]
    modified_at: String,
    #[serde(default)]
    size: u64,
}

#[derive(Deserialize, Serialize, Debug)]
struct ErrorResponse {
    error: String,
}
