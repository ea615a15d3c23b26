use crate::models::{Message, Role};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// One positional entry of the payload handed to the inference engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

impl From<&Message> for ChatMessage {
    fn from(value: &Message) -> Self {
        Self::new(value.role(), value.content())
    }
}

/// A model the local inference engine has pulled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModel {
    name: String,
    modified_at: String,
    size: u64,
}

impl LocalModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modified_at: String::new(),
            size: 0,
        }
    }

    pub fn with_modified_at(mut self, modified_at: impl Into<String>) -> Self {
        self.modified_at = modified_at.into();
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modified_at(&self) -> &str {
        &self.modified_at
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Display for LocalModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.1} MB, modified {})",
            self.name,
            self.size as f64 / (1024.0 * 1024.0),
            if self.modified_at.is_empty() {
                "unknown"
            } else {
                &self.modified_at
            }
        )
    }
}
