#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

use std::sync::Arc;

use crate::backend::{ArcBackend, BackendError, ChatRequest};
use crate::config::constants::SYSTEM_PROMPT_KEY;
use crate::context::Assembler;
use crate::models::{Conversation, LocalModel, Message, Role};
use crate::storage::{ArcStorage, ConversationStore, MessageStore, SettingsStore};
use eyre::{Context, Result, bail};
use thiserror::Error;
use tokio::sync::RwLock;

/// In-memory view of the active conversation. Shared with whoever renders
/// it; only the controller writes to it.
pub type Mirror = Arc<RwLock<Vec<Message>>>;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("no active conversation")]
    NoConversation,

    #[error("assembling context: {0:#}")]
    Context(eyre::Report),

    #[error("inference failed: {0}")]
    Inference(BackendError),

    /// The reply is in the mirror but the store does not have the turn yet.
    #[error("reply received but not saved: {0:#}")]
    Persist(eyre::Report),
}

/// Drives one active conversation: applies user turns to the mirror before
/// the inference engine answers, rolls them back when it fails, and persists
/// both turns once it succeeds.
pub struct Controller {
    storage: ArcStorage,
    backend: ArcBackend,
    assembler: Assembler,
    mirror: Mirror,
    active: Option<i64>,
    model: String,
}

impl Controller {
    pub fn new(storage: ArcStorage, backend: ArcBackend) -> Self {
        Self {
            assembler: Assembler::new(Arc::clone(&storage)),
            storage,
            backend,
            mirror: Mirror::default(),
            active: None,
            model: String::new(),
        }
    }

    pub fn with_mirror(mut self, mirror: Mirror) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.mirror.read().await.clone()
    }

    pub fn active_conversation(&self) -> Option<i64> {
        self.active
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    /// Picks `preferred` when given, otherwise the first locally available
    /// model. Leaves the model unset when the registry is empty.
    pub async fn resolve_model(&mut self, preferred: Option<&str>) -> Result<()> {
        if let Some(model) = preferred {
            self.model = model.to_string();
            return Ok(());
        }
        let models = self.list_models().await?;
        match models.first() {
            Some(model) => self.model = model.name().to_string(),
            None => log::warn!("No local models available"),
        }
        Ok(())
    }

    pub async fn list_models(&self) -> Result<Vec<LocalModel>> {
        self.backend.list_models().await.wrap_err("listing models")
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        self.storage.list_conversations().await
    }

    pub async fn new_conversation(&mut self, name: &str) -> Result<Conversation> {
        let conversation = self
            .storage
            .create_conversation(name)
            .await
            .wrap_err("creating conversation")?;
        self.switch_conversation(conversation.id()).await?;
        Ok(conversation)
    }

    pub async fn switch_conversation(&mut self, id: i64) -> Result<()> {
        if self.storage.get_conversation(id).await?.is_none() {
            bail!("conversation {} not found", id);
        }
        let messages = self.storage.list_messages(id).await?;
        self.active = Some(id);
        *self.mirror.write().await = messages;
        log::debug!("Switched to conversation {}", id);
        Ok(())
    }

    /// Replaces the mirror with what the store holds for the active
    /// conversation. On a read error the mirror is left as it was.
    pub async fn reload(&self) -> Result<()> {
        let messages = match self.active {
            Some(id) => self
                .storage
                .list_messages(id)
                .await
                .wrap_err("reloading conversation")?,
            None => vec![],
        };
        *self.mirror.write().await = messages;
        Ok(())
    }

    pub async fn rename_conversation(&self, id: i64, name: &str) -> Result<()> {
        self.storage.rename_conversation(id, name).await
    }

    pub async fn delete_conversation(&mut self, id: i64) -> Result<()> {
        self.storage.delete_conversation(id).await?;
        if self.active == Some(id) {
            self.active = None;
            self.mirror.write().await.clear();
        }
        Ok(())
    }

    pub async fn system_prompt(&self) -> Result<String> {
        self.storage.get_setting(SYSTEM_PROMPT_KEY).await
    }

    pub async fn set_system_prompt(&self, prompt: &str) -> Result<()> {
        self.storage.set_setting(SYSTEM_PROMPT_KEY, prompt).await
    }

    /// Sends `content` as the next user turn of the active conversation and
    /// returns the assistant reply.
    pub async fn submit(&mut self, content: &str) -> Result<String, SubmitError> {
        let conversation_id = self.active.ok_or(SubmitError::NoConversation)?;

        let position = {
            let mut mirror = self.mirror.write().await;
            mirror.push(Message::new_user(content).with_conversation_id(Some(conversation_id)));
            mirror.len() - 1
        };

        let reply = match self.complete(conversation_id, content).await {
            Ok(reply) => reply,
            Err(err) => {
                self.rollback(position).await;
                log::warn!("Submit to conversation {} failed: {}", conversation_id, err);
                return Err(err);
            }
        };

        self.mirror
            .write()
            .await
            .push(Message::new_assistant(&reply).with_conversation_id(Some(conversation_id)));

        // A failure here leaves the mirror ahead of the store until the
        // next reload.
        if let Err(err) = self.persist(conversation_id, content, &reply).await {
            log::error!("Failed to persist turn: {:#}", err);
            return Err(SubmitError::Persist(err));
        }
        Ok(reply)
    }

    async fn complete(&self, conversation_id: i64, content: &str) -> Result<String, SubmitError> {
        let messages = self
            .assembler
            .build_context(conversation_id, content)
            .await
            .map_err(SubmitError::Context)?;

        self.backend
            .chat(ChatRequest::new(&self.model, messages))
            .await
            .map_err(SubmitError::Inference)
    }

    async fn persist(&self, conversation_id: i64, content: &str, reply: &str) -> Result<()> {
        self.storage
            .append_message(conversation_id, Role::User, content)
            .await
            .wrap_err("nothing of the turn was stored")?;
        self.storage
            .append_message(conversation_id, Role::Assistant, reply)
            .await
            .wrap_err("user turn was stored but the assistant reply was not")?;
        Ok(())
    }

    async fn rollback(&self, position: usize) {
        let mut mirror = self.mirror.write().await;
        if position < mirror.len() && !mirror[position].is_persisted() {
            mirror.remove(position);
        }
    }
}
