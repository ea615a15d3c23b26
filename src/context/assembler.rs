#[cfg(test)]
#[path = "assembler_test.rs"]
mod tests;

use crate::config::constants::SYSTEM_PROMPT_KEY;
use crate::models::{ChatMessage, Message};
use crate::storage::{ArcStorage, MessageStore, SettingsStore};
use eyre::{Context, Result};

/// Builds the ordered payload for the inference engine from the stored
/// system prompt, the persisted history and the message being submitted.
pub struct Assembler {
    storage: ArcStorage,
}

impl Assembler {
    pub fn new(storage: ArcStorage) -> Self {
        Self { storage }
    }

    pub async fn build_context(
        &self,
        conversation_id: i64,
        pending: &str,
    ) -> Result<Vec<ChatMessage>> {
        let system_prompt = self
            .storage
            .get_setting(SYSTEM_PROMPT_KEY)
            .await
            .wrap_err("reading system prompt")?;

        let history = self
            .storage
            .list_messages(conversation_id)
            .await
            .wrap_err("reading conversation history")?;

        let context = assemble(&system_prompt, &history, pending);
        log::debug!(
            "Assembled {} context entries for conversation {}",
            context.len(),
            conversation_id
        );
        Ok(context)
    }
}

/// `[system?, history..., pending]`. The engine reads position as
/// conversational order, so this layout must not change.
pub fn assemble(system_prompt: &str, history: &[Message], pending: &str) -> Vec<ChatMessage> {
    let mut context = Vec::with_capacity(history.len() + 2);
    if !system_prompt.is_empty() {
        context.push(ChatMessage::system(system_prompt));
    }
    context.extend(history.iter().map(ChatMessage::from));
    context.push(ChatMessage::user(pending));
    context
}
