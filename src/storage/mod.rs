pub mod sqlite;

use std::sync::Arc;

use crate::{
    config::{StorageConfig, resolve_path},
    models::{Conversation, Message, Role},
};
use async_trait::async_trait;
use eyre::{Context, Result};
use sqlite::Sqlite;

/// Single key-value namespace for persisted configuration.
#[async_trait]
pub trait SettingsStore {
    /// Returns the stored value, or the built-in default for `key` when no
    /// row exists. A missing key is never an error.
    async fn get_setting(&self, key: &str) -> Result<String>;
    async fn set_setting(&self, key: &str, value: &str) -> Result<()>;
}

#[async_trait]
pub trait ConversationStore {
    async fn create_conversation(&self, name: &str) -> Result<Conversation>;
    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>>;
    /// Most recently created first.
    async fn list_conversations(&self) -> Result<Vec<Conversation>>;
    async fn rename_conversation(&self, id: i64, name: &str) -> Result<()>;
    /// Removes the conversation's messages, then the conversation itself.
    /// The two steps are not atomic.
    async fn delete_conversation(&self, id: i64) -> Result<()>;
}

#[async_trait]
pub trait MessageStore {
    async fn append_message(&self, conversation_id: i64, role: Role, content: &str)
    -> Result<()>;
    /// Oldest first.
    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>>;
}

pub trait Storage: SettingsStore + ConversationStore + MessageStore {}

impl<T: SettingsStore + ConversationStore + MessageStore> Storage for T {}

pub type ArcStorage = Arc<dyn Storage + Send + Sync>;

pub async fn new_storage(config: &StorageConfig) -> Result<ArcStorage> {
    let storage: ArcStorage = match config {
        StorageConfig::Sqlite(sqlite_config) => {
            let path = match sqlite_config.path() {
                Some(path) => Some(
                    resolve_path(path).wrap_err(format!("resolving database path {}", path))?,
                ),
                None => None,
            };
            if let Some(dir) = path.as_deref().and_then(|p| std::path::Path::new(p).parent()) {
                std::fs::create_dir_all(dir)
                    .wrap_err(format!("creating directory {}", dir.display()))?;
            }
            Arc::new(Sqlite::new(path.as_deref()).await?)
        }
    };
    Ok(storage)
}
