#[cfg(test)]
#[path = "sqlite_test.rs"]
mod tests;

use async_trait::async_trait;
use eyre::{Context, Result, bail};
use tokio_rusqlite::{
    Connection, OpenFlags, named_params, params,
    rusqlite::{self, Row, types::Type},
};

use crate::{
    config::defaults::setting_default,
    models::{Conversation, Message, Role},
    storage::{ConversationStore, MessageStore, SettingsStore},
};

use super::migration;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub struct Sqlite {
    conn: Connection,
}

impl Sqlite {
    /// Opens the store and brings its schema up to date.
    pub async fn new(path: Option<&str>) -> Result<Self> {
        let ret = Self::open(path).await?;
        ret.run_migration().await.wrap_err("running migration")?;
        Ok(ret)
    }

    /// Opens the store without touching its schema.
    pub async fn open(path: Option<&str>) -> Result<Self> {
        let conn = match path {
            Some(path) => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
            )
            .await
            .wrap_err(format!("opening database path: {}", path))?,
            None => Connection::open_in_memory()
                .await
                .wrap_err("opening in-memory database")?,
        };
        Ok(Self { conn })
    }

    pub async fn run_migration(&self) -> Result<()> {
        self.conn
            .call(|conn| Ok::<_, rusqlite::Error>(migration::bootstrap(conn)?))
            .await
            .wrap_err("executing migration")?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) async fn execute_batch(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| Ok::<_, rusqlite::Error>(conn.execute_batch(&sql)?))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for Sqlite {
    async fn get_setting(&self, key: &str) -> Result<String> {
        let key = key.to_string();
        let default = setting_default(&key);
        let value = self
            .conn
            .call(move |conn| -> rusqlite::Result<_> {
                let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = ?")?;
                let mut rows = stmt.query(params![key])?;
                // A NULL value reads the same as a missing row.
                let value: Option<String> = match rows.next()? {
                    Some(row) => row.get(0)?,
                    None => None,
                };
                Ok(value)
            })
            .await
            .wrap_err("reading setting")?;
        Ok(value.unwrap_or_else(|| default.to_string()))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let key = key.to_string();
        let value = value.to_string();
        self.conn
            .call(move |conn| -> rusqlite::Result<_> {
                Ok(conn.execute(
                    r#"INSERT INTO settings (key, value) VALUES (:key, :value)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value
                "#,
                    named_params! {
                        ":key": key,
                        ":value": value,
                    },
                )?)
            })
            .await
            .wrap_err("writing setting")?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for Sqlite {
    async fn create_conversation(&self, name: &str) -> Result<Conversation> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> rusqlite::Result<_> {
                Ok(conn.execute(
                    "INSERT INTO conversations (name) VALUES (?)",
                    params![name],
                )?)
            })
            .await
            .wrap_err("inserting conversation")?;

        // Only correct while a single writer is active.
        let conversation = self
            .conn
            .call(|conn| -> rusqlite::Result<_> {
                let mut stmt = conn.prepare(
                    "SELECT id, name, created_at FROM conversations ORDER BY created_at DESC, id DESC LIMIT 1",
                )?;
                let mut rows = stmt.query([])?;
                let conversation = match rows.next()? {
                    Some(row) => Some(conversation_from_row(row)?),
                    None => None,
                };
                Ok(conversation)
            })
            .await
            .wrap_err("looking up created conversation")?;

        match conversation {
            Some(conversation) => Ok(conversation),
            None => bail!("created conversation not found"),
        }
    }

    async fn get_conversation(&self, id: i64) -> Result<Option<Conversation>> {
        let conversation = self
            .conn
            .call(move |conn| -> rusqlite::Result<_> {
                let mut stmt =
                    conn.prepare("SELECT id, name, created_at FROM conversations WHERE id = ?")?;
                let mut rows = stmt.query(params![id])?;
                let conversation = match rows.next()? {
                    Some(row) => Some(conversation_from_row(row)?),
                    None => None,
                };
                Ok(conversation)
            })
            .await
            .wrap_err(format!("getting conversation {}", id))?;
        Ok(conversation)
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>> {
        let conversations = self
            .conn
            .call(|conn| -> rusqlite::Result<_> {
                let mut stmt = conn.prepare(
                    "SELECT id, name, created_at FROM conversations ORDER BY created_at DESC, id DESC",
                )?;
                let mut rows = stmt.query([])?;
                let mut conversations = vec![];
                while let Some(row) = rows.next()? {
                    conversations.push(conversation_from_row(row)?);
                }
                Ok(conversations)
            })
            .await
            .wrap_err("listing conversations")?;
        Ok(conversations)
    }

    async fn rename_conversation(&self, id: i64, name: &str) -> Result<()> {
        let name = name.to_string();
        let affected_rows = self
            .conn
            .call(move |conn| -> rusqlite::Result<_> {
                Ok(conn.execute(
                    "UPDATE conversations SET name = ? WHERE id = ?",
                    params![name, id],
                )?)
            })
            .await
            .wrap_err(format!("renaming conversation {}", id))?;

        if affected_rows == 0 {
            bail!("conversation {} not found", id);
        }
        Ok(())
    }

    async fn delete_conversation(&self, id: i64) -> Result<()> {
        let removed = self
            .conn
            .call(move |conn| -> rusqlite::Result<_> {
                Ok(conn.execute(
                    "DELETE FROM chat_messages WHERE conversation_id = ?",
                    params![id],
                )?)
            })
            .await
            .wrap_err(format!("deleting messages of conversation {}", id))?;
        log::debug!("Removed {} messages of conversation {}", removed, id);

        // No enclosing transaction: if this fails the messages stay deleted
        // while the conversation row survives.
        self.conn
            .call(move |conn| -> rusqlite::Result<_> {
                Ok(conn.execute("DELETE FROM conversations WHERE id = ?", params![id])?)
            })
            .await
            .wrap_err(format!(
                "deleting conversation {} after its {} messages were removed",
                id, removed
            ))?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for Sqlite {
    async fn append_message(
        &self,
        conversation_id: i64,
        role: Role,
        content: &str,
    ) -> Result<()> {
        let content = content.to_string();
        self.conn
            .call(move |conn| -> rusqlite::Result<_> {
                Ok(conn.execute(
                    r#"INSERT INTO chat_messages (conversation_id, role, content)
                VALUES (:conversation_id, :role, :content)"#,
                    named_params! {
                        ":conversation_id": conversation_id,
                        ":role": role.as_str(),
                        ":content": content,
                    },
                )?)
            })
            .await
            .wrap_err(format!(
                "appending {} message to conversation {}",
                role, conversation_id
            ))?;
        Ok(())
    }

    async fn list_messages(&self, conversation_id: i64) -> Result<Vec<Message>> {
        let messages = self.conn.call(move |conn| -> rusqlite::Result<_> {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, timestamp FROM chat_messages WHERE conversation_id = ? ORDER BY timestamp ASC, id ASC",
            )?;
            let mut rows = stmt.query(params![conversation_id])?;
            let mut messages = vec![];
            while let Some(row) = rows.next()? {
                messages.push(message_from_row(row)?);
            }
            Ok(messages)
        })
        .await
        .wrap_err(format!("listing messages of conversation {}", conversation_id))?;
        Ok(messages)
    }
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let id: i64 = row.get(0)?;
    let name: String = row.get(1)?;
    let created_at = parse_timestamp(2, row.get(2)?)?;
    Ok(Conversation::new(id, name).with_created_at(created_at))
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    let id: i64 = row.get(0)?;
    let conversation_id: Option<i64> = row.get(1)?;
    let role: String = row.get(2)?;
    let role = role
        .parse::<Role>()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(err)))?;
    let content: String = row.get(3)?;
    let timestamp = parse_timestamp(4, row.get(4)?)?;

    Ok(Message::new(role, content)
        .with_id(id)
        .with_conversation_id(conversation_id)
        .with_timestamp(timestamp))
}

/// Accepts both the millisecond timestamps written by the current schema
/// and the second-resolution `CURRENT_TIMESTAMP` values of older rows.
fn parse_timestamp(
    idx: usize,
    value: Option<String>,
) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let Some(value) = value else {
        return Ok(chrono::DateTime::UNIX_EPOCH);
    };
    chrono::NaiveDateTime::parse_from_str(&value, TIMESTAMP_FORMAT)
        .map(|ts| ts.and_utc())
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}
