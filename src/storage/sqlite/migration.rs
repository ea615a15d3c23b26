#[cfg(test)]
#[path = "migration_test.rs"]
mod tests;

use tokio_rusqlite::rusqlite::{self, Connection, params};

use crate::config::constants::{DEFAULT_SYSTEM_PROMPT, SYSTEM_PROMPT_KEY};

pub(crate) const MIGRATION: &str = r#"
    CREATE TABLE IF NOT EXISTS conversations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        created_at TIMESTAMP DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    );

    CREATE TABLE IF NOT EXISTS chat_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        role TEXT NOT NULL CHECK (role IN ('user', 'assistant', 'system')),
        content TEXT NOT NULL,
        timestamp TIMESTAMP DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    );

    CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
"#;

/// Older stores created `chat_messages` before messages were scoped to a
/// conversation, so the column is added separately.
const ADD_CONVERSATION_ID: &str =
    "ALTER TABLE chat_messages ADD COLUMN conversation_id INTEGER REFERENCES conversations(id)";

const CONVERSATION_ID_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation_id ON chat_messages (conversation_id)";

const SEED_SETTINGS: &str = "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)";

/// Brings the schema up to date. Safe to run on every start, against an
/// empty store or one left by any previous version.
pub(crate) fn bootstrap(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(MIGRATION)?;

    match conn.execute(ADD_CONVERSATION_ID, []) {
        Ok(_) => log::info!("Added conversation_id column to chat_messages"),
        Err(err) if is_duplicate_column(&err) => {
            log::debug!("chat_messages.conversation_id already exists");
        }
        Err(err) => return Err(err),
    }

    conn.execute(CONVERSATION_ID_INDEX, [])?;

    let seeded = conn.execute(SEED_SETTINGS, params![SYSTEM_PROMPT_KEY, DEFAULT_SYSTEM_PROMPT])?;
    if seeded > 0 {
        log::debug!("Seeded default {}", SYSTEM_PROMPT_KEY);
    }
    Ok(())
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => {
            msg.to_ascii_lowercase().contains("duplicate column name")
        }
        _ => false,
    }
}
