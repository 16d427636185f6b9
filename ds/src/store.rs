//! Core Store implementation

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use crate::records::{
    ArtifactRecord, ConversationRecord, DesignIterationRecord, MessageRecord, NewArtifact, NewIteration,
};
use crate::{DB_FILE, now_ms};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    title       TEXT NOT NULL,
    created_at  INTEGER NOT NULL,
    updated_at  INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, updated_at);

CREATE TABLE IF NOT EXISTS messages (
    id              TEXT PRIMARY KEY,
    conversation_id TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    role            TEXT NOT NULL,
    content         TEXT NOT NULL,
    created_at      INTEGER NOT NULL,
    seq             INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_conversation ON messages(conversation_id, seq);

CREATE TABLE IF NOT EXISTS artifacts (
    id            TEXT PRIMARY KEY,
    message_id    TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
    artifact_type TEXT NOT NULL,
    title         TEXT,
    content       TEXT,
    image_data    BLOB,
    metadata      TEXT NOT NULL,
    created_at    INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_artifacts_message ON artifacts(message_id);

CREATE TABLE IF NOT EXISTS design_iterations (
    id                  TEXT PRIMARY KEY,
    conversation_id     TEXT NOT NULL REFERENCES conversations(id) ON DELETE CASCADE,
    parent_iteration_id TEXT REFERENCES design_iterations(id),
    prompt_used         TEXT NOT NULL,
    image_data          BLOB,
    parameters          TEXT NOT NULL,
    version             INTEGER NOT NULL,
    created_at          INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_iterations_conversation ON design_iterations(conversation_id, version);

CREATE TABLE IF NOT EXISTS turn_state (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    expires_at  INTEGER,
    updated_at  INTEGER NOT NULL
);
"#;

/// SQLite-backed store
///
/// Not `Sync`: wrap it in an actor or a mutex to share between tasks.
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create a store in the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).context("Failed to create store directory")?;
        let db_path = dir.join(DB_FILE);
        debug!("Store::open: opening {}", db_path.display());

        let conn = Connection::open(&db_path).context(format!("Failed to open database {}", db_path.display()))?;
        let store = Self {
            conn,
            path: Some(db_path),
        };
        store.migrate()?;

        info!("Opened design store at {}", dir.display());
        Ok(store)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self { conn, path: None };
        store.migrate()?;
        Ok(store)
    }

    /// Path of the database file, if file-backed
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(&self) -> Result<()> {
        debug!("Store::migrate: called");
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.conn.execute_batch(SCHEMA).context("Failed to apply schema")?;
        Ok(())
    }

    // === Conversations ===

    /// Create a conversation for a user
    pub fn create_conversation(&mut self, user_id: &str, title: &str) -> Result<ConversationRecord> {
        debug!("Store::create_conversation: user_id={}", user_id);
        let now = now_ms();
        let record = ConversationRecord {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.conn.execute(
            "INSERT INTO conversations (id, user_id, title, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![record.id, record.user_id, record.title, record.created_at, record.updated_at],
        )?;
        Ok(record)
    }

    /// Get a conversation, only if it belongs to `user_id`
    pub fn get_conversation(&self, id: &str, user_id: &str) -> Result<Option<ConversationRecord>> {
        debug!("Store::get_conversation: id={} user_id={}", id, user_id);
        let record = self
            .conn
            .query_row(
                "SELECT * FROM conversations WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                row_to_conversation,
            )
            .optional()?;
        Ok(record)
    }

    /// List a user's conversations, most recently updated first
    pub fn list_conversations(&self, user_id: &str, limit: usize, offset: usize) -> Result<Vec<ConversationRecord>> {
        debug!("Store::list_conversations: user_id={} limit={} offset={}", user_id, limit, offset);
        let mut stmt = self.conn.prepare(
            "SELECT * FROM conversations WHERE user_id = ?1 ORDER BY updated_at DESC, id DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64, offset as i64], row_to_conversation)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Change a conversation's title
    ///
    /// Returns false when the conversation does not exist.
    pub fn update_conversation_title(&mut self, id: &str, title: &str) -> Result<bool> {
        debug!("Store::update_conversation_title: id={}", id);
        let rows = self.conn.execute(
            "UPDATE conversations SET title = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, title, now_ms()],
        )?;
        Ok(rows > 0)
    }

    /// Delete a conversation and everything attached to it
    ///
    /// Returns false when the conversation does not exist for this user.
    pub fn delete_conversation(&mut self, id: &str, user_id: &str) -> Result<bool> {
        debug!("Store::delete_conversation: id={} user_id={}", id, user_id);
        let rows = self.conn.execute(
            "DELETE FROM conversations WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // === Messages ===

    /// Append a message and bump the conversation's `updated_at`
    pub fn add_message(&mut self, conversation_id: &str, role: &str, content: &str) -> Result<MessageRecord> {
        debug!("Store::add_message: conversation_id={} role={}", conversation_id, role);
        let now = now_ms();
        let tx = self.conn.transaction()?;

        let touched = tx.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![conversation_id, now],
        )?;
        if touched == 0 {
            return Err(eyre!("Conversation not found: {}", conversation_id));
        }

        let seq: i64 = tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;

        let record = MessageRecord {
            id: Uuid::now_v7().to_string(),
            conversation_id: conversation_id.to_string(),
            role: role.to_string(),
            content: content.to_string(),
            created_at: now,
            seq,
        };
        tx.execute(
            "INSERT INTO messages (id, conversation_id, role, content, created_at, seq) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.conversation_id,
                record.role,
                record.content,
                record.created_at,
                record.seq
            ],
        )?;
        tx.commit()?;
        Ok(record)
    }

    /// List a conversation's messages in insertion order
    pub fn list_messages(&self, conversation_id: &str) -> Result<Vec<MessageRecord>> {
        debug!("Store::list_messages: conversation_id={}", conversation_id);
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM messages WHERE conversation_id = ?1 ORDER BY seq ASC")?;
        let rows = stmt.query_map(params![conversation_id], row_to_message)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // === Artifacts ===

    /// Attach an artifact to a message
    pub fn add_artifact(&mut self, message_id: &str, artifact: NewArtifact) -> Result<ArtifactRecord> {
        debug!(
            "Store::add_artifact: message_id={} type={}",
            message_id, artifact.artifact_type
        );
        let record = ArtifactRecord {
            id: Uuid::now_v7().to_string(),
            message_id: message_id.to_string(),
            artifact_type: artifact.artifact_type,
            title: artifact.title,
            content: artifact.content,
            image_data: artifact.image_data,
            metadata: artifact.metadata,
            created_at: now_ms(),
        };
        self.conn.execute(
            "INSERT INTO artifacts (id, message_id, artifact_type, title, content, image_data, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.message_id,
                record.artifact_type,
                record.title,
                record.content,
                record.image_data,
                record.metadata.to_string(),
                record.created_at
            ],
        )?;
        Ok(record)
    }

    /// List the artifacts attached to a message
    pub fn list_artifacts(&self, message_id: &str) -> Result<Vec<ArtifactRecord>> {
        debug!("Store::list_artifacts: message_id={}", message_id);
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM artifacts WHERE message_id = ?1 ORDER BY created_at ASC, id ASC")?;
        let rows = stmt.query_map(params![message_id], row_to_artifact)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // === Design iterations ===

    /// Record a design iteration
    pub fn save_design_iteration(&mut self, conversation_id: &str, iteration: NewIteration) -> Result<DesignIterationRecord> {
        debug!("Store::save_design_iteration: conversation_id={}", conversation_id);
        let version = match iteration.version {
            Some(v) => v,
            None => self.conn.query_row(
                "SELECT COALESCE(MAX(version), 0) + 1 FROM design_iterations WHERE conversation_id = ?1",
                params![conversation_id],
                |row| row.get(0),
            )?,
        };

        let record = DesignIterationRecord {
            id: Uuid::now_v7().to_string(),
            conversation_id: conversation_id.to_string(),
            parent_iteration_id: iteration.parent_iteration_id,
            prompt_used: iteration.prompt_used,
            image_data: iteration.image_data,
            parameters: iteration.parameters,
            version,
            created_at: now_ms(),
        };
        self.conn.execute(
            "INSERT INTO design_iterations
                (id, conversation_id, parent_iteration_id, prompt_used, image_data, parameters, version, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.conversation_id,
                record.parent_iteration_id,
                record.prompt_used,
                record.image_data,
                record.parameters.to_string(),
                record.version,
                record.created_at
            ],
        )?;
        Ok(record)
    }

    /// List a conversation's design iterations ordered by version
    pub fn list_design_iterations(&self, conversation_id: &str) -> Result<Vec<DesignIterationRecord>> {
        debug!("Store::list_design_iterations: conversation_id={}", conversation_id);
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM design_iterations WHERE conversation_id = ?1 ORDER BY version ASC")?;
        let rows = stmt.query_map(params![conversation_id], row_to_iteration)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Most recent design iteration, if any
    pub fn latest_design_iteration(&self, conversation_id: &str) -> Result<Option<DesignIterationRecord>> {
        debug!("Store::latest_design_iteration: conversation_id={}", conversation_id);
        let record = self
            .conn
            .query_row(
                "SELECT * FROM design_iterations WHERE conversation_id = ?1 ORDER BY version DESC LIMIT 1",
                params![conversation_id],
                row_to_iteration,
            )
            .optional()?;
        Ok(record)
    }

    // === Turn state (expiring key/value) ===

    /// Store an opaque value under `key`, replacing any previous value
    ///
    /// `expires_at` is an absolute unix-ms deadline; `None` never expires.
    pub fn put_state(&mut self, key: &str, value: &str, expires_at: Option<i64>) -> Result<()> {
        debug!("Store::put_state: key={} expires_at={:?}", key, expires_at);
        self.conn.execute(
            "INSERT INTO turn_state (key, value, expires_at, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at,
                                            updated_at = excluded.updated_at",
            params![key, value, expires_at, now_ms()],
        )?;
        Ok(())
    }

    /// Fetch the value under `key`; expired entries are dropped and read as missing
    pub fn get_state(&mut self, key: &str) -> Result<Option<String>> {
        debug!("Store::get_state: key={}", key);
        let row: Option<(String, Option<i64>)> = self
            .conn
            .query_row(
                "SELECT value, expires_at FROM turn_state WHERE key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((_, Some(expires_at))) if expires_at <= now_ms() => {
                debug!("Store::get_state: key={} expired", key);
                self.delete_state(key)?;
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value)),
            None => Ok(None),
        }
    }

    /// Remove the value under `key`
    pub fn delete_state(&mut self, key: &str) -> Result<bool> {
        debug!("Store::delete_state: key={}", key);
        let rows = self.conn.execute("DELETE FROM turn_state WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired_state(&mut self) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM turn_state WHERE expires_at IS NOT NULL AND expires_at <= ?1",
            params![now_ms()],
        )?;
        if rows > 0 {
            info!("Purged {} expired turn state entries", rows);
        }
        Ok(rows)
    }
}

fn json_column(row: &Row, name: &str) -> rusqlite::Result<serde_json::Value> {
    let raw: String = row.get(name)?;
    serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_conversation(row: &Row) -> rusqlite::Result<ConversationRecord> {
    Ok(ConversationRecord {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        title: row.get("title")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn row_to_message(row: &Row) -> rusqlite::Result<MessageRecord> {
    Ok(MessageRecord {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        role: row.get("role")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        seq: row.get("seq")?,
    })
}

fn row_to_artifact(row: &Row) -> rusqlite::Result<ArtifactRecord> {
    Ok(ArtifactRecord {
        id: row.get("id")?,
        message_id: row.get("message_id")?,
        artifact_type: row.get("artifact_type")?,
        title: row.get("title")?,
        content: row.get("content")?,
        image_data: row.get("image_data")?,
        metadata: json_column(row, "metadata")?,
        created_at: row.get("created_at")?,
    })
}

fn row_to_iteration(row: &Row) -> rusqlite::Result<DesignIterationRecord> {
    Ok(DesignIterationRecord {
        id: row.get("id")?,
        conversation_id: row.get("conversation_id")?,
        parent_iteration_id: row.get("parent_iteration_id")?,
        prompt_used: row.get("prompt_used")?,
        image_data: row.get("image_data")?,
        parameters: json_column(row, "parameters")?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
    })
}
