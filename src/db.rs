use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::memory::ConversationMemory;
use crate::message_log::{Message, Sender};
use crate::profile::{NameUsage, Profile};

/// Durable local storage for the conversation core.
///
/// One SQLite database holds the message history, the user profile (with its
/// name-usage counters) and the long-term conversation memory. The handle is
/// constructed once by the composition root and passed explicitly to every
/// component that persists state.
pub struct Store {
    conn: Mutex<Connection>,
}

fn db_path(data_dir: &Path) -> PathBuf {
    data_dir.join("talbot.db")
}

impl Store {
    /// Open (or create) the database under the given data directory
    pub fn open(data_dir: &Path) -> std::result::Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        if !data_dir.exists() {
            std::fs::create_dir_all(data_dir)?;
        }
        let conn = Connection::open(db_path(data_dir))?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            -- Ordered chat history; seq preserves append order even when
            -- timestamps collide
            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                sender TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                edited INTEGER NOT NULL DEFAULT 0
            );

            -- Singleton user profile, replaced wholesale on save
            CREATE TABLE IF NOT EXISTS profile (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Name-usage pacing counters, reset whenever the profile changes
            CREATE TABLE IF NOT EXISTS name_usage (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                total_usage_count INTEGER NOT NULL DEFAULT 0,
                messages_since_last_name INTEGER NOT NULL DEFAULT 0
            );

            -- Long-term conversation memory, independent of the message log
            CREATE TABLE IF NOT EXISTS conversation_memory (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
    }

    // ============ Messages ============

    pub fn insert_message(&self, message: &Message) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO messages (id, sender, content, timestamp, edited)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id,
                message.sender.as_str(),
                message.content,
                message.timestamp,
                if message.edited { 1 } else { 0 }
            ],
        )?;
        Ok(())
    }

    pub fn update_message(&self, message: &Message) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE messages SET content = ?1, edited = ?2 WHERE id = ?3",
            params![
                message.content,
                if message.edited { 1 } else { 0 },
                message.id
            ],
        )?;
        Ok(())
    }

    pub fn delete_message(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM messages WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn load_messages(&self) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, sender, content, timestamp, edited FROM messages ORDER BY seq ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let sender: String = row.get(1)?;
            Ok(Message {
                id: row.get(0)?,
                sender: Sender::from_str(&sender).unwrap_or(Sender::User),
                content: row.get(2)?,
                timestamp: row.get(3)?,
                edited: row.get::<_, i64>(4)? != 0,
            })
        })?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn clear_messages(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM messages", [])?;
        Ok(())
    }

    pub fn replace_messages(&self, messages: &[Message]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM messages", [])?;
        for message in messages {
            tx.execute(
                "INSERT INTO messages (id, sender, content, timestamp, edited)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    message.sender.as_str(),
                    message.content,
                    message.timestamp,
                    if message.edited { 1 } else { 0 }
                ],
            )?;
        }
        tx.commit()
    }

    // ============ Profile ============

    /// Replace the stored profile and reset the name-usage counters
    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        let data = serde_json::to_string(profile)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO profile (id, data, updated_at) VALUES (1, ?1, ?2)",
            params![data, now],
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO name_usage (id, total_usage_count, messages_since_last_name)
             VALUES (1, 0, 0)",
            [],
        )?;
        Ok(())
    }

    pub fn load_profile(&self) -> Result<Option<Profile>> {
        let conn = self.conn.lock().unwrap();
        let data: Option<String> = conn
            .query_row("SELECT data FROM profile WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;

        match data {
            Some(json) => {
                let profile = serde_json::from_str(&json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    pub fn clear_profile(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM profile", [])?;
        conn.execute("DELETE FROM name_usage", [])?;
        Ok(())
    }

    pub fn save_name_usage(&self, usage: &NameUsage) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO name_usage (id, total_usage_count, messages_since_last_name)
             VALUES (1, ?1, ?2)",
            params![usage.total_usage_count, usage.messages_since_last_name],
        )?;
        Ok(())
    }

    pub fn load_name_usage(&self) -> Result<NameUsage> {
        let conn = self.conn.lock().unwrap();
        let usage = conn
            .query_row(
                "SELECT total_usage_count, messages_since_last_name FROM name_usage WHERE id = 1",
                [],
                |row| {
                    Ok(NameUsage {
                        total_usage_count: row.get(0)?,
                        messages_since_last_name: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(usage.unwrap_or_default())
    }

    // ============ Conversation Memory ============

    pub fn save_memory(&self, memory: &ConversationMemory) -> Result<()> {
        let data = serde_json::to_string(memory)
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO conversation_memory (id, data, updated_at) VALUES (1, ?1, ?2)",
            params![data, now],
        )?;
        Ok(())
    }

    pub fn load_memory(&self) -> Result<Option<ConversationMemory>> {
        let conn = self.conn.lock().unwrap();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM conversation_memory WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => {
                let memory = serde_json::from_str(&json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(Some(memory))
            }
            None => Ok(None),
        }
    }

    pub fn clear_memory(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM conversation_memory", [])?;
        Ok(())
    }
}
