//! Ordered, persisted chat history.
//!
//! The log is the single source of truth for what the transcript shows:
//! insertion order is chronological order, ids are unique, content is never
//! empty. Every mutation is mirrored to the store best-effort; a write
//! failure is logged and the in-memory session continues without durability.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::db::Store;
use crate::logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    pub fn from_str(s: &str) -> Option<Sender> {
        match s {
            "user" => Some(Sender::User),
            "assistant" => Some(Sender::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sender: Sender,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub edited: bool,
}

impl Message {
    pub fn new(sender: Sender, content: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            sender,
            content: content.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            edited: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogStats {
    pub total: usize,
    pub user_count: usize,
    pub assistant_count: usize,
    pub avg_user_len: f64,
    pub avg_assistant_len: f64,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
}

pub struct MessageLog {
    store: Arc<Store>,
    messages: Mutex<Vec<Message>>,
}

impl MessageLog {
    /// Restore the persisted history; an unreadable store yields an empty log
    pub fn load(store: Arc<Store>) -> Self {
        let messages = match store.load_messages() {
            Ok(messages) => messages,
            Err(e) => {
                logging::log_storage(&format!("Failed to load chat history: {}", e));
                Vec::new()
            }
        };

        Self {
            store,
            messages: Mutex::new(messages),
        }
    }

    /// Append a message. Empty content is a no-op; callers are responsible
    /// for not sending blank messages in the first place.
    pub fn append(&self, sender: Sender, content: &str) -> Option<Message> {
        if content.trim().is_empty() {
            return None;
        }

        let message = Message::new(sender, content);
        self.messages.lock().unwrap().push(message.clone());

        if let Err(e) = self.store.insert_message(&message) {
            logging::log_storage(&format!("Failed to persist message: {}", e));
        }

        Some(message)
    }

    /// Read-only snapshot of the history, insertion order
    pub fn all(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().unwrap().is_empty()
    }

    /// Empty the log and its persisted copy. Conversation memory is not
    /// touched; the caller decides whether that survives.
    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
        if let Err(e) = self.store.clear_messages() {
            logging::log_storage(&format!("Failed to clear persisted history: {}", e));
        }
    }

    /// Replace the whole history at once (import/restore path)
    pub fn replace_all(&self, messages: Vec<Message>) {
        if let Err(e) = self.store.replace_messages(&messages) {
            logging::log_storage(&format!("Failed to persist replaced history: {}", e));
        }
        *self.messages.lock().unwrap() = messages;
    }

    /// Rewrite the content of an existing message (UI-triggered edit)
    pub fn edit(&self, id: &str, content: &str) -> bool {
        if content.trim().is_empty() {
            return false;
        }

        let mut messages = self.messages.lock().unwrap();
        let Some(message) = messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        message.content = content.to_string();
        message.edited = true;
        let updated = message.clone();
        drop(messages);

        if let Err(e) = self.store.update_message(&updated) {
            logging::log_storage(&format!("Failed to persist edited message: {}", e));
        }
        true
    }

    /// Remove a single message (UI-triggered delete)
    pub fn delete(&self, id: &str) -> bool {
        let mut messages = self.messages.lock().unwrap();
        let before = messages.len();
        messages.retain(|m| m.id != id);
        let removed = messages.len() != before;
        drop(messages);

        if removed {
            if let Err(e) = self.store.delete_message(id) {
                logging::log_storage(&format!("Failed to delete persisted message: {}", e));
            }
        }
        removed
    }

    pub fn stats(&self) -> LogStats {
        let messages = self.messages.lock().unwrap();

        let user: Vec<&Message> = messages.iter().filter(|m| m.sender == Sender::User).collect();
        let assistant: Vec<&Message> = messages
            .iter()
            .filter(|m| m.sender == Sender::Assistant)
            .collect();

        let avg_len = |subset: &[&Message]| {
            if subset.is_empty() {
                0.0
            } else {
                subset.iter().map(|m| m.content.chars().count()).sum::<usize>() as f64
                    / subset.len() as f64
            }
        };

        LogStats {
            total: messages.len(),
            user_count: user.len(),
            assistant_count: assistant.len(),
            avg_user_len: avg_len(&user),
            avg_assistant_len: avg_len(&assistant),
            first_timestamp: messages.first().map(|m| m.timestamp.clone()),
            last_timestamp: messages.last().map(|m| m.timestamp.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_log() -> MessageLog {
        MessageLog::load(Arc::new(Store::open_in_memory().unwrap()))
    }

    #[test]
    fn test_append_preserves_order() {
        let log = test_log();
        log.append(Sender::User, "first");
        log.append(Sender::Assistant, "second");
        log.append(Sender::User, "third");

        let all = log.all();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);

        // ids are unique
        assert_ne!(all[0].id, all[1].id);
        assert_ne!(all[1].id, all[2].id);
    }

    #[test]
    fn test_append_rejects_empty_content() {
        let log = test_log();
        assert!(log.append(Sender::User, "").is_none());
        assert!(log.append(Sender::User, "   \n").is_none());
        assert!(log.is_empty());
    }

    #[test]
    fn test_clear_empties_log_and_storage() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let log = MessageLog::load(Arc::clone(&store));
        log.append(Sender::User, "hello");
        log.append(Sender::Assistant, "hi");

        log.clear();
        assert!(log.all().is_empty());

        // a fresh load from the same store is also empty
        let reloaded = MessageLog::load(store);
        assert!(reloaded.all().is_empty());
    }

    #[test]
    fn test_reload_restores_history_verbatim() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let log = MessageLog::load(Arc::clone(&store));
        log.append(Sender::User, "how are you");
        log.append(Sender::Assistant, "I'm here for you");

        let reloaded = MessageLog::load(store);
        assert_eq!(reloaded.all(), log.all());
    }

    #[test]
    fn test_edit_and_delete() {
        let log = test_log();
        let message = log.append(Sender::User, "originl text").unwrap();

        assert!(log.edit(&message.id, "original text"));
        let edited = log.all().into_iter().find(|m| m.id == message.id).unwrap();
        assert_eq!(edited.content, "original text");
        assert!(edited.edited);

        // blank edits and unknown ids are refused
        assert!(!log.edit(&message.id, "  "));
        assert!(!log.edit("no-such-id", "text"));

        assert!(log.delete(&message.id));
        assert!(!log.delete(&message.id));
        assert!(log.is_empty());
    }

    #[test]
    fn test_stats() {
        let log = test_log();
        assert_eq!(log.stats().total, 0);
        assert!(log.stats().first_timestamp.is_none());

        log.append(Sender::User, "1234");
        log.append(Sender::User, "123456");
        log.append(Sender::Assistant, "12");

        let stats = log.stats();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.user_count, 2);
        assert_eq!(stats.assistant_count, 1);
        assert!((stats.avg_user_len - 5.0).abs() < f64::EPSILON);
        assert!((stats.avg_assistant_len - 2.0).abs() < f64::EPSILON);
        assert!(stats.first_timestamp.is_some());
        assert!(stats.last_timestamp.is_some());
    }
}
