//! Assembly of the outbound payload.
//!
//! A read-only projection over the message log, profile and conversation
//! memory. The one invariant that matters: the just-appended user message is
//! sent as its own field and must never also appear as the trailing history
//! entry, or the model sees it twice.

use serde::Serialize;

use crate::memory::ConversationMemory;
use crate::message_log::{Message, Sender};
use crate::profile::{NameUsage, Profile};
use crate::prompts;

/// History entries older than this are dropped before transmission,
/// oldest-first, to bound payload size.
pub const HISTORY_WINDOW: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct OutboundContext {
    pub outgoing_message: String,
    pub outgoing_history: Vec<HistoryEntry>,
    pub profile_context: String,
    pub memory_context: String,
}

impl OutboundContext {
    /// Full system context for the remote call: standing prompt plus the
    /// profile and memory blocks, whichever are non-empty.
    pub fn system_context(&self) -> String {
        let mut parts = vec![prompts::SYSTEM_PROMPT];
        if !self.profile_context.is_empty() {
            parts.push(&self.profile_context);
        }
        if !self.memory_context.is_empty() {
            parts.push(&self.memory_context);
        }
        parts.join("\n\n")
    }
}

/// Build the outbound payload for one send.
///
/// `log` is the full history including the just-appended current user
/// message; `current_message` is transmitted separately, so a trailing user
/// entry with identical content is dropped from the history before the
/// window is applied.
pub fn build(
    current_message: &str,
    log: &[Message],
    profile: Option<&Profile>,
    name_usage: &NameUsage,
    memory: Option<&ConversationMemory>,
) -> OutboundContext {
    let mut history: Vec<&Message> = log.iter().collect();

    if let Some(last) = history.last() {
        if last.sender == Sender::User && last.content == current_message {
            history.pop();
        }
    }

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    let outgoing_history = history[start..]
        .iter()
        .map(|m| HistoryEntry {
            sender: m.sender,
            content: m.content.clone(),
        })
        .collect();

    let mut profile_context = profile.map(|p| p.context_text()).unwrap_or_default();
    let has_name = profile.map(|p| p.preferred_name.is_some()).unwrap_or(false);
    if has_name && name_usage.should_use_name() {
        profile_context.push_str(&format!(
            "\nIt has been {} messages since you used the user's name; use it naturally in this reply.",
            name_usage.messages_since_last_name
        ));
    }

    let memory_context = memory.map(|m| m.to_prompt_text()).unwrap_or_default();

    OutboundContext {
        outgoing_message: current_message.to_string(),
        outgoing_history,
        profile_context,
        memory_context,
    }
}
