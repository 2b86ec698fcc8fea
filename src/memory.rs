//! Long-term conversation memory.
//!
//! When the user starts a new conversation but keeps context, a compact
//! summary of the finished conversation is derived from the message log and
//! persisted independently of it. Derivation is pure keyword matching over
//! fixed vocabularies - no model calls - so "keep context, clear history"
//! runs fully offline.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::db::Store;
use crate::logging;
use crate::message_log::{Message, Sender};

// Clinical topic vocabulary. Each topic lists the substrings that count as a
// mention of it in a user message; topics are recorded in encounter order.
const TOPIC_VOCABULARY: &[(&str, &[&str])] = &[
    ("anxiety", &["anxiety", "anxious"]),
    ("depression", &["depression", "depressed"]),
    ("stress", &["stress"]),
    ("work", &["work"]),
    ("relationship", &["relationship"]),
    ("family", &["family"]),
    ("therapy", &["therapy", "therapist"]),
    ("medication", &["medication", "meds"]),
    ("sleep", &["sleep", "insomnia"]),
    ("mood", &["mood"]),
    ("panic", &["panic"]),
    ("social", &["social"]),
    ("confidence", &["confidence"]),
    ("self-esteem", &["self-esteem", "self esteem"]),
    ("trauma", &["trauma"]),
    ("grief", &["grief", "grieving"]),
    ("anger", &["anger", "angry"]),
    ("fear", &["fear", "afraid", "scared"]),
    ("worry", &["worry", "worried"]),
    ("overthinking", &["overthinking", "overthink"]),
    ("boundaries", &["boundaries", "boundary"]),
    ("communication", &["communication"]),
    ("conflict", &["conflict"]),
];

const ANXIOUS_WORDS: &[&str] = &["anxious", "worried", "stress", "panic", "nervous"];
const SAD_WORDS: &[&str] = &["sad", "depressed", "down", "hopeless", "empty"];
const ANGRY_WORDS: &[&str] = &["angry", "frustrated", "mad", "irritated", "annoyed"];
const POSITIVE_WORDS: &[&str] = &["good", "better", "happy", "grateful", "hopeful"];

const THEME_PATTERNS: &[(&str, &[&str])] = &[
    ("coping-strategies", &["cope", "manage", "deal with", "handle"]),
    ("therapy-goals", &["goal", "working on", "trying to", "want to change"]),
    ("relationships", &["relationship", "partner", "friend", "family"]),
    ("work-stress", &["work", "job", "boss", "career", "colleague"]),
];

/// Dominant emotional tone of a conversation.
///
/// Ties between word-set counts break in enumeration order (anxious, sad,
/// angry, positive); a conversation with no emotional words at all is
/// neutral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Anxious,
    Sad,
    Angry,
    Positive,
    Neutral,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Anxious => "anxious",
            Tone::Sad => "sad",
            Tone::Angry => "angry",
            Tone::Positive => "positive",
            Tone::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMemory {
    pub last_updated: String,
    pub message_count_at_save: i64,
    pub topics: Vec<String>,
    pub summary: String,
    pub emotional_tone: Tone,
    pub key_themes: Vec<String>,
}

impl ConversationMemory {
    /// Render the memory as the short paragraph appended to the outbound
    /// context. Neutral tone is omitted.
    pub fn to_prompt_text(&self) -> String {
        let mut context = String::new();

        if !self.summary.is_empty() {
            context.push_str(&format!("Previous conversation context: {}. ", self.summary));
        }
        if !self.topics.is_empty() {
            context.push_str(&format!(
                "Topics previously discussed: {}. ",
                self.topics.join(", ")
            ));
        }
        if self.emotional_tone != Tone::Neutral {
            context.push_str(&format!(
                "Previous emotional tone was {}. ",
                self.emotional_tone.as_str()
            ));
        }
        if !self.key_themes.is_empty() {
            context.push_str(&format!(
                "Key themes from before: {}. ",
                self.key_themes.join(", ")
            ));
        }

        context.trim().to_string()
    }
}

/// Derive a conversation memory from the message log. Pure: the same log
/// always yields the same memory (modulo the saved-at timestamp).
pub fn derive_from(messages: &[Message]) -> ConversationMemory {
    let user_texts: Vec<String> = messages
        .iter()
        .filter(|m| m.sender == Sender::User)
        .map(|m| m.content.to_lowercase())
        .collect();

    ConversationMemory {
        last_updated: Utc::now().to_rfc3339(),
        message_count_at_save: messages.len() as i64,
        topics: extract_topics(&user_texts),
        summary: build_summary(messages),
        emotional_tone: analyze_tone(&user_texts),
        key_themes: extract_themes(&user_texts),
    }
}

/// Topics mentioned in user messages, deduplicated in encounter order
fn extract_topics(user_texts: &[String]) -> Vec<String> {
    let mut topics: Vec<String> = Vec::new();

    for text in user_texts {
        for (topic, triggers) in TOPIC_VOCABULARY {
            if topics.iter().any(|t| t == topic) {
                continue;
            }
            if triggers.iter().any(|trigger| text.contains(trigger)) {
                topics.push((*topic).to_string());
            }
        }
    }

    topics
}

fn analyze_tone(user_texts: &[String]) -> Tone {
    let word_sets: [(Tone, &[&str]); 4] = [
        (Tone::Anxious, ANXIOUS_WORDS),
        (Tone::Sad, SAD_WORDS),
        (Tone::Angry, ANGRY_WORDS),
        (Tone::Positive, POSITIVE_WORDS),
    ];

    let mut dominant = Tone::Neutral;
    let mut dominant_count = 0usize;

    for (tone, words) in word_sets {
        let count: usize = user_texts
            .iter()
            .map(|text| words.iter().filter(|word| text.contains(*word)).count())
            .sum();
        if count > dominant_count {
            dominant_count = count;
            dominant = tone;
        }
    }

    dominant
}

fn extract_themes(user_texts: &[String]) -> Vec<String> {
    THEME_PATTERNS
        .iter()
        .filter(|(_, patterns)| {
            user_texts
                .iter()
                .any(|text| patterns.iter().any(|pattern| text.contains(pattern)))
        })
        .map(|(theme, _)| (*theme).to_string())
        .collect()
}

/// One-line summary naming the most recent main topic
fn build_summary(messages: &[Message]) -> String {
    let user_texts: Vec<String> = messages
        .iter()
        .filter(|m| m.sender == Sender::User)
        .map(|m| m.content.to_lowercase())
        .collect();

    if user_texts.is_empty() {
        return "Brief conversation with Talbot".to_string();
    }

    // only the last five user messages inform the summary line
    let start = user_texts.len().saturating_sub(5);
    let topics = extract_topics(&user_texts[start..]);
    let main_topic = topics
        .first()
        .map(|t| t.as_str())
        .unwrap_or("general wellbeing");

    format!("Recent discussion about {} and related topics", main_topic)
}

/// Persistence wrapper around the current conversation memory
pub struct MemoryStore {
    store: Arc<Store>,
    current: Mutex<Option<ConversationMemory>>,
}

impl MemoryStore {
    pub fn load(store: Arc<Store>) -> Self {
        let current = match store.load_memory() {
            Ok(memory) => memory,
            Err(e) => {
                logging::log_storage(&format!("Failed to load conversation memory: {}", e));
                None
            }
        };

        Self {
            store,
            current: Mutex::new(current),
        }
    }

    pub fn get(&self) -> Option<ConversationMemory> {
        self.current.lock().unwrap().clone()
    }

    pub fn has_memory(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    pub fn save(&self, memory: ConversationMemory) {
        logging::log_memory(&format!(
            "Saving conversation memory: {} topics, tone {}",
            memory.topics.len(),
            memory.emotional_tone.as_str()
        ));
        if let Err(e) = self.store.save_memory(&memory) {
            logging::log_storage(&format!("Failed to persist conversation memory: {}", e));
        }
        *self.current.lock().unwrap() = Some(memory);
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.clear_memory() {
            logging::log_storage(&format!("Failed to clear conversation memory: {}", e));
        }
        *self.current.lock().unwrap() = None;
        logging::log_memory("Conversation memory cleared");
    }

    /// Prompt paragraph for the current memory, empty when none is stored
    pub fn prompt_text(&self) -> String {
        self.current
            .lock()
            .unwrap()
            .as_ref()
            .map(|m| m.to_prompt_text())
            .unwrap_or_default()
    }

    /// Last `n` remembered topics, in encounter order
    pub fn recent_topics(&self, n: usize) -> Vec<String> {
        let current = self.current.lock().unwrap();
        let Some(memory) = current.as_ref() else {
            return Vec::new();
        };
        let start = memory.topics.len().saturating_sub(n);
        memory.topics[start..].to_vec()
    }
}
