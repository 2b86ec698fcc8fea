//! User profile and name-usage pacing.
//!
//! The profile is a singleton with replace-on-save semantics: saving writes
//! the whole record, clearing removes it. `context_text` renders the prompt
//! block the remote model sees. The name-usage counters pace how often the
//! assistant addresses the user by name; they reset whenever the profile is
//! replaced and persist across restarts.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::db::Store;
use crate::logging;

/// After this many user messages without the assistant using the preferred
/// name, the context builder asks for it to be woven back in.
pub const NAME_REMINDER_AFTER: i64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignificantPerson {
    pub name: String,
    pub relationship: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pronouns: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnoses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medications: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment_history: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub communication_style: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_communication: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub triggers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapy_goals: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coping_strategies: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_stressors: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub therapist_info: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub significant_people: Vec<SignificantPerson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_photo: Option<String>,
}

impl Profile {
    /// Encode raw image bytes as the binary-as-text photo field
    pub fn encode_photo(mime: &str, bytes: &[u8]) -> String {
        format!("data:{};base64,{}", mime, BASE64.encode(bytes))
    }

    pub fn set_photo(&mut self, mime: &str, bytes: &[u8]) {
        self.profile_photo = Some(Self::encode_photo(mime, bytes));
    }

    /// Render the profile as the plain-text block injected into the prompt.
    /// Returns an empty string when nothing is filled in.
    pub fn context_text(&self) -> String {
        let mut lines = Vec::new();

        if let Some(name) = &self.preferred_name {
            lines.push(format!("User's name: {}", name));
        }
        if let Some(pronouns) = &self.pronouns {
            lines.push(format!("Pronouns: {}", pronouns));
        }
        if let Some(age) = &self.age_range {
            lines.push(format!("Age: {}", age));
        }
        if let Some(diagnoses) = &self.diagnoses {
            lines.push(format!("Mental health conditions: {}", diagnoses));
        }
        if let Some(medications) = &self.medications {
            lines.push(format!("Current medications: {}", medications));
        }
        if let Some(history) = &self.treatment_history {
            lines.push(format!("Treatment background: {}", history));
        }
        if !self.communication_style.is_empty() {
            lines.push(format!(
                "Communication preferences: {}",
                self.communication_style.join(", ")
            ));
        }
        if let Some(custom) = &self.custom_communication {
            lines.push(format!("Custom communication style: {}", custom));
        }
        if let Some(triggers) = &self.triggers {
            lines.push(format!("Topics to approach carefully: {}", triggers));
        }
        if let Some(goals) = &self.therapy_goals {
            lines.push(format!("Current therapy goals: {}", goals));
        }
        if let Some(strategies) = &self.coping_strategies {
            lines.push(format!("Effective coping strategies: {}", strategies));
        }
        if let Some(stressors) = &self.current_stressors {
            lines.push(format!("Current stressors: {}", stressors));
        }
        if let Some(therapist) = &self.therapist_info {
            lines.push(format!("Therapist information: {}", therapist));
        }
        if !self.significant_people.is_empty() {
            let people: Vec<String> = self
                .significant_people
                .iter()
                .map(|p| format!("{} ({})", p.name, p.relationship))
                .collect();
            lines.push(format!("People in their life: {}", people.join(", ")));
        }

        if lines.is_empty() {
            String::new()
        } else {
            format!("User Profile:\n{}", lines.join("\n"))
        }
    }
}

/// How often the assistant has been addressing the user by name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameUsage {
    pub total_usage_count: i64,
    pub messages_since_last_name: i64,
}

impl NameUsage {
    pub fn should_use_name(&self) -> bool {
        self.messages_since_last_name >= NAME_REMINDER_AFTER
    }
}

pub struct ProfileStore {
    store: Arc<Store>,
    profile: Mutex<Option<Profile>>,
    name_usage: Mutex<NameUsage>,
}

impl ProfileStore {
    pub fn load(store: Arc<Store>) -> Self {
        let profile = match store.load_profile() {
            Ok(profile) => profile,
            Err(e) => {
                logging::log_storage(&format!("Failed to load profile: {}", e));
                None
            }
        };

        let name_usage = match store.load_name_usage() {
            Ok(usage) => usage,
            Err(e) => {
                logging::log_storage(&format!("Failed to load name usage: {}", e));
                NameUsage::default()
            }
        };

        Self {
            store,
            profile: Mutex::new(profile),
            name_usage: Mutex::new(name_usage),
        }
    }

    pub fn get(&self) -> Option<Profile> {
        self.profile.lock().unwrap().clone()
    }

    pub fn has_profile(&self) -> bool {
        self.profile.lock().unwrap().is_some()
    }

    pub fn preferred_name(&self) -> Option<String> {
        self.profile
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|p| p.preferred_name.clone())
    }

    /// Replace the profile wholesale. Name-usage pacing starts over for the
    /// new profile.
    pub fn save(&self, profile: Profile) {
        if let Err(e) = self.store.save_profile(&profile) {
            logging::log_storage(&format!("Failed to persist profile: {}", e));
        }
        *self.profile.lock().unwrap() = Some(profile);
        *self.name_usage.lock().unwrap() = NameUsage::default();
    }

    pub fn clear(&self) {
        if let Err(e) = self.store.clear_profile() {
            logging::log_storage(&format!("Failed to clear persisted profile: {}", e));
        }
        *self.profile.lock().unwrap() = None;
        *self.name_usage.lock().unwrap() = NameUsage::default();
        logging::log_conversation("Profile cleared");
    }

    pub fn name_usage(&self) -> NameUsage {
        *self.name_usage.lock().unwrap()
    }

    /// Called once per accepted user send, before the outbound context is
    /// built, so the "should use name" guidance stays accurate.
    pub fn note_user_message(&self) {
        let mut usage = self.name_usage.lock().unwrap();
        usage.messages_since_last_name += 1;
        let snapshot = *usage;
        drop(usage);
        self.persist_usage(snapshot);
    }

    /// Called when an assistant reply was seen to contain the user's name
    pub fn note_name_used(&self) {
        let mut usage = self.name_usage.lock().unwrap();
        usage.messages_since_last_name = 0;
        usage.total_usage_count += 1;
        let snapshot = *usage;
        drop(usage);
        self.persist_usage(snapshot);
    }

    fn persist_usage(&self, usage: NameUsage) {
        if let Err(e) = self.store.save_name_usage(&usage) {
            logging::log_storage(&format!("Failed to persist name usage: {}", e));
        }
    }
}
