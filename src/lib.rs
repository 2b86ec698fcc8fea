//! Talbot conversation core.
//!
//! Everything stateful lives behind `TalbotApp`, the composition root: it
//! wires the profile store, message log, conversation memory, context
//! builder, response pipeline and submission gate together in dependency
//! order and exposes the user-facing actions. UI shells (click, Enter,
//! voice) are thin adapters over `request_send`.

pub mod api;
pub mod context;
pub mod db;
pub mod gate;
pub mod logging;
pub mod memory;
pub mod message_log;
pub mod pipeline;
pub mod profile;
pub mod prompts;
pub mod safety;
pub mod speech;

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

pub use api::{ChatApi, ChatReply, ChatRequest, HttpChatClient};
pub use db::Store;
pub use gate::{SendSource, SubmissionGate, FAILSAFE_UNLOCK, MIN_SEND_INTERVAL};
pub use memory::{ConversationMemory, MemoryStore, Tone};
pub use message_log::{LogStats, Message, MessageLog, Sender};
pub use pipeline::ResponsePipeline;
pub use profile::{NameUsage, Profile, ProfileStore, SignificantPerson};
pub use speech::{ElevenLabsSpeech, MutedSpeech, SpeechSynth, VoiceSettings};

/// What became of a send request
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The gate refused the send (empty text, in-flight, or too soon)
    Rejected,
    /// The send went through; both messages are already in the log
    Replied { user: Message, reply: Message },
}

impl SendOutcome {
    pub fn accepted(&self) -> bool {
        matches!(self, SendOutcome::Replied { .. })
    }
}

/// JSON snapshot of everything the app persists locally
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppExport {
    pub export_date: String,
    pub profile: Option<Profile>,
    pub messages: Vec<Message>,
    pub conversation_memory: Option<ConversationMemory>,
    pub message_stats: LogStats,
}

pub struct TalbotApp {
    profile: Arc<ProfileStore>,
    log: Arc<MessageLog>,
    memory: Arc<MemoryStore>,
    gate: Arc<SubmissionGate>,
    pipeline: ResponsePipeline,
    speaker: Arc<dyn SpeechSynth>,
}

impl TalbotApp {
    /// Wire up the core against a storage handle and the two remote
    /// collaborators. Persisted state (history, profile, memory) is
    /// restored here, so a restart reproduces the previous session.
    pub fn new(store: Arc<Store>, chat: Arc<dyn ChatApi>, speaker: Arc<dyn SpeechSynth>) -> Self {
        if let Err(e) = logging::init_logging() {
            eprintln!("Failed to initialize logging: {}", e);
        }
        let _ = logging::cleanup_old_logs();

        let profile = Arc::new(ProfileStore::load(Arc::clone(&store)));
        let log = Arc::new(MessageLog::load(Arc::clone(&store)));
        let memory = Arc::new(MemoryStore::load(store));
        let pipeline = ResponsePipeline::new(chat, Arc::clone(&profile));
        let gate = Arc::new(SubmissionGate::new());

        logging::log_conversation("Talbot core initialized");

        Self {
            profile,
            log,
            memory,
            gate,
            pipeline,
            speaker,
        }
    }

    // ============ Sending ============

    /// Mirror the UI input buffer into the gate
    pub fn set_input(&self, text: &str) {
        self.gate.set_input(text);
    }

    pub fn input(&self) -> String {
        self.gate.input()
    }

    pub fn is_sending(&self) -> bool {
        self.gate.is_in_flight()
    }

    /// The one entry point for "user wants to send", whatever the trigger.
    /// Voice passes its finalized transcript as `text_override`; click and
    /// Enter read the input buffer.
    pub async fn request_send(
        &self,
        source: SendSource,
        text_override: Option<&str>,
    ) -> SendOutcome {
        let Some((text, generation)) = self.gate.try_acquire(source, text_override) else {
            return SendOutcome::Rejected;
        };
        SubmissionGate::arm_failsafe(Arc::clone(&self.gate), generation);

        // The user's message lands in the log before anything async runs,
        // so a reload mid-flight still shows it.
        let Some(user) = self.log.append(Sender::User, &text) else {
            self.gate.release(generation);
            return SendOutcome::Rejected;
        };
        self.profile.note_user_message();

        let current_profile = self.profile.get();
        let current_memory = self.memory.get();
        let outbound = context::build(
            &text,
            &self.log.all(),
            current_profile.as_ref(),
            &self.profile.name_usage(),
            current_memory.as_ref(),
        );

        let reply_text = self.pipeline.respond(&outbound).await;
        self.gate.release(generation);

        let Some(reply) = self.log.append(Sender::Assistant, &reply_text) else {
            logging::log_error("Assistant reply was empty, nothing appended");
            return SendOutcome::Rejected;
        };

        if let Err(e) = self.speaker.speak(&reply_text).await {
            logging::log_error(&format!("Speech synthesis failed: {}", e));
        }

        SendOutcome::Replied { user, reply }
    }

    // ============ Conversation lifecycle ============

    /// Start a new conversation but remember what it was about: derive a
    /// memory from the current history, persist it, then clear the log.
    pub fn start_new_conversation_keep_context(&self) {
        let messages = self.log.all();
        if !messages.is_empty() {
            self.memory.save(memory::derive_from(&messages));
        }
        self.log.clear();
        logging::log_conversation("New conversation started, context preserved");
    }

    /// Start completely fresh: history and memory both gone
    pub fn start_new_conversation_reset(&self) {
        self.log.clear();
        self.memory.clear();
        logging::log_conversation("Complete conversation reset");
    }

    // ============ Profile ============

    pub fn save_profile(&self, profile: Profile) {
        self.profile.save(profile);
    }

    pub fn clear_profile(&self) {
        self.profile.clear();
    }

    pub fn profile(&self) -> Option<Profile> {
        self.profile.get()
    }

    pub fn name_usage(&self) -> NameUsage {
        self.profile.name_usage()
    }

    // ============ Views ============

    pub fn messages(&self) -> Vec<Message> {
        self.log.all()
    }

    pub fn message_stats(&self) -> LogStats {
        self.log.stats()
    }

    pub fn conversation_memory(&self) -> Option<ConversationMemory> {
        self.memory.get()
    }

    /// Welcome heading, personalized once a preferred name is saved.
    /// The body copy is `prompts::WELCOME_BODY`.
    pub fn welcome_message(&self) -> String {
        match self.profile.preferred_name() {
            Some(name) => format!("Hi, {}", name),
            None => prompts::WELCOME_TITLE.to_string(),
        }
    }

    /// "Continuing our conversation" notice shown after a context-keeping
    /// reset, naming the first few remembered topics
    pub fn continuation_notice(&self) -> Option<String> {
        let memory = self.memory.get()?;
        if memory.topics.is_empty() {
            return None;
        }
        let shown: Vec<String> = memory.topics.iter().take(3).cloned().collect();
        Some(format!(
            "I remember we were discussing: {}",
            shown.join(", ")
        ))
    }

    /// Preview of what "keep context" would preserve, for the
    /// new-conversation dialog
    pub fn context_preview(&self) -> String {
        let messages = self.log.all();
        if messages.is_empty() {
            return "No conversation context to preserve yet.".to_string();
        }

        let derived = memory::derive_from(&messages);
        let start = derived.topics.len().saturating_sub(3);
        let recent = &derived.topics[start..];

        if recent.is_empty() {
            "General conversation topics and emotional context.".to_string()
        } else {
            format!("Recent topics: {}", recent.join(", "))
        }
    }

    /// Snapshot all locally persisted state for export
    pub fn export_data(&self) -> AppExport {
        AppExport {
            export_date: Utc::now().to_rfc3339(),
            profile: self.profile.get(),
            messages: self.log.all(),
            conversation_memory: self.memory.get(),
            message_stats: self.log.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FakeChat {
        calls: AtomicUsize,
        reply: String,
        delay: Option<Duration>,
    }

    impl FakeChat {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: reply.to_string(),
                delay: None,
            })
        }

        fn slow(reply: &str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                reply: reply.to_string(),
                delay: Some(delay),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatApi for FakeChat {
        async fn send(
            &self,
            _request: &ChatRequest,
        ) -> Result<ChatReply, Box<dyn Error + Send + Sync>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(ChatReply {
                response: Some(self.reply.clone()),
                fallback: false,
            })
        }
    }

    fn app_with(chat: Arc<dyn ChatApi>) -> TalbotApp {
        let store = Arc::new(Store::open_in_memory().unwrap());
        TalbotApp::new(store, chat, Arc::new(MutedSpeech))
    }

    #[tokio::test]
    async fn test_send_appends_both_messages() {
        let chat = FakeChat::new("what's been going on?");
        let app = app_with(chat.clone());

        app.set_input("I've had a rough week");
        let outcome = app.request_send(SendSource::Click, None).await;

        assert!(outcome.accepted());
        let messages = app.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[0].content, "I've had a rough week");
        assert_eq!(messages[1].sender, Sender::Assistant);
        assert_eq!(messages[1].content, "what's been going on?");
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_sends_append_exactly_one_user_message() {
        let chat = FakeChat::slow("steady on", Duration::from_millis(50));
        let app = app_with(chat.clone());

        app.set_input("first message");
        let (first, second) = tokio::join!(
            app.request_send(SendSource::Click, None),
            app.request_send(SendSource::Voice, Some("second message")),
        );

        assert!(first.accepted());
        assert_eq!(second, SendOutcome::Rejected);

        let stats = app.message_stats();
        assert_eq!(stats.user_count, 1);
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn test_rapid_resend_from_other_source_is_rejected() {
        let chat = FakeChat::new("take your time");
        let app = app_with(chat);

        app.set_input("hello");
        let first = app.request_send(SendSource::Click, None).await;
        assert!(first.accepted());

        // well under the minimum interval, different trigger source
        app.set_input("hello again");
        let second = app.request_send(SendSource::EnterKey, None).await;
        assert_eq!(second, SendOutcome::Rejected);
        assert_eq!(app.message_stats().user_count, 1);
    }

    #[tokio::test]
    async fn test_crisis_message_short_circuits_remote_call() {
        let chat = FakeChat::new("never seen");
        let app = app_with(chat.clone());

        let outcome = app
            .request_send(SendSource::Voice, Some("I want to kill myself"))
            .await;

        let SendOutcome::Replied { reply, .. } = outcome else {
            panic!("crisis send should be accepted");
        };
        assert_eq!(reply.content, safety::CRISIS_RESPONSE);
        assert!(reply.content.contains("000"));
        assert_eq!(chat.calls(), 0);
    }

    #[tokio::test]
    async fn test_keep_context_saves_memory_and_clears_log() {
        let chat = FakeChat::new("that sounds stressful");
        let app = app_with(chat);

        app.request_send(SendSource::Voice, Some("I'm really anxious about work"))
            .await;
        assert_eq!(app.messages().len(), 2);

        app.start_new_conversation_keep_context();

        assert!(app.messages().is_empty());
        let memory = app.conversation_memory().expect("memory saved");
        assert!(memory.topics.contains(&"anxiety".to_string()));
        assert_eq!(memory.emotional_tone, Tone::Anxious);

        let notice = app.continuation_notice().expect("notice shown");
        assert!(notice.contains("anxiety"));
    }

    #[tokio::test]
    async fn test_complete_reset_clears_memory_too() {
        let chat = FakeChat::new("I'm listening");
        let app = app_with(chat);

        app.request_send(SendSource::Voice, Some("I'm really anxious about work"))
            .await;
        app.start_new_conversation_keep_context();
        assert!(app.conversation_memory().is_some());

        app.start_new_conversation_reset();
        assert!(app.messages().is_empty());
        assert!(app.conversation_memory().is_none());
        assert!(app.continuation_notice().is_none());
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let chat = FakeChat::new("good to hear");

        let app = TalbotApp::new(Arc::clone(&store), chat.clone(), Arc::new(MutedSpeech));
        app.request_send(SendSource::Voice, Some("feeling better today"))
            .await;
        let before = app.messages();
        drop(app);

        let restarted = TalbotApp::new(store, chat, Arc::new(MutedSpeech));
        assert_eq!(restarted.messages(), before);
    }

    #[tokio::test]
    async fn test_welcome_and_preview_surfaces() {
        let chat = FakeChat::new("hello");
        let app = app_with(chat);

        assert_eq!(app.welcome_message(), "Hi, I'm Talbot");
        assert_eq!(
            app.context_preview(),
            "No conversation context to preserve yet."
        );

        app.save_profile(Profile {
            preferred_name: Some("Alex".to_string()),
            ..Profile::default()
        });
        assert_eq!(app.welcome_message(), "Hi, Alex");

        app.request_send(SendSource::Voice, Some("work stress is back"))
            .await;
        let preview = app.context_preview();
        assert!(preview.starts_with("Recent topics:"));
        assert!(preview.contains("work"));

        app.clear_profile();
        assert_eq!(app.welcome_message(), "Hi, I'm Talbot");
    }

    #[tokio::test]
    async fn test_export_snapshot() {
        let chat = FakeChat::new("noted");
        let app = app_with(chat);

        app.save_profile(Profile {
            preferred_name: Some("Alex".to_string()),
            ..Profile::default()
        });
        app.request_send(SendSource::Voice, Some("sleep has been bad"))
            .await;
        app.start_new_conversation_keep_context();

        let export = app.export_data();
        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(
            export.profile.and_then(|p| p.preferred_name).as_deref(),
            Some("Alex")
        );
        assert!(export.messages.is_empty());
        assert!(export.conversation_memory.is_some());

        assert!(json["exportDate"].is_string());
        assert!(json["conversationMemory"]["topics"]
            .as_array()
            .unwrap()
            .iter()
            .any(|t| t == "sleep"));
    }
}
