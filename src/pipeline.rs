//! Response pipeline: crisis check, remote call, reply filtering, fallback.
//!
//! Per send: Idle -> CrisisCheck -> {CrisisResponse | RemoteCall} ->
//! {Success -> Filter -> Deliver | Failure -> Fallback}. Every failure mode
//! (transport error, non-2xx, malformed body, explicit fallback flag) ends
//! in Fallback - the caller always receives renderable, in-character text.

use rand::Rng;
use std::sync::Arc;

use crate::api::{ChatApi, ChatRequest};
use crate::context::OutboundContext;
use crate::logging;
use crate::profile::ProfileStore;
use crate::safety;

/// Pre-written empathetic replies for when the remote endpoint is
/// unavailable. Chosen uniformly at random - unlike the crisis response,
/// variety here is cosmetic, not safety-critical.
pub const FALLBACK_RESPONSES: [&str; 8] = [
    "I'm here to listen. Can you tell me more about what's going on for you right now?",
    "That sounds like it's weighing on you. What do you think might be underneath those feelings?",
    "I'm having some technical difficulties, but I'm still here for you. How are you feeling in this moment?",
    "What's coming up for you when you think about that situation?",
    "I can hear that this is affecting you. What does this remind you of, if anything?",
    "That sounds really significant for you. What would it mean to you if things were different?",
    "I'm listening. What thoughts are going through your head about this?",
    "It seems like there's something important here for you. What do you think that might be?",
];

pub struct ResponsePipeline {
    chat: Arc<dyn ChatApi>,
    profile: Arc<ProfileStore>,
}

impl ResponsePipeline {
    pub fn new(chat: Arc<dyn ChatApi>, profile: Arc<ProfileStore>) -> Self {
        Self { chat, profile }
    }

    /// Produce the assistant reply for one accepted send. Never fails; the
    /// worst case is a fallback message.
    pub async fn respond(&self, outbound: &OutboundContext) -> String {
        if safety::is_crisis_message(&outbound.outgoing_message) {
            logging::log_pipeline("Crisis keywords detected, returning fixed crisis resources");
            return safety::CRISIS_RESPONSE.to_string();
        }

        let request = ChatRequest {
            message: outbound.outgoing_message.clone(),
            profile: self.profile.get(),
            conversation_history: outbound.outgoing_history.clone(),
            context: outbound.system_context(),
        };

        match self.chat.send(&request).await {
            Ok(reply) if !reply.fallback => match reply.response {
                Some(text) if !text.trim().is_empty() => self.deliver(&text),
                _ => {
                    logging::log_pipeline("Chat endpoint returned no reply text");
                    self.fallback_message()
                }
            },
            Ok(_) => {
                logging::log_pipeline("Chat endpoint signalled fallback mode");
                self.fallback_message()
            }
            Err(e) => {
                logging::log_error(&format!("Chat request failed: {}", e));
                self.fallback_message()
            }
        }
    }

    /// Success path: redact disallowed disclosures, then track whether the
    /// reply addressed the user by name.
    fn deliver(&self, raw: &str) -> String {
        let filtered = safety::filter_reply(raw);

        if let Some(name) = self.profile.preferred_name() {
            if filtered.to_lowercase().contains(&name.to_lowercase()) {
                self.profile.note_name_used();
            }
        }

        if filtered.trim().is_empty() {
            self.fallback_message()
        } else {
            filtered
        }
    }

    fn fallback_message(&self) -> String {
        let index = rand::rng().random_range(0..FALLBACK_RESPONSES.len());
        FALLBACK_RESPONSES[index].to_string()
    }
}
