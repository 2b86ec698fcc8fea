//! Text-to-speech collaborator.
//!
//! The core only needs "speak this reply, settle when done or failed".
//! `ElevenLabsSpeech` fetches audio from the hosted TTS endpoint and hands
//! the bytes to a playback hook supplied by the shell; `MutedSpeech` is the
//! voice-off mode.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::error::Error;
use std::time::Duration;

use crate::logging;

/// Replies longer than this are not sent to the synthesis endpoint
pub const MAX_SPOKEN_REPLY_LEN: usize = 300;

pub const DEFAULT_VOICE_ID: &str = "pNInz6obpgDQGcFmaJgB";

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
    pub style: f32,
    pub use_speaker_boost: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            stability: 0.75,
            similarity_boost: 0.85,
            style: 0.5,
            use_speaker_boost: true,
        }
    }
}

#[async_trait]
pub trait SpeechSynth: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Voice-off mode: every reply "plays" instantly
pub struct MutedSpeech;

#[async_trait]
impl SpeechSynth for MutedSpeech {
    async fn speak(&self, _text: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    voice_settings: &'a VoiceSettings,
}

type AudioPlayer = Box<dyn Fn(&[u8]) + Send + Sync>;

pub struct ElevenLabsSpeech {
    client: Client,
    endpoint: String,
    voice_id: String,
    settings: VoiceSettings,
    player: AudioPlayer,
}

impl ElevenLabsSpeech {
    /// `player` receives the fetched audio bytes; it blocks until playback
    /// finishes so `speak` settles when the reply has actually been heard.
    pub fn new(endpoint: &str, voice_id: &str, player: AudioPlayer) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.to_string(),
            voice_id: voice_id.to_string(),
            settings: VoiceSettings::default(),
            player,
        }
    }

    pub fn with_settings(mut self, settings: VoiceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Fetch synthesized audio for the given text
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, Box<dyn Error + Send + Sync>> {
        let request = TtsRequest {
            text,
            voice_id: &self.voice_id,
            voice_settings: &self.settings,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "audio/mpeg")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("TTS endpoint error ({}): {}", status, error_text).into());
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynth for ElevenLabsSpeech {
    async fn speak(&self, text: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
        if text.chars().count() > MAX_SPOKEN_REPLY_LEN {
            logging::log_pipeline("Reply too long for speech synthesis, staying silent");
            return Ok(());
        }

        let audio = self.synthesize(text).await?;
        (self.player)(&audio);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_settings_defaults() {
        let settings = VoiceSettings::default();
        assert!((settings.stability - 0.75).abs() < f32::EPSILON);
        assert!((settings.similarity_boost - 0.85).abs() < f32::EPSILON);
        assert!(settings.use_speaker_boost);
    }

    #[tokio::test]
    async fn test_muted_speech_always_settles() {
        let muted = MutedSpeech;
        assert!(muted.speak("anything at all").await.is_ok());
    }

    #[test]
    fn test_tts_request_shape() {
        let settings = VoiceSettings::default();
        let request = TtsRequest {
            text: "hello",
            voice_id: DEFAULT_VOICE_ID,
            voice_settings: &settings,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["text"], "hello");
        assert_eq!(json["voice_id"], DEFAULT_VOICE_ID);
        assert!((json["voice_settings"]["stability"].as_f64().unwrap() - 0.75).abs() < 1e-6);
    }
}
