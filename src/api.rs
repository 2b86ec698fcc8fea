//! Remote chat endpoint collaborator.
//!
//! The pipeline only needs one async call: message plus context in, reply
//! text out, or failure. `ChatApi` is that seam; `HttpChatClient` is the
//! production implementation speaking the hosted endpoint's JSON contract.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::time::Duration;

use crate::context::HistoryEntry;
use crate::profile::Profile;

const REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    pub conversation_history: Vec<HistoryEntry>,
    pub context: String,
}

/// Endpoint reply. `fallback: true` signals the endpoint degraded and the
/// pipeline should treat the call as failed.
#[derive(Debug, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub fallback: bool,
}

#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn send(&self, request: &ChatRequest)
        -> Result<ChatReply, Box<dyn Error + Send + Sync>>;
}

pub struct HttpChatClient {
    client: Client,
    endpoint: String,
}

impl HttpChatClient {
    pub fn new(endpoint: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl ChatApi for HttpChatClient {
    async fn send(
        &self,
        request: &ChatRequest,
    ) -> Result<ChatReply, Box<dyn Error + Send + Sync>> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("Chat endpoint error ({}): {}", status, error_text).into());
        }

        let reply: ChatReply = response.json().await?;
        Ok(reply)
    }
}
