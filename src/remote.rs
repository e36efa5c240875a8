//! Request/response calls to the generative service: text, images, video,
//! and speech synthesis.
//!
//! These are plain HTTP exchanges, fully separate from the live session; a
//! failure here is reported inline for the affected exchange and never
//! touches conversation state.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::time::{Duration, sleep};

use crate::config::ServiceConfig;
use crate::error::RemoteCallError;

/// How often and how long to poll a long-running video operation.
const POLL_INTERVAL_SECS: u64 = 5;
const MAX_POLLS: u32 = 60;

pub struct RemoteClient {
    client: Client,
    config: ServiceConfig,
}

impl RemoteClient {
    pub fn new(config: ServiceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<String, RemoteCallError> {
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
        });
        let value = self.post("generate/text", &body).await?;
        string_field(&value, "text")
    }

    /// Returns the generated image bytes (PNG).
    pub async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, RemoteCallError> {
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
        });
        let value = self.post("generate/image", &body).await?;
        binary_field(&value, "image")
    }

    /// Edit an existing image under a text instruction.
    pub async fn edit_image(
        &self,
        image: &[u8],
        mime: &str,
        prompt: &str,
    ) -> Result<Vec<u8>, RemoteCallError> {
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
            "image": { "mime_type": mime, "data": BASE64.encode(image) },
        });
        let value = self.post("edit/image", &body).await?;
        binary_field(&value, "image")
    }

    /// Submit a video generation job and poll it to completion.
    pub async fn generate_video(&self, prompt: &str) -> Result<Vec<u8>, RemoteCallError> {
        let body = json!({
            "model": self.config.model,
            "prompt": prompt,
        });
        let submitted = self.post("generate/video", &body).await?;
        let operation = string_field(&submitted, "operation")?;

        for _ in 0..MAX_POLLS {
            sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;
            let status = self.get(&format!("operations/{}", operation)).await?;
            if status.get("done").and_then(Value::as_bool) == Some(true) {
                return binary_field(&status, "video");
            }
            log::info!("video generation still running...");
        }
        Err(RemoteCallError::PollExhausted(MAX_POLLS))
    }

    /// Synthesize speech; returns raw PCM16 at 24 kHz mono, ready for the
    /// playback scheduler.
    pub async fn synthesize_speech(&self, text: &str) -> Result<Vec<u8>, RemoteCallError> {
        let body = json!({
            "model": self.config.model,
            "text": text,
        });
        let value = self.post("generate/speech", &body).await?;
        binary_field(&value, "audio")
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, RemoteCallError> {
        let response = self
            .client
            .post(format!("{}/{}", self.config.base_url, path))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(body)
            .send()
            .await?;
        Self::into_json(response).await
    }

    async fn get(&self, path: &str) -> Result<Value, RemoteCallError> {
        let response = self
            .client
            .get(format!("{}/{}", self.config.base_url, path))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .send()
            .await?;
        Self::into_json(response).await
    }

    async fn into_json(response: reqwest::Response) -> Result<Value, RemoteCallError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RemoteCallError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.json().await?)
    }
}

fn string_field(value: &Value, field: &str) -> Result<String, RemoteCallError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RemoteCallError::Decode(format!("missing '{}' field", field)))
}

fn binary_field(value: &Value, field: &str) -> Result<Vec<u8>, RemoteCallError> {
    let encoded = string_field(value, field)?;
    BASE64
        .decode(encoded)
        .map_err(|e| RemoteCallError::Decode(e.to_string()))
}
