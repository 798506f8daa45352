//! Narration synthesis via the ElevenLabs text-to-speech API.
//!
//! All voice modelling, prosody, and timing live on the service side; this
//! client only sequences requests and writes the returned audio to disk. The
//! credential is checked before any request is built, so a missing key never
//! touches the network.

use std::path::Path;

use base64::Engine as _;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::captions::CharacterAlignment;
use crate::error::{ReelError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.elevenlabs.io";

const MODEL_ID: &str = "eleven_monolingual_v1";

/// Voice tuning parameters, both in [0, 1].
#[derive(Debug, Clone, Copy)]
pub struct VoiceSettings {
    pub stability: f32,
    pub similarity_boost: f32,
}

pub struct ElevenLabsClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TimestampedSpeech {
    audio_base64: String,
    alignment: CharacterAlignment,
}

impl ElevenLabsClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_BASE)
    }

    /// Construct against a non-default API base (used by tests and stubs).
    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn ensure_key(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ReelError::Auth(
                "ElevenLabs API key is missing".to_string(),
            ));
        }
        Ok(())
    }

    /// Synthesize `text` and write the returned MP3 to `output_path`.
    pub async fn synthesize(
        &self,
        text: &str,
        voice_id: &str,
        settings: &VoiceSettings,
        output_path: &Path,
    ) -> Result<()> {
        self.ensure_key()?;

        let url = format!("{}/v1/text-to-speech/{}", self.base_url, voice_id);
        log::info!("generating narration ({} characters)", text.chars().count());

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&request_body(text, settings))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let audio = response.bytes().await?;
        tokio::fs::write(output_path, &audio).await?;
        log::info!("narration written: {}", output_path.display());
        Ok(())
    }

    /// Synthesize `text` with character-level timestamps. The audio is
    /// written to `output_path` and the alignment is returned for caption
    /// derivation.
    pub async fn synthesize_with_timestamps(
        &self,
        text: &str,
        voice_id: &str,
        settings: &VoiceSettings,
        output_path: &Path,
    ) -> Result<CharacterAlignment> {
        self.ensure_key()?;

        let url = format!(
            "{}/v1/text-to-speech/{}/with-timestamps",
            self.base_url, voice_id
        );

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&request_body(text, settings))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(service_error(response).await);
        }

        let speech: TimestampedSpeech = response.json().await?;
        let audio = base64::engine::general_purpose::STANDARD
            .decode(&speech.audio_base64)
            .map_err(|e| ReelError::ExternalService {
                status: 200,
                message: format!("invalid base64 audio payload: {}", e),
            })?;
        tokio::fs::write(output_path, &audio).await?;

        Ok(speech.alignment)
    }
}

fn request_body(text: &str, settings: &VoiceSettings) -> serde_json::Value {
    json!({
        "text": prepare_text(text),
        "model_id": MODEL_ID,
        "voice_settings": {
            "stability": settings.stability,
            "similarity_boost": settings.similarity_boost,
        },
    })
}

async fn service_error(response: reqwest::Response) -> ReelError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("failed to read error response: {}", e));
    ReelError::ExternalService { status, message }
}

lazy_static! {
    static ref HTML_TAG: Regex = Regex::new(r"<[^>]*>").unwrap();
}

/// Strip markup and normalize whitespace before sending text to the service.
/// Generated scripts occasionally carry HTML fragments or entity escapes.
pub fn prepare_text(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&apos;", "'");

    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}
