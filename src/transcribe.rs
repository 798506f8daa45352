//! Caption alignment via the OpenAI Whisper transcription API.
//!
//! The audio artifact is uploaded as multipart form data and the service
//! returns segment-level timestamps (`verbose_json`). Segment ordering is the
//! service's responsibility.

use std::path::Path;

use reqwest::multipart::{Form, Part};
use reqwest::Client;

use crate::captions::{self, CaptionSegment};
use crate::error::{ReelError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com";

const MODEL: &str = "whisper-1";

pub struct WhisperClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl WhisperClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, DEFAULT_API_BASE)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn ensure_key(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ReelError::Auth("OpenAI API key is missing".to_string()));
        }
        Ok(())
    }

    /// Transcribe the narration audio into ordered caption segments.
    pub async fn transcribe(&self, audio_path: &Path) -> Result<Vec<CaptionSegment>> {
        self.ensure_key()?;

        if !audio_path.exists() {
            return Err(ReelError::NotFound(format!(
                "audio file not found: {}",
                audio_path.display()
            )));
        }

        let file_name = audio_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());
        let audio = tokio::fs::read(audio_path).await?;

        let part = Part::bytes(audio)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;
        let form = Form::new()
            .text("model", MODEL)
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", part);

        log::info!("generating captions for {}", audio_path.display());
        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("failed to read error response: {}", e));
            return Err(ReelError::ExternalService { status, message });
        }

        let body = response.text().await?;
        let segments = captions::segments_from_verbose_json(&body)?;
        log::info!("received {} caption segments", segments.len());
        Ok(segments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_fails_before_any_request() {
        let client = WhisperClient::with_base_url("", "http://127.0.0.1:0");
        let dir = tempfile::tempdir().unwrap();
        let audio = dir.path().join("voice.mp3");
        std::fs::write(&audio, b"mp3").unwrap();

        let err = client.transcribe(&audio).await.unwrap_err();
        assert!(matches!(err, ReelError::Auth(_)));
    }

    #[tokio::test]
    async fn missing_audio_file_is_not_found() {
        let client = WhisperClient::with_base_url("key", "http://127.0.0.1:0");
        let dir = tempfile::tempdir().unwrap();

        let err = client
            .transcribe(&dir.path().join("voice.mp3"))
            .await
            .unwrap_err();
        assert!(matches!(err, ReelError::NotFound(_)));
    }
}
