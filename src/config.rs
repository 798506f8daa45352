//! Pipeline configuration.
//!
//! Settings come from an optional `config.json` under the base directory;
//! every field falls back to a default, so a missing or malformed file is
//! never fatal. Credentials come from the environment and are resolved once,
//! before any stage runs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReelError, Result};

pub const ELEVENLABS_KEY_VAR: &str = "ELEVENLABS_API_KEY";
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

fn default_voice_stability() -> f32 {
    0.5
}

fn default_voice_similarity_boost() -> f32 {
    0.75
}

fn default_caption_font() -> String {
    "Impact".to_string()
}

fn default_caption_fontsize() -> u32 {
    70
}

fn default_caption_color() -> String {
    "white".to_string()
}

fn default_caption_stroke_color() -> String {
    "black".to_string()
}

fn default_caption_stroke_width() -> u32 {
    3
}

fn default_video_width() -> u32 {
    1080
}

fn default_video_height() -> u32 {
    1920
}

/// Flat per-run settings, immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    /// Voice stability in [0, 1].
    #[serde(default = "default_voice_stability")]
    pub voice_stability: f32,
    /// Voice similarity boost in [0, 1].
    #[serde(default = "default_voice_similarity_boost")]
    pub voice_similarity_boost: f32,
    #[serde(default = "default_caption_font")]
    pub caption_font: String,
    /// Caption font size in pixels.
    #[serde(default = "default_caption_fontsize")]
    pub caption_fontsize: u32,
    #[serde(default = "default_caption_color")]
    pub caption_color: String,
    #[serde(default = "default_caption_stroke_color")]
    pub caption_stroke_color: String,
    #[serde(default = "default_caption_stroke_width")]
    pub caption_stroke_width: u32,
    #[serde(default = "default_video_width")]
    pub video_width: u32,
    #[serde(default = "default_video_height")]
    pub video_height: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            voice_id: default_voice_id(),
            voice_stability: default_voice_stability(),
            voice_similarity_boost: default_voice_similarity_boost(),
            caption_font: default_caption_font(),
            caption_fontsize: default_caption_fontsize(),
            caption_color: default_caption_color(),
            caption_stroke_color: default_caption_stroke_color(),
            caption_stroke_width: default_caption_stroke_width(),
            video_width: default_video_width(),
            video_height: default_video_height(),
        }
    }
}

impl PipelineConfig {
    /// Load `config.json` from the base directory, falling back to defaults
    /// when the file is absent or unreadable.
    pub fn load(base_dir: &Path) -> Self {
        let path = base_dir.join("config.json");
        if !path.exists() {
            return Self::default();
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(ReelError::from)
            .and_then(|content| Ok(serde_json::from_str::<Self>(&content)?));

        match parsed {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "error loading {}, using defaults: {}",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

/// API credentials for the external speech services.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub elevenlabs_api_key: String,
    pub openai_api_key: String,
}

impl Credentials {
    /// Read both API keys from the environment. A missing or blank key is a
    /// fatal configuration error, raised before any stage runs.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            elevenlabs_api_key: read_key(ELEVENLABS_KEY_VAR)?,
            openai_api_key: read_key(OPENAI_KEY_VAR)?,
        })
    }
}

fn read_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ReelError::Auth(format!("{} is not set", var))),
    }
}
