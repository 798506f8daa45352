//! Narration script loading.
//!
//! Two input formats: a plain `script.txt` monologue, and a `dialogue.json`
//! two-speaker conversation (speaker descriptions plus an ordered list of
//! lines). Both are read once and never written back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ReelError, Result};

/// Read the narration script, trimmed. Fails when the file is missing or
/// blank after trimming.
pub fn load_script(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ReelError::NotFound(format!(
            "script file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let script = content.trim();
    if script.is_empty() {
        return Err(ReelError::EmptyInput(format!(
            "script file is empty: {}",
            path.display()
        )));
    }

    Ok(script.to_string())
}

/// One speaker of a dialogue: voice, caption styling, and overlay image.
#[derive(Debug, Clone, Deserialize)]
pub struct Speaker {
    pub name: String,
    pub voice_id: String,
    pub image_file: String,
    pub caption_color: String,
    pub caption_stroke_color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DialogueLine {
    pub character: String,
    pub text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DialogueScript {
    /// Optional display title, used for output naming in batch mode.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub characters: HashMap<String, Speaker>,
    pub dialogue: Vec<DialogueLine>,
}

/// Load and validate a dialogue script. Every line must reference a declared
/// speaker, and every speaker's overlay image must exist under `assets_dir`.
pub fn load_dialogue(path: &Path, assets_dir: &Path) -> Result<DialogueScript> {
    if !path.exists() {
        return Err(ReelError::NotFound(format!(
            "dialogue file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let script: DialogueScript = serde_json::from_str(&content)?;

    if script.dialogue.is_empty() {
        return Err(ReelError::EmptyInput(format!(
            "dialogue file has no lines: {}",
            path.display()
        )));
    }

    for line in &script.dialogue {
        if !script.characters.contains_key(&line.character) {
            return Err(ReelError::Config(format!(
                "dialogue line references unknown character '{}'",
                line.character
            )));
        }
    }

    for speaker in script.characters.values() {
        let image_path = assets_dir.join(&speaker.image_file);
        if !image_path.exists() {
            return Err(ReelError::NotFound(format!(
                "character image not found: {}",
                image_path.display()
            )));
        }
    }

    Ok(script)
}

/// List every `.json` dialogue file in `dir`, sorted by name. Used by batch
/// generation.
pub fn list_dialogue_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ReelError::NotFound(format!(
            "dialogues directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_json = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case("json"))
                .unwrap_or(false);
        if is_json {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(ReelError::EmptyInput(format!(
            "no dialogue files in {}",
            dir.display()
        )));
    }

    files.sort();
    Ok(files)
}
