//! Background video selection.
//!
//! Picks one clip uniformly at random from a directory of candidates. The
//! random source is injected so selection is deterministic under test;
//! content is never inspected.

use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{ReelError, Result};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv"];

/// List candidate clips in `dir`, sorted by name. Extension matching is
/// case-insensitive; subdirectories are not descended into.
pub fn list_candidates(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(ReelError::NotFound(format!(
            "backgrounds directory not found: {}",
            dir.display()
        )));
    }

    let mut candidates = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_video = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                VIDEO_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);
        if is_video {
            candidates.push(path);
        }
    }

    candidates.sort();
    Ok(candidates)
}

/// Pick one background clip uniformly at random.
pub fn select_background<R: Rng + ?Sized>(dir: &Path, rng: &mut R) -> Result<PathBuf> {
    let candidates = list_candidates(dir)?;
    let selected = candidates.choose(rng).cloned().ok_or_else(|| {
        ReelError::NoBackgroundsFound(format!("no video files in {}", dir.display()))
    })?;

    log::info!("selected background video: {}", selected.display());
    Ok(selected)
}
