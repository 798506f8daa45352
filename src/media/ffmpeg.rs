//! Thin wrappers around the ffmpeg and ffprobe binaries.

use std::process::Command;

use crate::error::{ReelError, Result};

/// Whether ffmpeg and ffprobe are both reachable on PATH.
pub fn ffmpeg_available() -> bool {
    which::which("ffmpeg").is_ok() && which::which("ffprobe").is_ok()
}

/// Run ffmpeg to completion. Failures carry the tail of stderr, which is
/// where ffmpeg reports the actual cause.
pub fn run_ffmpeg(args: &[String]) -> Result<()> {
    log::debug!("ffmpeg {}", args.join(" "));

    let output = Command::new("ffmpeg").args(args).output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ReelError::Composition(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            tail(&stderr, 800)
        )));
    }

    Ok(())
}

/// Run ffprobe and return stdout.
pub fn run_ffprobe(args: &[&str]) -> Result<String> {
    let output = Command::new("ffprobe").args(args).output()?;
    if !output.status.success() {
        return Err(ReelError::Composition(format!(
            "ffprobe exited with {}",
            output.status
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn tail(text: &str, max: usize) -> &str {
    let trimmed = text.trim();
    match trimmed.char_indices().nth_back(max.saturating_sub(1)) {
        Some((idx, _)) => &trimmed[idx..],
        None => trimmed,
    }
}
