//! Narration audio assembly for dialogue mode.
//!
//! Dialogue lines are synthesized as separate clips and joined into one
//! narration track with a short silence gap between lines. All mixing is done
//! by ffmpeg's concat filter; the clips are normalized to a common sample
//! rate and layout first so heterogeneous service output cannot break the
//! concat.

use std::path::{Path, PathBuf};

use crate::error::{ReelError, Result};
use crate::media::ffmpeg::run_ffmpeg;

const SAMPLE_RATE: u32 = 44100;

/// Join `clips` in order, inserting `gap` seconds of silence between
/// consecutive clips, and write the result to `output`.
pub fn concat_with_gaps(clips: &[PathBuf], gap: f64, output: &Path) -> Result<()> {
    if clips.is_empty() {
        return Err(ReelError::Composition(
            "no narration clips to concatenate".to_string(),
        ));
    }

    if clips.len() == 1 {
        std::fs::copy(&clips[0], output)?;
        return Ok(());
    }

    let mut args: Vec<String> = vec!["-y".to_string()];
    for clip in clips {
        args.push("-i".to_string());
        args.push(clip.to_string_lossy().into_owned());
    }
    args.push("-filter_complex".to_string());
    args.push(build_concat_filter(clips.len(), gap));
    args.extend(
        [
            "-map",
            "[aout]",
            "-c:a",
            "libmp3lame",
            "-q:a",
            "2",
        ]
        .map(str::to_string),
    );
    args.push(output.to_string_lossy().into_owned());

    run_ffmpeg(&args)
}

/// Filtergraph joining `n` audio inputs with `gap`-second silence inserts.
pub fn build_concat_filter(n: usize, gap: f64) -> String {
    let mut filters = Vec::new();
    let mut refs = String::new();

    for i in 0..n {
        filters.push(format!(
            "[{i}:a]aformat=sample_rates={SAMPLE_RATE}:channel_layouts=stereo[a{i}]"
        ));
        refs.push_str(&format!("[a{i}]"));
        if i + 1 < n {
            filters.push(format!(
                "aevalsrc=0:d={gap:.3}:s={SAMPLE_RATE},aformat=channel_layouts=stereo[g{i}]"
            ));
            refs.push_str(&format!("[g{i}]"));
        }
    }

    filters.push(format!("{}concat=n={}:v=0:a=1[aout]", refs, 2 * n - 1));
    filters.join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_filter_interleaves_silence_gaps() {
        let filter = build_concat_filter(3, 0.3);
        assert!(filter.contains("[a0][g0][a1][g1][a2]concat=n=5:v=0:a=1[aout]"));
        assert_eq!(filter.matches("aevalsrc=0:d=0.300").count(), 2);
    }

    #[test]
    fn concat_filter_for_two_clips() {
        let filter = build_concat_filter(2, 0.3);
        assert!(filter.contains("concat=n=3:v=0:a=1[aout]"));
    }

    #[test]
    fn single_clip_is_copied_through() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("only.mp3");
        std::fs::write(&clip, b"mp3-bytes").unwrap();
        let output = dir.path().join("narration.mp3");

        concat_with_gaps(&[clip], 0.3, &output).unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"mp3-bytes");
    }

    #[test]
    fn empty_clip_list_is_composition_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = concat_with_gaps(&[], 0.3, &dir.path().join("out.mp3")).unwrap_err();
        assert!(matches!(err, ReelError::Composition(_)));
    }
}
