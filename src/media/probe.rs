//! Media probing via ffprobe.

use std::path::Path;

use crate::error::{ReelError, Result};
use crate::media::ffmpeg::run_ffprobe;

/// Duration of an audio or video file in seconds.
pub fn media_duration(path: &Path) -> Result<f64> {
    let path_str = path.to_string_lossy();
    let output = run_ffprobe(&[
        "-v",
        "error",
        "-show_entries",
        "format=duration",
        "-of",
        "default=noprint_wrappers=1:nokey=1",
        path_str.as_ref(),
    ])?;

    parse_duration(&output)
}

/// Width and height of the first video stream.
pub fn video_resolution(path: &Path) -> Result<(u32, u32)> {
    let path_str = path.to_string_lossy();
    let output = run_ffprobe(&[
        "-v",
        "error",
        "-select_streams",
        "v:0",
        "-show_entries",
        "stream=width,height",
        "-of",
        "csv=s=x:p=0",
        path_str.as_ref(),
    ])?;

    parse_resolution(&output)
}

fn parse_duration(output: &str) -> Result<f64> {
    output
        .trim()
        .parse::<f64>()
        .map_err(|_| ReelError::Composition(format!("failed to parse duration: {:?}", output)))
}

fn parse_resolution(output: &str) -> Result<(u32, u32)> {
    let trimmed = output.trim();
    let (width, height) = trimmed.split_once('x').ok_or_else(|| {
        ReelError::Composition(format!("failed to parse resolution: {:?}", trimmed))
    })?;

    let width = width
        .parse::<u32>()
        .map_err(|_| ReelError::Composition(format!("failed to parse width: {:?}", width)))?;
    let height = height
        .parse::<u32>()
        .map_err(|_| ReelError::Composition(format!("failed to parse height: {:?}", height)))?;

    Ok((width, height))
}
