//! Media handling, all delegated to the `ffmpeg`/`ffprobe` binaries.

pub mod audio;
pub mod compose;
pub mod ffmpeg;
pub mod probe;
