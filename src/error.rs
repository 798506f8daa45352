use thiserror::Error;

/// Errors produced by the pipeline and the feed listing service.
///
/// Every variant is terminal for a run; there is no retry policy.
#[derive(Debug, Error)]
pub enum ReelError {
    /// A required input file or directory is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// An input file exists but is empty after trimming.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// The background directory contains no recognized video files.
    #[error("no background videos found: {0}")]
    NoBackgroundsFound(String),

    /// A credential is missing or rejected before any request is made.
    #[error("auth error: {0}")]
    Auth(String),

    /// A remote API returned a non-success response.
    #[error("external service error (status {status}): {message}")]
    ExternalService { status: u16, message: String },

    /// ffmpeg/ffprobe failed while composing or probing media.
    #[error("composition error: {0}")]
    Composition(String),

    /// Invalid pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReelError>;
