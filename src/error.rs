use thiserror::Error;

#[derive(Error, Debug)]
pub enum AudioloopError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Invalid repeat count: {0} (expected 1..=100)")]
    InvalidRepeatCount(u32),

    #[error("Codec engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Engine step '{step}' failed for '{input}': {message}")]
    EngineFailure {
        step: &'static str,
        input: String,
        message: String,
    },

    #[error("A job is already running")]
    Busy,

    #[error("No audio source loaded")]
    NoSource,

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AudioloopError>;
