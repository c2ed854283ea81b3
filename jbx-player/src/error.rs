//! Error types for the player crate

use thiserror::Error;

/// Player error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio output error: {0}")]
    AudioOutput(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Failed to create stream for {url}: {reason}")]
    StreamCreate { url: String, reason: String },

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Resume snapshot error: {0}")]
    Resume(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Common(#[from] jbx_common::Error),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;
