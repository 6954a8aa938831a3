use std::path::PathBuf;
use thiserror::Error;

/// Every failure the library can report. All of them are fatal:
/// callers propagate them, nothing is retried.
#[derive(Error, Debug)]
pub enum GptError {
    // --- Configuration ---
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    // --- Data ---
    #[error("Batch shape mismatch: {0}")]
    DataShape(String),

    #[error("Corpus error: {0}")]
    Corpus(String),

    // --- Model ---
    #[error("Checkpoint {path} does not match the model: {reason}")]
    CheckpointFormat { path: PathBuf, reason: String },

    #[error("Loss became non-finite ({loss}) at step {step}")]
    NonFiniteLoss { loss: f64, step: usize },

    // --- I/O ---
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GptError>;
