use std::path::PathBuf;
use thiserror::Error;

use crate::jobs::JobStatus;

#[derive(Error, Debug)]
pub enum TartilError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Background '{name}' not found in backgrounds/")]
    BackgroundNotFound { name: String },

    #[error("Download failed for {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Scripture catalog lookup failed: {reason}")]
    CatalogFailed { reason: String },

    #[error("No captions: the text produced no caption units")]
    NoCaptions,

    #[error("Could not measure narration duration of {path}")]
    UnmeasurableAudio { path: PathBuf },

    #[error("video generation failed")]
    EncodeFailed,

    #[error("{tool} did not finish within {seconds}s")]
    ToolTimeout { tool: String, seconds: u64 },

    #[error("Job queue is full ({capacity} jobs pending)")]
    QueueFull { capacity: usize },

    #[error("Job {0} not found")]
    JobNotFound(String),

    #[error("Job {job_id} cannot move from {from} to {to}")]
    InvalidTransition {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Output file {0} not found")]
    OutputNotFound(String),

    #[error("Pipeline wiring failed: {0}")]
    Wiring(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, TartilError>;
