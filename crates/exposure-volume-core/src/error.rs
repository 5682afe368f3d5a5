// crates/exposure-volume-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("environment variable {0} must be set")]
    MissingVar(&'static str),

    #[error("environment variable {name} is invalid: {reason}")]
    InvalidVar { name: &'static str, reason: String },

    #[error("failed to read '{name}' from the config store: {message}")]
    Secret { name: String, message: String },

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse signing key: {0}")]
    KeyParse(String),

    #[error("failed to sign payload: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Upload failed with {status} response: {body}")]
    Upload {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database query failed: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, VolumeError>;

/// Outcome of a failed run. A cleanup failure never hides the failure that
/// interrupted the run.
#[derive(Error, Debug)]
pub enum RunFailure {
    #[error("volume test failed: {0}")]
    Run(VolumeError),

    #[error("cleanup failed: {0}")]
    Cleanup(VolumeError),

    #[error("volume test failed: {run}; cleanup also failed: {cleanup}")]
    Both {
        run: VolumeError,
        cleanup: VolumeError,
    },
}

impl RunFailure {
    pub fn run_error(&self) -> Option<&VolumeError> {
        match self {
            RunFailure::Run(err) | RunFailure::Both { run: err, .. } => Some(err),
            RunFailure::Cleanup(_) => None,
        }
    }

    pub fn cleanup_error(&self) -> Option<&VolumeError> {
        match self {
            RunFailure::Cleanup(err) | RunFailure::Both { cleanup: err, .. } => Some(err),
            RunFailure::Run(_) => None,
        }
    }
}
