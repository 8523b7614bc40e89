//! Typed errors for a keyword scrape run.

use std::time::Duration;

use apify_client::ApifyError;
use thiserror::Error;

/// Errors that can end a run.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Input rejected before any remote call was made
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Remote job finished in a non-success terminal state
    #[error("Instagram scraper failed with status: {status}")]
    RemoteJobFailed { status: String },

    /// Remote job did not finish within the configured timeout
    #[error("remote job {run_id} did not finish within {}s", .after.as_secs())]
    Timeout { run_id: String, after: Duration },

    /// Run was cancelled while the remote job was in flight
    #[error("remote job {run_id} was cancelled")]
    Cancelled { run_id: String },

    /// Apify API call failed
    #[error(transparent)]
    Apify(#[from] ApifyError),

    /// Reading or writing run storage failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Value could not be (de)serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for ScoutError {
    fn from(err: std::io::Error) -> Self {
        ScoutError::Storage(err.to_string())
    }
}

impl From<csv::Error> for ScoutError {
    fn from(err: csv::Error) -> Self {
        ScoutError::Storage(err.to_string())
    }
}

/// Result type alias for scout operations.
pub type Result<T> = std::result::Result<T, ScoutError>;
