//! Error types for the structure fetcher.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while querying the materials database or storing results.
///
/// None of these are retried: the first failure aborts the fetch.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport-level failure (DNS, TLS, connection reset, non-2xx status).
    #[error("HTTP request to the materials database failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered but flagged the response as invalid.
    #[error("materials database rejected the query: {0}")]
    Api(String),

    /// The response body was not valid JSON or did not match the envelope.
    #[error("unexpected response payload: {0}")]
    Payload(String),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A returned document lacks a required field or has the wrong type.
    #[error("record #{index} is malformed: {detail}")]
    MalformedRecord {
        /// Position of the document within the response.
        index: usize,
        /// Description of the problem.
        detail: String,
    },

    /// Creating a directory or writing a structure file failed.
    #[error("failed to write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Two records share a `task_id` and would map to the same file.
    #[error("task id '{0}' occurs more than once")]
    DuplicateTaskId(String),

    /// The property name cannot be used in output file names.
    #[error("property name '{0}' cannot be used as a file name")]
    InvalidProperty(String),

    /// Writing the summary table failed.
    #[error("failed to write summary table: {0}")]
    Table(#[from] crate::io::Error),
}

impl Error {
    pub fn malformed(index: usize, detail: impl Into<String>) -> Self {
        Self::MalformedRecord {
            index,
            detail: detail.into(),
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
