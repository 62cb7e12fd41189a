//! Error types for the crystal graph dataset.

use crate::model::types::Element;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, featurizing or batching crystal graphs.
#[derive(Debug, Error)]
pub enum Error {
    /// A dataset file could not be opened.
    #[error("cannot open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The summary table or the element table is malformed.
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: crate::io::Error,
    },

    /// A structure file could not be parsed.
    #[error("structure '{id}' could not be parsed: {source}")]
    Structure {
        id: String,
        #[source]
        source: crate::io::Error,
    },

    /// A structure contains an element with no initial feature vector.
    #[error("no initial features for element {element} (structure '{id}')")]
    MissingAtomFeatures { id: String, element: Element },

    #[error("structure '{0}' has no sites")]
    EmptyStructure(String),

    #[error("dataset is empty")]
    EmptyDataset,

    #[error("index {index} is out of range for a dataset of {len} structures")]
    IndexOutOfRange { index: usize, len: usize },

    /// Split ratios or sizes are inconsistent.
    #[error("invalid train/validation/test split: {0}")]
    InvalidSplit(String),

    /// Parameters of the distance expansion are inconsistent.
    #[error("invalid Gaussian filter: {0}")]
    InvalidFilter(String),

    /// Fitting a normalizer needs at least two samples.
    #[error("normalizer needs at least 2 samples, got {0}")]
    TooFewSamples(usize),

    #[error("failed to start worker pool: {0}")]
    WorkerPool(String),

    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),
}

impl Error {
    pub fn open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Open {
            path: path.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: crate::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}
