use thiserror::Error;

/// Errors raised while building or running the network.
#[derive(Debug, Error)]
pub enum Error {
    /// Shape mismatches and other tensor failures, reported as-is.
    #[error("tensor operation failed: {0}")]
    Tensor(#[from] candle_core::Error),

    /// A model hyper-parameter is out of range.
    #[error("invalid model configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown pooling function '{0}' (expected mean, sum or max)")]
    UnknownPool(String),

    #[error("unknown optimizer '{0}' (expected adam or sgd)")]
    UnknownOptimizer(String),
}
