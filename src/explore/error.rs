use thiserror::Error;

/// Errors raised by the exploration workflow.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid explore settings: {0}")]
    Settings(#[from] toml::de::Error),

    #[error(transparent)]
    Data(#[from] crate::data::Error),

    #[error(transparent)]
    Model(#[from] crate::nn::Error),

    /// The split left the training set empty.
    #[error("training split is empty; the dataset has {0} structures")]
    EmptyTrainingSet(usize),
}

impl From<candle_core::Error> for Error {
    fn from(e: candle_core::Error) -> Self {
        Error::Model(crate::nn::Error::Tensor(e))
    }
}
