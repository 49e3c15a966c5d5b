use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid sample: {0}")]
    InvalidSample(String),

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("unsupported training algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported context generator: {0}")]
    UnsupportedGenerator(String),

    #[error("invalid parameter {name}={value}")]
    InvalidParameter { name: String, value: String },

    /// The validator rejected every extension at the given position.
    #[error("no legal tag sequence reachable at position {0}")]
    NoLegalSequence(usize),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
