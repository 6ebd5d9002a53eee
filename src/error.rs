use thiserror::Error;

#[derive(Error, Debug)]
pub enum MttrError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Corrupt record at line {line}: {reason}")]
    CorruptRecord { line: usize, reason: String },

    #[error("Missing metric: {0}")]
    MissingMetric(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MttrError>;
