use ingest::IngestIssue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("db error: {0}")]
    Db(#[from] tracker_db::DbError),
    #[error("ingest error: {0}")]
    Ingest(#[from] ingest::IngestError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error(transparent)]
    Refresh(#[from] RefreshError),
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of one refresh. Cloneable so every caller sharing an in-flight
/// refresh receives the same outcome.
#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    #[error("all {files} changed log files failed and no records were read")]
    TotalFailure {
        files: usize,
        issues: Vec<IngestIssue>,
    },
    #[error("refresh timed out after {after_secs}s")]
    TimedOut { after_secs: u64 },
    #[error("refresh cancelled")]
    Cancelled,
    #[error("store error: {0}")]
    Store(String),
    #[error("background task failed: {0}")]
    Join(String),
}
