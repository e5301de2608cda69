use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Unknown {field} value: {value}")]
    UnknownVariant { field: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Search API returned status {0}")]
    Status(reqwest::StatusCode),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Search failed: {0}")]
    Search(#[from] SearchError),

    #[error("Oracle reported failure: {0}")]
    Analysis(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Oracle call timed out after {0}ms")]
    Timeout(u64),
}

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Mailer rejected the message: {0}")]
    Rejected(String),

    #[error("No valid recipients for project {0}")]
    NoRecipients(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid time of day {0:?}: expected HH:MM in 24-hour format")]
    InvalidTime(String),
}

/// Errors that abort a whole daily pass. Per-library and per-project
/// failures are logged and skipped instead of being raised as this type.
#[derive(Debug, Error)]
pub enum PassError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
