use thiserror::Error;

/// Errors returned by a remote document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("document not found in store: {path}")]
    NotFound { path: String },

    /// The version token supplied with a write no longer matches the store.
    #[error("stale version token for {path}: {message}")]
    Conflict { path: String, message: String },

    #[error("unexpected HTTP status {status} from {url}: {message}")]
    UnexpectedStatus {
        status: u16,
        url: String,
        message: String,
    },

    /// The store answered, but not with something we can read.
    #[error("could not decode store response for {context}: {reason}")]
    Decode { context: String, reason: String },

    #[error("invalid base URL '{base_url}': {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
}

impl StoreError {
    /// True when the write lost a race against another commit.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors from the local backup store.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Snapshots are write-once; a label can only be used once.
    #[error("backup already exists: {path}")]
    AlreadyExists { path: String },

    #[error("invalid backup label '{0}'")]
    InvalidLabel(String),
}
