use festmap_core::{DocumentError, ValidationError};
use festmap_store::StoreError;
use thiserror::Error;

/// Why the canonical document could not be obtained.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to fetch canonical map: {0}")]
    FetchFailed(#[source] StoreError),

    #[error("canonical map is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("canonical map has an invalid structure: {0}")]
    InvalidStructure(#[source] ValidationError),

    #[error("canonical map does not fit the document model: {0}")]
    Undecodable(#[source] serde_json::Error),
}

impl From<DocumentError> for FetchError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Malformed(e) => Self::InvalidJson(e),
            DocumentError::Invalid(e) => Self::InvalidStructure(e),
            DocumentError::Decode(e) => Self::Undecodable(e),
        }
    }
}

/// Errors returned by [`crate::SyncCoordinator`] operations.
///
/// Input errors (`MalformedInput`, `InvalidStructure`, `UndecodableInput`)
/// are raised before the store is contacted, so nothing is ever partially
/// applied.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("submission is not valid JSON: {0}")]
    MalformedInput(#[source] serde_json::Error),

    #[error("invalid submission: {0}")]
    InvalidStructure(#[source] ValidationError),

    #[error("submission does not fit the document model: {0}")]
    UndecodableInput(#[source] serde_json::Error),

    #[error("upstream fetch failed: {0}")]
    UpstreamFetchFailed(#[source] FetchError),

    /// The canonical document could not be fetched, so no merge was attempted.
    #[error("merge aborted: {0}")]
    MergeAborted(#[source] FetchError),

    #[error("failed to persist merged map: {0}")]
    PersistFailed(#[source] StoreError),

    #[error("failed to serialize merged map: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl From<DocumentError> for SyncError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Malformed(e) => Self::MalformedInput(e),
            DocumentError::Invalid(e) => Self::InvalidStructure(e),
            DocumentError::Decode(e) => Self::UndecodableInput(e),
        }
    }
}

impl SyncError {
    /// The underlying store error, if the failure came from the store.
    #[must_use]
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            Self::PersistFailed(e)
            | Self::MergeAborted(FetchError::FetchFailed(e))
            | Self::UpstreamFetchFailed(FetchError::FetchFailed(e)) => Some(e),
            _ => None,
        }
    }
}
