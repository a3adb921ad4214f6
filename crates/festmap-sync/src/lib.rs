//! Fetch, validate, back up, merge and commit cycles against the canonical
//! map store.

pub mod cache;
pub mod coordinator;
pub mod error;

pub use cache::{read_cache, write_cache, CacheError};
pub use coordinator::{
    commit_message, validate_submission, CanonicalSnapshot, SubmitOutcome, SyncCoordinator,
    SyncOutcome,
};
pub use error::{FetchError, SyncError};
