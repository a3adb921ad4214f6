use std::future::Future;

use crate::error::StoreError;

/// Opaque revision identifier handed out by the store on read and required
/// back on write. For the GitHub store this is the file's blob SHA.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionToken(pub String);

impl VersionToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw content of the canonical document together with its version.
#[derive(Debug, Clone)]
pub struct RemoteSnapshot {
    pub bytes: Vec<u8>,
    pub version: VersionToken,
}

/// A version-controlled store holding exactly one document.
///
/// Writes are conditional: the store must reject a write whose
/// `expected` token is not its current version ([`StoreError::Conflict`]).
/// Nothing here retries.
pub trait RemoteStore: Send + Sync {
    /// Fetches the current content and version token.
    fn read(&self) -> impl Future<Output = Result<RemoteSnapshot, StoreError>> + Send;

    /// Commits `bytes` as the new version, returning the new token.
    fn write(
        &self,
        bytes: &[u8],
        expected: &VersionToken,
        message: &str,
    ) -> impl Future<Output = Result<VersionToken, StoreError>> + Send;
}
