//! Collaborators at the edge of the sync engine: the remote document store
//! holding the canonical map, and the local store of dated backup snapshots.

pub mod backup;
pub mod error;
pub mod github;
pub mod remote;

pub use backup::{backup_label, BackupEntry, BackupStore, FsBackupStore};
pub use error::{BackupError, StoreError};
pub use github::{GithubStore, GithubTarget};
pub use remote::{RemoteSnapshot, RemoteStore, VersionToken};
