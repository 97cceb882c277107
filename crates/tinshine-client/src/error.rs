use thiserror::Error;

use tinshine_shared::Collection;
use tinshine_store::StoreError;

use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The server could not be used. Read and write operations absorb this
    /// and fall back to the cache; only strict remote queries return it.
    #[error("Server unavailable: {0}")]
    NetworkUnavailable(#[from] RemoteError),

    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: i64 },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(SnapshotRejection),

    #[error("Local cache error: {0}")]
    Persistence(#[from] StoreError),
}

/// Why a snapshot import was refused. Nothing is written in either case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotRejection {
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    #[error("snapshot version {snapshot} is not newer than local version {local}")]
    NotNewer { snapshot: u64, local: u64 },
}

impl From<SnapshotRejection> for SyncError {
    fn from(reason: SnapshotRejection) -> Self {
        SyncError::InvalidSnapshot(reason)
    }
}
