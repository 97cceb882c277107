//! Staleness detection against the server's global data version.

use tracing::{debug, warn};

use crate::client::SyncClient;
use crate::error::SyncError;
use crate::remote::Remote;

impl<R: Remote> SyncClient<R> {
    /// The server's version, with no fallback.
    pub async fn remote_version(&self) -> Result<u64, SyncError> {
        Ok(self.remote.version().await?.version)
    }

    /// The server's version, or the last locally recorded one when the
    /// server cannot be asked.
    pub async fn current_version(&self) -> u64 {
        match self.remote_version().await {
            Ok(version) => version,
            Err(e) => {
                debug!(error = %e, "Version check failed, using local version");
                self.local_version()
            }
        }
    }

    /// The server's version when it is ahead of `known`.
    pub async fn check_for_update(&self, known: u64) -> Option<u64> {
        match self.remote_version().await {
            Ok(version) if version > known => Some(version),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Update check failed");
                None
            }
        }
    }

    pub async fn has_update(&self, known: u64) -> bool {
        self.check_for_update(known).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use crate::client::SyncClient;
    use crate::testing::{record, FakeRemote};
    use serde_json::json;
    use tinshine_shared::Collection;
    use tinshine_store::Database;

    #[tokio::test]
    async fn detects_newer_server_version() {
        let remote = FakeRemote::new();
        let dir = tempfile::tempdir().unwrap();
        let client =
            SyncClient::new(remote.clone(), Database::open_at(&dir.path().join("c.db")).unwrap())
                .unwrap();

        assert_eq!(client.current_version().await, 1);
        assert!(client.has_update(0).await);
        assert!(!client.has_update(1).await);

        remote.seed(Collection::Products, vec![record(1, json!({}))]);
        assert_eq!(client.check_for_update(1).await, Some(2));
    }

    #[tokio::test]
    async fn offline_falls_back_to_local_version() {
        let remote = FakeRemote::new();
        remote.seed(Collection::BlogPosts, vec![]);
        let dir = tempfile::tempdir().unwrap();
        let client =
            SyncClient::new(remote.clone(), Database::open_at(&dir.path().join("c.db")).unwrap())
                .unwrap();
        assert!(client.sync_all().await);

        remote.set_online(false);
        assert_eq!(client.current_version().await, 2);
        assert!(!client.has_update(0).await);
        assert!(client.remote_version().await.is_err());
    }
}
