//! Cross-process change detection.
//!
//! Every mutation writes a `{at, origin}` marker into the shared cache file.
//! A [`StorageWatcher`] polls that marker; when it changes and was written
//! by another client, this client reloads its image table, refetches every
//! served collection and announces `DataUpdated(All)`.
//!
//! The marker is a single slot and the signal is coarse. When this client
//! writes its own marker before the next poll, a marker left by another
//! client in between is overwritten and that change is not picked up until
//! some later foreign write or sync. The auto-sync timers bound how stale
//! the cache can get in that case.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::client::SyncClient;
use crate::error::SyncError;
use crate::events::Scope;
use crate::remote::Remote;
use crate::task::TaskSlot;

impl<R: Remote> SyncClient<R> {
    /// Check the shared marker once. Returns whether a change made by
    /// another client was picked up.
    pub async fn poll_external_change(&self) -> Result<bool, SyncError> {
        let marker = self.with_db(|db| db.sync_marker())?;
        {
            let mut seen = self
                .last_seen_marker
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if *seen == marker {
                return Ok(false);
            }
            *seen = marker;
        }

        let Some(marker) = marker else {
            return Ok(false);
        };
        if marker.origin == self.origin {
            return Ok(false);
        }

        info!(from = %marker.origin, at = marker.at, "Cache changed by another client");
        self.reload_images()?;
        self.resync_all().await;
        self.notify(Scope::All);
        Ok(true)
    }
}

pub struct StorageWatcher<R: Remote> {
    client: Arc<SyncClient<R>>,
    poll: Duration,
    task: TaskSlot,
}

impl<R: Remote> StorageWatcher<R> {
    pub fn new(client: Arc<SyncClient<R>>, poll: Duration) -> Self {
        Self {
            client,
            poll,
            task: TaskSlot::default(),
        }
    }

    pub fn start(&self) -> bool {
        let client = self.client.clone();
        let poll = self.poll;

        self.task.start(|| {
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + poll, poll);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(e) = client.poll_external_change().await {
                        warn!(error = %e, "Failed to read change marker");
                    }
                }
            })
        })
    }

    pub fn stop(&self) {
        self.task.stop();
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SyncEvent;
    use crate::testing::{fields, record, FakeRemote};
    use serde_json::json;
    use std::path::Path;
    use tinshine_shared::Collection;
    use tinshine_store::Database;

    fn client_at(remote: &FakeRemote, path: &Path) -> Arc<SyncClient<FakeRemote>> {
        let db = Database::open_at(path).unwrap();
        Arc::new(SyncClient::new(remote.clone(), db).unwrap())
    }

    #[tokio::test]
    async fn other_client_delete_triggers_refetch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let remote = FakeRemote::new();
        remote.seed(
            Collection::Products,
            vec![record(7, json!({"name": "seven"})), record(8, json!({"name": "eight"}))],
        );

        let tab_a = client_at(&remote, &path);
        let tab_b = client_at(&remote, &path);
        tab_b.fetch_all(Collection::Products).await;
        let mut b_events = tab_b.subscribe();

        assert!(tab_a.delete(Collection::Products, 7).await.unwrap().value);

        assert!(tab_b.poll_external_change().await.unwrap());
        let ids: Vec<i64> = tab_b.get_all(Collection::Products).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![8]);
        assert_eq!(
            b_events.drain().last().cloned(),
            Some(SyncEvent::data_updated(Scope::All))
        );

        // Already seen.
        assert!(!tab_b.poll_external_change().await.unwrap());
    }

    #[tokio::test]
    async fn own_writes_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FakeRemote::new();
        let client = client_at(&remote, &dir.path().join("one.db"));

        client.add(Collection::BlogPosts, fields(json!({"title": "t"}))).await.unwrap();
        let calls = remote.calls();
        assert!(!client.poll_external_change().await.unwrap());
        assert_eq!(remote.calls(), calls);
    }

    #[tokio::test]
    async fn image_table_is_reloaded_from_other_client() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let remote = FakeRemote::new();
        let tab_a = client_at(&remote, &path);
        let tab_b = client_at(&remote, &path);

        tab_a.set_category_image(4, "four.png").await.unwrap();
        assert_ne!(tab_b.images().category_image(4), "four.png");

        assert!(tab_b.poll_external_change().await.unwrap());
        assert_eq!(tab_b.images().category_image(4), "four.png");
    }

    #[tokio::test(start_paused = true)]
    async fn watcher_polls_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");
        let remote = FakeRemote::new();
        let tab_a = client_at(&remote, &path);
        let tab_b = client_at(&remote, &path);
        let mut b_events = tab_b.subscribe();

        let watcher = StorageWatcher::new(tab_b.clone(), Duration::from_millis(500));
        assert!(watcher.start());
        assert!(!watcher.start());

        tab_a.add(Collection::Products, fields(json!({"name": "new"}))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        let events = b_events.drain();
        assert_eq!(events.last(), Some(&SyncEvent::data_updated(Scope::All)));
        assert_eq!(tab_b.count(Collection::Products), 1);

        watcher.stop();
        assert!(!watcher.is_running());
    }
}
