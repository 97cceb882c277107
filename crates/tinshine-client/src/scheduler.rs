//! Periodic update checks.
//!
//! An [`AutoSync`] owns one repeating timer. Several can run side by side
//! with different intervals and modes, e.g. a slow background resync and a
//! fast foreground check that only tells the UI an update exists.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::client::SyncClient;
use crate::events::SyncEvent;
use crate::remote::Remote;
use crate::task::TaskSlot;

/// What a tick does once it finds the server ahead of the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Run a full sync right away.
    Resync,
    /// Publish [`SyncEvent::UpdateAvailable`] and let the user decide.
    Notify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The view was hidden; nothing was checked.
    Hidden,
    UpToDate,
    Synced { version: u64 },
    SyncFailed,
    Notified { version: u64 },
}

pub struct AutoSync<R: Remote> {
    client: Arc<SyncClient<R>>,
    interval: Duration,
    mode: SyncMode,
    visible: watch::Receiver<bool>,
    task: TaskSlot,
}

impl<R: Remote> AutoSync<R> {
    /// `visible` reports whether the host view is in the foreground; ticks
    /// are skipped while it is false.
    pub fn new(
        client: Arc<SyncClient<R>>,
        interval: Duration,
        mode: SyncMode,
        visible: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            interval,
            mode,
            visible,
            task: TaskSlot::default(),
        }
    }

    /// Start the timer. The first tick fires one full interval from now.
    /// Does nothing if already running.
    pub fn start(&self) -> bool {
        let client = self.client.clone();
        let visible = self.visible.clone();
        let (period, mode) = (self.interval, self.mode);

        let started = self.task.start(|| {
            tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    let outcome = tick(&client, mode, &visible).await;
                    debug!(?outcome, ?mode, "Auto-sync tick");
                }
            })
        });
        if started {
            info!(interval_secs = period.as_secs(), ?mode, "Auto-sync started");
        }
        started
    }

    pub fn stop(&self) {
        if self.task.stop() {
            info!(mode = ?self.mode, "Auto-sync stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }
}

/// One scheduler step: compare the locally known version with the
/// server's and act on the difference.
pub async fn tick<R: Remote>(
    client: &SyncClient<R>,
    mode: SyncMode,
    visible: &watch::Receiver<bool>,
) -> TickOutcome {
    if !*visible.borrow() {
        return TickOutcome::Hidden;
    }

    let known = client.local_version();
    let Some(version) = client.check_for_update(known).await else {
        return TickOutcome::UpToDate;
    };

    match mode {
        SyncMode::Resync => {
            info!(known, version, "New data available, syncing");
            if client.sync_all().await {
                TickOutcome::Synced { version }
            } else {
                TickOutcome::SyncFailed
            }
        }
        SyncMode::Notify => {
            client.events().emit(SyncEvent::UpdateAvailable { version });
            TickOutcome::Notified { version }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{record, FakeRemote};
    use serde_json::json;
    use tempfile::TempDir;
    use tinshine_shared::Collection;
    use tinshine_store::Database;

    fn shared_client(remote: &FakeRemote) -> (Arc<SyncClient<FakeRemote>>, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("cache.db")).unwrap();
        (Arc::new(SyncClient::new(remote.clone(), db).unwrap()), dir)
    }

    #[tokio::test]
    async fn hidden_view_skips_the_check() {
        let remote = FakeRemote::new();
        let (client, _dir) = shared_client(&remote);
        let (_tx, visible) = watch::channel(false);

        assert_eq!(tick(&client, SyncMode::Resync, &visible).await, TickOutcome::Hidden);
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn resync_mode_pulls_newer_data() {
        let remote = FakeRemote::new();
        remote.seed(Collection::Products, vec![record(1, json!({}))]);
        let (client, _dir) = shared_client(&remote);
        let (_tx, visible) = watch::channel(true);

        assert_eq!(
            tick(&client, SyncMode::Resync, &visible).await,
            TickOutcome::Synced { version: 2 }
        );
        assert_eq!(client.count(Collection::Products), 1);
        assert_eq!(tick(&client, SyncMode::Resync, &visible).await, TickOutcome::UpToDate);
    }

    #[tokio::test]
    async fn notify_mode_publishes_without_syncing() {
        let remote = FakeRemote::new();
        remote.seed(Collection::Products, vec![record(1, json!({}))]);
        let (client, _dir) = shared_client(&remote);
        let (_tx, visible) = watch::channel(true);
        let mut sub = client.subscribe();

        assert_eq!(
            tick(&client, SyncMode::Notify, &visible).await,
            TickOutcome::Notified { version: 2 }
        );
        assert_eq!(sub.drain(), vec![SyncEvent::UpdateAvailable { version: 2 }]);
        assert_eq!(client.count(Collection::Products), 0);
    }

    #[tokio::test]
    async fn offline_server_means_no_update() {
        let remote = FakeRemote::new();
        remote.set_online(false);
        let (client, _dir) = shared_client(&remote);
        let (_tx, visible) = watch::channel(true);

        assert_eq!(tick(&client, SyncMode::Resync, &visible).await, TickOutcome::UpToDate);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_a_full_interval() {
        let remote = FakeRemote::new();
        remote.seed(Collection::BlogPosts, vec![record(3, json!({}))]);
        let (client, _dir) = shared_client(&remote);
        let (_tx, visible) = watch::channel(true);
        let scheduler = AutoSync::new(
            client.clone(),
            Duration::from_secs(60),
            SyncMode::Notify,
            visible,
        );
        let mut sub = client.subscribe();

        assert!(scheduler.start());
        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(sub.try_recv().is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sub.recv().await, Some(SyncEvent::UpdateAvailable { version: 2 }));
        scheduler.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_single_and_stop_is_idempotent() {
        let remote = FakeRemote::new();
        let (client, _dir) = shared_client(&remote);
        let (_tx, visible) = watch::channel(true);
        let scheduler = AutoSync::new(client, Duration::from_secs(10), SyncMode::Notify, visible);

        assert!(scheduler.start());
        assert!(!scheduler.start());
        assert!(scheduler.is_running());

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(remote.calls(), 3);

        scheduler.stop();
        scheduler.stop();
        assert!(!scheduler.is_running());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(remote.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_view_pauses_ticks_until_visible() {
        let remote = FakeRemote::new();
        let (client, _dir) = shared_client(&remote);
        let (tx, visible) = watch::channel(false);
        let scheduler = AutoSync::new(client, Duration::from_secs(10), SyncMode::Notify, visible);
        scheduler.start();

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(remote.calls(), 0);

        tx.send(true).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(remote.calls(), 1);
    }
}
