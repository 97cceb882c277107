//! In-process notification bus.
//!
//! Every subscriber owns an unbounded channel, so a slow subscriber never
//! loses events and never blocks the emitter. Dropping a [`Subscription`]
//! closes its channel; the bus prunes closed channels on the next emit.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc;

use tinshine_shared::Collection;

/// What a `DataUpdated` event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "collection")]
pub enum Scope {
    Collection(Collection),
    ImageTable,
    All,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "event")]
pub enum SyncEvent {
    /// Local data changed; readers of `scope` should re-read the cache.
    DataUpdated { scope: Scope },
    /// The server is ahead of the cache and a resync is available.
    UpdateAvailable { version: u64 },
}

impl SyncEvent {
    pub fn data_updated(scope: Scope) -> Self {
        SyncEvent::DataUpdated { scope }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<SyncEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        Subscription { rx }
    }

    pub fn emit(&self, event: SyncEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        tracing::trace!(?event, subscribers = subscribers.len(), "Event emitted");
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

/// Receiving end of a bus subscription. Drop it to unsubscribe.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<SyncEvent>,
}

impl Subscription {
    /// Wait for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<SyncEvent> {
        self.rx.recv().await
    }

    /// Next already-delivered event, if any.
    pub fn try_recv(&mut self) -> Option<SyncEvent> {
        self.rx.try_recv().ok()
    }

    /// Everything delivered so far, in emission order.
    pub fn drain(&mut self) -> Vec<SyncEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
