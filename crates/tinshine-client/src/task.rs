use std::sync::{Mutex, PoisonError};

use tokio::task::JoinHandle;

/// Holds at most one running background task.
#[derive(Debug, Default)]
pub(crate) struct TaskSlot {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskSlot {
    /// Spawn through `spawn` unless a task is already running. Returns
    /// whether a task was started.
    pub fn start(&self, spawn: impl FnOnce() -> JoinHandle<()>) -> bool {
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }
        *handle = Some(spawn());
        true
    }

    /// Abort the running task, if any. Returns whether one was running.
    pub fn stop(&self) -> bool {
        match self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.stop();
    }
}
