//! Process-wide single-flight admission for image generation.
//!
//! One [`DiffusionQueue`] is shared by every router. Jobs are queued FIFO and
//! tagged by channel; each router drains the jobs of its own channel. The
//! slot admits one generation at a time across all channels.

use parley_core::message::{ChannelKind, Message};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

/// Queue of pending generation requests plus the generation slot.
pub struct DiffusionQueue {
    jobs: Mutex<VecDeque<Message>>,
    slot: Arc<AsyncMutex<()>>,
    busy: Arc<watch::Sender<bool>>,
}

/// Held while a generation runs. Dropping it frees the slot.
pub struct SlotGuard {
    _lock: OwnedMutexGuard<()>,
    busy: Arc<watch::Sender<bool>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.busy.send_replace(false);
    }
}

impl Default for DiffusionQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffusionQueue {
    pub fn new() -> Self {
        let (busy, _) = watch::channel(false);
        Self {
            jobs: Mutex::new(VecDeque::new()),
            slot: Arc::new(AsyncMutex::new(())),
            busy: Arc::new(busy),
        }
    }

    /// Queue a generation request.
    pub fn enqueue(&self, message: Message) {
        self.lock_jobs().push_back(message);
    }

    /// Queued requests for `channel`, oldest first.
    pub fn pending_for(&self, channel: ChannelKind) -> Vec<Message> {
        self.lock_jobs()
            .iter()
            .filter(|m| m.channel == channel)
            .cloned()
            .collect()
    }

    /// Drop a handled request.
    pub fn remove(&self, id: Uuid) {
        self.lock_jobs().retain(|m| m.id != id);
    }

    pub fn len(&self) -> usize {
        self.lock_jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_jobs().is_empty()
    }

    /// Whether a generation is in flight.
    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }

    /// Resolve once no generation is in flight.
    pub async fn wait_idle(&self) {
        let mut rx = self.busy.subscribe();
        // The sender lives as long as `self`, so this cannot fail.
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    /// Wait for the slot and take it.
    pub async fn occupy(&self) -> SlotGuard {
        let lock = self.slot.clone().lock_owned().await;
        self.busy.send_replace(true);
        SlotGuard {
            _lock: lock,
            busy: self.busy.clone(),
        }
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, VecDeque<Message>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
