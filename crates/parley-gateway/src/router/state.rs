//! Per-chat router state.

use crate::history::HistoryBuffer;
use parley_core::message::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Everything the router keeps for one chat.
pub(crate) struct ChatState {
    pub chat_id: String,
    /// Messages waiting for the next sweep, in arrival order.
    pub pending: Vec<Message>,
    /// Cancels the generation in flight for this chat.
    pub cancel: Option<CancellationToken>,
    pub history: HistoryBuffer,
    /// Auto-responses stay off until this instant.
    pub suppressed_until: Option<Instant>,
}

/// Folded prefix of a chat's pending list.
#[derive(Debug)]
pub(crate) struct Batch {
    pub message: Message,
    /// Ids of the folded messages.
    pub ids: Vec<Uuid>,
}

impl ChatState {
    pub fn new(chat_id: &str, max_history_tokens: usize) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            pending: Vec::new(),
            cancel: None,
            history: HistoryBuffer::new(max_history_tokens),
            suppressed_until: None,
        }
    }

    /// Fold the longest prefix of pending messages sharing the first
    /// message's `sender.is_me`.
    pub fn next_batch(&self) -> Option<Batch> {
        let first = self.pending.first()?;
        let mine = first.sender.is_me;

        let run: Vec<&Message> = self
            .pending
            .iter()
            .take_while(|m| m.sender.is_me == mine)
            .collect();

        let message = run
            .iter()
            .skip(1)
            .fold(first.clone(), |acc, m| acc.combine(m).unwrap_or(acc));

        Some(Batch {
            message,
            ids: run.iter().map(|m| m.id).collect(),
        })
    }

    /// Drop handled messages, keeping anything that arrived since.
    pub fn remove(&mut self, ids: &[Uuid]) {
        self.pending.retain(|m| !ids.contains(&m.id));
    }

    pub fn is_suppressed(&self, now: Instant) -> bool {
        self.suppressed_until.is_some_and(|until| now < until)
    }
}

/// Held while a sweep runs. Dropping it, on any path, reopens the latch.
pub(crate) struct Latch<'a>(&'a AtomicBool);

impl<'a> Latch<'a> {
    /// `None` when the latch is already held.
    pub fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for Latch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
