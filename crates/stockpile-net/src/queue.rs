//! Update coalescing for multi-step storage transactions.
//!
//! While a batch operation runs, refresh notifications for the same entity
//! are folded together instead of being emitted once per touched unit. The
//! queue deduplicates by membership and preserves first-insertion order, so
//! a drain replays each entity exactly once, oldest first.

use std::collections::HashSet;

use stockpile_core::id::EntityId;

/// Coalescing queue for entity refresh notifications.
///
/// Outside a batch the queue is pass-through: [`UpdateQueue::request_update`]
/// emits immediately. Between [`UpdateQueue::start_queueing`] and
/// [`UpdateQueue::drain`] requests are buffered and deduplicated instead.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    queueing: bool,
    pending: Vec<EntityId>,
    members: HashSet<EntityId>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_queueing(&self) -> bool {
        self.queueing
    }

    /// Enter queueing mode. Idempotent: re-entering does not disturb
    /// already-buffered requests.
    pub fn start_queueing(&mut self) {
        self.queueing = true;
    }

    /// Request a refresh for `id`. Emits through `sink` immediately when not
    /// queueing; otherwise buffers, ignoring ids already pending.
    pub fn request_update(&mut self, id: EntityId, mut sink: impl FnMut(EntityId)) {
        if !self.queueing {
            sink(id);
            return;
        }
        if self.members.insert(id) {
            self.pending.push(id);
        }
    }

    /// Leave queueing mode and replay every buffered id through `sink`, in
    /// first-insertion order. The queue is empty afterwards.
    pub fn drain(&mut self, mut sink: impl FnMut(EntityId)) {
        self.queueing = false;
        self.members.clear();
        for id in self.pending.drain(..) {
            sink(id);
        }
    }
}
