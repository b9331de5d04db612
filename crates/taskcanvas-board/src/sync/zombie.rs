//! Deny-list of just-deleted ids.
//!
//! A slower data path may deliver an update for a node after it was deleted.
//! While an id is on this list the projector refuses to create a node for it.

use std::collections::HashMap;
use std::time::Duration;
use taskcanvas_core::NodeId;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RecentlyDeleted {
    entries: HashMap<NodeId, Instant>,
    ttl: Duration,
}

impl RecentlyDeleted {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn mark(&mut self, id: NodeId) {
        self.entries.insert(id, Instant::now());
    }

    /// True while `id` was deleted less than the ttl ago.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.entries
            .get(id)
            .is_some_and(|deleted_at| deleted_at.elapsed() < self.ttl)
    }

    /// Drops expired entries.
    pub fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, deleted_at| deleted_at.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
