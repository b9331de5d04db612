//! # Position Authority
//!
//! Single arbitration point for "where is this node right now". Every writer
//! (user drag, programmatic layout, local reconciliation, remote sync) goes
//! through [`PositionManager`]; a write is accepted only when the node is unlocked
//! or locked by the writer itself.
//!
//! ## Locks
//!
//! - A lock is held by one [`WriteSource`] and is active until released. Locks
//!   of sources other than [`WriteSource::UserDrag`] also lapse once older than
//!   the configured lifetime; a drag lock lasts until the gesture releases it.
//! - [`acquire_lock`](PositionManager::acquire_lock) fails when a different
//!   source of equal or higher priority holds an active lock. A strictly higher
//!   priority source takes the lock over.
//!
//! ## Events
//!
//! Accepted updates, lock changes and removals are published on the session's
//! [`EventBus`] under [`EventCategory::Position`].

mod record;

pub use record::{BatchResult, PositionRecord, PositionUpdate};

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use taskcanvas_core::{
    CanvasEvent, EventBus, EventCategory, EventFilter, NodeId, PositionEvent, PositionPayload,
    SubscriptionId, WriteSource,
};
use taskcanvas_settings::CanvasConfig;
use tokio::time::Instant;

use crate::geometry::{to_relative, Point};

#[derive(Debug, Clone, Copy)]
struct Lock {
    source: WriteSource,
    acquired_at: Instant,
}

#[derive(Debug, Default)]
struct AuthorityState {
    records: HashMap<NodeId, PositionRecord>,
    locks: HashMap<NodeId, Lock>,
}

impl AuthorityState {
    /// Active lock holder; expired locks are dropped on the way.
    fn active_lock(&mut self, id: &NodeId, ttl: Duration) -> Option<Lock> {
        let lock = *self.locks.get(id)?;
        if lock.source != WriteSource::UserDrag && lock.acquired_at.elapsed() >= ttl {
            tracing::debug!("Lock on {} held by {} expired", id, lock.source);
            self.locks.remove(id);
            return None;
        }
        Some(lock)
    }
}

/// Position authority for one canvas session.
pub struct PositionManager {
    state: RwLock<AuthorityState>,
    bus: Arc<EventBus>,
    border_inset: f64,
    lock_ttl: Duration,
}

impl PositionManager {
    /// Creates an authority publishing on `bus`.
    pub fn new(bus: Arc<EventBus>, config: &CanvasConfig) -> Self {
        Self {
            state: RwLock::new(AuthorityState::default()),
            bus,
            border_inset: config.geometry.border_inset,
            lock_ttl: config.drag.lock_ttl(),
        }
    }

    /// Grants `source` exclusive write access to `id`.
    ///
    /// # Returns
    ///
    /// `false` when another source of equal or higher priority holds an active
    /// lock. Re-acquiring an own lock refreshes its age.
    pub fn acquire_lock(&self, id: &NodeId, source: WriteSource) -> bool {
        {
            let mut state = self.state.write();
            if let Some(held) = state.active_lock(id, self.lock_ttl) {
                if held.source != source && held.source.priority() >= source.priority() {
                    tracing::debug!(
                        "Lock on {} refused to {}: held by {}",
                        id,
                        source,
                        held.source
                    );
                    return false;
                }
                if held.source != source {
                    tracing::debug!("{} takes lock on {} from {}", source, id, held.source);
                }
            }
            state.locks.insert(
                id.clone(),
                Lock {
                    source,
                    acquired_at: Instant::now(),
                },
            );
        }

        self.publish(PositionEvent::LockAcquired {
            node_id: id.clone(),
            source,
        });
        true
    }

    /// Clears any lock on `id`.
    pub fn release_lock(&self, id: &NodeId) {
        let removed = self.state.write().locks.remove(id).is_some();
        if removed {
            self.publish(PositionEvent::LockReleased {
                node_id: id.clone(),
            });
        }
    }

    /// Clears the lock on `id` only if `source` holds it.
    ///
    /// Used by writers whose lock may have been taken over in the meantime.
    pub fn release_lock_held_by(&self, id: &NodeId, source: WriteSource) -> bool {
        let removed = {
            let mut state = self.state.write();
            match state.locks.get(id) {
                Some(lock) if lock.source == source => state.locks.remove(id).is_some(),
                _ => false,
            }
        };
        if removed {
            self.publish(PositionEvent::LockReleased {
                node_id: id.clone(),
            });
        }
        removed
    }

    /// Active lock holder of `id`.
    pub fn lock_holder(&self, id: &NodeId) -> Option<WriteSource> {
        self.state
            .write()
            .active_lock(id, self.lock_ttl)
            .map(|lock| lock.source)
    }

    pub fn is_locked(&self, id: &NodeId) -> bool {
        self.lock_holder(id).is_some()
    }

    /// Proposes a new absolute position and parent for `id`.
    ///
    /// # Returns
    ///
    /// `true` if accepted. Non-finite positions and writes against another
    /// source's active lock are rejected.
    pub fn update(
        &self,
        id: &NodeId,
        position: Point,
        parent_id: Option<NodeId>,
        source: WriteSource,
    ) -> bool {
        if !position.is_finite() {
            tracing::warn!(
                "Rejected non-finite position for {} from {}: ({}, {})",
                id,
                source,
                position.x,
                position.y
            );
            return false;
        }

        {
            let mut state = self.state.write();
            if let Some(held) = state.active_lock(id, self.lock_ttl) {
                if held.source != source {
                    tracing::debug!(
                        "Update for {} from {} rejected: locked by {}",
                        id,
                        source,
                        held.source
                    );
                    return false;
                }
            }

            let record = state
                .records
                .entry(id.clone())
                .or_insert_with(|| PositionRecord {
                    id: id.clone(),
                    absolute_position: position,
                    parent_id: None,
                    locked_by: None,
                    version: 0,
                });
            record.absolute_position = position;
            record.parent_id = parent_id.clone();
            record.version += 1;
        }

        self.publish(PositionEvent::Updated {
            node_id: id.clone(),
            payload: PositionPayload {
                x: position.x,
                y: position.y,
                parent_id,
                source,
            },
        });
        true
    }

    /// Applies [`update`](Self::update) to each entry.
    pub fn batch_update(&self, updates: &[PositionUpdate], source: WriteSource) -> BatchResult {
        let mut result = BatchResult::default();
        for entry in updates {
            if self.update(&entry.id, entry.position, entry.parent_id.clone(), source) {
                result.success_count += 1;
            } else {
                result.rejected_ids.push(entry.id.clone());
            }
        }
        if !result.rejected_ids.is_empty() {
            tracing::debug!(
                "Batch from {}: {} accepted, {} rejected",
                source,
                result.success_count,
                result.rejected_ids.len()
            );
        }
        result
    }

    /// Current record for `id`, with its active lock holder filled in.
    pub fn get_position(&self, id: &NodeId) -> Option<PositionRecord> {
        let mut state = self.state.write();
        let locked_by = state.active_lock(id, self.lock_ttl).map(|lock| lock.source);
        state.records.get(id).map(|record| PositionRecord {
            locked_by,
            ..record.clone()
        })
    }

    /// Display position of `id` relative to its parent's record.
    ///
    /// Root-level records return their absolute position. `None` when the
    /// record, or its parent's record, is missing.
    pub fn get_relative_position(&self, id: &NodeId) -> Option<Point> {
        let state = self.state.read();
        let record = state.records.get(id)?;
        match &record.parent_id {
            None => Some(record.absolute_position),
            Some(parent) => {
                let parent = state.records.get(parent)?;
                Some(to_relative(
                    record.absolute_position,
                    parent.absolute_position,
                    self.border_inset,
                ))
            }
        }
    }

    /// Registers `callback` for every accepted update.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&NodeId, &PositionPayload) + Send + Sync + 'static,
    {
        self.bus.subscribe(
            EventFilter::Categories(vec![EventCategory::Position]),
            move |event| {
                if let CanvasEvent::Position(PositionEvent::Updated { node_id, payload }) = event {
                    callback(&node_id, &payload);
                }
            },
        )
    }

    pub fn unsubscribe(&self, subscription: SubscriptionId) -> bool {
        self.bus.unsubscribe(subscription)
    }

    /// Drops the record and lock of a deleted node.
    pub fn remove(&self, id: &NodeId) -> Option<PositionRecord> {
        let removed = {
            let mut state = self.state.write();
            state.locks.remove(id);
            state.records.remove(id)
        };
        if removed.is_some() {
            self.publish(PositionEvent::Removed {
                node_id: id.clone(),
            });
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().records.is_empty()
    }

    /// Drops all records and locks; called on session teardown.
    pub fn clear(&self) {
        let mut state = self.state.write();
        state.records.clear();
        state.locks.clear();
    }

    fn publish(&self, event: PositionEvent) {
        tracing::trace!("{}", event.description());
        let _ = self.bus.publish(CanvasEvent::Position(event));
    }
}

impl std::fmt::Debug for PositionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("PositionManager")
            .field("records", &state.records.len())
            .field("locks", &state.locks.len())
            .finish()
    }
}
