//! Remote write path with optimistic locking.
//!
//! Each row carries a `position_version`. A write names the version it expects to
//! replace; the store accepts it only if that is still the current version and
//! then stores it at `expected + 1`. On a version conflict the writer fetches the
//! latest version and retries once. A second failure is logged and returned; there
//! is no further automatic retry and nothing is written locally as a result.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use taskcanvas_core::{thread_safe_rw, NodeId, RemoteError, ThreadSafeRwMap};
use taskcanvas_settings::RemoteSettings;

use crate::geometry::{Bounds, Point};

/// Marker stating that task positions are stored in world space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionFormat {
    #[default]
    Absolute,
}

/// Task position column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPosition {
    pub x: f64,
    pub y: f64,
    pub parent_id: Option<NodeId>,
    pub format: PositionFormat,
}

/// Remote task row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPositionRow {
    pub position: TaskPosition,
    pub position_version: u64,
}

/// Group rectangle column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPositionJson {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Remote group row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPositionRow {
    pub position_json: GroupPositionJson,
    pub parent_group_id: Option<NodeId>,
    pub position_version: u64,
}

/// A row of either kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteRow {
    Task(TaskPositionRow),
    Group(GroupPositionRow),
}

impl RemoteRow {
    pub fn task(position: Point, parent_id: Option<NodeId>) -> Self {
        RemoteRow::Task(TaskPositionRow {
            position: TaskPosition {
                x: position.x,
                y: position.y,
                parent_id,
                format: PositionFormat::Absolute,
            },
            position_version: 0,
        })
    }

    pub fn group(bounds: Bounds, parent_group_id: Option<NodeId>) -> Self {
        RemoteRow::Group(GroupPositionRow {
            position_json: GroupPositionJson {
                x: bounds.min_x,
                y: bounds.min_y,
                width: bounds.width(),
                height: bounds.height(),
            },
            parent_group_id,
            position_version: 0,
        })
    }

    pub fn version(&self) -> u64 {
        match self {
            RemoteRow::Task(row) => row.position_version,
            RemoteRow::Group(row) => row.position_version,
        }
    }

    fn with_version(mut self, version: u64) -> Self {
        match &mut self {
            RemoteRow::Task(row) => row.position_version = version,
            RemoteRow::Group(row) => row.position_version = version,
        }
        self
    }
}

/// Row-level optimistic-lock persistence.
#[async_trait]
pub trait RemotePositionStore: Send + Sync {
    /// Current version of the row.
    async fn fetch_version(&self, id: &NodeId) -> Result<u64, RemoteError>;

    /// Writes `row` if the stored version equals `expected_version`.
    ///
    /// Returns the new version on success.
    async fn compare_and_swap(
        &self,
        id: &NodeId,
        expected_version: u64,
        row: RemoteRow,
    ) -> Result<u64, RemoteError>;
}

/// Persists positions through a [`RemotePositionStore`], tracking last known
/// versions per row.
pub struct RemoteWriter {
    store: Arc<dyn RemotePositionStore>,
    versions: ThreadSafeRwMap<NodeId, u64>,
    max_retries: u32,
}

impl RemoteWriter {
    pub fn new(store: Arc<dyn RemotePositionStore>, settings: &RemoteSettings) -> Self {
        Self {
            store,
            versions: thread_safe_rw(HashMap::new()),
            max_retries: settings.max_conflict_retries,
        }
    }

    /// Records a version read through another path (e.g. the initial load).
    pub fn seed_version(&self, id: &NodeId, version: u64) {
        self.versions.write().insert(id.clone(), version);
    }

    pub fn known_version(&self, id: &NodeId) -> Option<u64> {
        self.versions.read().get(id).copied()
    }

    pub fn forget(&self, id: &NodeId) {
        self.versions.write().remove(id);
    }

    pub async fn write_task(
        &self,
        id: &NodeId,
        position: Point,
        parent_id: Option<NodeId>,
    ) -> Result<u64, RemoteError> {
        self.write(id, RemoteRow::task(position, parent_id)).await
    }

    pub async fn write_group(
        &self,
        id: &NodeId,
        bounds: Bounds,
        parent_group_id: Option<NodeId>,
    ) -> Result<u64, RemoteError> {
        self.write(id, RemoteRow::group(bounds, parent_group_id)).await
    }

    /// Writes `row`, retrying after a version conflict at most `max_retries` times.
    pub async fn write(&self, id: &NodeId, row: RemoteRow) -> Result<u64, RemoteError> {
        let mut expected = match self.known_version(id) {
            Some(version) => version,
            None => self.store.fetch_version(id).await?,
        };
        let mut attempt = 0;

        loop {
            let result = self
                .store
                .compare_and_swap(id, expected, row.clone().with_version(expected + 1))
                .await;

            match result {
                Ok(version) => {
                    self.versions.write().insert(id.clone(), version);
                    if attempt > 0 {
                        tracing::info!("Position of {} persisted at v{} after retry", id, version);
                    }
                    return Ok(version);
                }
                Err(RemoteError::VersionConflict { actual, .. }) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::debug!(
                        "Version conflict on {} (expected v{}, server v{}); refetching",
                        id,
                        expected,
                        actual
                    );
                    expected = self.store.fetch_version(id).await?;
                    self.versions.write().insert(id.clone(), expected);
                }
                Err(err) => {
                    tracing::warn!("Position of {} may be stale: {}", id, err);
                    return Err(err);
                }
            }
        }
    }
}

impl std::fmt::Debug for RemoteWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteWriter")
            .field("known_versions", &self.versions.read().len())
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[derive(Debug, Default)]
struct StoredRow {
    version: u64,
    row: Option<RemoteRow>,
}

#[derive(Debug, Default)]
struct MemoryRemoteState {
    rows: HashMap<NodeId, StoredRow>,
    /// Rows bumped by a simulated concurrent writer before each of the next N
    /// writes.
    interference: HashMap<NodeId, u32>,
    failing_writes: u32,
    writes: usize,
}

/// In-memory remote store able to simulate concurrent writers and outages.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    state: Mutex<MemoryRemoteState>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates or resets a row at `version`.
    pub fn insert(&self, id: impl Into<NodeId>, version: u64) {
        self.state
            .lock()
            .rows
            .insert(id.into(), StoredRow { version, row: None });
    }

    /// Simulates another client writing the row.
    pub fn bump(&self, id: &NodeId) {
        if let Some(stored) = self.state.lock().rows.get_mut(id) {
            stored.version += 1;
        }
    }

    /// Bumps the row right before each of the next `times` writes to it.
    pub fn interfere(&self, id: impl Into<NodeId>, times: u32) {
        self.state.lock().interference.insert(id.into(), times);
    }

    /// Fails the next `count` writes with a transport error.
    pub fn fail_next_writes(&self, count: u32) {
        self.state.lock().failing_writes = count;
    }

    pub fn version(&self, id: &NodeId) -> Option<u64> {
        self.state.lock().rows.get(id).map(|stored| stored.version)
    }

    pub fn row(&self, id: &NodeId) -> Option<RemoteRow> {
        self.state.lock().rows.get(id).and_then(|stored| stored.row.clone())
    }

    /// Successful writes so far.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }
}

#[async_trait]
impl RemotePositionStore for MemoryRemote {
    async fn fetch_version(&self, id: &NodeId) -> Result<u64, RemoteError> {
        self.version(id)
            .ok_or_else(|| RemoteError::RowNotFound { id: id.clone() })
    }

    async fn compare_and_swap(
        &self,
        id: &NodeId,
        expected_version: u64,
        row: RemoteRow,
    ) -> Result<u64, RemoteError> {
        let mut state = self.state.lock();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(RemoteError::Transport {
                reason: "simulated outage".to_string(),
            });
        }

        let interfere = match state.interference.get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };

        let stored = state
            .rows
            .get_mut(id)
            .ok_or_else(|| RemoteError::RowNotFound { id: id.clone() })?;
        if interfere {
            stored.version += 1;
        }
        if stored.version != expected_version {
            return Err(RemoteError::VersionConflict {
                id: id.clone(),
                expected: expected_version,
                actual: stored.version,
            });
        }
        stored.version = expected_version + 1;
        stored.row = Some(row);
        let version = stored.version;
        state.writes += 1;
        Ok(version)
    }
}
