//! Configuration for a TaskCanvas session
//!
//! Configuration is organized into logical sections:
//! - Geometry (render-layer content inset, default task extents)
//! - Containment (depth bounds, group nesting tolerance, overlap threshold)
//! - Drag (settling window, lock lifetime, stacking elevation)
//! - Sync (diff tolerance, zombie deny-list lifetime)
//! - Remote (conflict retry policy)
//!
//! Files may be JSON or TOML; the format is chosen by extension.

use crate::error::{ConfigError, SettingsError, SettingsResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Geometry settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometrySettings {
    /// Content-box inset of a group in the render layer; 0 means plain vector math
    pub border_inset: f64,
    /// Width used for tasks, which have no user-resizable extent
    pub task_width: f64,
    /// Height used for tasks
    pub task_height: f64,
}

impl Default for GeometrySettings {
    fn default() -> Self {
        Self {
            border_inset: 0.0,
            task_width: 200.0,
            task_height: 80.0,
        }
    }
}

/// Containment settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainmentSettings {
    /// Hop limit when walking ancestor chains for cycle detection
    pub max_ancestor_depth: usize,
    /// Hop limit when resolving absolute positions through parent offsets
    pub max_resolve_depth: usize,
    /// A new parent group must exceed the child's area by this factor
    pub group_area_ratio: f64,
    /// Fraction of a box that must overlap a group to count as inside
    pub overlap_threshold: f64,
}

impl Default for ContainmentSettings {
    fn default() -> Self {
        Self {
            max_ancestor_depth: 50,
            max_resolve_depth: 100,
            group_area_ratio: 1.05,
            overlap_threshold: 0.5,
        }
    }
}

/// Drag settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragSettings {
    /// Cool-down after drag-stop during which stale reads may not overwrite
    pub settle_ms: u64,
    /// Locks older than this are no longer considered active
    pub lock_ttl_ms: u64,
    /// Stacking order given to a dragged group for the gesture
    pub elevated_z_index: i32,
}

impl Default for DragSettings {
    fn default() -> Self {
        Self {
            settle_ms: 300,
            lock_ttl_ms: 10_000,
            elevated_z_index: 1000,
        }
    }
}

impl DragSettings {
    /// Settling window as a duration.
    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Lock lifetime as a duration.
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }
}

/// Sync settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Position differences below this are not material changes
    pub position_tolerance: f64,
    /// How long a deleted id stays on the deny-list
    pub zombie_ttl_ms: u64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            position_tolerance: 0.1,
            zombie_ttl_ms: 5_000,
        }
    }
}

impl SyncSettings {
    /// Deny-list lifetime as a duration.
    pub fn zombie_ttl(&self) -> Duration {
        Duration::from_millis(self.zombie_ttl_ms)
    }
}

/// Remote persistence settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Fetch-and-retry cycles after a version conflict (0 or 1)
    pub max_conflict_retries: u32,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            max_conflict_retries: 1,
        }
    }
}

/// Complete canvas configuration
///
/// Aggregates all settings sections and provides file I/O operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CanvasConfig {
    /// Geometry settings
    pub geometry: GeometrySettings,
    /// Containment settings
    pub containment: ContainmentSettings,
    /// Drag settings
    pub drag: DragSettings,
    /// Sync settings
    pub sync: SyncSettings,
    /// Remote settings
    pub remote: RemoteSettings,
}

impl CanvasConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Platform config location, e.g. `~/.config/taskcanvas/config.toml`.
    pub fn default_path() -> SettingsResult<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("taskcanvas").join("config.toml"))
            .ok_or_else(|| {
                SettingsError::ConfigDirectory("no platform config directory".to_string())
            })
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)?;

        let config: Self = match Format::from_path(path)? {
            Format::Json => serde_json::from_str(&content)?,
            Format::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        self.validate()?;

        let content = match Format::from_path(path)? {
            Format::Json => serde_json::to_string_pretty(self)?,
            Format::Toml => toml::to_string_pretty(self)?,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> SettingsResult<()> {
        let geometry = &self.geometry;
        if !geometry.border_inset.is_finite() || geometry.border_inset < 0.0 {
            return Err(SettingsError::invalid(
                "geometry.border_inset",
                "must be finite and >= 0",
            ));
        }
        if !(geometry.task_width.is_finite() && geometry.task_width > 0.0)
            || !(geometry.task_height.is_finite() && geometry.task_height > 0.0)
        {
            return Err(SettingsError::invalid(
                "geometry.task_width",
                "task extents must be finite and > 0",
            ));
        }

        let containment = &self.containment;
        if containment.max_ancestor_depth == 0 || containment.max_resolve_depth == 0 {
            return Err(SettingsError::invalid(
                "containment.max_ancestor_depth",
                "depth bounds must be > 0",
            ));
        }
        if !(containment.group_area_ratio >= 1.0) {
            return Err(SettingsError::invalid(
                "containment.group_area_ratio",
                "must be >= 1.0",
            ));
        }
        if !(containment.overlap_threshold > 0.0 && containment.overlap_threshold <= 1.0) {
            return Err(SettingsError::invalid(
                "containment.overlap_threshold",
                "must be in (0, 1]",
            ));
        }

        if self.drag.settle_ms == 0 {
            return Err(SettingsError::invalid("drag.settle_ms", "must be > 0"));
        }
        if self.drag.lock_ttl_ms <= self.drag.settle_ms {
            return Err(SettingsError::invalid(
                "drag.lock_ttl_ms",
                "must outlive the settling window",
            ));
        }

        if !(self.sync.position_tolerance.is_finite() && self.sync.position_tolerance >= 0.0) {
            return Err(SettingsError::invalid(
                "sync.position_tolerance",
                "must be finite and >= 0",
            ));
        }

        if self.remote.max_conflict_retries > 1 {
            return Err(SettingsError::invalid(
                "remote.max_conflict_retries",
                "at most one fetch-and-retry cycle is allowed",
            ));
        }

        Ok(())
    }
}

enum Format {
    Json,
    Toml,
}

impl Format {
    fn from_path(path: &Path) -> SettingsResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Format::Json),
            Some("toml") => Ok(Format::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.unwrap_or("").to_string()).into()),
        }
    }
}
