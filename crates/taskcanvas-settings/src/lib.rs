//! TaskCanvas Settings Crate
//!
//! Handles canvas configuration: the tunable constants of the geometry,
//! containment, drag, sync and remote subsystems, with JSON/TOML persistence.

pub mod config;
pub mod error;

pub use config::{
    CanvasConfig, ContainmentSettings, DragSettings, GeometrySettings, RemoteSettings,
    SyncSettings,
};
pub use error::{ConfigError, SettingsError, SettingsResult};
