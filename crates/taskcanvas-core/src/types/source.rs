//! Write sources.
//!
//! Every position write names its origin. The position authority arbitrates
//! between sources using [`WriteSource::priority`], and the store uses
//! [`WriteSource::tag`] to decide whether a write gets an undo entry.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin of a position write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteSource {
    /// Active user drag or resize gesture.
    UserDrag,
    /// Programmatic layout operations such as align and distribute.
    Programmatic,
    /// Local reconciliation (re-rooting after deletion, stale containment repair).
    Reconcile,
    /// Remote or periodic store sync.
    RemoteSync,
}

impl WriteSource {
    /// Arbitration priority; higher wins.
    pub fn priority(self) -> u8 {
        match self {
            WriteSource::UserDrag => 3,
            WriteSource::Programmatic => 2,
            WriteSource::Reconcile => 1,
            WriteSource::RemoteSync => 0,
        }
    }

    /// Tag understood by the persisted store.
    pub fn tag(self) -> &'static str {
        match self {
            WriteSource::UserDrag => "drag",
            WriteSource::Programmatic => "align",
            WriteSource::Reconcile => "reconcile",
            WriteSource::RemoteSync => "remote-sync",
        }
    }

    /// Whether store writes from this source are recorded for undo.
    pub fn is_undoable(self) -> bool {
        matches!(self, WriteSource::UserDrag)
    }
}

impl fmt::Display for WriteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
