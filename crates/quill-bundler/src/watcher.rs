//! File-watcher event intake types.
//!
//! The watcher itself lives outside this crate; it only needs to deliver
//! batches of [`WatchEvent`]s, either by calling
//! [`DeltaBundler::notify`](crate::DeltaBundler::notify) directly or through
//! a broadcast channel attached with
//! [`DeltaBundler::attach_watcher`](crate::DeltaBundler::attach_watcher).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchEventKind {
    Add,
    Change,
    Delete,
}

/// A single file-system event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn add(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: WatchEventKind::Add,
            path: path.into(),
        }
    }

    pub fn change(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: WatchEventKind::Change,
            path: path.into(),
        }
    }

    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: WatchEventKind::Delete,
            path: path.into(),
        }
    }
}

/// Notification that files belonging to a graph changed and a recompute is
/// available. Deliberately carries no delta content: listeners decide when
/// (and whether) to actually ask for the delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent;
