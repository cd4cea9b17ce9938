//! Watch notifications emitted by a tree watcher
use thiserror::Error;

/// Kind of change observed on a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Delete,
    Update,
}

/// Failure reported by the watcher in place of a regular notification
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{0}")]
pub struct WatchError(pub String);

/// A single change notification for `path`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: String,
    pub kind: EventKind,
    pub error: Option<WatchError>,
}

impl WatchEvent {
    pub fn new(path: impl Into<String>, kind: EventKind) -> Self {
        Self {
            path: path.into(),
            kind,
            error: None,
        }
    }

    pub fn created(path: impl Into<String>) -> Self {
        Self::new(path, EventKind::Create)
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::new(path, EventKind::Delete)
    }

    pub fn updated(path: impl Into<String>) -> Self {
        Self::new(path, EventKind::Update)
    }

    /// Attach a watch failure to the notification
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(WatchError(error.into()));
        self
    }
}
