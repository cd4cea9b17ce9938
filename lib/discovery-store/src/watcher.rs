use crate::Result;
use async_trait::async_trait;
use discovery_core::WatchEvent;
use tokio::sync::mpsc;

/// Subscribes to change notifications below a root node
#[async_trait]
pub trait TreeWatcher: Send + Sync {
    /// Watch `root` and its descendants.
    ///
    /// Children of every node up to `depth` levels below `root` are watched,
    /// so notifications cover nodes at most `depth + 1` levels deep. Nodes
    /// already present are reported as `Create` notifications first, parents
    /// before children. The subscription ends when the receiver is dropped.
    async fn watch(&self, root: &str, depth: usize) -> Result<mpsc::Receiver<WatchEvent>>;
}
