//! In-process coordination store
//!
//! `MemoryStore` keeps the node tree in memory and delivers watch
//! notifications in the order mutations are applied. It backs the tests and
//! the standalone discovery daemon.

use crate::tree::join;
use crate::{Acl, CoordinationStore, CreateMode, Result, StoreError, TreeWatcher};
use async_trait::async_trait;
use discovery_core::{sanitize, WatchEvent};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace, warn};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct Node {
    data: Vec<u8>,
    version: i32,
    mode: CreateMode,
}

#[derive(Debug)]
struct Subscription {
    root: String,
    depth: usize,
    tx: mpsc::Sender<WatchEvent>,
}

/// Depth of `path` below `root`, if it is inside the subtree
fn relative_depth(root: &str, path: &str) -> Option<usize> {
    if path == root {
        return Some(0);
    }
    let rest = if root == "/" {
        path.strip_prefix('/')?
    } else {
        path.strip_prefix(root)?.strip_prefix('/')?
    };
    Some(rest.split('/').count())
}

impl Subscription {
    fn covers(&self, path: &str) -> bool {
        relative_depth(&self.root, path).is_some_and(|depth| depth <= self.depth + 1)
    }
}

#[derive(Debug)]
struct State {
    nodes: BTreeMap<String, Node>,
    subscriptions: Vec<Subscription>,
}

impl State {
    fn node(&self, path: &str) -> Result<&Node> {
        self.nodes
            .get(path)
            .ok_or_else(|| StoreError::NoNode(path.to_string()))
    }

    fn children(&self, path: &str) -> Vec<String> {
        let prefix = join(path, "");
        self.nodes
            .range(prefix.clone()..)
            .map(|(p, _)| p)
            .take_while(|p| p.starts_with(&prefix))
            .filter_map(|p| {
                let name = &p[prefix.len()..];
                (!name.is_empty() && !name.contains('/')).then(|| name.to_string())
            })
            .collect()
    }

    /// Deliver `event` to every subscription covering its path, in order.
    ///
    /// Runs under the store lock, so it never waits on a subscriber: one whose
    /// buffer is full is dropped, and its receiver sees the channel close once
    /// the buffered notifications are drained.
    fn notify(&mut self, event: WatchEvent) {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|sub| {
            if !sub.covers(&event.path) {
                return !sub.tx.is_closed();
            }
            trace!("Notify {:?} {} to watch on {}", event.kind, event.path, sub.root);
            match sub.tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "Watch on {} is not keeping up, dropping it at {}",
                        sub.root, event.path
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });
        if self.subscriptions.len() != before {
            debug!("Pruned watches, {} remaining", self.subscriptions.len());
        }
    }
}

fn normalize(path: &str) -> String {
    format!("/{}", sanitize(path))
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

fn check_version(path: &str, node: &Node, version: Option<i32>) -> Result<()> {
    match version {
        Some(v) if v != node.version => Err(StoreError::BadVersion(path.to_string())),
        _ => Ok(()),
    }
}

/// MemoryStore is an in-memory [`CoordinationStore`] and [`TreeWatcher`].
///
/// ACLs are accepted but not enforced. Clones share the same tree.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    connected: Arc<AtomicBool>,
    state: Arc<Mutex<State>>,
    channel_capacity: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_channel_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a store whose watch channels buffer `capacity` notifications
    pub fn with_channel_capacity(capacity: usize) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node {
                data: Vec::new(),
                version: 0,
                mode: CreateMode::Persistent,
            },
        );
        Self {
            connected: Arc::new(AtomicBool::new(true)),
            state: Arc::new(Mutex::new(State {
                nodes,
                subscriptions: Vec::new(),
            })),
            channel_capacity: capacity.max(1),
        }
    }

    /// Mark the session as lost; every later call fails with `ConnectionClosed`
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Push a failed `Delete` notification for `path` to the watches covering it
    pub async fn fail_watches(&self, path: &str, message: &str) {
        let path = normalize(path);
        warn!("Failing watches on {}: {}", path, message);
        let mut state = self.state.lock().await;
        state.notify(WatchEvent::deleted(path).with_error(message));
    }

    /// Remove every ephemeral node, as when the owning session expires
    pub async fn expire_ephemerals(&self) -> usize {
        let mut state = self.state.lock().await;
        let expired: Vec<String> = state
            .nodes
            .iter()
            .filter(|(_, node)| node.mode == CreateMode::Ephemeral)
            .map(|(path, _)| path.clone())
            .collect();

        for path in expired.iter().rev() {
            state.nodes.remove(path);
            state.notify(WatchEvent::deleted(path.as_str()));
        }
        debug!("Expired {} ephemeral nodes", expired.len());
        expired.len()
    }

    /// Current data stored at `path`
    pub async fn data(&self, path: &str) -> Result<Vec<u8>> {
        self.ensure_connected()?;
        let state = self.state.lock().await;
        Ok(state.node(&normalize(path))?.data.clone())
    }

    /// Number of live watch subscriptions
    pub async fn watch_count(&self) -> usize {
        let mut state = self.state.lock().await;
        state.subscriptions.retain(|s| !s.tx.is_closed());
        state.subscriptions.len()
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(StoreError::ConnectionClosed)
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.ensure_connected()?;
        let state = self.state.lock().await;
        Ok(state.nodes.contains_key(&normalize(path)))
    }

    async fn create(&self, path: &str, data: &[u8], mode: CreateMode, _acl: &[Acl]) -> Result<()> {
        self.ensure_connected()?;
        let path = normalize(path);
        let mut state = self.state.lock().await;
        if state.nodes.contains_key(&path) {
            return Err(StoreError::NodeExists(path));
        }
        let parent_path = parent(&path);
        if state.node(parent_path)?.mode == CreateMode::Ephemeral {
            return Err(StoreError::NoChildrenForEphemerals(parent_path.to_string()));
        }

        state.nodes.insert(
            path.clone(),
            Node {
                data: data.to_vec(),
                version: 0,
                mode,
            },
        );
        state.notify(WatchEvent::created(path));
        Ok(())
    }

    async fn children(&self, path: &str) -> Result<Vec<String>> {
        self.ensure_connected()?;
        let path = normalize(path);
        let state = self.state.lock().await;
        state.node(&path)?;
        Ok(state.children(&path))
    }

    async fn set_data(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<()> {
        self.ensure_connected()?;
        let path = normalize(path);
        let mut state = self.state.lock().await;
        let node = state
            .nodes
            .get_mut(&path)
            .ok_or_else(|| StoreError::NoNode(path.clone()))?;
        check_version(&path, node, version)?;
        node.data = data.to_vec();
        node.version += 1;

        state.notify(WatchEvent::updated(path));
        Ok(())
    }

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<()> {
        self.ensure_connected()?;
        let path = normalize(path);
        let mut state = self.state.lock().await;
        check_version(&path, state.node(&path)?, version)?;
        if !state.children(&path).is_empty() {
            return Err(StoreError::NotEmpty(path));
        }

        state.nodes.remove(&path);
        state.notify(WatchEvent::deleted(path));
        Ok(())
    }
}

#[async_trait]
impl TreeWatcher for MemoryStore {
    async fn watch(&self, root: &str, depth: usize) -> Result<mpsc::Receiver<WatchEvent>> {
        self.ensure_connected()?;
        let root = normalize(root);
        let mut state = self.state.lock().await;
        state.node(&root)?;

        // BTreeMap order puts every parent before its children.
        let existing: Vec<String> = state
            .nodes
            .keys()
            .filter(|path| {
                relative_depth(&root, path).is_some_and(|d| d >= 1 && d <= depth + 1)
            })
            .cloned()
            .collect();

        let (tx, rx) = mpsc::channel(self.channel_capacity + existing.len());
        for path in existing {
            // Capacity covers the replay, so this never fails.
            let _ = tx.try_send(WatchEvent::created(path));
        }

        state.subscriptions.push(Subscription {
            root: root.clone(),
            depth,
            tx,
        });
        debug!("Watching {} to depth {}", root, depth);
        Ok(rx)
    }
}
