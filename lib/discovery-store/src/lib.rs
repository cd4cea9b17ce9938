//! Coordination store integration
pub mod error;
pub mod memory;
pub mod store;
pub mod tree;
pub mod watcher;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use store::{Acl, CoordinationStore, CreateMode, Perms};
pub use tree::{create_tree, remove_tree};
pub use watcher::TreeWatcher;
