//! Core service discovery primitives
//!
//! This library provides:
//! - Path decoding from coordination-store paths into service/version/endpoint
//! - The in-memory service cache backing lookups
//! - Watch notification types shared with the store collaborators

pub mod cache;
pub mod error;
pub mod event;
pub mod path;

pub use cache::{ServiceCache, Snapshot};
pub use error::{CoreError, Result};
pub use event::{EventKind, WatchError, WatchEvent};
pub use path::{decode, sanitize, segment_count, PathTarget};
