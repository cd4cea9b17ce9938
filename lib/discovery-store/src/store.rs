//! Node operations on a hierarchical coordination store

use crate::Result;
use async_trait::async_trait;

/// Lifetime of a created node
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CreateMode {
    /// Survives the session that created it
    #[default]
    Persistent,
    /// Removed when the creating session ends
    Ephemeral,
}

/// Permission bits granted by an ACL entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Perms(pub u32);

impl Perms {
    pub const ALL: Perms = Perms(0x1f);
}

/// Access control entry attached to a node
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Acl {
    pub perms: Perms,
    pub scheme: String,
    pub id: String,
}

impl Acl {
    /// Open ACL: anyone may do anything
    pub fn world_all() -> Vec<Acl> {
        vec![Acl {
            perms: Perms::ALL,
            scheme: "world".to_string(),
            id: "anyone".to_string(),
        }]
    }
}

/// Client side of a coordination store session.
///
/// `version` arguments follow the store's optimistic concurrency rules: `None`
/// matches any version, `Some(v)` fails with `BadVersion` unless the node is
/// currently at `v`.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Whether the session is usable
    fn is_connected(&self) -> bool;

    async fn exists(&self, path: &str) -> Result<bool>;

    async fn create(&self, path: &str, data: &[u8], mode: CreateMode, acl: &[Acl]) -> Result<()>;

    /// Names of the direct children of `path`
    async fn children(&self, path: &str) -> Result<Vec<String>>;

    async fn set_data(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<()>;

    async fn delete(&self, path: &str, version: Option<i32>) -> Result<()>;
}
