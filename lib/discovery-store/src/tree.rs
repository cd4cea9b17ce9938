//! Helpers for creating and removing whole subtrees

use crate::{Acl, CoordinationStore, CreateMode, Result, StoreError};
use tracing::debug;

/// Join a parent path and a child name
pub fn join(parent: &str, child: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), child)
}

/// Create `path` and every missing node above it
pub async fn create_tree<S>(store: &S, path: &str) -> Result<()>
where
    S: CoordinationStore + ?Sized,
{
    let mut target = String::new();
    for elem in path.split('/').filter(|elem| !elem.is_empty()) {
        target = join(&target, elem);

        let exists = store
            .exists(&target)
            .await
            .map_err(|e| StoreError::Lookup {
                path: target.clone(),
                source: Box::new(e),
            })?;
        if exists {
            continue;
        }

        match store
            .create(&target, &[], CreateMode::Persistent, &Acl::world_all())
            .await
        {
            Ok(()) => debug!("Created node {}", target),
            // Lost a race with another client; the node is there either way.
            Err(StoreError::NodeExists(_)) => {}
            Err(e) => {
                return Err(StoreError::Create {
                    path: target,
                    source: Box::new(e),
                })
            }
        }
    }
    Ok(())
}

/// Remove `path` and everything below it, children first
pub async fn remove_tree<S>(store: &S, path: &str) -> Result<()>
where
    S: CoordinationStore + ?Sized,
{
    let mut pending = vec![path.to_string()];
    let mut ordered = Vec::new();
    while let Some(node) = pending.pop() {
        for child in store.children(&node).await? {
            pending.push(join(&node, &child));
        }
        ordered.push(node);
    }

    for node in ordered.into_iter().rev() {
        store
            .delete(&node, None)
            .await
            .map_err(|e| StoreError::Remove {
                path: node.clone(),
                source: Box::new(e),
            })?;
        debug!("Removed node {}", node);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_join() {
        assert_eq!(join("", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
        assert_eq!(join("/a/", "b"), "/a/b");
        assert_eq!(join("/", "b"), "/b");
    }

    #[tokio::test]
    async fn test_create_tree_creates_intermediate_nodes() {
        let store = MemoryStore::new();
        create_tree(&store, "/test/discovery/").await.unwrap();

        assert!(store.exists("/test").await.unwrap());
        assert!(store.exists("/test/discovery").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_tree_is_idempotent() {
        let store = MemoryStore::new();
        create_tree(&store, "/a/b").await.unwrap();
        create_tree(&store, "/a/b/c").await.unwrap();
        create_tree(&store, "a/b/c").await.unwrap();

        assert_eq!(store.children("/a/b").await.unwrap(), vec!["c"]);
    }

    #[tokio::test]
    async fn test_create_tree_reports_failing_path() {
        let store = MemoryStore::new();
        store.disconnect();

        let err = create_tree(&store, "/a/b").await.unwrap_err();
        assert!(matches!(err, StoreError::Lookup { ref path, .. } if path == "/a"));
        assert_eq!(err.to_string(), "error looking up \"/a\": connection closed");
    }

    #[tokio::test]
    async fn test_remove_tree() {
        let store = MemoryStore::new();
        create_tree(&store, "/a/b/c").await.unwrap();
        create_tree(&store, "/a/b/d").await.unwrap();
        create_tree(&store, "/a/e").await.unwrap();
        create_tree(&store, "/keep").await.unwrap();

        remove_tree(&store, "/a").await.unwrap();

        assert!(!store.exists("/a").await.unwrap());
        assert!(store.exists("/keep").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_missing_tree_fails() {
        let store = MemoryStore::new();
        assert!(matches!(
            remove_tree(&store, "/missing").await,
            Err(StoreError::NoNode(_))
        ));
    }
}
