//! Registry behaviour driven through store notifications

use discovery_core::CoreError;
use discovery_registry::{Registry, RegistryConfig, RegistryError};
use discovery_store::{create_tree, remove_tree, Acl, CoordinationStore, CreateMode, MemoryStore};
use std::time::Duration;

const ROOT: &str = "/test/discovery";

async fn setup() -> (MemoryStore, Registry) {
    let store = MemoryStore::new();
    let registry = Registry::new(&store, RegistryConfig::new(ROOT))
        .await
        .expect("registry should start");
    (store, registry)
}

/// Wait until the registry has taken `count` notifications off its channel
async fn wait_for_received(registry: &Registry, count: u64) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while registry.stats().received < count {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("notifications were not processed in time");
}

fn endpoints(registry: &Registry, name: &str, version: &str) -> Result<Vec<String>, CoreError> {
    registry.lookup(name, version).map(|e| e.to_vec())
}

#[tokio::test]
async fn test_new_fails_on_unusable_connection() {
    let store = MemoryStore::new();
    store.disconnect();

    let err = Registry::new(&store, RegistryConfig::new(ROOT))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::ConnectionUnavailable));
}

#[tokio::test]
async fn test_new_rejects_invalid_root() {
    let store = MemoryStore::new();
    let err = Registry::new(&store, RegistryConfig::new("/")).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn test_new_creates_root_and_closes() {
    let (store, registry) = setup().await;
    assert!(store.exists(ROOT).await.unwrap());
    assert_eq!(store.watch_count().await, 1);

    tokio::time::timeout(Duration::from_secs(1), registry.close())
        .await
        .expect("close should not block")
        .unwrap();

    // The subscription goes away with the reconciliation task.
    assert_eq!(store.watch_count().await, 0);
}

#[tokio::test]
async fn test_endpoint_lifecycle() {
    let (store, registry) = setup().await;

    create_tree(&store, "/test/discovery/name/version/addr").await.unwrap();
    wait_for_received(&registry, 3).await;
    assert_eq!(endpoints(&registry, "name", "version").unwrap(), vec!["addr"]);

    store.delete("/test/discovery/name/version/addr", None).await.unwrap();
    wait_for_received(&registry, 4).await;
    assert!(endpoints(&registry, "name", "version").unwrap().is_empty());

    store.delete("/test/discovery/name/version", None).await.unwrap();
    wait_for_received(&registry, 5).await;
    assert!(matches!(
        endpoints(&registry, "name", "version"),
        Err(CoreError::ServiceNotFound { .. })
    ));
    assert_eq!(registry.describe(), r#"{"name":{}}"#);

    store.delete("/test/discovery/name", None).await.unwrap();
    wait_for_received(&registry, 6).await;
    assert_eq!(registry.describe(), "{}");

    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_describe_after_registration() {
    let (store, registry) = setup().await;

    create_tree(&store, "/test/discovery/name/version/addr").await.unwrap();
    wait_for_received(&registry, 3).await;
    assert_eq!(registry.describe(), r#"{"name":{"version":["addr"]}}"#);

    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_multiple_endpoints_and_versions() {
    let (store, registry) = setup().await;

    create_tree(&store, "/test/discovery/name/v1/addr1").await.unwrap();
    create_tree(&store, "/test/discovery/name/v1/addr2").await.unwrap();
    create_tree(&store, "/test/discovery/name/v2/addr3").await.unwrap();
    wait_for_received(&registry, 6).await;

    assert_eq!(
        endpoints(&registry, "name", "v1").unwrap(),
        vec!["addr1", "addr2"]
    );

    remove_tree(&store, "/test/discovery/name/v1").await.unwrap();
    wait_for_received(&registry, 9).await;
    assert!(endpoints(&registry, "name", "v1").is_err());
    assert_eq!(endpoints(&registry, "name", "v2").unwrap(), vec!["addr3"]);

    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_bare_service_and_version_are_not_cached() {
    let (store, registry) = setup().await;

    create_tree(&store, "/test/discovery/name/version").await.unwrap();
    wait_for_received(&registry, 2).await;

    assert!(endpoints(&registry, "name", "version").is_err());
    assert_eq!(registry.describe(), "{}");
    assert_eq!(registry.stats().ignored, 2);

    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_update_is_ignored() {
    let (store, registry) = setup().await;

    create_tree(&store, "/test/discovery/name/version/addr").await.unwrap();
    store
        .set_data("/test/discovery/name/version/addr", b"other-addr", None)
        .await
        .unwrap();
    store
        .set_data("/test/discovery/name/version", b"payload", None)
        .await
        .unwrap();
    wait_for_received(&registry, 5).await;

    assert_eq!(endpoints(&registry, "name", "version").unwrap(), vec!["addr"]);

    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_watch_error_leaves_cache_untouched() {
    let (store, registry) = setup().await;

    create_tree(&store, "/test/discovery/name/version/addr").await.unwrap();
    store
        .fail_watches("/test/discovery/name/version/addr", "session expired")
        .await;
    wait_for_received(&registry, 4).await;

    assert_eq!(endpoints(&registry, "name", "version").unwrap(), vec!["addr"]);
    assert_eq!(registry.stats().dropped, 1);

    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_existing_tree_is_loaded_at_start() {
    let store = MemoryStore::new();
    create_tree(&store, "/test/discovery/name/version/addr").await.unwrap();
    create_tree(&store, "/test/discovery/other/v1/addr2").await.unwrap();

    let registry = Registry::new(&store, RegistryConfig::new(ROOT)).await.unwrap();
    wait_for_received(&registry, 6).await;

    assert_eq!(
        registry.describe(),
        r#"{"name":{"version":["addr"]},"other":{"v1":["addr2"]}}"#
    );

    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_ephemeral_endpoints_expire() {
    let (store, registry) = setup().await;

    create_tree(&store, "/test/discovery/name/version").await.unwrap();
    store
        .create(
            "/test/discovery/name/version/addr",
            &[],
            CreateMode::Ephemeral,
            &Acl::world_all(),
        )
        .await
        .unwrap();
    wait_for_received(&registry, 3).await;
    assert_eq!(endpoints(&registry, "name", "version").unwrap(), vec!["addr"]);

    store.expire_ephemerals().await;
    wait_for_received(&registry, 4).await;
    assert!(endpoints(&registry, "name", "version").unwrap().is_empty());

    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_direct_calls_interleave_with_watch() {
    let (store, registry) = setup().await;

    registry.add("name", "version", "local");
    create_tree(&store, "/test/discovery/name/version/addr").await.unwrap();
    wait_for_received(&registry, 3).await;
    assert_eq!(
        endpoints(&registry, "name", "version").unwrap(),
        vec!["local", "addr"]
    );

    store.delete("/test/discovery/name/version/addr", None).await.unwrap();
    store.delete("/test/discovery/name/version", None).await.unwrap();
    wait_for_received(&registry, 5).await;
    assert!(endpoints(&registry, "name", "version").is_err());

    registry.close().await.unwrap();
}

#[tokio::test]
async fn test_events_outside_watch_depth_are_not_seen() {
    let (store, registry) = setup().await;

    create_tree(&store, "/test/discovery/name/version/addr/extra").await.unwrap();
    create_tree(&store, "/test/elsewhere/name/version/addr").await.unwrap();
    wait_for_received(&registry, 3).await;
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(registry.stats().received, 3);
    assert_eq!(endpoints(&registry, "name", "version").unwrap(), vec!["addr"]);

    registry.close().await.unwrap();
}
