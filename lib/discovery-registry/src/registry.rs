//! Registry facade over the service cache and its reconciliation task

use crate::reconcile::{ReconcileStats, ReconciliationLoop, StatsSnapshot};
use crate::{RegistryConfig, RegistryError, Result};
use discovery_core::{segment_count, ServiceCache};
use discovery_store::{create_tree, CoordinationStore, TreeWatcher};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// Registry keeps a local copy of the services registered under a store root.
///
/// Lookups are served from memory and never wait on the store. The copy is
/// eventually consistent: a notification lost by the watcher is not
/// recovered.
pub struct Registry {
    cache: Arc<ServiceCache>,
    root_path: String,
    offset: usize,
    stats: Arc<ReconcileStats>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    span: Span,
}

/// Builder for [`Registry`], mainly to inject a tracing span
pub struct RegistryBuilder {
    config: RegistryConfig,
    span: Option<Span>,
}

impl RegistryBuilder {
    /// Emit the registry's diagnostics inside `span`
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Bootstrap the root in `store`, subscribe to it and start reconciling
    pub async fn build<S>(self, store: &S) -> Result<Registry>
    where
        S: CoordinationStore + TreeWatcher + ?Sized,
    {
        let config = self.config;
        config.validate()?;
        if !store.is_connected() {
            return Err(RegistryError::ConnectionUnavailable);
        }
        let span = self
            .span
            .unwrap_or_else(|| info_span!("registry", root = %config.root_path));

        create_tree(store, &config.root_path)
            .await
            .map_err(RegistryError::Bootstrap)?;

        let offset = segment_count(&config.root_path);
        let events = store
            .watch(&config.root_path, config.watch_depth)
            .await
            .map_err(RegistryError::Watch)?;

        let cache = Arc::new(ServiceCache::new());
        let stats = Arc::new(ReconcileStats::default());
        let shutdown = CancellationToken::new();
        let reconciliation = ReconciliationLoop {
            cache: cache.clone(),
            events,
            offset,
            tick_interval: config.tick_interval(),
            shutdown: shutdown.clone(),
            stats: stats.clone(),
        };
        let task = tokio::spawn(reconciliation.run().instrument(span.clone()));

        span.in_scope(|| info!("Registry watching {}", config.root_path));
        Ok(Registry {
            cache,
            root_path: config.root_path,
            offset,
            stats,
            shutdown,
            task: Mutex::new(Some(task)),
            span,
        })
    }
}

impl Registry {
    pub fn builder(config: RegistryConfig) -> RegistryBuilder {
        RegistryBuilder { config, span: None }
    }

    /// Create a registry for `config.root_path` in `store`
    pub async fn new<S>(store: &S, config: RegistryConfig) -> Result<Self>
    where
        S: CoordinationStore + TreeWatcher + ?Sized,
    {
        Self::builder(config).build(store).await
    }

    /// Get the endpoints registered for `name`/`version`
    pub fn lookup(&self, name: &str, version: &str) -> discovery_core::Result<Arc<Vec<String>>> {
        self.cache.lookup(name, version)
    }

    /// Register an endpoint locally, bypassing the store
    pub fn add(&self, name: &str, version: &str, endpoint: &str) {
        self.cache.add(name, version, endpoint);
    }

    pub fn delete_endpoint(&self, name: &str, version: &str, endpoint: &str) {
        self.cache.delete_endpoint(name, version, endpoint);
    }

    pub fn delete_version(&self, name: &str, version: &str) {
        self.cache.delete_version(name, version);
    }

    pub fn delete_service(&self, name: &str) {
        self.cache.delete_service(name);
    }

    /// Report that `endpoint` failed for `name`/`version`.
    ///
    /// Only logged; the endpoint stays registered.
    pub fn report_failure(
        &self,
        name: &str,
        version: &str,
        endpoint: &str,
        cause: &dyn fmt::Display,
    ) {
        let _entered = self.span.enter();
        warn!("{}", failure_message(name, version, endpoint, cause));
    }

    /// JSON rendering of the whole cache.
    ///
    /// Takes the cache lock; keep it off hot request paths.
    pub fn describe(&self) -> String {
        self.cache.to_json()
    }

    /// Stop the reconciliation task and wait for it to exit.
    ///
    /// Calling `close` again is a no-op.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        let task = self.task.lock().take();
        if let Some(task) = task {
            task.await?;
            self.span.in_scope(|| debug!("Registry closed"));
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    /// Depth of the root path, in segments
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn service_count(&self) -> usize {
        self.cache.service_count()
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("root_path", &self.root_path)
            .field("offset", &self.offset)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Message logged by [`Registry::report_failure`]
pub fn failure_message(
    name: &str,
    version: &str,
    endpoint: &str,
    cause: &dyn fmt::Display,
) -> String {
    format!("Error accessing {}/{} ({}): {}", name, version, endpoint, cause)
}
