//! Reconciliation of watch notifications into the service cache
//!
//! A single task consumes notifications in arrival order, decodes each path
//! relative to the watched root and applies the implied [`Mutation`]. Bad
//! paths and failed notifications are logged and dropped; the task only stops
//! when the registry is closed.

use discovery_core::{decode, EventKind, PathTarget, ServiceCache, WatchEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Cache change implied by a single notification
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutation<'a> {
    Add {
        name: &'a str,
        version: &'a str,
        endpoint: &'a str,
    },
    DeleteEndpoint {
        name: &'a str,
        version: &'a str,
        endpoint: &'a str,
    },
    DeleteVersion {
        name: &'a str,
        version: &'a str,
    },
    DeleteService {
        name: &'a str,
    },
}

impl<'a> Mutation<'a> {
    /// Map a notification kind on a decoded path to a mutation.
    ///
    /// Only endpoint creations add entries; service and version nodes
    /// materialize in the cache once an endpoint appears under them. Updates
    /// carry node data, which is not part of the registration.
    pub fn from_event(kind: EventKind, target: PathTarget<'a>) -> Option<Self> {
        let (name, version, endpoint) = target.parts();
        if name.is_empty() {
            return None;
        }

        match kind {
            EventKind::Create if !version.is_empty() && !endpoint.is_empty() => {
                Some(Mutation::Add {
                    name,
                    version,
                    endpoint,
                })
            }
            EventKind::Create => None,
            EventKind::Delete if version.is_empty() => Some(Mutation::DeleteService { name }),
            EventKind::Delete if endpoint.is_empty() => {
                Some(Mutation::DeleteVersion { name, version })
            }
            EventKind::Delete => Some(Mutation::DeleteEndpoint {
                name,
                version,
                endpoint,
            }),
            EventKind::Update => None,
        }
    }

    pub fn apply(&self, cache: &ServiceCache) {
        match *self {
            Mutation::Add {
                name,
                version,
                endpoint,
            } => cache.add(name, version, endpoint),
            Mutation::DeleteEndpoint {
                name,
                version,
                endpoint,
            } => cache.delete_endpoint(name, version, endpoint),
            Mutation::DeleteVersion { name, version } => cache.delete_version(name, version),
            Mutation::DeleteService { name } => cache.delete_service(name),
        }
    }
}

/// Counters describing what the reconciliation task has done
#[derive(Debug, Default)]
pub struct ReconcileStats {
    received: AtomicU64,
    applied: AtomicU64,
    ignored: AtomicU64,
    dropped: AtomicU64,
    ticks: AtomicU64,
}

/// Point-in-time copy of [`ReconcileStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Notifications fully handled, whatever the outcome
    pub received: u64,
    /// Notifications that changed the cache
    pub applied: u64,
    /// Well-formed notifications with nothing to apply
    pub ignored: u64,
    /// Notifications with a bad path or a watch error
    pub dropped: u64,
    pub ticks: u64,
}

impl ReconcileStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }

    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Background consumer applying notifications to the cache
pub(crate) struct ReconciliationLoop {
    pub(crate) cache: Arc<ServiceCache>,
    pub(crate) events: mpsc::Receiver<WatchEvent>,
    pub(crate) offset: usize,
    pub(crate) tick_interval: Duration,
    pub(crate) shutdown: CancellationToken,
    pub(crate) stats: Arc<ReconcileStats>,
}

impl ReconciliationLoop {
    pub(crate) async fn run(mut self) {
        let mut ticker = time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watching = true;

        info!("Reconciliation started at offset {}", self.offset);
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => self.on_tick(),
                event = self.events.recv(), if watching => match event {
                    Some(event) => self.on_event(event),
                    None => {
                        warn!("Watch channel closed, cache will no longer follow the store");
                        watching = false;
                    }
                },
            }
        }
        info!("Reconciliation stopped");
    }

    fn on_tick(&self) {
        // Reserved for periodic resync; nothing to do yet.
        ReconcileStats::incr(&self.stats.ticks);
        trace!("Reconciliation tick");
    }

    fn on_event(&self, event: WatchEvent) {
        let outcome = self.reconcile(&event);
        ReconcileStats::incr(outcome);
        // Counted last so that `received` never runs ahead of the cache.
        ReconcileStats::incr(&self.stats.received);
    }

    /// Apply `event` and return the counter matching what happened to it
    fn reconcile(&self, event: &WatchEvent) -> &AtomicU64 {
        let target = match decode(&event.path, self.offset) {
            Ok(target) => target,
            Err(e) => {
                warn!(
                    "Error parsing the event from the store: {} ({:?})",
                    e, event.error
                );
                return &self.stats.dropped;
            }
        };

        if let Some(err) = &event.error {
            let (name, version, _) = target.parts();
            warn!("Watch error from the store for {}/{}: {}", name, version, err);
            return &self.stats.dropped;
        }

        match Mutation::from_event(event.kind, target) {
            Some(mutation) => {
                debug!("Applying {:?}", mutation);
                mutation.apply(&self.cache);
                &self.stats.applied
            }
            None => {
                trace!("Ignoring {:?} on {}", event.kind, event.path);
                &self.stats.ignored
            }
        }
    }
}
