use anyhow::Result;
use discovery_registry::Registry;
use discovery_store::{create_tree, tree::join, MemoryStore};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::DaemonConfig;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting service-discovery daemon...");

    let config = DaemonConfig::load()?;
    let store = MemoryStore::new();
    seed_store(&store, &config).await?;

    let registry = Registry::new(&store, config.registry.clone()).await?;
    info!(
        "Registry initialized on {} (offset {})",
        registry.root_path(),
        registry.offset()
    );

    let mut report = tokio::time::interval(config.report_interval());
    loop {
        tokio::select! {
            _ = report.tick() => report_state(&registry),
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutdown signal received, closing registry...");
    registry.close().await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if std::env::var("DISCOVERY_LOG_JSON").is_ok_and(|v| v == "1") {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Register the configured seed endpoints in the store
async fn seed_store(store: &MemoryStore, config: &DaemonConfig) -> Result<()> {
    for endpoint in &config.seed {
        let path = join(&config.registry.root_path, endpoint);
        create_tree(store, &path).await?;
        info!("Seeded {}", path);
    }
    Ok(())
}

fn report_state(registry: &Registry) {
    let stats = registry.stats();
    info!(
        "Registry has {} services ({} notifications, {} applied, {} dropped)",
        registry.service_count(),
        stats.received,
        stats.applied,
        stats.dropped
    );
    info!("Registry state: {}", registry.describe());
}
