use discovery_store::StoreError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("can't create registry with an unusable store connection")]
    ConnectionUnavailable,

    #[error("Invalid registry configuration: {0}")]
    InvalidConfiguration(String),

    #[error("failed to bootstrap registry root: {0}")]
    Bootstrap(#[source] StoreError),

    #[error("failed to watch registry root: {0}")]
    Watch(#[source] StoreError),

    #[error("reconciliation task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
