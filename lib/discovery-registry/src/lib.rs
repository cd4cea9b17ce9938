//! Local replica of a service registration tree
//!
//! A [`Registry`] mirrors `<root>/<service>/<version>/<endpoint>` nodes from a
//! coordination store into an in-memory cache. A background reconciliation
//! task applies watch notifications while callers read through
//! [`Registry::lookup`].

pub mod config;
pub mod error;
pub mod reconcile;
pub mod registry;

pub use config::RegistryConfig;
pub use error::{RegistryError, Result};
pub use reconcile::{Mutation, ReconcileStats, StatsSnapshot};
pub use registry::{failure_message, Registry, RegistryBuilder};
