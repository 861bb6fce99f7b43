//! Core module containing the backup and restore engine.
//!
//! - [`BackupCollector`] snapshots every registered kind into a directory tree
//! - [`RestoreApplier`] replays a snapshot in two waves, namespaces first
//! - [`FleetCore`] wires configuration, cluster access and the registry
//!   together for the binary

mod backup;
mod error;
mod fleet_core;
mod options;
mod restore;
mod stats;

pub use backup::BackupCollector;
pub use error::{OrchestrationError, ResourceError};
pub use fleet_core::FleetCore;
pub use options::RunOptions;
pub use restore::{RestoreApplier, Wave};
pub use stats::{BackupSummary, Counters, RestoreSummary};
