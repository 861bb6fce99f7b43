pub mod cluster;
pub mod config;
pub mod core;
pub mod pool;
pub mod registry;
pub mod snapshot;
pub mod util;

pub use cluster::{ClusterAccess, ClusterError, RawResource, ResourceKind, Scope};
pub use config::Config;
pub use crate::core::{
    BackupCollector, BackupSummary, FleetCore, OrchestrationError, ResourceError, RestoreApplier,
    RestoreSummary, RunOptions,
};
pub use pool::{Pool, PoolError, RunReport, Task};
pub use registry::Registry;
pub use snapshot::{sanitize, ResourceRecord, SnapshotTree};
