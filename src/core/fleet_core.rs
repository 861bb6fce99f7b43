//! Shared infrastructure for backup and restore runs.

use std::sync::Arc;

use crate::cluster::http::HttpCluster;
use crate::cluster::{ClusterAccess, ClusterError};
use crate::config::Config;
use crate::registry::Registry;

use super::backup::BackupCollector;
use super::options::RunOptions;
use super::restore::RestoreApplier;

/// Owns the configuration and the kind registry bound to one cluster.
///
/// Collectors and appliers built from the same core share the registry;
/// each gets fresh counters.
pub struct FleetCore {
    /// Application configuration
    config: Config,
    /// Kind table bound to the cluster
    registry: Arc<Registry>,
}

impl FleetCore {
    /// Create a core over any cluster implementation.
    ///
    /// Applies the configured kind allow-list; unknown kind names are logged
    /// and ignored.
    pub fn new(config: Config, cluster: Arc<dyn ClusterAccess>) -> Self {
        let mut registry = Registry::with_builtin_kinds(cluster);
        if let Some(kinds) = &config.kinds {
            for unknown in registry.retain_kinds(kinds) {
                tracing::warn!(kind = %unknown, "Ignoring unknown kind in allow-list");
            }
        }
        tracing::debug!(registry = ?registry, "Initialized registry");

        Self {
            config,
            registry: Arc::new(registry),
        }
    }

    /// Create a core talking to the configured API server
    pub fn connect(config: Config) -> Result<Self, ClusterError> {
        let cluster = HttpCluster::new(&config.http_config())?;
        tracing::info!(server = %cluster.base_url(), "Using cluster API server");
        Ok(Self::new(config, Arc::new(cluster)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Collector writing into `config.backup_dir`
    pub fn backup_collector(&self) -> BackupCollector {
        let options = RunOptions::new(&self.config.backup_dir)
            .with_max_concurrency(self.config.max_concurrency)
            .with_dry_run(self.config.dry_run);
        BackupCollector::new(self.registry.clone(), options)
    }

    /// Applier reading from `config.restore_dir`
    pub fn restore_applier(&self) -> RestoreApplier {
        let options = RunOptions::new(&self.config.restore_dir)
            .with_max_concurrency(self.config.max_concurrency)
            .with_dry_run(self.config.dry_run);
        RestoreApplier::new(self.registry.clone(), options)
    }
}
