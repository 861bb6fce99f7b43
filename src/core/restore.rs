//! Restore applier
//!
//! Replays a snapshot tree into the cluster in two waves: every namespace
//! record first, then everything else. The second wave starts only after
//! the first pool run has fully drained.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{OrchestrationError, ResourceError};
use super::options::RunOptions;
use super::stats::{Counters, RestoreSummary};
use crate::pool::{Pool, RunReport, Task};
use crate::registry::{Registry, RegistryError};
use crate::snapshot::{sanitize, ResourceIdentity, ResourceRecord, SnapshotTree};

/// Restore phase a pool run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    Namespaces,
    Resources,
}

impl fmt::Display for Wave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wave::Namespaces => write!(f, "namespaces"),
            Wave::Resources => write!(f, "resources"),
        }
    }
}

/// Applies a snapshot tree to the cluster
pub struct RestoreApplier {
    registry: Arc<Registry>,
    options: RunOptions,
    counters: Arc<Counters>,
}

impl RestoreApplier {
    pub fn new(registry: Arc<Registry>, options: RunOptions) -> Self {
        Self {
            registry,
            options,
            counters: Arc::new(Counters::new()),
        }
    }

    /// Share an existing counter set instead of a fresh one
    pub fn with_counters(mut self, counters: Arc<Counters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    /// Run a full restore.
    ///
    /// A missing or unreadable root aborts before any task is scheduled.
    /// Per-file failures are collected into the wave reports. Restoring the
    /// same snapshot twice converges on the same cluster state.
    pub async fn perform_restore(
        &self,
        cancel: CancellationToken,
    ) -> Result<RestoreSummary, OrchestrationError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let tree = SnapshotTree::new(&self.options.root);

        if !tree.root().is_dir() {
            return Err(OrchestrationError::MissingSnapshotRoot(
                self.options.root.clone(),
            ));
        }
        let files = tree.scan().map_err(|source| OrchestrationError::Scan {
            path: self.options.root.clone(),
            source,
        })?;

        tracing::info!(
            run_id = %run_id,
            root = %tree.root().display(),
            dry_run = self.options.dry_run,
            namespaces = files.namespaces.len(),
            resources = files.others.len(),
            "Starting restore"
        );

        let total_files = files.total();
        let namespace_wave = self
            .run_wave(Wave::Namespaces, files.namespaces, &cancel)
            .await?;
        let other_wave = self
            .run_wave(Wave::Resources, files.others, &cancel)
            .await?;

        let summary = RestoreSummary {
            run_id,
            root: self.options.root.clone(),
            dry_run: self.options.dry_run,
            files: total_files,
            per_kind: self.counters.snapshot(),
            total: self.counters.total(),
            namespace_wave,
            other_wave,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            run_id = %run_id,
            total = summary.total,
            files = summary.files,
            failed = summary.errors().count(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Restore finished"
        );
        Ok(summary)
    }

    async fn run_wave(
        &self,
        wave: Wave,
        files: Vec<PathBuf>,
        cancel: &CancellationToken,
    ) -> Result<RunReport<ResourceError>, OrchestrationError> {
        tracing::info!(wave = %wave, files = files.len(), "Restoring wave");

        let pool = Pool::new(self.options.max_concurrency, files.len());
        for path in files {
            let label = format!("restore {}", path.display());
            let job = RestoreJob {
                registry: self.registry.clone(),
                counters: self.counters.clone(),
                dry_run: self.options.dry_run,
                path,
            };
            pool.add_task(Task::new(move |cancel| job.run(cancel)).with_label(label))?;
        }

        let report = pool.run(cancel.clone()).await?;
        for err in &report.errors {
            tracing::error!(wave = %wave, error = %err, "Restore task failed");
        }
        tracing::info!(
            wave = %wave,
            succeeded = report.succeeded,
            failed = report.errors.len(),
            dropped = report.dropped,
            "Wave finished"
        );
        Ok(report)
    }
}

/// One file to apply
struct RestoreJob {
    registry: Arc<Registry>,
    counters: Arc<Counters>,
    dry_run: bool,
    path: PathBuf,
}

impl RestoreJob {
    async fn run(self, cancel: CancellationToken) -> Result<(), ResourceError> {
        if cancel.is_cancelled() {
            return Err(self.cancelled());
        }

        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| ResourceError::Read {
                path: self.path.clone(),
                source,
            })?;
        let record = ResourceRecord::decode(&bytes).map_err(|source| ResourceError::Decode {
            path: self.path.clone(),
            source,
        })?;

        let kind = match self.registry.lookup(&record.kind) {
            Ok(kind) => kind.clone(),
            Err(_) => {
                return Err(ResourceError::UnsupportedKind {
                    kind: record.kind,
                    context: self.path.display().to_string(),
                })
            }
        };

        let resource = sanitize(record.resource);
        let identity = ResourceIdentity::resolve(&kind, &resource).map_err(|reason| {
            ResourceError::Validation {
                kind: kind.name.clone(),
                context: self.path.display().to_string(),
                reason,
            }
        })?;

        if self.dry_run {
            tracing::info!(
                resource = %identity,
                path = %self.path.display(),
                "Dry run: would restore resource"
            );
            self.counters.increment(&kind.name);
            return Ok(());
        }

        let applied = tokio::select! {
            _ = cancel.cancelled() => return Err(self.cancelled()),
            applied = self.registry.upsert(&kind.name, identity.namespace.as_deref(), &resource) => applied,
        };
        if let Err(e) = applied {
            let source = match e {
                RegistryError::Cluster(source) => source,
                RegistryError::UnsupportedKind(kind) => {
                    return Err(ResourceError::UnsupportedKind {
                        kind,
                        context: self.path.display().to_string(),
                    })
                }
            };
            return Err(ResourceError::Apply {
                identity,
                path: self.path,
                source,
            });
        }

        self.counters.increment(&kind.name);
        tracing::debug!(resource = %identity, "Restored resource");
        Ok(())
    }

    fn cancelled(&self) -> ResourceError {
        ResourceError::Cancelled {
            operation: format!("restore of {}", self.path.display()),
        }
    }
}
