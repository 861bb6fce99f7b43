//! Backup collector
//!
//! Fans out one pool task per (namespace, namespaced kind) pair plus one
//! per cluster-scoped kind. Each task lists its instances and writes every
//! one of them into the snapshot tree.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::error::{OrchestrationError, ResourceError};
use super::options::RunOptions;
use super::stats::{BackupSummary, Counters};
use crate::cluster::{object_name, object_namespace, RawResource, ResourceKind, Scope};
use crate::pool::{Pool, Task};
use crate::registry::{Registry, RegistryError};
use crate::snapshot::{is_safe_segment, ResourceIdentity, ResourceRecord, SnapshotTree};

/// Captures every registered kind from the cluster into a snapshot tree
pub struct BackupCollector {
    registry: Arc<Registry>,
    options: RunOptions,
    counters: Arc<Counters>,
}

impl BackupCollector {
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

    /// Run a full backup.
    ///
    /// Only a failed namespace enumeration (or a scheduling fault) aborts the
    /// run. Listing and write failures are reported per task in the summary.
    pub async fn perform_backup(
        &self,
        cancel: CancellationToken,
    ) -> Result<BackupSummary, OrchestrationError> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let tree = Arc::new(SnapshotTree::new(&self.options.root));

        tracing::info!(
            run_id = %run_id,
            root = %tree.root().display(),
            dry_run = self.options.dry_run,
            workers = self.options.max_concurrency,
            "Starting backup"
        );

        let namespaces = self
            .registry
            .cluster()
            .list_namespaces()
            .await
            .map_err(OrchestrationError::NamespaceEnumeration)?;
        tracing::info!(count = namespaces.len(), "Enumerated namespaces");

        let mut jobs: Vec<(ResourceKind, Scope)> = self
            .registry
            .cluster_scoped_kinds()
            .map(|kind| (kind.clone(), Scope::Cluster))
            .collect();
        for namespace in &namespaces {
            for kind in self.registry.namespaced_kinds() {
                jobs.push((kind.clone(), Scope::Namespace(namespace.clone())));
            }
        }

        let pool = Pool::new(self.options.max_concurrency, jobs.len());
        for (kind, scope) in jobs {
            let label = format!("backup {} in {}", kind.name, scope);
            let job = BackupJob {
                registry: self.registry.clone(),
                tree: tree.clone(),
                counters: self.counters.clone(),
                dry_run: self.options.dry_run,
                kind,
                scope,
            };
            pool.add_task(Task::new(move |cancel| job.run(cancel)).with_label(label))?;
        }

        let report = pool.run(cancel).await?;
        for err in &report.errors {
            tracing::error!(error = %err, "Backup task failed");
        }

        let per_kind = self.counters.snapshot();
        for (kind, count) in &per_kind {
            tracing::info!(kind = %kind, count, "Backed up kind");
        }
        let summary = BackupSummary {
            run_id,
            root: self.options.root.clone(),
            dry_run: self.options.dry_run,
            namespaces: namespaces.len(),
            total: self.counters.total(),
            per_kind,
            report,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            run_id = %run_id,
            total = summary.total,
            failed = summary.report.errors.len(),
            dropped = summary.report.dropped,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "Backup finished"
        );
        Ok(summary)
    }
}

/// One listing task: a kind within a scope
struct BackupJob {
    registry: Arc<Registry>,
    tree: Arc<SnapshotTree>,
    counters: Arc<Counters>,
    dry_run: bool,
    kind: ResourceKind,
    scope: Scope,
}

impl BackupJob {
    async fn run(self, cancel: CancellationToken) -> Result<(), ResourceError> {
        let listed = tokio::select! {
            _ = cancel.cancelled() => return Err(self.cancelled()),
            listed = self.registry.list(&self.kind.name, &self.scope) => listed,
        };
        let items = listed.map_err(|e| match e {
            RegistryError::Cluster(source) => ResourceError::List {
                kind: self.kind.name.clone(),
                scope: self.scope.clone(),
                source,
            },
            RegistryError::UnsupportedKind(kind) => ResourceError::UnsupportedKind {
                kind,
                context: self.scope.to_string(),
            },
        })?;

        tracing::debug!(
            kind = %self.kind,
            scope = %self.scope,
            count = items.len(),
            "Listed resources"
        );

        // Keep going after a failed instance; report the first one.
        let mut first_failure = None;
        for item in items {
            if cancel.is_cancelled() {
                return Err(self.interrupted(first_failure));
            }
            match self.backup_one(item).await {
                Ok(()) => self.counters.increment(&self.kind.name),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to back up resource");
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn backup_one(&self, item: RawResource) -> Result<(), ResourceError> {
        let identity = self.identity_of(&item)?;
        let path = self.tree.path_for(&self.kind, &identity);

        if self.dry_run {
            tracing::info!(
                resource = %identity,
                path = %path.display(),
                "Dry run: would back up resource"
            );
            return Ok(());
        }

        let record = ResourceRecord::new(self.kind.name.clone(), item);
        if let Err(source) = self.tree.write_record(&path, &record).await {
            return Err(ResourceError::Write {
                identity,
                path,
                source,
            });
        }
        tracing::debug!(resource = %identity, path = %path.display(), "Backed up resource");
        Ok(())
    }

    fn identity_of(&self, item: &RawResource) -> Result<ResourceIdentity, ResourceError> {
        let invalid = |reason: String| ResourceError::Validation {
            kind: self.kind.name.clone(),
            context: self.scope.to_string(),
            reason,
        };

        let name = object_name(item).ok_or_else(|| invalid("metadata.name is missing".into()))?;
        if !is_safe_segment(name) {
            return Err(invalid(format!("name {name:?} is not a valid file name")));
        }

        let namespace = match self.scope.namespace() {
            Some(ns) if !self.kind.cluster_scoped => {
                if let Some(found) = object_namespace(item).filter(|found| *found != ns) {
                    tracing::debug!(
                        expected = %ns,
                        found = %found,
                        "Listed resource reports a different namespace"
                    );
                }
                if !is_safe_segment(ns) {
                    return Err(invalid(format!("namespace {ns:?} is not a valid directory name")));
                }
                Some(ns)
            }
            _ => None,
        };

        Ok(ResourceIdentity::new(self.kind.name.clone(), namespace, name))
    }

    /// Error for a task stopped partway through its instances. A failure
    /// seen before the stop outranks the cancellation.
    fn interrupted(&self, first_failure: Option<ResourceError>) -> ResourceError {
        match first_failure {
            Some(e) => {
                tracing::warn!(
                    kind = %self.kind,
                    scope = %self.scope,
                    "Backup cancelled after an earlier failure"
                );
                e
            }
            None => self.cancelled(),
        }
    }

    fn cancelled(&self) -> ResourceError {
        ResourceError::Cancelled {
            operation: format!("backup of {} in {}", self.kind.name, self.scope),
        }
    }
}
