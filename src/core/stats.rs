//! Per-kind counters and run summaries

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;
use uuid::Uuid;

use super::error::ResourceError;
use crate::pool::RunReport;

/// Thread-safe count of processed instances, keyed by kind name.
///
/// One instance is shared by every task of a run; a dry run counts the
/// instances it would have written or applied.
#[derive(Debug, Default)]
pub struct Counters {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, kind: &str) {
        *self.counts.lock().entry(kind.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, kind: &str) -> u64 {
        self.counts.lock().get(kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    /// Copy of the current counts
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts.lock().clone()
    }
}

/// Result of one backup run
#[derive(Debug)]
pub struct BackupSummary {
    pub run_id: Uuid,
    pub root: PathBuf,
    pub dry_run: bool,
    /// Namespaces enumerated at the start of the run
    pub namespaces: usize,
    /// Instances written (or that would have been) per kind
    pub per_kind: BTreeMap<String, u64>,
    pub total: u64,
    pub report: RunReport<ResourceError>,
    pub elapsed: Duration,
}

impl BackupSummary {
    pub fn has_failures(&self) -> bool {
        !self.report.is_clean()
    }
}

/// Result of one restore run; one report per wave
#[derive(Debug)]
pub struct RestoreSummary {
    pub run_id: Uuid,
    pub root: PathBuf,
    pub dry_run: bool,
    /// Resource files found under the root
    pub files: usize,
    pub per_kind: BTreeMap<String, u64>,
    pub total: u64,
    pub namespace_wave: RunReport<ResourceError>,
    pub other_wave: RunReport<ResourceError>,
    pub elapsed: Duration,
}

impl RestoreSummary {
    pub fn has_failures(&self) -> bool {
        !self.namespace_wave.is_clean() || !self.other_wave.is_clean()
    }

    /// Errors from both waves, namespace wave first
    pub fn errors(&self) -> impl Iterator<Item = &ResourceError> {
        self.namespace_wave
            .errors
            .iter()
            .chain(self.other_wave.errors.iter())
    }
}

fn write_counts(f: &mut fmt::Formatter<'_>, per_kind: &BTreeMap<String, u64>) -> fmt::Result {
    for (kind, count) in per_kind {
        writeln!(f, "  {kind}: {count}")?;
    }
    Ok(())
}

fn write_report(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    report: &RunReport<ResourceError>,
) -> fmt::Result {
    writeln!(
        f,
        "{label}: {} tasks, {} succeeded, {} failed, {} panicked, {} dropped",
        report.admitted,
        report.succeeded,
        report.errors.len(),
        report.panicked,
        report.dropped
    )?;
    for err in &report.errors {
        writeln!(f, "  error: {err}")?;
    }
    Ok(())
}

impl fmt::Display for BackupSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "Would back up" } else { "Backed up" };
        writeln!(
            f,
            "{verb} {} resources from {} namespaces into {} ({:.1}s)",
            self.total,
            self.namespaces,
            self.root.display(),
            self.elapsed.as_secs_f64()
        )?;
        write_counts(f, &self.per_kind)?;
        write_report(f, "Tasks", &self.report)
    }
}

impl fmt::Display for RestoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = if self.dry_run { "Would restore" } else { "Restored" };
        writeln!(
            f,
            "{verb} {} of {} resources from {} ({:.1}s)",
            self.total,
            self.files,
            self.root.display(),
            self.elapsed.as_secs_f64()
        )?;
        write_counts(f, &self.per_kind)?;
        write_report(f, "Namespace wave", &self.namespace_wave)?;
        write_report(f, "Resource wave", &self.other_wave)
    }
}
