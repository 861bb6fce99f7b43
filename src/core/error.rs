//! Error taxonomy for backup and restore runs

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::cluster::{ClusterError, Scope};
use crate::pool::PoolError;
use crate::snapshot::ResourceIdentity;

/// Failure of one task, annotated with the resource or file it concerned.
///
/// These never abort a run; they are aggregated by the pool and reported in
/// the run summary.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Failed to list {kind} in {scope}: {source}")]
    List {
        kind: String,
        scope: Scope,
        #[source]
        source: ClusterError,
    },
    #[error("Failed to write {identity} to {}: {source}", .path.display())]
    Write {
        identity: ResourceIdentity,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed snapshot file {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid {kind} in {context}: {reason}")]
    Validation {
        kind: String,
        context: String,
        reason: String,
    },
    #[error("Unsupported kind {kind:?} in {context}")]
    UnsupportedKind { kind: String, context: String },
    #[error("Failed to apply {identity} from {}: {source}", .path.display())]
    Apply {
        identity: ResourceIdentity,
        path: PathBuf,
        #[source]
        source: ClusterError,
    },
    #[error("Cancelled: {operation}")]
    Cancelled { operation: String },
}

impl ResourceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResourceError::Cancelled { .. })
    }

    /// Short category name used in summaries
    pub fn category(&self) -> &'static str {
        match self {
            ResourceError::List { .. } => "list",
            ResourceError::Write { .. } => "write",
            ResourceError::Read { .. } => "read",
            ResourceError::Decode { .. } => "decode",
            ResourceError::Validation { .. } => "validation",
            ResourceError::UnsupportedKind { .. } => "unsupported-kind",
            ResourceError::Apply { .. } => "apply",
            ResourceError::Cancelled { .. } => "cancelled",
        }
    }
}

/// Failure that prevents a run from producing a summary at all
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("Failed to enumerate namespaces: {0}")]
    NamespaceEnumeration(#[source] ClusterError),
    #[error("Snapshot root {} does not exist", .0.display())]
    MissingSnapshotRoot(PathBuf),
    #[error("Failed to scan snapshot root {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("Failed to schedule task: {0}")]
    Pool(#[from] PoolError),
}
