use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::record::{ResourceIdentity, ResourceRecord};
use crate::cluster::ResourceKind;

const NAMESPACES_DIR: &str = "namespaces";
const RECORD_EXTENSION: &str = "json";

/// Resource files found under a snapshot root, split by restore wave
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotFiles {
    /// Direct children of `root/namespaces/`
    pub namespaces: Vec<PathBuf>,
    /// Everything else
    pub others: Vec<PathBuf>,
}

impl SnapshotFiles {
    pub fn total(&self) -> usize {
        self.namespaces.len() + self.others.len()
    }
}

/// On-disk snapshot layout:
///
/// - `root/{namespace}/{kindPluralLower}/{name}.json` for namespaced kinds
/// - `root/{kindPluralLower}/{name}.json` for cluster-scoped kinds, so
///   namespace records land in `root/namespaces/{name}.json`
#[derive(Debug, Clone)]
pub struct SnapshotTree {
    root: PathBuf,
}

impl SnapshotTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding namespace records
    pub fn namespaces_dir(&self) -> PathBuf {
        self.root.join(NAMESPACES_DIR)
    }

    /// File path for one resource instance
    pub fn path_for(&self, kind: &ResourceKind, identity: &ResourceIdentity) -> PathBuf {
        let file_name = format!("{}.{}", identity.name, RECORD_EXTENSION);
        match &identity.namespace {
            Some(ns) if !kind.cluster_scoped => {
                self.root.join(ns).join(kind.dir_name()).join(file_name)
            }
            _ => self.root.join(kind.dir_name()).join(file_name),
        }
    }

    /// True for files restored in the namespace wave
    pub fn is_namespace_file(&self, path: &Path) -> bool {
        path.parent() == Some(self.namespaces_dir().as_path())
    }

    /// Write one record, creating parent directories on demand
    pub async fn write_record(&self, path: &Path, record: &ResourceRecord) -> io::Result<()> {
        let bytes = record
            .encode()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, bytes).await
    }

    /// Recursively collect every resource file, partitioned by wave.
    ///
    /// Files are returned in path order. Hidden files and files without a
    /// `.json` extension are ignored.
    pub fn scan(&self) -> Result<SnapshotFiles, walkdir::Error> {
        let mut files = SnapshotFiles::default();

        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() || !is_record_file(entry.path()) {
                continue;
            }
            let path = entry.into_path();
            if self.is_namespace_file(&path) {
                files.namespaces.push(path);
            } else {
                files.others.push(path);
            }
        }

        Ok(files)
    }
}

fn is_record_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'));
    !hidden && path.extension().and_then(|e| e.to_str()) == Some(RECORD_EXTENSION)
}

/// Whether `segment` can be used as a single path component in a snapshot
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}
