//! Temporary snapshot directories

use std::path::{Path, PathBuf};

use fleetsnap::ResourceRecord;
use serde_json::Value;
use tempfile::TempDir;

/// A snapshot root that is removed when dropped
pub struct TestSnapshot {
    /// TempDir handle (keeps directory alive until dropped)
    _dir: TempDir,
    /// Path to the snapshot root
    pub path: PathBuf,
}

impl TestSnapshot {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("snapshot");
        std::fs::create_dir_all(&path).expect("Failed to create snapshot root");
        Self { _dir: dir, path }
    }

    /// Write a `{kind, resource}` record at `relative`
    pub fn write(&self, relative: &str, kind: &str, resource: Value) -> &Self {
        let bytes = ResourceRecord::new(kind, resource)
            .encode()
            .expect("Failed to encode record");
        self.write_raw(relative, &bytes)
    }

    /// Write arbitrary bytes at `relative`
    pub fn write_raw(&self, relative: &str, contents: &[u8]) -> &Self {
        let path = self.path.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(&path, contents).expect("Failed to write file");
        self
    }

    /// Decode the record at `relative`
    pub fn read(&self, relative: &str) -> ResourceRecord {
        read_record(&self.path.join(relative))
    }
}

pub fn read_record(path: &Path) -> ResourceRecord {
    let bytes = std::fs::read(path).expect("Failed to read record");
    ResourceRecord::decode(&bytes).expect("Failed to decode record")
}
