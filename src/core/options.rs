use std::path::PathBuf;

use crate::pool::DEFAULT_MAX_CONCURRENCY;

/// Per-run settings shared by the backup collector and restore applier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Worker count for each pool run
    pub max_concurrency: usize,
    /// Log intended writes instead of performing them
    pub dry_run: bool,
    /// Snapshot root directory
    pub root: PathBuf,
}

impl RunOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            dry_run: false,
            root: root.into(),
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
