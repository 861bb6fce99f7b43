use thiserror::Error;

/// Admission and lifecycle failures of a [`Pool`](super::Pool).
///
/// Task failures never show up here; they are collected into the
/// [`RunReport`](super::RunReport) returned by `run`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Pool is closed")]
    Closed,
    #[error("Task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },
    #[error("Pool has already been run")]
    AlreadyRun,
}
