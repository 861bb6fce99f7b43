/// Outcome of a single [`Pool::run`](super::Pool::run).
///
/// Every admitted task lands in exactly one bucket:
/// `succeeded + errors.len() + panicked + dropped == admitted`.
#[derive(Debug)]
pub struct RunReport<E> {
    /// Tasks accepted by `add_task` before the run started
    pub admitted: usize,
    /// Tasks that returned `Ok(())`
    pub succeeded: usize,
    /// Aggregated task errors, in completion order
    pub errors: Vec<E>,
    /// Tasks whose body panicked
    pub panicked: usize,
    /// Tasks still queued when every worker had exited (cancelled runs only)
    pub dropped: usize,
}

impl<E> RunReport<E> {
    /// Number of tasks that reached a worker
    pub fn attempted(&self) -> usize {
        self.succeeded + self.errors.len() + self.panicked
    }

    /// Sum of all outcome buckets; equals `admitted` for any finished run
    pub fn accounted(&self) -> usize {
        self.attempted() + self.dropped
    }

    /// True when every admitted task ran and succeeded
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.panicked == 0 && self.dropped == 0
    }
}

impl<E> Default for RunReport<E> {
    fn default() -> Self {
        Self {
            admitted: 0,
            succeeded: 0,
            errors: Vec::new(),
            panicked: 0,
            dropped: 0,
        }
    }
}
