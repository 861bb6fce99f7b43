use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

type TaskFn<E> = Box<dyn FnOnce(CancellationToken) -> BoxFuture<'static, Result<(), E>> + Send>;

/// A deferred, cancellable unit of work.
///
/// The body receives the run's cancellation token and is expected to honor
/// it; the pool never interrupts a task that has already started.
pub struct Task<E> {
    label: String,
    run: TaskFn<E>,
}

impl<E: 'static> Task<E> {
    /// Wrap an async closure as a task
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
    {
        Self {
            label: String::from("task"),
            // Building the future happens inside it, so a panicking closure is
            // caught by the worker like any other task panic.
            run: Box::new(move |cancel| Box::pin(async move { f(cancel).await })),
        }
    }

    /// Attach a human readable label used in worker logs
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn execute(self, cancel: CancellationToken) -> BoxFuture<'static, Result<(), E>> {
        (self.run)(cancel)
    }
}

impl<E> fmt::Debug for Task<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("label", &self.label).finish()
    }
}
