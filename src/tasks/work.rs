use std::future::Future;

use futures::future::BoxFuture;

use crate::core::TaskContext;
use crate::error::TaskError;

/// Type-erased task body: a closure that creates a fresh future from its context.
pub type BoxWork<T> =
    Box<dyn FnOnce(TaskContext) -> BoxFuture<'static, Result<T, TaskError>> + Send + 'static>;

/// Erases a concrete body so heterogeneous closures can share one collection.
pub(crate) fn boxed<T, F, Fut>(work: F) -> BoxWork<T>
where
    F: FnOnce(TaskContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    Box::new(move |ctx| Box::pin(work(ctx)))
}
