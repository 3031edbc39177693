use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, oneshot};

use crate::error::{HolderError, panic_message};
use crate::holder::HolderCall;

type Op<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Shared handle to state that is only reachable through serialized operations.
///
/// Cheap to clone; all clones address the same state.
///
/// ## Example
/// ```rust
/// use tasktree::Holder;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), tasktree::HolderError> {
///     let counter = Holder::named("counter", 0u64);
///     counter.mutate(|n| *n += 1).await?;
///     assert_eq!(counter.read(|n| *n).await?, 1);
///     Ok(())
/// }
/// ```
pub struct Holder<S> {
    name: Arc<str>,
    tx: mpsc::UnboundedSender<Op<S>>,
    completed: Arc<AtomicU64>,
}

impl<S> Holder<S>
where
    S: Send + 'static,
{
    /// Wraps `state` in a holder named `holder`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(state: S) -> Self {
        Self::named("holder", state)
    }

    /// Wraps `state` in a holder with the given name (used in diagnostics).
    ///
    /// Must be called inside a Tokio runtime.
    pub fn named(name: impl Into<Arc<str>>, state: S) -> Self {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(Arc::clone(&name), state, rx));
        Self {
            name,
            tx,
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Queues a read-only operation.
    pub fn read<R, F>(&self, f: F) -> HolderCall<R>
    where
        R: Send + 'static,
        F: FnOnce(&S) -> R + Send + 'static,
    {
        self.submit(move |s| Ok(f(s)))
    }

    /// Queues a read-only operation that may fail.
    ///
    /// An `Err(e)` reaches the caller as [`HolderError::Operation`].
    pub fn try_read<R, E, F>(&self, f: F) -> HolderCall<R>
    where
        R: Send + 'static,
        E: fmt::Display,
        F: FnOnce(&S) -> Result<R, E> + Send + 'static,
    {
        self.submit(move |s| f(s).map_err(operation_error))
    }

    /// Queues an operation that may modify or replace the state.
    pub fn mutate<R, F>(&self, f: F) -> HolderCall<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> R + Send + 'static,
    {
        self.submit(move |s| Ok(f(s)))
    }

    /// Queues a modifying operation that may fail.
    ///
    /// Changes made before returning `Err` are kept.
    pub fn try_mutate<R, E, F>(&self, f: F) -> HolderCall<R>
    where
        R: Send + 'static,
        E: fmt::Display,
        F: FnOnce(&mut S) -> Result<R, E> + Send + 'static,
    {
        self.submit(move |s| f(s).map_err(operation_error))
    }

    /// Queues a copy of the current state.
    pub fn snapshot(&self) -> HolderCall<S>
    where
        S: Clone,
    {
        self.read(S::clone)
    }

    /// Queues a replacement of the state; resolves to the previous value.
    pub fn replace(&self, value: S) -> HolderCall<S> {
        self.mutate(move |s| std::mem::replace(s, value))
    }

    /// Holder name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of operations executed so far (including failed ones).
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    fn submit<R, F>(&self, op: F) -> HolderCall<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut S) -> Result<R, HolderError> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let name = Arc::clone(&self.name);
        let completed = Arc::clone(&self.completed);

        let job: Op<S> = Box::new(move |state: &mut S| {
            let res = match std::panic::catch_unwind(AssertUnwindSafe(|| op(state))) {
                Ok(res) => res,
                Err(payload) => {
                    let info = panic_message(&*payload);
                    tracing::warn!(holder = %name, %info, "holder operation panicked");
                    Err(HolderError::Panicked { info })
                }
            };
            completed.fetch_add(1, Ordering::AcqRel);
            let _ = tx.send(res);
        });

        match self.tx.send(job) {
            Ok(()) => HolderCall::queued(rx),
            Err(_) => HolderCall::closed(),
        }
    }
}

fn operation_error(e: impl fmt::Display) -> HolderError {
    HolderError::Operation {
        error: e.to_string(),
    }
}

/// Owns the state and applies queued operations one at a time.
async fn drain<S>(name: Arc<str>, mut state: S, mut rx: mpsc::UnboundedReceiver<Op<S>>) {
    while let Some(op) = rx.recv().await {
        op(&mut state);
    }
    tracing::debug!(holder = %name, "holder released");
}

impl<S> Clone for Holder<S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            tx: self.tx.clone(),
            completed: Arc::clone(&self.completed),
        }
    }
}

impl<S> fmt::Debug for Holder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Holder")
            .field("name", &self.name)
            .field("completed", &self.completed.load(Ordering::Acquire))
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}
