//! # Deferred child launch.
//!
//! A child spawned from inside a body is registered immediately but its runner
//! is handed to Tokio only **after the parent's current poll returns**. Even on
//! a multi-thread runtime, the parent's code up to its next suspension point
//! therefore never interleaves with its own children.
//!
//! ```text
//! Deferring::poll ─► polling = true
//!                    inner.poll(cx)        ctx.spawn(..) ─► queue.push(launch)
//!                    flush: polling = false, run queued launches (tokio::spawn)
//! ```
//!
//! Spawns issued while the body is not being polled (e.g. from a context clone
//! moved into another task) launch immediately.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;

type Launch = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct LaunchState {
    polling: bool,
    queue: Vec<Launch>,
}

/// Per-task launch queue shared by the body wrapper and the task's contexts.
#[derive(Clone, Default)]
pub(crate) struct Launcher {
    state: Arc<Mutex<LaunchState>>,
}

impl Launcher {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Runs `launch` now, or after the current poll of the owning body.
    pub(crate) fn submit(&self, launch: impl FnOnce() + Send + 'static) {
        {
            let mut st = self.state.lock();
            if st.polling {
                st.queue.push(Box::new(launch));
                return;
            }
        }
        launch();
    }

    /// Wraps a body so that spawns made during a poll are deferred to its end.
    ///
    /// The wrapper also catches panics raised by the body, so queued launches
    /// are never stranded.
    pub(crate) fn wrap<F: Future>(&self, fut: F) -> Deferring<F> {
        Deferring {
            inner: Box::pin(fut),
            launcher: self.clone(),
        }
    }

    fn enter(&self) {
        self.state.lock().polling = true;
    }

    fn flush(&self) {
        loop {
            let batch = {
                let mut st = self.state.lock();
                if st.queue.is_empty() {
                    st.polling = false;
                    return;
                }
                std::mem::take(&mut st.queue)
            };
            for launch in batch {
                launch();
            }
        }
    }
}

/// Body future wrapped by [`Launcher::wrap`].
pub(crate) struct Deferring<F> {
    inner: Pin<Box<F>>,
    launcher: Launcher,
}

impl<F: Future> Future for Deferring<F> {
    type Output = std::thread::Result<F::Output>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.launcher.enter();
        let inner = self.inner.as_mut();
        let res = std::panic::catch_unwind(AssertUnwindSafe(|| inner.poll(cx)));
        self.launcher.flush();
        match res {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(out)) => Poll::Ready(Ok(out)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    }
}
