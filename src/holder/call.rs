use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::HolderError;

enum CallState<R> {
    Queued(oneshot::Receiver<Result<R, HolderError>>),
    Closed,
}

/// Pending result of a [`Holder`](crate::Holder) operation.
///
/// The operation is already queued when this value is created. Dropping it
/// does not withdraw the operation, it only discards the result.
#[must_use = "the operation runs anyway; await the call to observe its result"]
pub struct HolderCall<R> {
    state: CallState<R>,
}

impl<R> HolderCall<R> {
    pub(crate) fn queued(rx: oneshot::Receiver<Result<R, HolderError>>) -> Self {
        Self {
            state: CallState::Queued(rx),
        }
    }

    pub(crate) fn closed() -> Self {
        Self {
            state: CallState::Closed,
        }
    }
}

impl<R> Future for HolderCall<R> {
    type Output = Result<R, HolderError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            CallState::Queued(rx) => Pin::new(rx)
                .poll(cx)
                .map(|res| res.unwrap_or(Err(HolderError::Closed))),
            CallState::Closed => Poll::Ready(Err(HolderError::Closed)),
        }
    }
}
