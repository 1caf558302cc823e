// Spawn/await primitive over the tokio runtime
//
// An `AsyncHandle` is the only thing a thunk hands back. It is either lazy
// (polled by whoever awaits it) or backed by a spawned task. Spawned tasks are
// aborted when their handle is dropped, so abandoning a handle after a timeout
// shuts the unit down.

use futures::future::{self, BoxFuture, FutureExt};
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};

use crate::error::Cause;

/// What an await boundary can observe besides a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Interrupt {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unit panicked: {0}")]
    Panicked(String),

    #[error("unit was cancelled before producing a result")]
    Cancelled,
}

impl From<JoinError> for Interrupt {
    fn from(error: JoinError) -> Self {
        if error.is_panic() {
            Interrupt::Panicked(panic_message(error.into_panic()))
        } else {
            Interrupt::Cancelled
        }
    }
}

impl From<Interrupt> for Cause {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Timeout(after) => Cause::Timeout(after),
            Interrupt::Panicked(message) => Cause::Panicked(message),
            Interrupt::Cancelled => Cause::InvalidResult,
        }
    }
}

/// Render a panic payload as text.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "opaque panic payload".to_string(),
        },
    }
}

/// Join handle that aborts its task when dropped.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Future for AbortOnDrop<T> {
    type Output = std::result::Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0).poll(cx)
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Handle to a unit of work that eventually yields a `T`.
pub struct AsyncHandle<T> {
    inner: BoxFuture<'static, Result<T, Interrupt>>,
}

impl<T: Send + 'static> AsyncHandle<T> {
    /// An already-resolved handle.
    pub fn ready(value: T) -> Self {
        Self::from_future(future::ready(Ok(value)))
    }

    /// A lazy handle driven by whoever awaits it.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Interrupt>> + Send + 'static,
    {
        Self {
            inner: future.boxed(),
        }
    }

    /// Spawn `future` as an independent tokio task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::spawn_try(future.map(Ok))
    }

    /// Spawn a future that may itself report an interrupt.
    pub fn spawn_try<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Interrupt>> + Send + 'static,
    {
        Self::attach(tokio::spawn(future))
    }

    /// Spawn `future` on an explicit runtime.
    pub fn spawn_on<F>(runtime: &tokio::runtime::Handle, future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::attach(runtime.spawn(future.map(Ok)))
    }

    /// Run a blocking closure on tokio's blocking pool.
    ///
    /// Awaiting the handle can time out, but a closure that has already
    /// started keeps its thread until it returns.
    pub fn spawn_blocking<F>(f: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        Self::attach(tokio::task::spawn_blocking(move || Ok(f())))
    }

    fn attach(task: JoinHandle<Result<T, Interrupt>>) -> Self {
        let task = AbortOnDrop(task);
        Self::from_future(async move {
            match task.await {
                Ok(result) => result,
                Err(error) => Err(Interrupt::from(error)),
            }
        })
    }

    /// Post-process the eventual value.
    pub fn map<U, F>(self, f: F) -> AsyncHandle<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        AsyncHandle {
            inner: self.inner.map(move |result| result.map(f)).boxed(),
        }
    }

    /// Wait for completion. Panics in lazy handles propagate to the caller.
    pub async fn join(self) -> Result<T, Interrupt> {
        self.inner.await
    }

    /// Wait at most `timeout`, capturing panics.
    ///
    /// On timeout the handle is dropped, which aborts any task it owns.
    pub async fn await_timeout(self, timeout: Duration) -> Result<T, Interrupt> {
        let guarded = AssertUnwindSafe(self.inner).catch_unwind();
        match tokio::time::timeout(timeout, guarded).await {
            Ok(Ok(result)) => result,
            Ok(Err(payload)) => Err(Interrupt::Panicked(panic_message(payload))),
            Err(_) => Err(Interrupt::Timeout(timeout)),
        }
    }
}

impl<T> fmt::Debug for AsyncHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncHandle").finish_non_exhaustive()
    }
}
