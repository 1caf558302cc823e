// Supervising executors for top-level units
//
// A supervisor owns the lifecycle of the unit a run spawns. Units spawned
// further down, inside a single thunk, are not routed through it.

use futures::future::{BoxFuture, FutureExt};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{trace, warn};

use crate::handle::AsyncHandle;

/// Spawns the top-level unit of a run.
pub trait Supervisor: Send + Sync {
    /// Take ownership of `unit` and start it.
    fn spawn(&self, unit: BoxFuture<'static, ()>) -> AsyncHandle<()>;
}

#[derive(Debug, Default)]
struct Counters {
    spawned: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// Supervisor backed by a tokio runtime handle that counts what it runs.
#[derive(Debug, Clone)]
pub struct TaskSupervisor {
    runtime: tokio::runtime::Handle,
    counters: Arc<Counters>,
}

impl TaskSupervisor {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self {
            runtime,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Supervise on the runtime the caller is running in.
    pub fn current() -> Result<Self, tokio::runtime::TryCurrentError> {
        tokio::runtime::Handle::try_current().map(Self::new)
    }

    pub fn spawned_count(&self) -> u64 {
        self.counters.spawned.load(Ordering::Relaxed)
    }

    pub fn completed_count(&self) -> u64 {
        self.counters.completed.load(Ordering::Relaxed)
    }

    pub fn panicked_count(&self) -> u64 {
        self.counters.panicked.load(Ordering::Relaxed)
    }
}

impl Supervisor for TaskSupervisor {
    fn spawn(&self, unit: BoxFuture<'static, ()>) -> AsyncHandle<()> {
        self.counters.spawned.fetch_add(1, Ordering::Relaxed);
        trace!("supervisor: spawn");
        let counters = Arc::clone(&self.counters);
        AsyncHandle::spawn_on(&self.runtime, async move {
            match AssertUnwindSafe(unit).catch_unwind().await {
                Ok(()) => {
                    counters.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    counters.panicked.fetch_add(1, Ordering::Relaxed);
                    warn!("supervisor: unit panicked");
                    std::panic::resume_unwind(payload);
                }
            }
        })
    }
}
