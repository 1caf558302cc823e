// Execution engine
//
// Resolves the effective context and timeout, optionally reports telemetry,
// dispatches the thunk (directly or under a supervisor) and folds every way a
// unit can end into an `Outcome`. Declared failure kinds never escape as
// panics from here.

use futures::channel::oneshot;
use futures::future::FutureExt;
use std::any::Any;
use std::fmt::{self, Debug};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use tracing::{debug, debug_span, warn, Instrument};

use crate::effect::{Effect, Settled, Thunk};
use crate::env::Env;
use crate::error::{self, Cause, EffectError, InternalFailure, Stage};
use crate::handle::{panic_message, AsyncHandle, Interrupt};
use crate::outcome::Outcome;
use crate::summary::{summarize, SummaryLimits};
use crate::supervisor::Supervisor;
use crate::telemetry::{StartEvent, Status, StopEvent, Telemetry, TracingTelemetry};

/// Timeout applied when neither the effect nor the config sets one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Defaults injected at every run.
#[derive(Clone)]
pub struct Config {
    default_timeout: Duration,
    telemetry_enabled: bool,
    telemetry: Arc<dyn Telemetry>,
    summary: SummaryLimits,
}

impl Config {
    /// Same as [`Config::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Timeout for effects that do not carry their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Telemetry for effects that do not turn it on or off themselves.
    pub fn with_telemetry_enabled(mut self, enabled: bool) -> Self {
        self.telemetry_enabled = enabled;
        self
    }

    /// Where start/stop events go.
    pub fn with_telemetry(mut self, sink: Arc<dyn Telemetry>) -> Self {
        self.telemetry = sink;
        self
    }

    /// Limits of the outcome summary in stop events.
    pub fn with_summary_limits(mut self, limits: SummaryLimits) -> Self {
        self.summary = limits;
        self
    }

    /// Timeout used when the effect has none.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Whether telemetry is on unless the effect says otherwise.
    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry_enabled
    }

    /// Limits applied to stop-event summaries.
    pub fn summary_limits(&self) -> &SummaryLimits {
        &self.summary
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            telemetry_enabled: false,
            telemetry: Arc::new(TracingTelemetry),
            summary: SummaryLimits::default(),
        }
    }
}

impl Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("default_timeout", &self.default_timeout)
            .field("telemetry_enabled", &self.telemetry_enabled)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

/// Per-call overrides for a single run.
#[derive(Clone, Default)]
pub struct RunOptions {
    span_name: Option<String>,
    supervisor: Option<Arc<dyn Supervisor>>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run under a child span with this name.
    pub fn named(mut self, span_name: impl Into<String>) -> Self {
        self.span_name = Some(span_name.into());
        self
    }

    /// Spawn the top-level unit under `supervisor`.
    pub fn supervised_by(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }
}

impl Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("span_name", &self.span_name)
            .field("supervised", &self.supervisor.is_some())
            .finish()
    }
}

impl<A, E> Effect<A, E>
where
    A: Debug + Send + 'static,
    E: Debug + Send + 'static,
{
    /// Run with an empty environment and default options.
    pub async fn run(self, config: &Config) -> Settled<A, E> {
        self.run_with(Env::default(), config, RunOptions::default())
            .await
    }

    /// Run against `env` with default options.
    pub async fn run_in(self, env: Env, config: &Config) -> Settled<A, E> {
        self.run_with(env, config, RunOptions::default()).await
    }

    /// Run against `env` with per-call options.
    pub async fn run_with(self, env: Env, config: &Config, options: RunOptions) -> Settled<A, E> {
        let RunOptions {
            span_name,
            supervisor,
        } = options;
        let (_, context, thunk) = self.into_parts();
        let context = match span_name {
            Some(name) => context.promote(name),
            None => context,
        };
        let timeout = context.timeout().unwrap_or(config.default_timeout);
        let telemetry = context.telemetry().unwrap_or(config.telemetry_enabled);
        let span = debug_span!(
            "effect.run",
            span_name = %context.span_name(),
            trace_id = %context.trace_id()
        );

        if !telemetry {
            return dispatch(thunk, env, supervisor, timeout)
                .instrument(span)
                .await;
        }

        config.telemetry.start(&StartEvent {
            timestamp: OffsetDateTime::now_utc(),
            timeout,
            span_name: context.span_name().to_string(),
            trace_id: context.trace_id(),
        });
        let started = Instant::now();
        let settled = dispatch(thunk, env, supervisor, timeout)
            .instrument(span)
            .await;
        config.telemetry.stop(&StopEvent {
            duration: started.elapsed(),
            status: if settled.is_success() {
                Status::Ok
            } else {
                Status::Error
            },
            trace_id: context.trace_id(),
            parent_trace_id: context.parent_trace_id(),
            span_name: context.span_name().to_string(),
            summary: summarize(&settled, &config.summary),
        });
        settled
    }

    /// Run and convert to a standard `Result`.
    pub async fn to_result(self, config: &Config) -> error::Result<A, E> {
        self.run(config).await.into_result()
    }

    /// Run and return the success value, re-raising the failure payload as a
    /// panic otherwise.
    ///
    /// Domain failures are raised with the payload itself, so a caller using
    /// `catch_unwind` can downcast it back to `E`. Internal failures are raised
    /// as [`InternalFailure`].
    pub async fn run_or_panic(self, config: &Config) -> A
    where
        E: Any,
    {
        match self.run(config).await {
            Outcome::Success(value) => value,
            Outcome::Failure(EffectError::Domain(error)) => panic::panic_any(error),
            Outcome::Failure(EffectError::Internal(failure)) => panic::panic_any(failure),
        }
    }
}

async fn dispatch<A, E>(
    thunk: Thunk<A, E>,
    env: Env,
    supervisor: Option<Arc<dyn Supervisor>>,
    timeout: Duration,
) -> Settled<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    let handle = match supervisor {
        Some(supervisor) => supervised(thunk, env, supervisor.as_ref()),
        None => match panic::catch_unwind(AssertUnwindSafe(move || thunk(env))) {
            Ok(handle) => handle,
            Err(payload) => {
                return run_failure(Cause::Panicked(panic_message(payload)));
            }
        },
    };

    match handle.await_timeout(timeout).await {
        Ok(settled) => {
            debug!(ok = settled.is_success(), "effect: settled");
            settled
        }
        Err(interrupt) => run_failure(interrupt.into()),
    }
}

fn supervised<A, E>(
    thunk: Thunk<A, E>,
    env: Env,
    supervisor: &dyn Supervisor,
) -> AsyncHandle<Settled<A, E>>
where
    A: Send + 'static,
    E: Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    let unit = async move {
        let settled = thunk(env).join().await;
        // the receiver is gone only when the run already gave up
        let _ = sender.send(settled);
    }
    .boxed();
    let unit = supervisor.spawn(unit);

    AsyncHandle::from_future(async move {
        unit.join().await?;
        match receiver.await {
            Ok(result) => result,
            Err(_) => Err(Interrupt::Cancelled),
        }
    })
}

fn run_failure<A, E>(cause: Cause) -> Settled<A, E> {
    let failure = InternalFailure::new(Stage::Run, cause);
    warn!(error = %failure, "effect: run failed internally");
    Outcome::Failure(EffectError::Internal(failure))
}
