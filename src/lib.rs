//! Deferred two-channel effects for Aura
//!
//! An [`Effect`] is a description of fallible asynchronous work that produces
//! either a success value or a failure. Nothing runs until one of the `run*`
//! methods is called with a [`Config`]. Effects carry a tracing [`Context`]
//! through every composition and can report start/stop telemetry for each run.
//!
//! Two disciplines compose lists of effects: [`traverse`]/[`sequence`] stop at
//! the first failure-shaped step, while [`traverse_accumulate`],
//! [`sequence_accumulate`] and [`validate`] run every branch and merge all
//! failures through an [`Aggregate`].

pub mod accumulate;
pub mod context;
pub mod effect;
pub mod env;
pub mod error;
pub mod handle;
pub mod lift;
pub mod outcome;
pub mod run;
pub mod sequence;
pub mod summary;
pub mod supervisor;
pub mod telemetry;

// Re-export main APIs
pub use accumulate::{
    sequence_accumulate, sequence_accumulate_with, traverse_accumulate,
    traverse_accumulate_with, validate, validate_with, Aggregate, Aggregation, Collect,
};
pub use context::{Context, TraceId};
pub use effect::{Effect, Settled, Tag, Thunk};
pub use env::Env;
pub use error::{Cause, EffectError, InternalFailure, Result, Stage};
pub use handle::{AsyncHandle, Interrupt};
pub use lift::{
    from_throwing, kleisli, lift_func, lift_optional, lift_predicate, lift_result, normalize,
    Returned,
};
pub use outcome::Outcome;
pub use run::{Config, RunOptions, DEFAULT_TIMEOUT};
pub use sequence::{sequence, traverse};
pub use summary::{summarize, SummaryLimits};
pub use supervisor::{Supervisor, TaskSupervisor};
pub use telemetry::{
    Fanout, MetricsTelemetry, RecordingTelemetry, StartEvent, Status, StopEvent, Telemetry,
    TelemetryEvent, TracingTelemetry,
};
