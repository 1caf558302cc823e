// Telemetry sinks for effect runs
//
// A run with telemetry enabled reports exactly one start and one stop event
// to the configured sink. `Fanout` stacks several sinks, so logging through
// `tracing`, recording events and counting runs can be combined.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::context::TraceId;

/// Final status of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The run produced a success.
    Ok,
    /// Domain or internal failure.
    Error,
}

/// Emitted when a run starts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StartEvent {
    /// Wall-clock start time.
    pub timestamp: OffsetDateTime,
    /// Effective timeout of the run.
    pub timeout: Duration,
    /// Span the run reports under.
    pub span_name: String,
    /// Trace of the run.
    pub trace_id: TraceId,
}

/// Emitted when a run finishes, whatever the outcome.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StopEvent {
    /// Monotonic duration of the run.
    pub duration: Duration,
    /// Success or failure.
    pub status: Status,
    /// Trace of the run.
    pub trace_id: TraceId,
    /// Set when the run promoted its context.
    pub parent_trace_id: Option<TraceId>,
    /// Span the run reported under.
    pub span_name: String,
    /// Bounded rendering of the outcome.
    pub summary: String,
}

/// Receives run telemetry.
pub trait Telemetry: Send + Sync {
    /// Called once before the thunk is invoked.
    fn start(&self, event: &StartEvent);
    /// Called once with the final outcome.
    fn stop(&self, event: &StopEvent);
}

/// Reports runs as `tracing` events.
#[derive(Clone, Debug, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn start(&self, event: &StartEvent) {
        info!(
            span_name = %event.span_name,
            trace_id = %event.trace_id,
            timeout = ?event.timeout,
            "effect: start"
        );
    }

    fn stop(&self, event: &StopEvent) {
        let parent = event.parent_trace_id.map(|id| id.to_string());
        match event.status {
            Status::Ok => info!(
                span_name = %event.span_name,
                trace_id = %event.trace_id,
                parent_trace_id = ?parent,
                duration = ?event.duration,
                result = %event.summary,
                "effect: ok"
            ),
            Status::Error => warn!(
                span_name = %event.span_name,
                trace_id = %event.trace_id,
                parent_trace_id = ?parent,
                duration = ?event.duration,
                result = %event.summary,
                "effect: error"
            ),
        }
    }
}

/// One recorded telemetry event.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TelemetryEvent {
    Start(StartEvent),
    Stop(StopEvent),
}

/// Captures every event for later verification.
#[derive(Clone, Debug, Default)]
pub struct RecordingTelemetry {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded stop events, in order.
    pub fn stops(&self) -> Vec<StopEvent> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                TelemetryEvent::Stop(stop) => Some(stop),
                TelemetryEvent::Start(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, event: TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Telemetry for RecordingTelemetry {
    fn start(&self, event: &StartEvent) {
        self.record(TelemetryEvent::Start(event.clone()));
    }

    fn stop(&self, event: &StopEvent) {
        self.record(TelemetryEvent::Stop(event.clone()));
    }
}

/// Counts runs by status.
#[derive(Debug, Default)]
pub struct MetricsTelemetry {
    started: AtomicU64,
    ok: AtomicU64,
    error: AtomicU64,
}

impl MetricsTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started_count(&self) -> u64 {
        self.started.load(Ordering::Relaxed)
    }

    pub fn ok_count(&self) -> u64 {
        self.ok.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error.load(Ordering::Relaxed)
    }
}

impl Telemetry for MetricsTelemetry {
    fn start(&self, _event: &StartEvent) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn stop(&self, event: &StopEvent) {
        match event.status {
            Status::Ok => self.ok.fetch_add(1, Ordering::Relaxed),
            Status::Error => self.error.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Forwards every event to each inner sink in turn.
#[derive(Clone, Default)]
pub struct Fanout {
    sinks: Vec<Arc<dyn Telemetry>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn Telemetry>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl std::fmt::Debug for Fanout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fanout")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl Telemetry for Fanout {
    fn start(&self, event: &StartEvent) {
        for sink in &self.sinks {
            sink.start(event);
        }
    }

    fn stop(&self, event: &StopEvent) {
        for sink in &self.sinks {
            sink.stop(event);
        }
    }
}
