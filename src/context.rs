//! Immutable tracing metadata carried by every effect.
//!
//! A [`Context`] is never modified in place. Composition promotes it, which
//! yields a new context whose trace id is fresh and whose parent is the trace
//! it was promoted from. Unset timeout and telemetry fields defer to the
//! [`Config`](crate::Config) supplied at run time.

use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Span name given to contexts nobody named.
pub const DEFAULT_SPAN_NAME: &str = "effect";

/// Opaque trace identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TraceId(Uuid);

impl TraceId {
    /// Draw a new random trace id.
    pub fn new() -> Self {
        TraceId(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.as_hyphenated().fmt(f)
    }
}

/// Tracing and execution metadata of an effect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Context {
    trace_id: TraceId,
    parent_trace_id: Option<TraceId>,
    span_name: String,
    timeout: Option<Duration>,
    telemetry: Option<bool>,
}

impl Context {
    /// A root context with a fresh trace id.
    pub fn new(span_name: impl Into<String>) -> Self {
        Self {
            trace_id: TraceId::new(),
            parent_trace_id: None,
            span_name: span_name.into(),
            timeout: None,
            telemetry: None,
        }
    }

    /// Child context: fresh trace id, this trace as parent, new span name.
    pub fn promote(&self, span_name: impl Into<String>) -> Self {
        Self {
            trace_id: TraceId::new(),
            parent_trace_id: Some(self.trace_id),
            span_name: span_name.into(),
            timeout: self.timeout,
            telemetry: self.telemetry,
        }
    }

    /// Promote with the label `"{span_name}/{suffix}"`.
    pub fn derive(&self, suffix: &str) -> Self {
        self.promote(format!("{}/{}", self.span_name, suffix))
    }

    /// Fold `other` into this context.
    ///
    /// Identity (trace ids, span name) stays with `self`. The larger explicit
    /// timeout wins and telemetry is on when either side turned it on.
    pub fn merge(&self, other: &Context) -> Self {
        let timeout = match (self.timeout, other.timeout) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        let telemetry = match (self.telemetry, other.telemetry) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (a, b) => a.or(b),
        };
        Self {
            trace_id: self.trace_id,
            parent_trace_id: self.parent_trace_id,
            span_name: self.span_name.clone(),
            timeout,
            telemetry,
        }
    }

    /// Same context under another span name.
    pub fn with_span_name(mut self, span_name: impl Into<String>) -> Self {
        self.span_name = span_name.into();
        self
    }

    /// Same context with an explicit timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Same context with telemetry explicitly on or off.
    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.telemetry = Some(enabled);
        self
    }

    pub fn trace_id(&self) -> TraceId {
        self.trace_id
    }

    pub fn parent_trace_id(&self) -> Option<TraceId> {
        self.parent_trace_id
    }

    pub fn span_name(&self) -> &str {
        &self.span_name
    }

    /// Explicit timeout, if one was set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Explicit telemetry toggle, if one was set.
    pub fn telemetry(&self) -> Option<bool> {
        self.telemetry
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(DEFAULT_SPAN_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_links_parent_and_child() {
        let root = Context::new("root").with_timeout(Duration::from_secs(1));
        let child = root.promote("child");

        assert_ne!(child.trace_id(), root.trace_id());
        assert_eq!(child.parent_trace_id(), Some(root.trace_id()));
        assert_eq!(child.span_name(), "child");
        assert_eq!(child.timeout(), Some(Duration::from_secs(1)));
        // the source is untouched
        assert_eq!(root.parent_trace_id(), None);
        assert_eq!(root.span_name(), "root");
    }

    #[test]
    fn derive_appends_to_the_span_name() {
        let ctx = Context::new("load").derive("bind");
        assert_eq!(ctx.span_name(), "load/bind");
    }

    #[test]
    fn merge_keeps_identity_and_widens_settings() {
        let root = Context::new("root").with_timeout(Duration::from_millis(10));
        let child = Context::new("child")
            .with_timeout(Duration::from_millis(30))
            .with_telemetry(true);

        let merged = root.merge(&child);
        assert_eq!(merged.trace_id(), root.trace_id());
        assert_eq!(merged.span_name(), "root");
        assert_eq!(merged.timeout(), Some(Duration::from_millis(30)));
        assert_eq!(merged.telemetry(), Some(true));
    }

    #[test]
    fn merge_leaves_unset_fields_unset() {
        let merged = Context::default().merge(&Context::default());
        assert_eq!(merged.timeout(), None);
        assert_eq!(merged.telemetry(), None);
    }
}
