// Failure taxonomy for effects
//
// Domain failures are whatever the caller put on the failure channel. Internal
// failures are synthesized at an await boundary or inside a lifting adapter
// that caught a panic.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// The failure channel of a run effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError<E> {
    /// Caller-supplied payload, untouched except by `map_failure`.
    #[error("{0}")]
    Domain(E),

    /// Failure synthesized by the execution machinery.
    #[error(transparent)]
    Internal(#[from] InternalFailure),
}

impl<E> EffectError<E> {
    /// The domain payload, if this is a domain failure.
    pub fn domain(self) -> Option<E> {
        match self {
            EffectError::Domain(error) => Some(error),
            EffectError::Internal(_) => None,
        }
    }

    /// Borrow the internal failure, if any.
    pub fn internal(&self) -> Option<&InternalFailure> {
        match self {
            EffectError::Domain(_) => None,
            EffectError::Internal(failure) => Some(failure),
        }
    }

    /// Returns `true` for internal failures.
    pub fn is_internal(&self) -> bool {
        matches!(self, EffectError::Internal(_))
    }

    /// Transform the domain payload, leaving internal failures alone.
    pub fn map_domain<F>(self, f: impl FnOnce(E) -> F) -> EffectError<F> {
        match self {
            EffectError::Domain(error) => EffectError::Domain(f(error)),
            EffectError::Internal(failure) => EffectError::Internal(failure),
        }
    }
}

/// A failure raised by the machinery rather than by user code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("internal failure during {stage}: {cause}")]
pub struct InternalFailure {
    /// Where the failure was captured.
    pub stage: Stage,
    /// What went wrong.
    pub cause: Cause,
}

impl InternalFailure {
    /// Build an internal failure.
    pub fn new(stage: Stage, cause: Cause) -> Self {
        Self { stage, cause }
    }

    /// Returns `true` when the cause is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self.cause, Cause::Timeout(_))
    }
}

/// The point at which an internal failure was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The await boundary of a run.
    Run,
    /// Nested execution inside `bind`.
    Bind,
    /// A link of a fail-fast sequence.
    Sequence,
    /// A branch of an accumulating composition.
    Accumulate,
    /// `lift_func`.
    LiftFunc,
    /// `lift_result`.
    LiftResult,
    /// A step function built with `from_throwing`.
    FromThrowing,
    /// Normalizing a step function's return shape.
    Normalize,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Run => "run",
            Stage::Bind => "bind",
            Stage::Sequence => "sequence",
            Stage::Accumulate => "accumulate",
            Stage::LiftFunc => "lift_func",
            Stage::LiftResult => "lift_result",
            Stage::FromThrowing => "from_throwing",
            Stage::Normalize => "normalize",
        };
        f.write_str(name)
    }
}

/// Why an internal failure happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Cause {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unit finished without producing a result")]
    InvalidResult,

    #[error("panicked: {0}")]
    Panicked(String),

    /// Internal failures of accumulated branches, by input index.
    #[error("{} branch(es) failed internally", .0.len())]
    Branches(Vec<(usize, InternalFailure)>),
}

/// Result type for effect runs converted to the standard shape.
pub type Result<A, E> = std::result::Result<A, EffectError<E>>;
