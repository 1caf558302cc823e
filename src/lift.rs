//! Constructors that bring plain values and functions into [`Effect`].
//!
//! `lift_func` and `lift_result` defer their function until the effect runs
//! and are always success-shaped. The function runs on tokio's blocking pool,
//! so the run timeout bounds the wait for it and several of them in one
//! `traverse` run side by side. The remaining adapters decide their outcome
//! while the effect is built, so their tag matches what they will produce and
//! fail-fast sequencing can stop on them.

use std::panic::{self, AssertUnwindSafe};

use crate::context::Context;
use crate::effect::{Effect, Settled, Tag};
use crate::env::Env;
use crate::error::{Cause, EffectError, InternalFailure, Stage};
use crate::handle::{panic_message, AsyncHandle};
use crate::outcome::Outcome;

/// Defer `f` until the effect runs. A panic in `f` becomes an internal failure.
pub fn lift_func<A, E, F>(f: F) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: FnOnce() -> A + Send + 'static,
{
    deferred(move || Ok(f()), Stage::LiftFunc)
}

/// Defer a fallible `f` until the effect runs.
pub fn lift_result<A, E, F>(f: F) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: FnOnce() -> Result<A, E> + Send + 'static,
{
    deferred(f, Stage::LiftResult)
}

fn deferred<A, E, F>(f: F, stage: Stage) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: FnOnce() -> Result<A, E> + Send + 'static,
{
    Effect::from_parts(
        Tag::Success,
        Context::default(),
        Box::new(move |_: Env| {
            AsyncHandle::spawn_blocking(move || match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(result) => Outcome::from(result).map_failure(EffectError::Domain),
                Err(payload) => Outcome::Failure(EffectError::Internal(InternalFailure::new(
                    stage,
                    Cause::Panicked(panic_message(payload)),
                ))),
            })
        }),
    )
}

/// Success-shaped when `value` is present, otherwise fails with `on_absent()`.
pub fn lift_optional<A, E>(value: Option<A>, on_absent: impl FnOnce() -> E) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    match value {
        Some(value) => Effect::success(value),
        None => Effect::failure(on_absent()),
    }
}

/// Check `predicate` now and succeed with `value` or fail with `on_false(value)`.
///
/// ```
/// use aura_effect::{lift_predicate, Tag};
///
/// let even = lift_predicate(3, |n| n % 2 == 0, |n| format!("{n} must be even"));
/// assert_eq!(even.tag(), Tag::Failure);
/// ```
pub fn lift_predicate<A, E>(
    value: A,
    predicate: impl FnOnce(&A) -> bool,
    on_false: impl FnOnce(A) -> E,
) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    if predicate(&value) {
        Effect::success(value)
    } else {
        Effect::failure(on_false(value))
    }
}

/// Turn a function that may panic into a step function.
///
/// The function is called as soon as the step is applied. A panic becomes a
/// failure-shaped effect carrying an internal failure.
pub fn from_throwing<I, A, E, F>(mut f: F) -> impl FnMut(I) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: FnMut(I) -> A,
{
    move |input| match panic::catch_unwind(AssertUnwindSafe(|| f(input))) {
        Ok(value) => Effect::success(value),
        Err(payload) => Effect::internal(InternalFailure::new(
            Stage::FromThrowing,
            Cause::Panicked(panic_message(payload)),
        )),
    }
}

impl<A, E> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    /// An effect tagged after a standard `Result`.
    pub fn from_result(result: Result<A, E>) -> Self {
        match result {
            Ok(value) => Self::success(value),
            Err(error) => Self::failure(error),
        }
    }

    /// An effect tagged after an [`Outcome`].
    pub fn from_outcome(outcome: Outcome<A, E>) -> Self {
        Self::from_result(outcome.into_result())
    }
}

/// The shapes a step function may return.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Returned<A, E> {
    /// An already two-channel outcome.
    Outcome(Outcome<A, E>),
    /// A std result; `Err` is a domain failure.
    Result(Result<A, E>),
    /// A bare success value.
    Raw(A),
    /// No value at all.
    Absent,
}

impl<A, E> Returned<A, E> {
    /// Wrap a bare success value.
    pub fn raw(value: A) -> Self {
        Returned::Raw(value)
    }
}

impl<A, E> From<Outcome<A, E>> for Returned<A, E> {
    fn from(outcome: Outcome<A, E>) -> Self {
        Returned::Outcome(outcome)
    }
}

impl<A, E> From<Result<A, E>> for Returned<A, E> {
    fn from(result: Result<A, E>) -> Self {
        Returned::Result(result)
    }
}

impl<A, E> From<Option<A>> for Returned<A, E> {
    fn from(value: Option<A>) -> Self {
        value.map_or(Returned::Absent, Returned::Raw)
    }
}

/// Bring any accepted return shape into a settled outcome.
pub fn normalize<A, E>(returned: Returned<A, E>) -> Settled<A, E> {
    match returned {
        Returned::Outcome(outcome) => outcome.map_failure(EffectError::Domain),
        Returned::Result(Ok(value)) | Returned::Raw(value) => Outcome::Success(value),
        Returned::Result(Err(error)) => Outcome::Failure(EffectError::Domain(error)),
        Returned::Absent => Outcome::Failure(EffectError::Internal(InternalFailure::new(
            Stage::Normalize,
            Cause::InvalidResult,
        ))),
    }
}

/// Adapt a function returning any [`Returned`] shape into a step function.
///
/// The function is called when the step is applied, so the effect's tag
/// reflects what it returned.
pub fn kleisli<I, A, E, R, F>(mut f: F) -> impl FnMut(I) -> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
    R: Into<Returned<A, E>>,
    F: FnMut(I) -> R,
{
    move |input| Effect::settled(normalize(f(input).into()))
}
