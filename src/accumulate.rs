//! All-branches composition with pluggable failure aggregation.
//!
//! Unlike [`traverse`](crate::sequence::traverse), the accumulating engine
//! invokes the step function on every input and runs every resulting effect,
//! each as its own spawned unit. Success values and failures are reassembled
//! in input order regardless of which unit finished first. Domain failures are
//! merged through an [`Aggregate`]; the default, [`Collect`], gathers them into
//! a `Vec`.
//!
//! Internal failures are never folded into the aggregate. If any branch fails
//! internally the combined effect fails with
//! [`Cause::Branches`], listing every internally failed branch by index.

use futures::future::join_all;
use tracing::{debug, trace};

use crate::context::Context;
use crate::effect::{Effect, Settled, Tag, Thunk};
use crate::env::Env;
use crate::error::{Cause, EffectError, InternalFailure, Stage};
use crate::handle::{AsyncHandle, Interrupt};
use crate::outcome::Outcome;

/// How several domain failures merge into one.
pub trait Aggregate<E> {
    /// The merged failure type.
    type Output;

    /// Lift a single failure into the merged type.
    fn wrap(&self, error: E) -> Self::Output;

    /// Append an already wrapped failure to the accumulator.
    fn combine(&self, acc: Self::Output, wrapped: Self::Output) -> Self::Output;
}

/// Collects failures into a `Vec`, in input order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Collect;

impl<E> Aggregate<E> for Collect {
    type Output = Vec<E>;

    fn wrap(&self, error: E) -> Vec<E> {
        vec![error]
    }

    fn combine(&self, mut acc: Vec<E>, wrapped: Vec<E>) -> Vec<E> {
        acc.extend(wrapped);
        acc
    }
}

/// An [`Aggregate`] built from a pair of closures.
///
/// ```
/// use aura_effect::Aggregation;
///
/// // Join messages into one line.
/// let joined = Aggregation::new(
///     |error: String| error,
///     |acc: String, next: String| format!("{acc}; {next}"),
/// );
/// # let _ = joined;
/// ```
#[derive(Clone, Copy)]
pub struct Aggregation<W, C> {
    wrap: W,
    combine: C,
}

impl<W, C> Aggregation<W, C> {
    pub fn new(wrap: W, combine: C) -> Self {
        Self { wrap, combine }
    }
}

impl<W, C> std::fmt::Debug for Aggregation<W, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregation").finish_non_exhaustive()
    }
}

impl<E, T, W, C> Aggregate<E> for Aggregation<W, C>
where
    W: Fn(E) -> T,
    C: Fn(T, T) -> T,
{
    type Output = T;

    fn wrap(&self, error: E) -> T {
        (self.wrap)(error)
    }

    fn combine(&self, acc: T, wrapped: T) -> T {
        (self.combine)(acc, wrapped)
    }
}

/// Run `step` on every input, collecting every failure.
pub fn traverse_accumulate<I, A, E, F>(
    inputs: impl IntoIterator<Item = I>,
    step: F,
) -> Effect<Vec<A>, Vec<E>>
where
    A: Send + 'static,
    E: Send + 'static,
    F: FnMut(I) -> Effect<A, E>,
{
    traverse_accumulate_with(inputs, step, Collect)
}

/// Run `step` on every input, merging failures with `aggregate`.
pub fn traverse_accumulate_with<I, A, E, F, G>(
    inputs: impl IntoIterator<Item = I>,
    step: F,
    aggregate: G,
) -> Effect<Vec<A>, G::Output>
where
    A: Send + 'static,
    E: Send + 'static,
    F: FnMut(I) -> Effect<A, E>,
    G: Aggregate<E> + Send + 'static,
    G::Output: Send + 'static,
{
    accumulate(inputs.into_iter().map(step), aggregate, "accumulate")
}

/// Run every effect, collecting every failure.
pub fn sequence_accumulate<A, E>(
    effects: impl IntoIterator<Item = Effect<A, E>>,
) -> Effect<Vec<A>, Vec<E>>
where
    A: Send + 'static,
    E: Send + 'static,
{
    traverse_accumulate(effects, |effect| effect)
}

/// Run every effect, merging failures with `aggregate`.
pub fn sequence_accumulate_with<A, E, G>(
    effects: impl IntoIterator<Item = Effect<A, E>>,
    aggregate: G,
) -> Effect<Vec<A>, G::Output>
where
    A: Send + 'static,
    E: Send + 'static,
    G: Aggregate<E> + Send + 'static,
    G::Output: Send + 'static,
{
    traverse_accumulate_with(effects, |effect| effect, aggregate)
}

/// Check `value` against every validator and keep it if all of them pass.
///
/// Validators are called in order when the effect is built. Their success
/// values are discarded.
pub fn validate<A, B, E, V>(value: A, validators: impl IntoIterator<Item = V>) -> Effect<A, Vec<E>>
where
    A: Send + 'static,
    B: Send + 'static,
    E: Send + 'static,
    V: FnOnce(&A) -> Effect<B, E>,
{
    validate_with(value, validators, Collect)
}

/// [`validate`] with a custom aggregation.
pub fn validate_with<A, B, E, V, G>(
    value: A,
    validators: impl IntoIterator<Item = V>,
    aggregate: G,
) -> Effect<A, G::Output>
where
    A: Send + 'static,
    B: Send + 'static,
    E: Send + 'static,
    V: FnOnce(&A) -> Effect<B, E>,
    G: Aggregate<E> + Send + 'static,
    G::Output: Send + 'static,
{
    let checks = validators
        .into_iter()
        .map(|validator| validator(&value))
        .collect::<Vec<_>>();
    accumulate(checks, aggregate, "validate").map(move |_| value)
}

fn accumulate<A, E, G>(
    effects: impl IntoIterator<Item = Effect<A, E>>,
    aggregate: G,
    label: &str,
) -> Effect<Vec<A>, G::Output>
where
    A: Send + 'static,
    E: Send + 'static,
    G: Aggregate<E> + Send + 'static,
    G::Output: Send + 'static,
{
    let mut tag = Tag::Success;
    let mut root = Context::default();
    let mut thunks: Vec<Thunk<A, E>> = Vec::new();

    for (index, effect) in effects.into_iter().enumerate() {
        let (child_tag, child_context, thunk) = effect.into_parts();
        if child_tag == Tag::Failure {
            tag = Tag::Failure;
        }
        root = root.merge(&child_context.derive(&format!("[{index}]")));
        thunks.push(thunk);
    }

    trace!(branches = thunks.len(), label, "accumulate: built");
    Effect::from_parts(
        tag,
        root.derive(label),
        Box::new(move |env: Env| {
            let units = thunks
                .into_iter()
                .map(|thunk| {
                    let env = env.clone();
                    AsyncHandle::spawn_try(async move { thunk(env).join().await })
                })
                .collect::<Vec<_>>();
            AsyncHandle::from_future(async move {
                let settled = join_all(units.into_iter().map(AsyncHandle::join)).await;
                Ok(gather(settled, &aggregate))
            })
        }),
    )
}

/// Fold branch results, in input order, into one outcome.
fn gather<A, E, G>(
    branches: Vec<Result<Settled<A, E>, Interrupt>>,
    aggregate: &G,
) -> Settled<Vec<A>, G::Output>
where
    G: Aggregate<E>,
{
    let mut values = Vec::with_capacity(branches.len());
    let mut failures: Option<G::Output> = None;
    let mut internal = Vec::new();

    for (index, branch) in branches.into_iter().enumerate() {
        match branch {
            Ok(Outcome::Success(value)) => values.push(value),
            Ok(Outcome::Failure(EffectError::Domain(error))) => {
                let wrapped = aggregate.wrap(error);
                failures = Some(match failures {
                    Some(acc) => aggregate.combine(acc, wrapped),
                    None => wrapped,
                });
            }
            Ok(Outcome::Failure(EffectError::Internal(failure))) => {
                internal.push((index, failure));
            }
            Err(interrupt) => {
                internal.push((index, InternalFailure::new(Stage::Accumulate, interrupt.into())));
            }
        }
    }

    if !internal.is_empty() {
        debug!(failed = internal.len(), "accumulate: branches failed internally");
        let failure = InternalFailure::new(Stage::Accumulate, Cause::Branches(internal));
        return Outcome::Failure(EffectError::Internal(failure));
    }
    match failures {
        Some(aggregated) => Outcome::Failure(EffectError::Domain(aggregated)),
        None => Outcome::Success(values),
    }
}
