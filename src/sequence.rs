//! Fail-fast, ordered composition over a list.
//!
//! [`traverse`] calls the step function on each input in order and inspects
//! only the tag of the effect it returns. Success-shaped effects are linked
//! into one computation; the first failure-shaped effect is linked as the last
//! element and stops construction, so the combined effect is failure-shaped.
//! Inputs after it are never handed to the step function, and their effects
//! therefore never run. When run, every linked thunk is invoked inside its own
//! spawned unit, the prefix runs alongside the failing step, and the first
//! failure in input order is the result.
//!
//! A step that returns a success-shaped effect which later fails at run time
//! does not stop construction. The combined effect then fails with the first
//! failure in input order once run.

use futures::future::join_all;
use tracing::{debug, trace, warn};

use crate::context::Context;
use crate::effect::{Effect, Settled, Tag, Thunk};
use crate::env::Env;
use crate::error::{EffectError, InternalFailure, Stage};
use crate::handle::{AsyncHandle, Interrupt};
use crate::outcome::Outcome;

/// Apply `step` to each input and sequence the resulting effects.
pub fn traverse<I, A, E, F>(inputs: impl IntoIterator<Item = I>, mut step: F) -> Effect<Vec<A>, E>
where
    A: Send + 'static,
    E: Send + 'static,
    F: FnMut(I) -> Effect<A, E>,
{
    let mut context = Context::default();
    let mut thunks: Vec<Thunk<A, E>> = Vec::new();
    let mut tag = Tag::Success;

    for input in inputs {
        let (item_tag, item_context, item) = step(input).into_parts();
        context = context.merge(&item_context);
        thunks.push(item);
        if item_tag == Tag::Failure {
            debug!(
                index = thunks.len() - 1,
                span_name = %item_context.span_name(),
                "traverse: halted at failure-shaped step"
            );
            tag = Tag::Failure;
            break;
        }
    }

    trace!(linked = thunks.len(), "traverse: chain built");
    Effect::from_parts(tag, context.derive("traverse"), chained(thunks))
}

/// Sequence a list of effects, failing fast.
pub fn sequence<A, E>(effects: impl IntoIterator<Item = Effect<A, E>>) -> Effect<Vec<A>, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    traverse(effects, |effect| effect)
}

/// Run every linked thunk as its own unit and collect values in input order.
/// The first failure in input order wins.
fn chained<A, E>(thunks: Vec<Thunk<A, E>>) -> Thunk<Vec<A>, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    Box::new(move |env: Env| {
        let units = thunks
            .into_iter()
            .map(|thunk| {
                let env = env.clone();
                AsyncHandle::spawn_try(async move { thunk(env).join().await })
            })
            .collect::<Vec<_>>();
        AsyncHandle::from_future(async move {
            let joined = join_all(units.into_iter().map(AsyncHandle::join)).await;
            Ok(first_failure(joined))
        })
    })
}

fn first_failure<A, E>(joined: Vec<Result<Settled<A, E>, Interrupt>>) -> Settled<Vec<A>, E> {
    let mut values = Vec::with_capacity(joined.len());
    for (index, unit) in joined.into_iter().enumerate() {
        match unit {
            Ok(Outcome::Success(value)) => values.push(value),
            Ok(Outcome::Failure(error)) => return Outcome::Failure(error),
            Err(interrupt) => {
                let failure = InternalFailure::new(Stage::Sequence, interrupt.into());
                warn!(index, error = %failure, "traverse: unit interrupted");
                return Outcome::Failure(EffectError::Internal(failure));
            }
        }
    }
    Outcome::Success(values)
}
