//! The deferred, tagged, context-carrying computation.
//!
//! An [`Effect`] pairs a [`Context`] with a thunk `Env -> AsyncHandle<Outcome>`.
//! Building or combining effects never runs anything: the thunk is only
//! invoked by one of the `run*` methods, exactly once.
//!
//! Every effect also carries a [`Tag`] decided when it was built. The tag says
//! whether the effect is success-shaped or failure-shaped, independently of
//! what its thunk eventually produces. Fail-fast sequencing looks only at
//! tags, so a step that wants to stop a sequence early has to decide
//! synchronously (for instance with
//! [`lift_predicate`](crate::lift::lift_predicate)).
//!
//! # Examples
//!
//! ```
//! use aura_effect::{Config, Effect, Outcome};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let effect = Effect::<_, String>::pure(5)
//!     .map(|x| x * 2)
//!     .bind(|x| Effect::pure(x + 10));
//!
//! assert_eq!(effect.run(&Config::default()).await, Outcome::Success(20));
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::context::Context;
use crate::env::Env;
use crate::error::{EffectError, InternalFailure, Stage};
use crate::handle::AsyncHandle;
use crate::outcome::Outcome;

/// What a thunk eventually settles to.
pub type Settled<A, E> = Outcome<A, EffectError<E>>;

/// The deferred body of an effect.
pub type Thunk<A, E> = Box<dyn FnOnce(Env) -> AsyncHandle<Settled<A, E>> + Send + 'static>;

/// Shape an effect was given at construction time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Built to succeed; its outcome is still decided by the thunk.
    Success,
    /// Built from a known failure.
    Failure,
}

impl Tag {
    /// The opposite shape.
    pub fn flip(self) -> Self {
        match self {
            Tag::Success => Tag::Failure,
            Tag::Failure => Tag::Success,
        }
    }
}

/// A deferred computation producing `A` or failing with `E`.
pub struct Effect<A, E> {
    pub(crate) tag: Tag,
    pub(crate) context: Context,
    pub(crate) thunk: Thunk<A, E>,
}

impl<A, E> fmt::Debug for Effect<A, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("tag", &self.tag)
            .field("context", &self.context)
            .field("thunk", &"<function>")
            .finish()
    }
}

impl<A, E> Effect<A, E>
where
    A: Send + 'static,
    E: Send + 'static,
{
    /// Assemble an effect from its parts.
    pub fn from_parts(tag: Tag, context: Context, thunk: Thunk<A, E>) -> Self {
        Self {
            tag,
            context,
            thunk,
        }
    }

    /// Split an effect into its parts.
    pub fn into_parts(self) -> (Tag, Context, Thunk<A, E>) {
        (self.tag, self.context, self.thunk)
    }

    /// A success-shaped effect resolving to `value`.
    pub fn success(value: A) -> Self {
        Self::from_parts(
            Tag::Success,
            Context::default(),
            Box::new(move |_: Env| AsyncHandle::ready(Outcome::Success(value))),
        )
    }

    /// Alias of [`Effect::success`].
    pub fn pure(value: A) -> Self {
        Self::success(value)
    }

    /// A failure-shaped effect failing with `error`.
    pub fn failure(error: E) -> Self {
        Self::from_parts(
            Tag::Failure,
            Context::default(),
            Box::new(move |_: Env| {
                AsyncHandle::ready(Outcome::Failure(EffectError::Domain(error)))
            }),
        )
    }

    /// A failure-shaped effect carrying an internal failure.
    pub(crate) fn internal(failure: InternalFailure) -> Self {
        Self::from_parts(
            Tag::Failure,
            Context::default(),
            Box::new(move |_: Env| {
                AsyncHandle::ready(Outcome::Failure(EffectError::Internal(failure)))
            }),
        )
    }

    /// An effect that settles to `settled`, tagged after it.
    pub fn settled(settled: Settled<A, E>) -> Self {
        match settled {
            Outcome::Success(value) => Self::success(value),
            Outcome::Failure(EffectError::Domain(error)) => Self::failure(error),
            Outcome::Failure(EffectError::Internal(failure)) => Self::internal(failure),
        }
    }

    /// Success-shaped effect running `f` as an independent unit.
    ///
    /// The future is spawned on the current tokio runtime when the effect runs.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Env) -> Fut + Send + 'static,
        Fut: Future<Output = Result<A, E>> + Send + 'static,
    {
        Self::from_parts(
            Tag::Success,
            Context::default(),
            Box::new(move |env: Env| {
                let unit = f(env);
                AsyncHandle::spawn(async move {
                    Outcome::from(unit.await).map_failure(EffectError::Domain)
                })
            }),
        )
    }

    /// Success-shaped effect applying `f` to the environment.
    pub fn asks<F>(f: F) -> Self
    where
        F: FnOnce(&Env) -> A + Send + 'static,
    {
        Self::from_parts(
            Tag::Success,
            Context::default(),
            Box::new(move |env: Env| AsyncHandle::ready(Outcome::Success(f(&env)))),
        )
    }

    /// Failure-shaped effect failing with `f` applied to the environment.
    pub fn fails<F>(f: F) -> Self
    where
        F: FnOnce(&Env) -> E + Send + 'static,
    {
        Self::from_parts(
            Tag::Failure,
            Context::default(),
            Box::new(move |env: Env| {
                AsyncHandle::ready(Outcome::Failure(EffectError::Domain(f(&env))))
            }),
        )
    }

    /// Shape given at construction.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// Whether the effect is success-shaped.
    pub fn is_success(&self) -> bool {
        self.tag == Tag::Success
    }

    /// Whether the effect is failure-shaped.
    pub fn is_failure(&self) -> bool {
        self.tag == Tag::Failure
    }

    /// Tracing context carried to the run.
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Replace the context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Rename the span this effect runs under.
    pub fn named(mut self, span_name: impl Into<String>) -> Self {
        self.context = self.context.with_span_name(span_name);
        self
    }

    /// Bound the run of this effect by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.context = self.context.with_timeout(timeout);
        self
    }

    /// Turn telemetry on or off for runs of this effect.
    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.context = self.context.with_telemetry(enabled);
        self
    }

    /// Transform the success value.
    pub fn map<B, F>(self, f: F) -> Effect<B, E>
    where
        B: Send + 'static,
        F: FnOnce(A) -> B + Send + 'static,
    {
        let Effect {
            tag,
            context,
            thunk,
        } = self;
        Effect::from_parts(
            tag,
            context,
            Box::new(move |env: Env| thunk(env).map(move |settled| settled.map(f))),
        )
    }

    /// Chain an effect that depends on the success value.
    ///
    /// `f` runs only once this effect has succeeded, and its effect executes
    /// nested inside this one with the same environment.
    pub fn bind<B, F>(self, f: F) -> Effect<B, E>
    where
        B: Send + 'static,
        F: FnOnce(A) -> Effect<B, E> + Send + 'static,
    {
        let Effect {
            tag,
            context,
            thunk,
        } = self;
        let context = context.derive("bind");
        Effect::from_parts(
            tag,
            context,
            Box::new(move |env: Env| {
                let first = thunk(env.clone());
                AsyncHandle::from_future(async move {
                    let settled = match first.join().await {
                        Ok(Outcome::Success(value)) => (f(value).thunk)(env).join().await,
                        Ok(Outcome::Failure(error)) => return Ok(Outcome::Failure(error)),
                        Err(interrupt) => Err(interrupt),
                    };
                    Ok(settled.unwrap_or_else(|interrupt| {
                        let failure = InternalFailure::new(Stage::Bind, interrupt.into());
                        Outcome::Failure(EffectError::Internal(failure))
                    }))
                })
            }),
        )
    }

    /// Alias of [`Effect::bind`].
    pub fn and_then<B, F>(self, f: F) -> Effect<B, E>
    where
        B: Send + 'static,
        F: FnOnce(A) -> Effect<B, E> + Send + 'static,
    {
        self.bind(f)
    }

    /// Transform the domain failure payload.
    pub fn map_failure<F, G>(self, f: G) -> Effect<A, F>
    where
        F: Send + 'static,
        G: FnOnce(E) -> F + Send + 'static,
    {
        let Effect {
            tag,
            context,
            thunk,
        } = self;
        Effect::from_parts(
            tag,
            context.derive("map_failure"),
            Box::new(move |env: Env| {
                thunk(env).map(move |settled| settled.map_failure(|error| error.map_domain(f)))
            }),
        )
    }

    /// Swap the success and domain failure channels.
    ///
    /// Internal failures stay failures.
    pub fn flip(self) -> Effect<E, A> {
        let Effect {
            tag,
            context,
            thunk,
        } = self;
        Effect::from_parts(
            tag.flip(),
            context.derive("flip"),
            Box::new(move |env: Env| {
                thunk(env).map(|settled| match settled {
                    Outcome::Success(value) => Outcome::Failure(EffectError::Domain(value)),
                    Outcome::Failure(EffectError::Domain(error)) => Outcome::Success(error),
                    Outcome::Failure(EffectError::Internal(failure)) => {
                        Outcome::Failure(EffectError::Internal(failure))
                    }
                })
            }),
        )
    }
}

impl<E: Send + 'static> Effect<Env, E> {
    /// Success-shaped effect yielding the environment.
    pub fn ask() -> Self {
        Self::asks(Env::clone)
    }
}

impl<A: Send + 'static> Effect<A, Env> {
    /// Failure-shaped effect failing with the environment.
    pub fn fail() -> Self {
        Self::fails(Env::clone)
    }
}
