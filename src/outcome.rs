//! The two-case value produced when an effect is run.

/// Either a failure payload or a success value, never both.
///
/// Converts losslessly to and from [`std::result::Result`], which is the plain
/// two-case shape most Rust callers want at the edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome<A, E> {
    /// The computation failed with `E`.
    Failure(E),
    /// The computation succeeded with `A`.
    Success(A),
}

impl<A, E> Outcome<A, E> {
    /// Returns `true` for [`Outcome::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Returns `true` for [`Outcome::Failure`].
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure(_))
    }

    /// The success value, if any.
    pub fn success(self) -> Option<A> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// The failure payload, if any.
    pub fn failure(self) -> Option<E> {
        match self {
            Outcome::Failure(error) => Some(error),
            Outcome::Success(_) => None,
        }
    }

    /// Borrow both sides.
    pub fn as_ref(&self) -> Outcome<&A, &E> {
        match self {
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Transform the success side.
    pub fn map<B>(self, f: impl FnOnce(A) -> B) -> Outcome<B, E> {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Transform the failure side.
    pub fn map_failure<F>(self, f: impl FnOnce(E) -> F) -> Outcome<A, F> {
        match self {
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Failure(error) => Outcome::Failure(f(error)),
        }
    }

    /// Chain a computation on the success side.
    pub fn and_then<B>(self, f: impl FnOnce(A) -> Outcome<B, E>) -> Outcome<B, E> {
        match self {
            Outcome::Success(value) => f(value),
            Outcome::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Swap the two sides.
    pub fn flip(self) -> Outcome<E, A> {
        match self {
            Outcome::Success(value) => Outcome::Failure(value),
            Outcome::Failure(error) => Outcome::Success(error),
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> Result<A, E> {
        self.into()
    }
}

impl<A, E> From<Result<A, E>> for Outcome<A, E> {
    fn from(result: Result<A, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::Failure(error),
        }
    }
}

impl<A, E> From<Outcome<A, E>> for Result<A, E> {
    fn from(outcome: Outcome<A, E>) -> Self {
        match outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }
}
