use std::result::Result;

/// Represents a result of an operation which can be completed partially.
///
/// Convertable between `Result<T, E>` and itself for convenience's sake.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[must_use="this `PartialResult` may contain a `Partial` or `Failure` variant, which should be handled"]
pub enum PartialResult<T, E> {
    Complete(T),
    Partial(T, E),
    Failure(E)
}

use self::PartialResult::*;

impl<T, E> PartialResult<T, E> {
    /// Discard partial results and return a result only if there was no error.
    pub fn complete(self) -> Result<T, E> {
        match self {
            Complete(result) => Ok(result),
            Partial(_, error) => Err(error),
            Failure(error) => Err(error)
        }
    }

    /// Discard partial errors and return a result only if there was no error.
    pub fn partial(self) -> Result<T, E> {
        match self {
            Complete(result) => Ok(result),
            Partial(result, _) => Ok(result),
            Failure(error) => Err(error)
        }
    }

    /// Obtain the result, if there was any, and the error, if there was any.
    pub fn both(self) -> (Option<T>, Option<E>) {
        match self {
            Complete(result) => (Some(result), None),
            Partial(result, error) => (Some(result), Some(error)),
            Failure(error) => (None, Some(error))
        }
    }
}

impl<T, E> From<Result<T, E>> for PartialResult<T, E> {
    fn from(t: Result<T, E>) -> PartialResult<T, E> {
        match t {
            Ok(result) => Complete(result),
            Err(error) => Failure(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::result::PartialResult;
    use crate::result::PartialResult::*;

    #[test]
    fn complete_rejects_partial() {
        let done : PartialResult<u64, &str> = Complete(5);
        let half : PartialResult<u64, &str> = Partial(3, "media full");

        assert_eq!(done.complete(), Ok(5));
        assert_eq!(half.complete(), Err("media full"));
    }

    #[test]
    fn partial_keeps_count() {
        let half : PartialResult<u64, &str> = Partial(3, "media full");
        let none : PartialResult<u64, &str> = Failure("no tape");

        assert_eq!(half.partial(), Ok(3));
        assert_eq!(none.partial(), Err("no tape"));
        assert_eq!(half.both(), (Some(3), Some("media full")));
    }

    #[test]
    fn from_result() {
        assert_eq!(PartialResult::from(Ok::<u64, &str>(1)), Complete(1));
        assert_eq!(PartialResult::from(Err::<u64, &str>("x")), Failure("x"));
    }
}
