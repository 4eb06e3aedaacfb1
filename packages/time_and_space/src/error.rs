use thiserror::Error;

use crate::InstrumentState;

/// Errors raised by instruments, benchmarks and trend sweeps.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A lifecycle method was called while the instrument was in a state that does not allow it.
    ///
    /// This is never corrected silently because it almost always indicates a bug in the code
    /// that drives the instrument.
    #[error("cannot {operation} an instrument that is {state}")]
    InvalidState {
        /// The lifecycle method that was called, e.g. `split`.
        operation: &'static str,

        /// The state the instrument was in when the method was called.
        state: InstrumentState,
    },

    /// A benchmark or sweep was configured with a value it cannot work with.
    ///
    /// Raised before any measurement work begins.
    #[error("invalid {argument}: {problem}")]
    InvalidArgument {
        /// The name of the offending argument.
        argument: &'static str,

        /// A human-readable description of the problem.
        problem: String,
    },
}

/// A specialized `Result` type for measurement operations, returning the crate's
/// [`Error`] type as the error value.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a benchmark over a fallible operation.
///
/// The measured operation's own error is passed through unchanged in
/// [`BenchmarkError::Operation`], so a measurement tool never hides the fact that the
/// measured code failed.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BenchmarkError<E> {
    /// The benchmark itself could not be carried out.
    #[error(transparent)]
    Measurement(#[from] Error),

    /// The measured operation failed.
    #[error("measured operation failed: {0}")]
    Operation(#[source] E),
}

impl<E> BenchmarkError<E> {
    /// Returns the measured operation's error, if that is what failed.
    #[must_use]
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(error) => Some(error),
            Self::Measurement(_) => None,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Debug;
    use std::io;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);
    assert_impl_all!(BenchmarkError<io::Error>: Send, Sync, Debug, std::error::Error);

    #[test]
    fn invalid_state_names_operation_and_state() {
        let error = Error::InvalidState {
            operation: "split",
            state: InstrumentState::Idle,
        };

        assert_eq!(error.to_string(), "cannot split an instrument that is idle");
    }

    #[test]
    fn invalid_argument_names_argument() {
        let error = Error::InvalidArgument {
            argument: "repetitions",
            problem: "must be at least 1".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "invalid repetitions: must be at least 1"
        );
    }

    #[test]
    fn operation_error_is_passed_through() {
        let error: BenchmarkError<io::Error> =
            BenchmarkError::Operation(io::Error::other("disk on fire"));

        let inner = error.into_operation_error().unwrap();
        assert_eq!(inner.to_string(), "disk on fire");
    }

    #[test]
    fn measurement_error_has_no_operation_error() {
        let error: BenchmarkError<io::Error> = Error::InvalidArgument {
            argument: "sizes",
            problem: "must not be empty".to_string(),
        }
        .into();

        assert!(error.into_operation_error().is_none());
    }
}
