//! Function-wrapping usage of an instrument.

use std::fmt;

use crate::{Instrument, RunResult, SampleSource};

/// A function wrapped so that every call to it is measured.
///
/// Each call starts the owned instrument, calls the function and stops the instrument,
/// returning the function's value unchanged. Only the result of the most recent call is
/// kept; read it with [`last_result()`](Self::last_result) between calls.
///
/// Runs of a decorated function are always logged at info level.
///
/// The wrapper is not re-entrant: a call that recursively calls the same wrapper is
/// rejected by the borrow checker, as `call()` takes `&mut self`.
///
/// # Examples
///
/// ```
/// use time_and_space::Timer;
///
/// fn fibonacci(n: u64) -> u64 {
///     (1..n).fold((0, 1), |(a, b), _| (b, a + b)).1
/// }
///
/// let mut measured = Timer::new("fibonacci").decorate(fibonacci);
///
/// assert_eq!(measured.call(30), fibonacci(30));
/// assert_eq!(measured.last_result().unwrap().splits().len(), 1);
/// ```
pub struct Decorated<F, S: SampleSource> {
    function: F,
    instrument: Instrument<S>,
}

impl<S: SampleSource> Instrument<S> {
    /// Wraps a function so that every call to it is measured by this instrument.
    ///
    /// The instrument is switched to verbose logging and keeps its own label. Use
    /// [`decorate_named()`](Self::decorate_named) to label it after the function instead.
    #[must_use]
    pub fn decorate<F>(mut self, function: F) -> Decorated<F, S> {
        self.set_verbose(true);

        Decorated {
            function,
            instrument: self,
        }
    }

    /// Like [`decorate()`](Self::decorate) but relabels the instrument after the function.
    ///
    /// The label is the last segment of the function's type name, so a function item
    /// `parse_config` is labeled `parse_config`. Closures are labeled after the function
    /// that defines them.
    ///
    /// # Examples
    ///
    /// ```
    /// use time_and_space::Timer;
    ///
    /// fn checksum(data: &[u8]) -> u32 {
    ///     data.iter().map(|&byte| u32::from(byte)).sum()
    /// }
    ///
    /// let measured = Timer::new("unused").decorate_named(checksum);
    ///
    /// assert_eq!(measured.instrument().label(), "checksum");
    /// ```
    #[must_use]
    pub fn decorate_named<F>(mut self, function: F) -> Decorated<F, S> {
        self.set_label(function_label::<F>());
        self.decorate(function)
    }
}

/// The last path segment of a function's type name, skipping closure markers.
fn function_label<F>() -> &'static str {
    let type_name = std::any::type_name::<F>();

    type_name
        .rsplit("::")
        .find(|segment| !segment.is_empty() && !segment.starts_with('{'))
        .unwrap_or(type_name)
}

impl<F, S: SampleSource> Decorated<F, S> {
    /// Calls a one-argument function with measurement.
    ///
    /// Use a tuple to pass several arguments.
    pub fn call<A, R>(&mut self, args: A) -> R
    where
        F: FnMut(A) -> R,
    {
        let function = &mut self.function;

        self.instrument
            .measure(|| function(args))
            .expect("a decorator's instrument is only started by the decorator")
    }

    /// Calls a function without arguments with measurement.
    pub fn invoke<R>(&mut self) -> R
    where
        F: FnMut() -> R,
    {
        let function = &mut self.function;

        self.instrument
            .measure(function)
            .expect("a decorator's instrument is only started by the decorator")
    }

    /// The instrument that measures the calls.
    #[must_use]
    pub fn instrument(&self) -> &Instrument<S> {
        &self.instrument
    }

    /// The result of the most recent call, if any call has completed.
    #[must_use]
    pub fn last_result(&self) -> Option<&RunResult<S::Quantity>> {
        self.instrument.last_result()
    }

    /// Splits the wrapper into the undecorated function and its instrument.
    #[must_use]
    pub fn into_parts(self) -> (F, Instrument<S>) {
        (self.function, self.instrument)
    }
}

impl<F, S: SampleSource> fmt::Debug for Decorated<F, S> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(std::any::type_name::<Self>())
            .field("instrument", &self.instrument)
            .finish_non_exhaustive()
    }
}
