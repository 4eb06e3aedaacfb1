//! Scoped-block usage of an instrument.

use std::borrow::Cow;

use tracing::error;

use crate::{Instrument, Result, SampleSource, Split};

/// A running instrument that is stopped when this guard is dropped.
///
/// The instrument is stopped exactly once however the scope is left: normally, by an
/// early return, or by a panic unwinding through it. The result is then available from
/// [`Instrument::last_result()`].
///
/// # Examples
///
/// ```
/// use time_and_space::Timer;
///
/// let mut timer = Timer::new("block");
///
/// {
///     let mut scope = timer.scope().unwrap();
///     let squares: Vec<u64> = (0..100).map(|n| n * n).collect();
///     scope.split();
///     std::hint::black_box(squares);
/// } // The timer is stopped here.
///
/// assert_eq!(timer.last_result().unwrap().splits().len(), 2);
/// ```
#[derive(Debug)]
#[must_use = "Measurements are taken between creation and drop"]
pub struct Scope<'a, S: SampleSource> {
    instrument: &'a mut Instrument<S>,
}

impl<S: SampleSource> Instrument<S> {
    /// Starts the instrument and returns a guard that stops it when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`](crate::Error::InvalidState) if the instrument is
    /// already running.
    pub fn scope(&mut self) -> Result<Scope<'_, S>> {
        self.start()?;
        Ok(Scope { instrument: self })
    }

    /// Measures the given closure, returning its value.
    ///
    /// The result of the measurement is available from [`last_result()`](Self::last_result)
    /// afterwards, also when the closure panics.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`](crate::Error::InvalidState) if the instrument is
    /// already running. The closure is not called in that case.
    pub fn measure<R>(&mut self, f: impl FnOnce() -> R) -> Result<R> {
        let _scope = self.scope()?;
        Ok(f())
    }
}

impl<S: SampleSource> Scope<'_, S> {
    /// Records a split in the guarded instrument.
    pub fn split(&mut self) -> Split<S::Quantity> {
        self.instrument
            .split()
            .expect("the guarded instrument is running for the lifetime of the scope")
    }

    /// Records a labeled split in the guarded instrument.
    pub fn split_named(&mut self, label: impl Into<Cow<'static, str>>) -> Split<S::Quantity> {
        self.instrument
            .split_named(label)
            .expect("the guarded instrument is running for the lifetime of the scope")
    }

    /// The guarded instrument.
    #[must_use]
    pub fn instrument(&self) -> &Instrument<S> {
        self.instrument
    }
}

impl<S: SampleSource> Drop for Scope<'_, S> {
    fn drop(&mut self) {
        if let Err(stop_error) = self.instrument.stop() {
            // Only reachable if the instrument was stopped behind the guard's back, which
            // the exclusive borrow rules out. Never panic here, we may be unwinding.
            error!(%stop_error, "scoped instrument could not be stopped");
        }
    }
}
