use crate::SampleSource;

/// A source that measures nothing.
///
/// Instruments, benchmarks and trends built on this source are zero-cost pass-throughs:
/// the source is never polled, lifecycle calls always succeed, and every result is empty.
/// This lets a caller keep measurement code in place and switch it off by picking this
/// source instead of a [`Clock`](crate::Clock) or [`AllocationMeter`](crate::AllocationMeter).
///
/// # Examples
///
/// ```
/// use time_and_space::{Disabled, Instrument};
///
/// let mut instrument = Instrument::<Disabled>::new("off");
///
/// // No lifecycle rules are enforced on a disabled instrument.
/// instrument.split().unwrap();
/// let result = instrument.stop().unwrap();
///
/// assert!(result.splits().is_empty());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Disabled;

impl SampleSource for Disabled {
    type Sample = ();
    type Quantity = ();

    const ENABLED: bool = false;

    #[cfg_attr(test, mutants::skip)] // Never called by instruments.
    fn poll(&self) {}

    fn delta(&self, (): (), (): ()) {}
}
