//! Sample sources that instruments poll at each lifecycle point.
//!
//! A source is the only place where the outside world is observed. Everything above it
//! (instruments, benchmarks, trends) works purely with the samples and quantities it
//! produces, which allows tests to substitute a fake source with scripted readings.

mod allocations;
mod clock;
mod disabled;
#[cfg(test)]
mod fake;

use std::fmt::Debug;

pub use allocations::{AllocationMeter, MeasurementScope, MemoryMetric};
pub use clock::{Clock, ClockKind};
pub use disabled::Disabled;
#[cfg(test)]
pub(crate) use fake::{DisabledFakeSource, FakeSource};

use crate::Quantity;

/// Provides raw readings of some measurable resource.
///
/// Implementations must be cheap to poll, since every split polls twice.
pub trait SampleSource: Debug {
    /// One raw reading.
    type Sample: Copy + Debug;

    /// The quantity obtained by comparing two readings.
    type Quantity: Quantity;

    /// Whether instruments built on this source measure anything at all.
    ///
    /// Instruments on a source where this is `false` never call [`poll()`](Self::poll).
    const ENABLED: bool = true;

    /// Takes a reading of the resource right now.
    fn poll(&self) -> Self::Sample;

    /// The amount of the resource consumed between two readings.
    fn delta(&self, earlier: Self::Sample, later: Self::Sample) -> Self::Quantity;
}
