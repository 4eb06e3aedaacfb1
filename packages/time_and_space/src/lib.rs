#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Time and memory instruments for performance analysis during development.
//!
//! Every measurement is built from the same pieces:
//!
//! - A [`SampleSource`] takes raw readings of a resource: wall-clock or processor time
//!   ([`Clock`]), heap memory ([`AllocationMeter`]) or nothing at all ([`Disabled`]).
//! - An [`Instrument`] turns readings at its lifecycle points into [`Split`]s and a
//!   [`RunResult`]. It can be driven manually, around a block with a [`Scope`] guard or
//!   around a function with [`Decorated`].
//! - A [`Benchmark`] runs an operation repeatedly with a fresh instrument per run and
//!   reduces the runs to a [`Summary`] of best, worst and average.
//! - A [`Trend`] runs the benchmark once per input size and yields one [`TrendPoint`]
//!   per size through a [`Sweep`].
//!
//! Each family has a time flavor and a memory flavor:
//!
//! | | Time | Memory |
//! |---|---|---|
//! | Instrument | [`Timer`] | [`Profiler`] |
//! | Benchmark | [`Timeit`] | [`Memit`] |
//! | Trend | [`TimeTrend`] | [`MemTrend`] |
//!
//! Replacing the source type parameter with [`Disabled`] turns any of them into a
//! pass-through that runs the measured code without measuring or reporting anything.
//!
//! This package is not meant for use in production, serving only as a development tool.
//!
//! # Measuring a block
//!
//! ```
//! use time_and_space::Timer;
//!
//! let mut timer = Timer::new("checksum");
//!
//! let checksum = timer
//!     .measure(|| (0..10_000_u64).fold(0_u64, |acc, n| acc.wrapping_mul(31).wrapping_add(n)))
//!     .unwrap();
//!
//! println!("{checksum}: {}", timer.last_result().unwrap());
//! ```
//!
//! # Benchmarking memory
//!
//! Memory measurements need the tracking [`Allocator`] installed as the global allocator.
//!
//! ```
//! use time_and_space::{Allocator, BenchmarkConfig, Memit};
//!
//! #[global_allocator]
//! static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();
//!
//! let mut memit = Memit::new(BenchmarkConfig::new("strings").repetitions(10)).unwrap();
//!
//! let summary = memit
//!     .run(|| (0..100).map(|n| n.to_string()).collect::<Vec<_>>())
//!     .unwrap();
//!
//! assert!(summary.worst().get() > 0);
//! ```
//!
//! # Logging
//!
//! Lifecycle events, benchmark runs and trend steps are emitted through `tracing`. The
//! package never installs a subscriber; reports are written to a [`Sink`] instead.

mod allocator;
mod benchmark;
mod decorated;
mod error;
mod instrument;
mod quantity;
mod scope;
mod sink;
mod source;
mod summary;
mod trend;

pub use allocator::{AllocationTotals, Allocator};
pub use benchmark::{Benchmark, BenchmarkConfig, FailurePolicy};
pub use decorated::Decorated;
pub use error::{BenchmarkError, Error, Result};
pub use instrument::{Instrument, InstrumentState, RunResult, Split};
pub use quantity::{Bytes, Headline, MemoryUnit, Quantity, TimeUnit, Unit};
pub use scope::Scope;
pub use sink::Sink;
pub use source::{
    AllocationMeter, Clock, ClockKind, Disabled, MeasurementScope, MemoryMetric, SampleSource,
};
pub use summary::{SplitStats, Stats, Summary};
pub use trend::{Sweep, Trend, TrendPoint};

/// Measures elapsed time over a region of code.
pub type Timer = Instrument<Clock>;

/// Measures heap memory over a region of code.
pub type Profiler = Instrument<AllocationMeter>;

/// Benchmarks the time an operation takes over repeated runs.
pub type Timeit = Benchmark<Clock>;

/// Benchmarks the memory an operation uses over repeated runs.
pub type Memit = Benchmark<AllocationMeter>;

/// Shows how the time an operation takes scales with input size.
pub type TimeTrend = Trend<Clock>;

/// Shows how the memory an operation uses scales with input size.
pub type MemTrend = Trend<AllocationMeter>;

pub(crate) const ERR_POISONED_LOCK: &str =
    "encountered poisoned lock - continuing would risk reporting corrupted measurements";
