//! Time sources.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use cpu_time::{ProcessTime, ThreadTime};

use crate::SampleSource;

/// Which clock a [`Clock`] reads.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum ClockKind {
    /// Monotonic wall-clock time.
    #[default]
    Wall,

    /// Processor time consumed by the current thread.
    ThreadCpu,

    /// Processor time consumed by all threads of the process.
    ProcessCpu,
}

/// Measures elapsed time.
///
/// The default clock measures monotonic wall-clock time. Processor time clocks exclude
/// time spent waiting or descheduled, which makes them less noisy for pure computation
/// but blind to I/O and sleeping.
///
/// Readings never decrease and deltas saturate at zero.
///
/// # Examples
///
/// ```
/// use time_and_space::{Clock, ClockKind, Instrument};
///
/// let mut timer = Instrument::with_source("busy", Clock::new(ClockKind::ThreadCpu));
///
/// timer.start().unwrap();
/// let sum: u64 = (0..10_000_u64).sum();
/// std::hint::black_box(sum);
/// let result = timer.stop().unwrap();
///
/// println!("busy for {:?}", result.total());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct Clock {
    kind: ClockKind,
}

impl Clock {
    /// Creates a clock of the given kind.
    #[must_use]
    pub fn new(kind: ClockKind) -> Self {
        Self { kind }
    }

    /// Creates a monotonic wall-clock time source.
    #[must_use]
    pub fn wall() -> Self {
        Self::new(ClockKind::Wall)
    }

    /// The kind of clock this source reads.
    #[must_use]
    pub fn kind(&self) -> ClockKind {
        self.kind
    }
}

impl SampleSource for Clock {
    type Sample = Duration;
    type Quantity = Duration;

    fn poll(&self) -> Duration {
        match self.kind {
            // Any fixed instant works as an origin as long as every reading shares it.
            ClockKind::Wall => WALL_ORIGIN.get_or_init(Instant::now).elapsed(),
            ClockKind::ThreadCpu => ThreadTime::now().as_duration(),
            ClockKind::ProcessCpu => ProcessTime::now().as_duration(),
        }
    }

    fn delta(&self, earlier: Duration, later: Duration) -> Duration {
        later.saturating_sub(earlier)
    }
}

static WALL_ORIGIN: OnceLock<Instant> = OnceLock::new();

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::hint::black_box;

    use super::*;

    #[test]
    fn wall_clock_is_monotonic() {
        let clock = Clock::wall();

        let mut previous = clock.poll();
        for _ in 0..1000 {
            let current = clock.poll();
            assert!(current >= previous);
            previous = current;
        }
    }

    #[test]
    fn default_clock_is_wall_clock() {
        let clock = Clock::default();
        assert_eq!(clock.kind(), ClockKind::Wall);

        let first = clock.poll();
        let second = clock.poll();
        assert!(second >= first);
    }

    #[test]
    fn delta_saturates_at_zero() {
        let clock = Clock::wall();

        assert_eq!(
            clock.delta(Duration::from_millis(5), Duration::from_millis(3)),
            Duration::ZERO
        );
        assert_eq!(
            clock.delta(Duration::from_millis(3), Duration::from_millis(5)),
            Duration::from_millis(2)
        );
    }

    #[test]
    fn thread_cpu_clock_advances_under_load() {
        let clock = Clock::new(ClockKind::ThreadCpu);
        let before = clock.poll();

        let mut accumulator = 0_u64;
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(20) {
            for i in 0..10_000_u64 {
                accumulator = accumulator.wrapping_mul(31).wrapping_add(i);
            }
        }
        black_box(accumulator);

        let after = clock.poll();
        assert!(after >= before);
    }

    static_assertions::assert_impl_all!(Clock: Send, Sync, Copy);
}
