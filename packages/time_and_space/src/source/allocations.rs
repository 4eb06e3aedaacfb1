//! Memory sources backed by the tracking allocator.

use crate::allocator::{AllocationTotals, process_totals, thread_totals};
use crate::{Bytes, SampleSource};

/// What an [`AllocationMeter`] reports between two readings.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum MemoryMetric {
    /// How far live memory rose above its level at the start of the measurement, at its
    /// highest point. Memory allocated and freed again within the measurement still
    /// counts. Never negative.
    ///
    /// Every reading restarts the high-water mark, so two meters with this metric taking
    /// readings at the same time disturb each other.
    #[default]
    Peak,

    /// Change in live memory: bytes allocated minus bytes freed. Negative when the
    /// measured code released more than it acquired.
    Live,

    /// Gross bytes allocated, ignoring frees. Never negative.
    Allocated,
}

/// Whose allocations an [`AllocationMeter`] counts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum MeasurementScope {
    /// Allocations made by every thread of the process.
    #[default]
    Process,

    /// Allocations made by the thread that takes the reading.
    Thread,
}

/// Measures memory through the counters of the crate's tracking
/// [`Allocator`](crate::Allocator).
///
/// The allocator must be installed as the global allocator, otherwise every reading is
/// zero. Readings are inherently noisy: with [`MeasurementScope::Process`], allocations
/// by unrelated threads that happen to run during the measurement are counted too. This
/// jitter is accepted rather than corrected for; compare measurements relative to each
/// other instead of trusting them to the byte.
///
/// # Examples
///
/// ```
/// use time_and_space::{Allocator, Profiler};
///
/// #[global_allocator]
/// static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();
///
/// let mut profiler = Profiler::new("buffers");
///
/// profiler.start().unwrap();
/// let buffer = vec![0_u8; 4096];
/// let result = profiler.stop().unwrap();
///
/// assert!(result.total().get() >= 4096);
/// drop(buffer);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct AllocationMeter {
    metric: MemoryMetric,
    scope: MeasurementScope,
}

impl AllocationMeter {
    /// Creates a meter reporting the given metric for the given scope.
    #[must_use]
    pub fn new(metric: MemoryMetric, scope: MeasurementScope) -> Self {
        Self { metric, scope }
    }

    /// What this meter reports.
    #[must_use]
    pub fn metric(&self) -> MemoryMetric {
        self.metric
    }

    /// Whose allocations this meter counts.
    #[must_use]
    pub fn scope(&self) -> MeasurementScope {
        self.scope
    }
}

impl SampleSource for AllocationMeter {
    type Sample = AllocationTotals;
    type Quantity = Bytes;

    fn poll(&self) -> AllocationTotals {
        let restart_peak = self.metric == MemoryMetric::Peak;

        match self.scope {
            MeasurementScope::Process => process_totals(restart_peak),
            MeasurementScope::Thread => thread_totals(restart_peak),
        }
    }

    fn delta(&self, earlier: AllocationTotals, later: AllocationTotals) -> Bytes {
        let allocated = i128::from(later.allocated().wrapping_sub(earlier.allocated()));

        let bytes = match self.metric {
            MemoryMetric::Allocated => allocated,
            MemoryMetric::Live => {
                let freed = i128::from(later.freed().wrapping_sub(earlier.freed()));
                allocated
                    .checked_sub(freed)
                    .expect("difference of two u64 values always fits in i128")
            }
            MemoryMetric::Peak => i128::from(later.peak())
                .checked_sub(i128::from(earlier.live()))
                .expect("difference of two i64 values always fits in i128")
                .max(0),
        };

        Bytes::new(
            bytes
                .try_into()
                .expect("memory delta exceeds i64 - this indicates an unrealistic scenario"),
        )
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::allocator::register_fake_allocation;

    fn thread_meter(metric: MemoryMetric) -> AllocationMeter {
        AllocationMeter::new(metric, MeasurementScope::Thread)
    }

    #[test]
    fn defaults_to_peak_process_memory() {
        let meter = AllocationMeter::default();

        assert_eq!(meter.metric(), MemoryMetric::Peak);
        assert_eq!(meter.scope(), MeasurementScope::Process);
    }

    #[test]
    fn peak_metric_sees_released_allocation() {
        let meter = thread_meter(MemoryMetric::Peak);

        let before = meter.poll();
        register_fake_allocation(4096, 4096);
        let after = meter.poll();

        assert_eq!(meter.delta(before, after), Bytes::new(4096));
    }

    #[test]
    fn peak_metric_restarts_at_each_reading() {
        let meter = thread_meter(MemoryMetric::Peak);

        let start = meter.poll();
        register_fake_allocation(8192, 8192);
        let end_of_first = meter.poll();
        let checkpoint = meter.poll();
        register_fake_allocation(100, 100);
        let end_of_second = meter.poll();

        assert_eq!(meter.delta(start, end_of_first), Bytes::new(8192));
        assert_eq!(meter.delta(checkpoint, end_of_second), Bytes::new(100));
    }

    #[test]
    fn peak_metric_is_never_negative() {
        let meter = thread_meter(MemoryMetric::Peak);

        let earlier = AllocationTotals::default().with_live(1000, 1000);
        let later = AllocationTotals::default().with_live(200, 200);

        assert_eq!(meter.delta(earlier, later), Bytes::ZERO);
    }

    #[test]
    fn live_metric_subtracts_frees() {
        let meter = thread_meter(MemoryMetric::Live);

        let before = meter.poll();
        register_fake_allocation(1024, 256);
        let after = meter.poll();

        assert_eq!(meter.delta(before, after), Bytes::new(768));
    }

    #[test]
    fn live_metric_can_be_negative() {
        let meter = thread_meter(MemoryMetric::Live);

        let before = meter.poll();
        register_fake_allocation(0, 512);
        let after = meter.poll();

        assert_eq!(meter.delta(before, after), Bytes::new(-512));
    }

    #[test]
    fn allocated_metric_ignores_frees() {
        let meter = thread_meter(MemoryMetric::Allocated);

        let before = meter.poll();
        register_fake_allocation(2048, 2048);
        let after = meter.poll();

        assert_eq!(meter.delta(before, after), Bytes::new(2048));
    }

    #[test]
    fn delta_tolerates_counter_wraparound() {
        let meter = thread_meter(MemoryMetric::Allocated);

        let earlier = AllocationTotals::new(u64::MAX - 9, 0);
        let later = AllocationTotals::new(10, 0);

        assert_eq!(meter.delta(earlier, later), Bytes::new(20));
    }

    static_assertions::assert_impl_all!(AllocationMeter: Send, Sync, Copy);
}
