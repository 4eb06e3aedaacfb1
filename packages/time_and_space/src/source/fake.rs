//! Fake sample source for testing.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::SampleSource;

#[derive(Debug, Default)]
struct FakeSourceState {
    now: Duration,

    // Readings handed out in order before falling back to `now`.
    script: Vec<Duration>,
    polls: usize,
}

/// Fake time source that lets tests control readings.
///
/// Clones share the same state, so a test can keep one handle to advance time while an
/// instrument (or a factory creating many instruments) holds another.
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeSource {
    state: Arc<Mutex<FakeSourceState>>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets the reading returned by subsequent polls.
    pub(crate) fn set(&self, now: Duration) {
        self.state
            .lock()
            .expect("FakeSource state lock should not be poisoned")
            .now = now;
    }

    /// Moves the reading forward.
    pub(crate) fn advance(&self, by: Duration) {
        let mut state = self
            .state
            .lock()
            .expect("FakeSource state lock should not be poisoned");

        state.now = state.now.checked_add(by).expect("test durations are small");
    }

    /// Queues readings to be returned by the next polls, in order.
    pub(crate) fn script(&self, readings: impl IntoIterator<Item = Duration>) {
        self.state
            .lock()
            .expect("FakeSource state lock should not be poisoned")
            .script
            .extend(readings);
    }

    /// How many times any clone of this source has been polled.
    pub(crate) fn polls(&self) -> usize {
        self.state
            .lock()
            .expect("FakeSource state lock should not be poisoned")
            .polls
    }
}

impl SampleSource for FakeSource {
    type Sample = Duration;
    type Quantity = Duration;

    fn poll(&self) -> Duration {
        let mut state = self
            .state
            .lock()
            .expect("FakeSource state lock should not be poisoned");

        state.polls = state.polls.checked_add(1).expect("test poll counts are small");

        if state.script.is_empty() {
            state.now
        } else {
            let reading = state.script.remove(0);
            state.now = reading;
            reading
        }
    }

    fn delta(&self, earlier: Duration, later: Duration) -> Duration {
        later.saturating_sub(earlier)
    }
}

/// Switched-off counterpart of [`FakeSource`] that still counts polls.
///
/// Instruments must never poll a source that is not enabled; tests assert this through
/// the shared poll count.
#[derive(Clone, Debug, Default)]
pub(crate) struct DisabledFakeSource {
    inner: FakeSource,
}

impl DisabledFakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// How many times any clone of this source has been polled.
    pub(crate) fn polls(&self) -> usize {
        self.inner.polls()
    }
}

impl SampleSource for DisabledFakeSource {
    type Sample = Duration;
    type Quantity = Duration;

    const ENABLED: bool = false;

    fn poll(&self) -> Duration {
        self.inner.poll()
    }

    fn delta(&self, earlier: Duration, later: Duration) -> Duration {
        self.inner.delta(earlier, later)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn initializes_with_zero_reading() {
        let source = FakeSource::new();

        assert_eq!(source.poll(), Duration::ZERO);
        assert_eq!(source.polls(), 1);
    }

    #[test]
    fn scripted_readings_come_first() {
        let source = FakeSource::new();
        source.script([Duration::from_millis(3), Duration::from_millis(8)]);

        assert_eq!(source.poll(), Duration::from_millis(3));
        assert_eq!(source.poll(), Duration::from_millis(8));
        assert_eq!(source.poll(), Duration::from_millis(8));
    }

    #[test]
    fn shared_state_between_clones() {
        let source1 = FakeSource::new();
        let source2 = source1.clone();

        source1.set(Duration::from_millis(100));
        source2.advance(Duration::from_millis(50));

        assert_eq!(source1.poll(), Duration::from_millis(150));
        assert_eq!(source2.polls(), 1);
    }

    #[test]
    fn disabled_fake_counts_polls_across_clones() {
        let source = DisabledFakeSource::new();
        source.clone().poll();

        assert_eq!(source.polls(), 1);
    }
}
