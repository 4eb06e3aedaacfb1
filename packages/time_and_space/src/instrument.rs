//! The measurement state machine shared by every usage mode.

use std::borrow::Cow;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{info, trace};

use crate::quantity::format_base;
use crate::{Error, Quantity, Result, SampleSource};

/// The lifecycle state of an [`Instrument`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum InstrumentState {
    /// Created or reset; no run in progress and no result available.
    Idle,

    /// Between `start()` and `stop()`.
    Running,

    /// A run has completed and its result is available.
    Stopped,
}

impl fmt::Display for InstrumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopped => "stopped",
        })
    }
}

#[derive(Debug)]
enum State<T> {
    Idle,
    Running { checkpoint: T },
    Stopped,
}

/// One delta measured between two checkpoints of a run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Split<Q> {
    index: usize,
    label: Option<Cow<'static, str>>,
    value: Q,
}

impl<Q: Quantity> Split<Q> {
    fn empty() -> Self {
        Self {
            index: 0,
            label: None,
            value: Q::ZERO,
        }
    }

    /// The 1-based position of this split within its run. Zero for the empty split
    /// returned by disabled instruments.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The label given to [`Instrument::split_named()`], if any.
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The amount of the measured resource consumed since the previous checkpoint.
    #[must_use]
    pub fn value(&self) -> Q {
        self.value
    }
}

/// The outcome of one instrument lifecycle, from `start()` to `stop()`.
#[derive(Clone, Debug)]
pub struct RunResult<Q> {
    label: Arc<str>,
    splits: Vec<Split<Q>>,
    total: Q,
}

impl<Q: Quantity> RunResult<Q> {
    fn empty(label: Arc<str>) -> Self {
        Self {
            label,
            splits: Vec::new(),
            total: Q::ZERO,
        }
    }

    /// The label of the instrument that produced this result.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The splits of the run, in chronological order.
    ///
    /// The final split is the one taken by `stop()`.
    #[must_use]
    pub fn splits(&self) -> &[Split<Q>] {
        &self.splits
    }

    /// The sum of all split values.
    #[must_use]
    pub fn total(&self) -> Q {
        self.total
    }

    /// The splits paired with their display names.
    ///
    /// A labeled split is named after its label. A run with a single unlabeled split names
    /// it after the instrument; otherwise unlabeled splits are numbered, e.g. `"parse 2"`.
    pub fn named_splits(&self) -> impl Iterator<Item = (Cow<'_, str>, Q)> {
        let single = self.splits.len() == 1;

        self.splits.iter().map(move |split| {
            let name = match &split.label {
                Some(label) => Cow::Borrowed(label.as_ref()),
                None if single => Cow::Borrowed(self.label.as_ref()),
                None => Cow::Owned(format!("{} {}", self.label, split.index)),
            };

            (name, split.value)
        })
    }
}

impl<Q: Quantity> fmt::Display for RunResult<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = Q::Unit::default();

        for (name, value) in self.named_splits() {
            writeln!(f, "{name}: {}", format_base(value.to_base(), unit))?;
        }

        if self.splits.len() > 1 {
            writeln!(
                f,
                "{} total: {}",
                self.label,
                format_base(self.total.to_base(), unit)
            )?;
        }

        Ok(())
    }
}

/// Measures the consumption of one resource (time, memory, ...) over a region of code.
///
/// The instrument is a small state machine (idle, running, stopped) that can be driven in
/// three ways, all backed by the same methods:
///
/// - manually, with [`start()`](Self::start), [`split()`](Self::split) and
///   [`stop()`](Self::stop);
/// - around a block, with the [`Scope`](crate::Scope) guard returned by
///   [`scope()`](Self::scope) or with [`measure()`](Self::measure);
/// - around a function, with the [`Decorated`](crate::Decorated) wrapper returned by
///   [`decorate()`](Self::decorate).
///
/// The resource is read from a [`SampleSource`]. [`Timer`](crate::Timer) and
/// [`Profiler`](crate::Profiler) are the time and memory flavors.
///
/// An instrument is meant to be used from the thread whose work it measures. It can be
/// moved to another thread but not shared between threads.
///
/// # Examples
///
/// ```
/// use time_and_space::Timer;
///
/// let mut timer = Timer::new("parse");
///
/// timer.start().unwrap();
/// let numbers: Vec<u64> = "1 2 3".split(' ').map(|n| n.parse().unwrap()).collect();
/// timer.split().unwrap();
/// let sum: u64 = numbers.iter().sum();
/// let result = timer.stop().unwrap();
///
/// assert_eq!(sum, 6);
/// assert_eq!(result.splits().len(), 2);
/// println!("{result}");
/// ```
#[derive(Debug)]
pub struct Instrument<S: SampleSource> {
    label: Arc<str>,
    source: S,
    state: State<S::Sample>,
    splits: Vec<Split<S::Quantity>>,
    last_result: Option<RunResult<S::Quantity>>,
    verbose: bool,

    _not_sync: PhantomData<Cell<()>>,
}

impl<S: SampleSource + Default> Instrument<S> {
    /// Creates an idle instrument reading from the default source of its kind.
    #[must_use]
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self::with_source(label, S::default())
    }
}

impl<S: SampleSource> Instrument<S> {
    /// Creates an idle instrument reading from the given source.
    #[must_use]
    pub fn with_source(label: impl Into<Arc<str>>, source: S) -> Self {
        Self {
            label: label.into(),
            source,
            state: State::Idle,
            splits: Vec::new(),
            last_result: None,
            verbose: false,
            _not_sync: PhantomData,
        }
    }

    /// Whether splits and results are logged at info level instead of trace level.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The label used when logging and naming splits.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The source this instrument reads from.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> InstrumentState {
        match self.state {
            State::Idle => InstrumentState::Idle,
            State::Running { .. } => InstrumentState::Running,
            State::Stopped => InstrumentState::Stopped,
        }
    }

    /// The splits of the current run, or of the last completed run once stopped.
    #[must_use]
    pub fn splits(&self) -> &[Split<S::Quantity>] {
        self.last_result
            .as_ref()
            .map_or(self.splits.as_slice(), RunResult::splits)
    }

    /// The result of the last completed run, if the instrument has been stopped since it
    /// was last started or reset.
    #[must_use]
    pub fn last_result(&self) -> Option<&RunResult<S::Quantity>> {
        self.last_result.as_ref()
    }

    pub(crate) fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub(crate) fn set_label(&mut self, label: impl Into<Arc<str>>) {
        self.label = label.into();
    }

    /// Starts a new run, discarding the splits and result of any previous run.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the instrument is already running.
    pub fn start(&mut self) -> Result<()> {
        if !S::ENABLED {
            return Ok(());
        }

        if matches!(self.state, State::Running { .. }) {
            return Err(self.invalid_state("start"));
        }

        self.splits.clear();
        self.last_result = None;

        trace!(label = %self.label, "instrument started");

        self.state = State::Running {
            checkpoint: self.source.poll(),
        };

        Ok(())
    }

    /// Records the consumption since the previous checkpoint as a new split.
    ///
    /// The new checkpoint is taken after the split has been recorded, so the bookkeeping
    /// of the split itself is not attributed to the next one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the instrument is not running.
    pub fn split(&mut self) -> Result<Split<S::Quantity>> {
        self.split_with(None)
    }

    /// Like [`split()`](Self::split) but gives the split an explicit label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the instrument is not running.
    pub fn split_named(
        &mut self,
        label: impl Into<Cow<'static, str>>,
    ) -> Result<Split<S::Quantity>> {
        self.split_with(Some(label.into()))
    }

    fn split_with(&mut self, label: Option<Cow<'static, str>>) -> Result<Split<S::Quantity>> {
        if !S::ENABLED {
            return Ok(Split::empty());
        }

        let State::Running { checkpoint } = self.state else {
            return Err(self.invalid_state("split"));
        };

        let split = self.record_split(checkpoint, label).clone();

        self.state = State::Running {
            checkpoint: self.source.poll(),
        };

        Ok(split)
    }

    /// Ends the run with a final split and stores its result.
    ///
    /// The total of the result is the sum of all split values rather than the difference
    /// between the first and last reading, so it stays meaningful for sources whose
    /// readings can go down as well as up.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the instrument is not running.
    pub fn stop(&mut self) -> Result<&RunResult<S::Quantity>> {
        if !S::ENABLED {
            return Ok(self.last_result.insert(RunResult::empty(Arc::clone(&self.label))));
        }

        let State::Running { checkpoint } = self.state else {
            return Err(self.invalid_state("stop"));
        };

        self.record_split(checkpoint, None);
        self.state = State::Stopped;

        let total = self.splits.iter().fold(S::Quantity::ZERO, |total, split| {
            total
                .checked_add(split.value)
                .expect("run total overflows - this indicates an unrealistic scenario")
        });

        let result = RunResult {
            label: Arc::clone(&self.label),
            splits: std::mem::take(&mut self.splits),
            total,
        };

        if self.verbose {
            info!(label = %self.label, total = ?result.total, "instrument stopped");
        } else {
            trace!(label = %self.label, total = ?result.total, "instrument stopped");
        }

        Ok(self.last_result.insert(result))
    }

    /// Returns the instrument to the idle state, discarding any splits and result.
    ///
    /// Unlike the other lifecycle methods, this is valid in every state.
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.splits.clear();
        self.last_result = None;
    }

    fn record_split(
        &mut self,
        checkpoint: S::Sample,
        label: Option<Cow<'static, str>>,
    ) -> &Split<S::Quantity> {
        let now = self.source.poll();
        let value = self.source.delta(checkpoint, now);

        let index = self
            .splits
            .len()
            .checked_add(1)
            .expect("split count overflows usize - this indicates an unrealistic scenario");

        if self.verbose {
            info!(label = %self.label, index, split = ?label, ?value, "split");
        } else {
            trace!(label = %self.label, index, split = ?label, ?value, "split");
        }

        self.splits.push(Split {
            index,
            label,
            value,
        });

        self.splits.last().expect("we just pushed a split")
    }

    fn invalid_state(&self, operation: &'static str) -> Error {
        Error::InvalidState {
            operation,
            state: self.state(),
        }
    }
}
