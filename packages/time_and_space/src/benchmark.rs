//! Repeated-run benchmarks.

use std::convert::Infallible;
use std::fmt;
use std::hint::black_box;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    BenchmarkError, Error, Instrument, Quantity, Result, RunResult, SampleSource, Scope, Sink,
    Summary,
};

/// What a benchmark does when the measured operation fails.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum FailurePolicy {
    /// The first failure ends the benchmark and is returned to the caller.
    #[default]
    Abort,

    /// Failed runs are left out of the statistics and counted instead. The benchmark only
    /// fails if no run succeeded, returning the last failure.
    Skip,
}

/// Configuration of a [`Benchmark`] and of every step of a [`Trend`](crate::Trend).
///
/// # Examples
///
/// ```
/// use time_and_space::{BenchmarkConfig, FailurePolicy};
///
/// let config = BenchmarkConfig::new("parse")
///     .repetitions(20)
///     .warmup(2)
///     .failure_policy(FailurePolicy::Skip);
///
/// assert_eq!(config.repetition_count(), 20);
/// ```
#[derive(Clone, Debug)]
pub struct BenchmarkConfig {
    label: Arc<str>,
    repetitions: usize,
    warmup: usize,
    failure_policy: FailurePolicy,
    verbose: bool,
}

impl BenchmarkConfig {
    /// Creates a configuration for a single measured run with no warmup.
    #[must_use]
    pub fn new(label: impl Into<Arc<str>>) -> Self {
        Self {
            label: label.into(),
            repetitions: 1,
            warmup: 0,
            failure_policy: FailurePolicy::default(),
            verbose: false,
        }
    }

    /// Sets how many measured runs the statistics are computed from. Must be at least 1.
    #[must_use]
    pub fn repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Sets how many unmeasured runs precede the measured ones.
    #[must_use]
    pub fn warmup(mut self, warmup: usize) -> Self {
        self.warmup = warmup;
        self
    }

    /// Sets what happens when the measured operation fails.
    #[must_use]
    pub fn failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Sets whether every measured run is logged at info level instead of debug level.
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// The label of the benchmark and of the instruments it creates.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// How many measured runs the statistics are computed from.
    #[must_use]
    pub fn repetition_count(&self) -> usize {
        self.repetitions
    }

    /// How many unmeasured runs precede the measured ones.
    #[must_use]
    pub fn warmup_count(&self) -> usize {
        self.warmup
    }

    /// What happens when the measured operation fails.
    #[must_use]
    pub fn on_failure(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.repetitions == 0 {
            return Err(Error::InvalidArgument {
                argument: "repetitions",
                problem: "at least one repetition is required".to_string(),
            });
        }

        Ok(())
    }
}

/// Creates the fresh instrument that measures one run.
pub(crate) type InstrumentFactory<S> = Arc<dyn Fn() -> Instrument<S> + Send + Sync>;

pub(crate) fn source_factory<S>(label: Arc<str>, source: S) -> InstrumentFactory<S>
where
    S: SampleSource + Clone + Send + Sync + 'static,
{
    Arc::new(move || Instrument::with_source(Arc::clone(&label), source.clone()))
}

/// Runs an operation repeatedly, measuring each run with a fresh instrument, and reduces
/// the run totals to a [`Summary`].
///
/// [`Timeit`](crate::Timeit) and [`Memit`](crate::Memit) are the time and memory
/// flavors. The summary is written to the benchmark's [`Sink`] (standard output by
/// default) and returned.
///
/// Values returned by the operation are passed through [`black_box()`] so that the
/// compiler cannot optimize the measured work away.
///
/// # Examples
///
/// ```
/// use time_and_space::{BenchmarkConfig, Timeit};
///
/// let mut timeit = Timeit::new(BenchmarkConfig::new("sort").repetitions(5)).unwrap();
///
/// let summary = timeit
///     .run(|| {
///         let mut values: Vec<u32> = (0..1000).rev().collect();
///         values.sort_unstable();
///         values
///     })
///     .unwrap();
///
/// assert_eq!(summary.samples(), 5);
/// assert!(summary.best() <= summary.average());
/// assert!(summary.average() <= summary.worst());
/// ```
pub struct Benchmark<S: SampleSource> {
    config: BenchmarkConfig,
    factory: InstrumentFactory<S>,
    sink: Sink,
    unit: <S::Quantity as Quantity>::Unit,
}

impl<S> Benchmark<S>
where
    S: SampleSource + Default + Clone + Send + Sync + 'static,
{
    /// Creates a benchmark measuring with the default source of its kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the configuration asks for zero repetitions.
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        Self::with_source(config, S::default())
    }
}

impl<S: SampleSource> Benchmark<S> {
    /// Creates a benchmark measuring with the given source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the configuration asks for zero repetitions.
    pub fn with_source(config: BenchmarkConfig, source: S) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
    {
        let factory = source_factory(Arc::clone(&config.label), source);
        Self::from_parts(config, factory, Sink::default())
    }

    pub(crate) fn from_parts(
        config: BenchmarkConfig,
        factory: InstrumentFactory<S>,
        sink: Sink,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            factory,
            sink,
            unit: Default::default(),
        })
    }

    /// Replaces the function that creates the instrument for each run.
    #[must_use]
    pub fn with_factory(
        mut self,
        factory: impl Fn() -> Instrument<S> + Send + Sync + 'static,
    ) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Replaces the destination of the report.
    #[must_use]
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the unit the report is rendered in.
    #[must_use]
    pub fn unit(mut self, unit: <S::Quantity as Quantity>::Unit) -> Self {
        self.unit = unit;
        self
    }

    /// The configuration of this benchmark.
    #[must_use]
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Benchmarks an infallible operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the instrument factory hands out an instrument
    /// that is already running.
    pub fn run<T>(&mut self, mut operation: impl FnMut() -> T) -> Result<Summary<S::Quantity>> {
        self.execute(|_| Ok::<T, Infallible>(operation()))
            .map_err(into_measurement_error)
    }

    /// Benchmarks an operation that receives the running [`Scope`] of each run, so it can
    /// record splits. Statistics per split name are then included in the summary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidState`] if the instrument factory hands out an instrument
    /// that is already running.
    pub fn run_scoped<T>(
        &mut self,
        mut operation: impl FnMut(&mut Scope<'_, S>) -> T,
    ) -> Result<Summary<S::Quantity>> {
        self.execute(|scope| Ok::<T, Infallible>(operation(scope)))
            .map_err(into_measurement_error)
    }

    /// Benchmarks a fallible operation, handling failures according to the configured
    /// [`FailurePolicy`].
    ///
    /// A failed run is still stopped. Its measurement is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`BenchmarkError::Operation`] with the operation's error unchanged if a
    /// warmup run fails, if any run fails under [`FailurePolicy::Abort`], or if every run
    /// fails under [`FailurePolicy::Skip`]. Returns [`BenchmarkError::Measurement`] if the
    /// instrument factory hands out an instrument that is already running.
    pub fn try_run<T, E>(
        &mut self,
        mut operation: impl FnMut() -> std::result::Result<T, E>,
    ) -> std::result::Result<Summary<S::Quantity>, BenchmarkError<E>> {
        self.execute(|_| operation())
    }

    fn execute<T, E>(
        &mut self,
        mut operation: impl FnMut(&mut Scope<'_, S>) -> std::result::Result<T, E>,
    ) -> std::result::Result<Summary<S::Quantity>, BenchmarkError<E>> {
        let label = Arc::clone(&self.config.label);

        if !S::ENABLED {
            // Nothing to measure but the caller still expects the work to happen.
            run_once(&self.factory, &mut operation)?.map_err(BenchmarkError::Operation)?;
            return Ok(Summary::empty(label, self.unit));
        }

        for iteration in 1..=self.config.warmup {
            if let Err(error) = run_once(&self.factory, &mut operation)? {
                warn!(%label, iteration, "measured operation failed during warmup");
                return Err(BenchmarkError::Operation(error));
            }
        }

        let mut runs: Vec<(usize, RunResult<S::Quantity>)> =
            Vec::with_capacity(self.config.repetitions);
        let mut failed_runs: usize = 0;
        let mut last_error = None;

        for run in 1..=self.config.repetitions {
            let mut instrument = (self.factory)();

            let outcome = {
                let mut scope = instrument.scope()?;
                operation(&mut scope)
            };

            match outcome {
                Ok(value) => {
                    black_box(value);

                    let result = instrument
                        .last_result()
                        .expect("the scope stopped the instrument when it was dropped")
                        .clone();

                    if self.config.verbose {
                        info!(%label, run, total = ?result.total(), "measured run");
                    } else {
                        debug!(%label, run, total = ?result.total(), "measured run");
                    }

                    runs.push((run, result));
                }
                Err(error) => {
                    warn!(
                        %label,
                        run,
                        policy = ?self.config.failure_policy,
                        "measured operation failed"
                    );

                    match self.config.failure_policy {
                        FailurePolicy::Abort => return Err(BenchmarkError::Operation(error)),
                        FailurePolicy::Skip => {
                            failed_runs = failed_runs.checked_add(1).expect(
                                "failed run count cannot exceed repetitions, which is a usize",
                            );
                            last_error = Some(error);
                        }
                    }
                }
            }
        }

        if let Some(error) = last_error.filter(|_| runs.is_empty()) {
            return Err(BenchmarkError::Operation(error));
        }

        let summary = Summary::from_runs(label, self.unit, &runs, failed_runs);

        debug!(
            label = %summary.label(),
            samples = summary.samples(),
            failed_runs,
            "benchmark finished"
        );

        self.sink.write_report(&summary.to_string());

        Ok(summary)
    }
}

/// Runs the operation once through a fresh instrument, discarding the measurement.
fn run_once<S, T, E>(
    factory: &InstrumentFactory<S>,
    operation: &mut impl FnMut(&mut Scope<'_, S>) -> std::result::Result<T, E>,
) -> Result<std::result::Result<(), E>>
where
    S: SampleSource,
{
    let mut instrument = factory();
    let mut scope = instrument.scope()?;

    Ok(operation(&mut scope).map(|value| {
        black_box(value);
    }))
}

fn into_measurement_error(error: BenchmarkError<Infallible>) -> Error {
    match error {
        BenchmarkError::Measurement(error) => error,
        BenchmarkError::Operation(never) => match never {},
    }
}

impl<S: SampleSource> fmt::Debug for Benchmark<S> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(std::any::type_name::<Self>())
            .field("config", &self.config)
            .field("sink", &self.sink)
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sink::SharedBuffer;
    use crate::source::{DisabledFakeSource, FakeSource};
    use crate::{Disabled, TimeUnit};

    fn fake_benchmark(config: BenchmarkConfig) -> (Benchmark<FakeSource>, FakeSource, SharedBuffer) {
        let source = FakeSource::new();
        let buffer = SharedBuffer::default();

        let benchmark = Benchmark::with_source(config, source.clone())
            .unwrap()
            .with_sink(Sink::writer(buffer.clone()))
            .unit(TimeUnit::Milliseconds);

        (benchmark, source, buffer)
    }

    /// An operation that takes the given durations, in milliseconds, one per call.
    fn durations(source: &FakeSource, millis: &[u64]) -> impl FnMut() -> u64 {
        let source = source.clone();
        let mut remaining = millis.to_vec().into_iter();

        move || {
            let ms = remaining.next().expect("operation called more often than scripted");
            source.advance(Duration::from_millis(ms));
            ms
        }
    }

    #[test]
    fn zero_repetitions_is_invalid_argument() {
        let outcome = Benchmark::with_source(
            BenchmarkConfig::new("none").repetitions(0),
            FakeSource::new(),
        );

        assert!(matches!(
            outcome.unwrap_err(),
            Error::InvalidArgument {
                argument: "repetitions",
                ..
            }
        ));
    }

    #[test]
    fn five_repetitions_are_ordered() {
        let (mut benchmark, source, _) =
            fake_benchmark(BenchmarkConfig::new("work").repetitions(5));

        let summary = benchmark.run(durations(&source, &[4, 2, 9, 2, 3])).unwrap();

        assert_eq!(summary.samples(), 5);
        assert_eq!(summary.best(), Duration::from_millis(2));
        assert_eq!(summary.best_run(), Some(2));
        assert_eq!(summary.worst(), Duration::from_millis(9));
        assert_eq!(summary.average(), Duration::from_millis(4));
        assert!(summary.best() <= summary.average() && summary.average() <= summary.worst());
    }

    #[test]
    fn single_repetition_collapses_stats() {
        let (mut benchmark, source, _) = fake_benchmark(BenchmarkConfig::new("once"));

        let summary = benchmark.run(durations(&source, &[6])).unwrap();

        assert_eq!(summary.best(), summary.average());
        assert_eq!(summary.average(), summary.worst());
        assert_eq!(summary.std_dev(), None);
    }

    #[test]
    fn warmup_runs_are_not_measured() {
        let (mut benchmark, source, _) =
            fake_benchmark(BenchmarkConfig::new("warm").repetitions(2).warmup(1));

        let summary = benchmark.run(durations(&source, &[100, 3, 5])).unwrap();

        assert_eq!(summary.samples(), 2);
        assert_eq!(summary.worst(), Duration::from_millis(5));
        assert_eq!(summary.best_run(), Some(1));
    }

    #[test]
    fn report_goes_to_sink() {
        let (mut benchmark, source, buffer) =
            fake_benchmark(BenchmarkConfig::new("work").repetitions(2));

        benchmark.run(durations(&source, &[2, 4])).unwrap();

        assert_eq!(
            buffer.contents(),
            "work: best 2.000ms [mean 3.000 ± 1.414ms]\n"
        );
    }

    #[test]
    fn abort_surfaces_failure_unchanged() {
        let (mut benchmark, _, buffer) =
            fake_benchmark(BenchmarkConfig::new("fails").repetitions(3));
        let mut calls = 0_u32;

        let error = benchmark
            .try_run(|| {
                calls = calls.checked_add(1).unwrap();
                if calls == 2 { Err("broken") } else { Ok(()) }
            })
            .unwrap_err();

        assert_eq!(error.into_operation_error(), Some("broken"));
        assert_eq!(calls, 2);
        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn skip_excludes_failed_runs() {
        let (mut benchmark, source, _) = fake_benchmark(
            BenchmarkConfig::new("flaky")
                .repetitions(3)
                .failure_policy(FailurePolicy::Skip),
        );
        let mut operation = durations(&source, &[1, 50, 3]);

        let summary = benchmark
            .try_run(|| {
                let ms = operation();
                if ms == 50 { Err("timeout") } else { Ok(ms) }
            })
            .unwrap();

        assert_eq!(summary.samples(), 2);
        assert_eq!(summary.failed_runs(), 1);
        assert_eq!(summary.worst(), Duration::from_millis(3));
        assert_eq!(summary.worst_run(), Some(3));
    }

    #[test]
    fn skip_surfaces_last_failure_when_nothing_succeeded() {
        let (mut benchmark, _, _) = fake_benchmark(
            BenchmarkConfig::new("hopeless")
                .repetitions(2)
                .failure_policy(FailurePolicy::Skip),
        );
        let mut attempt = 0_u32;

        let error = benchmark
            .try_run(|| -> std::result::Result<(), u32> {
                attempt = attempt.checked_add(1).unwrap();
                Err(attempt)
            })
            .unwrap_err();

        assert_eq!(error.into_operation_error(), Some(2));
    }

    #[test]
    fn warmup_failure_is_always_surfaced() {
        let (mut benchmark, _, _) = fake_benchmark(
            BenchmarkConfig::new("cold")
                .warmup(1)
                .failure_policy(FailurePolicy::Skip),
        );

        let error = benchmark
            .try_run(|| -> std::result::Result<(), &'static str> { Err("cold start") })
            .unwrap_err();

        assert_eq!(error.into_operation_error(), Some("cold start"));
    }

    #[test]
    fn each_run_gets_fresh_instrument() {
        let source = FakeSource::new();
        let created = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let counter = Arc::clone(&created);
        let factory_source = source.clone();
        let mut benchmark = Benchmark::with_source(
            BenchmarkConfig::new("fresh").repetitions(3).warmup(1),
            source.clone(),
        )
        .unwrap()
        .with_sink(Sink::Silent)
        .with_factory(move || {
            counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Instrument::with_source("fresh", factory_source.clone())
        });

        benchmark.run(|| ()).unwrap();

        assert_eq!(created.load(std::sync::atomic::Ordering::Relaxed), 4);
        assert_eq!(source.polls(), 8);
    }

    #[test]
    fn running_instrument_from_factory_is_invalid_state() {
        let mut benchmark = Benchmark::with_source(BenchmarkConfig::new("busy"), FakeSource::new())
            .unwrap()
            .with_sink(Sink::Silent)
            .with_factory(|| {
                let mut instrument = Instrument::with_source("busy", FakeSource::new());
                instrument.start().unwrap();
                instrument
            });

        assert!(matches!(
            benchmark.run(|| ()).unwrap_err(),
            Error::InvalidState { .. }
        ));
    }

    #[test]
    fn scoped_runs_collect_split_stats() {
        let (mut benchmark, source, _) =
            fake_benchmark(BenchmarkConfig::new("phases").repetitions(2));

        let summary = benchmark
            .run_scoped(|scope| {
                source.advance(Duration::from_millis(1));
                scope.split_named("load");
                source.advance(Duration::from_millis(2));
            })
            .unwrap();

        let names: Vec<_> = summary.split_stats().iter().map(|split| split.name()).collect();
        assert_eq!(names, ["load", "phases 2"]);
        assert_eq!(summary.best(), Duration::from_millis(3));
    }

    #[test]
    fn disabled_runs_once_and_reports_nothing() {
        let buffer = SharedBuffer::default();
        let mut benchmark = Benchmark::<Disabled>::new(BenchmarkConfig::new("off").repetitions(10))
            .unwrap()
            .with_sink(Sink::writer(buffer.clone()));
        let mut calls = 0_u32;

        let summary = benchmark
            .run(|| calls = calls.checked_add(1).unwrap())
            .unwrap();

        assert!(summary.is_empty());
        assert_eq!(calls, 1);
        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn switched_off_source_is_never_polled() {
        let source = DisabledFakeSource::new();
        let config = BenchmarkConfig::new("off").repetitions(10).warmup(2);
        let mut benchmark = Benchmark::with_source(config, source.clone())
            .unwrap()
            .with_sink(Sink::Silent);

        let summary = benchmark.run(|| 42).unwrap();
        assert!(summary.is_empty());

        let summary = benchmark
            .run_scoped(|scope| {
                scope.split();
            })
            .unwrap();
        assert!(summary.is_empty());

        assert_eq!(source.polls(), 0);
    }

    static_assertions::assert_impl_all!(BenchmarkConfig: Send, Sync, Clone);
    static_assertions::assert_impl_all!(Benchmark<crate::Clock>: Send);
}
