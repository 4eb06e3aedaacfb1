//! Benchmarks repeated over increasing input sizes.

use std::fmt::{self, Write as _};
use std::iter::FusedIterator;
use std::sync::Arc;
use std::vec;

use tracing::{info, warn};

use crate::benchmark::{InstrumentFactory, source_factory};
use crate::quantity::format_base;
use crate::{
    Benchmark, BenchmarkConfig, BenchmarkError, Error, Instrument, Quantity, Result, SampleSource,
    Sink, Summary,
};

/// The benchmark summary of one input size in a [`Sweep`].
#[derive(Clone, Debug)]
pub struct TrendPoint<Q: Quantity> {
    size: usize,
    summary: Summary<Q>,
}

impl<Q: Quantity> TrendPoint<Q> {
    /// The input size the operation was built for.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The benchmark summary at this size.
    #[must_use]
    pub fn summary(&self) -> &Summary<Q> {
        &self.summary
    }

    /// Consumes the point, returning its summary.
    #[must_use]
    pub fn into_summary(self) -> Summary<Q> {
        self.summary
    }
}

/// Runs the same benchmark over a series of input sizes to show how consumption scales.
///
/// [`TimeTrend`](crate::TimeTrend) and [`MemTrend`](crate::MemTrend) are the time and
/// memory flavors. Every step is a [`Benchmark`] with the trend's configuration, run
/// silently; instead of per-step reports, the sweep writes one consolidated report to
/// the trend's [`Sink`] once all sizes have been measured.
///
/// # Examples
///
/// ```
/// use time_and_space::{BenchmarkConfig, TimeTrend};
///
/// let mut trend = TimeTrend::new(BenchmarkConfig::new("fill").repetitions(3)).unwrap();
///
/// let sizes: Vec<usize> = trend
///     .sweep([1_000, 10_000, 100_000], |size| move || vec![0_u8; size])
///     .unwrap()
///     .map(|point| point.unwrap().size())
///     .collect();
///
/// assert_eq!(sizes, [1_000, 10_000, 100_000]);
/// ```
pub struct Trend<S: SampleSource> {
    config: BenchmarkConfig,
    factory: InstrumentFactory<S>,
    sink: Sink,
    unit: <S::Quantity as Quantity>::Unit,
}

impl<S> Trend<S>
where
    S: SampleSource + Default + Clone + Send + Sync + 'static,
{
    /// Creates a trend measuring with the default source of its kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the configuration asks for zero repetitions.
    pub fn new(config: BenchmarkConfig) -> Result<Self> {
        Self::with_source(config, S::default())
    }
}

impl<S: SampleSource> Trend<S> {
    /// Creates a trend measuring with the given source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the configuration asks for zero repetitions.
    pub fn with_source(config: BenchmarkConfig, source: S) -> Result<Self>
    where
        S: Clone + Send + Sync + 'static,
    {
        config.validate()?;

        Ok(Self {
            factory: source_factory(Arc::from(config.label()), source),
            config,
            sink: Sink::default(),
            unit: Default::default(),
        })
    }

    /// Replaces the function that creates the instrument for each run of each step.
    #[must_use]
    pub fn with_factory(
        mut self,
        factory: impl Fn() -> Instrument<S> + Send + Sync + 'static,
    ) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    /// Replaces the destination of the consolidated report.
    #[must_use]
    pub fn with_sink(mut self, sink: Sink) -> Self {
        self.sink = sink;
        self
    }

    /// Sets the unit the consolidated report is rendered in.
    #[must_use]
    pub fn unit(mut self, unit: <S::Quantity as Quantity>::Unit) -> Self {
        self.unit = unit;
        self
    }

    /// The configuration used for every step.
    #[must_use]
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Starts a sweep over the given sizes.
    ///
    /// For each size, in order, `make_operation` builds the operation to benchmark. The
    /// returned iterator benchmarks one size per call to `next()`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `sizes` is empty.
    pub fn sweep<'a, T, F, M>(
        &'a mut self,
        sizes: impl IntoIterator<Item = usize>,
        mut make_operation: M,
    ) -> Result<Sweep<'a, S::Quantity>>
    where
        M: FnMut(usize) -> F + 'a,
        F: FnMut() -> T,
    {
        self.start_sweep(sizes, move |benchmark, size| {
            benchmark.run(make_operation(size))
        })
    }

    /// Starts a sweep over the given sizes with a fallible operation.
    ///
    /// Failed runs are handled by each step according to the configured
    /// [`FailurePolicy`](crate::FailurePolicy). A step that fails is yielded as an error
    /// and ends the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `sizes` is empty.
    pub fn try_sweep<'a, T, E, F, M>(
        &'a mut self,
        sizes: impl IntoIterator<Item = usize>,
        mut make_operation: M,
    ) -> Result<Sweep<'a, S::Quantity, BenchmarkError<E>>>
    where
        M: FnMut(usize) -> F + 'a,
        F: FnMut() -> std::result::Result<T, E>,
    {
        self.start_sweep(sizes, move |benchmark, size| {
            benchmark.try_run(make_operation(size))
        })
    }

    fn start_sweep<'a, E>(
        &'a mut self,
        sizes: impl IntoIterator<Item = usize>,
        mut run_step: impl FnMut(
            &mut Benchmark<S>,
            usize,
        ) -> std::result::Result<Summary<S::Quantity>, E>
        + 'a,
    ) -> Result<Sweep<'a, S::Quantity, E>> {
        let sizes: Vec<usize> = sizes.into_iter().collect();

        if sizes.is_empty() {
            return Err(Error::InvalidArgument {
                argument: "sizes",
                problem: "a sweep needs at least one size".to_string(),
            });
        }

        let config = self.config.clone();
        let factory = Arc::clone(&self.factory);
        let unit = self.unit;

        let step = move |size| {
            let mut benchmark = Benchmark::from_parts(
                config.clone(),
                Arc::clone(&factory),
                Sink::Silent,
            )
            .expect("trend configuration was validated when the trend was created")
            .unit(unit);

            run_step(&mut benchmark, size)
        };

        Ok(Sweep {
            label: Arc::from(self.config.label()),
            unit: self.unit,
            sink: &mut self.sink,
            sizes: sizes.into_iter(),
            step: Box::new(step),
            rows: Vec::new(),
            finished: false,
            reported: false,
        })
    }
}

impl<S: SampleSource> fmt::Debug for Trend<S> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(std::any::type_name::<Self>())
            .field("config", &self.config)
            .field("sink", &self.sink)
            .field("unit", &self.unit)
            .finish_non_exhaustive()
    }
}

type Step<'a, Q, E> = Box<dyn FnMut(usize) -> std::result::Result<Summary<Q>, E> + 'a>;

#[derive(Debug)]
struct TrendRow<Q> {
    size: usize,
    best: Q,
    average: Q,
    worst: Q,
}

/// A single pass over the sizes of a [`Trend`], yielding one [`TrendPoint`] per size.
///
/// Each call to `next()` benchmarks one size, so dropping the sweep early cancels the
/// remaining sizes. When the last size has been measured, a consolidated report is
/// written to the trend's sink. Once exhausted, the sweep yields nothing further; start
/// a new one with [`Trend::sweep()`].
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Sweep<'a, Q: Quantity, E = Error> {
    label: Arc<str>,
    unit: Q::Unit,
    sink: &'a mut Sink,
    sizes: vec::IntoIter<usize>,
    step: Step<'a, Q, E>,
    rows: Vec<TrendRow<Q>>,
    finished: bool,
    reported: bool,
}

impl<Q: Quantity, E> Sweep<'_, Q, E> {
    /// Writes the consolidated report of the sizes measured so far.
    ///
    /// The report is written at most once per sweep. It happens automatically when the
    /// last size has been measured, so this is only needed to report a sweep that is
    /// abandoned early.
    pub fn report(&mut self) {
        if self.reported {
            return;
        }

        self.reported = true;
        let report = self.render_report();
        self.sink.write_report(&report);
    }

    fn render_report(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }

        let width = self
            .rows
            .iter()
            .map(|row| row.size.to_string().len())
            .max()
            .expect("guarded by if condition");

        let mut report = format!("{} trend:\n", self.label);

        for row in &self.rows {
            writeln!(
                report,
                "{:>width$}: worst {} (best {}, mean {})",
                row.size,
                format_base(row.worst.to_base(), self.unit),
                format_base(row.best.to_base(), self.unit),
                format_base(row.average.to_base(), self.unit),
            )
            .expect("writing to a String never fails");
        }

        report
    }
}

impl<Q: Quantity, E> Iterator for Sweep<'_, Q, E> {
    type Item = std::result::Result<TrendPoint<Q>, E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let Some(size) = self.sizes.next() else {
            self.finished = true;
            self.report();
            return None;
        };

        let summary = match (self.step)(size) {
            Ok(summary) => summary,
            Err(error) => {
                warn!(label = %self.label, size, "trend step failed, ending sweep");
                self.finished = true;
                return Some(Err(error));
            }
        };

        if let Some(totals) = summary.totals() {
            info!(
                label = %self.label,
                size,
                best = ?totals.best(),
                average = ?totals.average(),
                worst = ?totals.worst(),
                "trend step"
            );

            self.rows.push(TrendRow {
                size,
                best: totals.best(),
                average: totals.average(),
                worst: totals.worst(),
            });
        }

        if self.sizes.len() == 0 {
            self.finished = true;
            self.report();
        }

        Some(Ok(TrendPoint { size, summary }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else {
            (0, Some(self.sizes.len()))
        }
    }
}

impl<Q: Quantity, E> FusedIterator for Sweep<'_, Q, E> {}

impl<Q: Quantity, E> fmt::Debug for Sweep<'_, Q, E> {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(std::any::type_name::<Self>())
            .field("label", &self.label)
            .field("remaining", &self.sizes.len())
            .field("finished", &self.finished)
            .field("reported", &self.reported)
            .finish_non_exhaustive()
    }
}
