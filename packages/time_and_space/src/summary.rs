//! Statistics over repeated runs.

use std::fmt;
use std::sync::Arc;

use crate::quantity::format_base;
use crate::{Headline, Quantity, RunResult, Unit};

/// Statistics over the samples of one measured quantity across repeated runs.
///
/// Run indices are 1-based repetition numbers, counting failed repetitions too, so they
/// identify the repetition that produced the sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stats<Q> {
    best: Q,
    best_run: usize,
    worst: Q,
    worst_run: usize,
    average: Q,
    std_dev: Option<f64>,
    samples: usize,
}

impl<Q: Quantity> Stats<Q> {
    /// Reduces `(run index, value)` pairs, returning `None` if there are none.
    ///
    /// Ties for best or worst resolve to the earliest sample.
    pub(crate) fn from_samples(samples: &[(usize, Q)]) -> Option<Self> {
        let (&(first_run, first), rest) = samples.split_first()?;

        let mut best = (first_run, first);
        let mut worst = (first_run, first);

        for &(run, value) in rest {
            if value < best.1 {
                best = (run, value);
            }

            if value > worst.1 {
                worst = (run, value);
            }
        }

        let values: Vec<Q> = samples.iter().map(|&(_, value)| value).collect();

        Some(Self {
            best: best.1,
            best_run: best.0,
            worst: worst.1,
            worst_run: worst.0,
            average: Q::mean(&values),
            std_dev: sample_std_dev(&values),
            samples: samples.len(),
        })
    }

    /// The smallest sample.
    #[must_use]
    pub fn best(&self) -> Q {
        self.best
    }

    /// The repetition that produced the smallest sample.
    #[must_use]
    pub fn best_run(&self) -> usize {
        self.best_run
    }

    /// The largest sample.
    #[must_use]
    pub fn worst(&self) -> Q {
        self.worst
    }

    /// The repetition that produced the largest sample.
    #[must_use]
    pub fn worst_run(&self) -> usize {
        self.worst_run
    }

    /// The arithmetic mean of the samples.
    #[must_use]
    pub fn average(&self) -> Q {
        self.average
    }

    /// The sample standard deviation in base units (nanoseconds, bytes, ...).
    ///
    /// `None` when there are fewer than two samples.
    #[must_use]
    pub fn std_dev(&self) -> Option<f64> {
        self.std_dev
    }

    /// How many samples the statistics were computed from.
    #[must_use]
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// The statistic that reports of this quantity lead with.
    #[must_use]
    pub fn headline(&self) -> Q {
        match Q::HEADLINE {
            Headline::Best => self.best,
            Headline::Worst => self.worst,
        }
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "reporting tolerates precision loss for absurd sample counts"
)]
fn sample_std_dev<Q: Quantity>(values: &[Q]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }

    let count = values.len() as f64;
    let mean = values.iter().map(|value| value.to_base()).sum::<f64>() / count;

    let squares: f64 = values
        .iter()
        .map(|value| {
            let deviation = value.to_base() - mean;
            deviation * deviation
        })
        .sum();

    Some((squares / (count - 1.0)).sqrt())
}

/// Statistics of one named split across repeated runs.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitStats<Q> {
    name: String,
    stats: Stats<Q>,
}

impl<Q: Quantity> SplitStats<Q> {
    /// The display name of the split, as given by [`RunResult::named_splits()`].
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The statistics of the split.
    #[must_use]
    pub fn stats(&self) -> &Stats<Q> {
        &self.stats
    }
}

/// The outcome of a benchmark: statistics over the totals of its successful runs.
///
/// When runs recorded more than one split, statistics per split name are included too.
/// A summary with no samples is empty; that is what benchmarks over a
/// [`Disabled`](crate::Disabled) source produce.
///
/// Displaying a summary renders the report that benchmarks write to their sink. Time
/// reports lead with the best run and memory reports with the worst run.
#[derive(Clone, Debug)]
pub struct Summary<Q: Quantity> {
    label: Arc<str>,
    unit: Q::Unit,
    totals: Option<Stats<Q>>,
    splits: Vec<SplitStats<Q>>,
    failed_runs: usize,
}

impl<Q: Quantity> Summary<Q> {
    pub(crate) fn empty(label: Arc<str>, unit: Q::Unit) -> Self {
        Self {
            label,
            unit,
            totals: None,
            splits: Vec::new(),
            failed_runs: 0,
        }
    }

    /// Builds a summary from `(run index, result)` pairs of the successful runs.
    pub(crate) fn from_runs(
        label: Arc<str>,
        unit: Q::Unit,
        runs: &[(usize, RunResult<Q>)],
        failed_runs: usize,
    ) -> Self {
        let totals: Vec<_> = runs.iter().map(|(run, result)| (*run, result.total())).collect();

        Self {
            label,
            unit,
            totals: Stats::from_samples(&totals),
            splits: split_stats(runs),
            failed_runs,
        }
    }

    /// The label of the benchmark.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The unit the report is rendered in.
    #[must_use]
    pub fn unit(&self) -> Q::Unit {
        self.unit
    }

    /// Whether no run was measured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.totals.is_none()
    }

    /// Statistics of the run totals, `None` if the summary is empty.
    #[must_use]
    pub fn totals(&self) -> Option<&Stats<Q>> {
        self.totals.as_ref()
    }

    /// The smallest run total, zero if the summary is empty.
    #[must_use]
    pub fn best(&self) -> Q {
        self.totals.as_ref().map_or(Q::ZERO, Stats::best)
    }

    /// The largest run total, zero if the summary is empty.
    #[must_use]
    pub fn worst(&self) -> Q {
        self.totals.as_ref().map_or(Q::ZERO, Stats::worst)
    }

    /// The mean run total, zero if the summary is empty.
    #[must_use]
    pub fn average(&self) -> Q {
        self.totals.as_ref().map_or(Q::ZERO, Stats::average)
    }

    /// The sample standard deviation of the run totals in base units.
    #[must_use]
    pub fn std_dev(&self) -> Option<f64> {
        self.totals.as_ref().and_then(Stats::std_dev)
    }

    /// The repetition that produced the smallest total.
    #[must_use]
    pub fn best_run(&self) -> Option<usize> {
        self.totals.as_ref().map(Stats::best_run)
    }

    /// The repetition that produced the largest total.
    #[must_use]
    pub fn worst_run(&self) -> Option<usize> {
        self.totals.as_ref().map(Stats::worst_run)
    }

    /// How many runs succeeded and were measured.
    #[must_use]
    pub fn samples(&self) -> usize {
        self.totals.as_ref().map_or(0, Stats::samples)
    }

    /// How many runs failed and were left out of the statistics.
    #[must_use]
    pub fn failed_runs(&self) -> usize {
        self.failed_runs
    }

    /// Statistics per split name, in the order the splits were first seen.
    ///
    /// Empty unless runs recorded more than one split.
    #[must_use]
    pub fn split_stats(&self) -> &[SplitStats<Q>] {
        &self.splits
    }
}

fn split_stats<Q: Quantity>(runs: &[(usize, RunResult<Q>)]) -> Vec<SplitStats<Q>> {
    if runs.iter().all(|(_, result)| result.splits().len() <= 1) {
        return Vec::new();
    }

    let mut groups: Vec<(String, Vec<(usize, Q)>)> = Vec::new();

    for (run, result) in runs {
        for (name, value) in result.named_splits() {
            match groups.iter_mut().find(|(existing, _)| *existing == name) {
                Some((_, samples)) => samples.push((*run, value)),
                None => groups.push((name.into_owned(), vec![(*run, value)])),
            }
        }
    }

    groups
        .into_iter()
        .map(|(name, samples)| SplitStats {
            name,
            stats: Stats::from_samples(&samples).expect("every group has at least one sample"),
        })
        .collect()
}

impl<Q: Quantity> fmt::Display for Summary<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(totals) = &self.totals else {
            return Ok(());
        };

        let total_name = if self.splits.is_empty() {
            self.label.to_string()
        } else {
            format!("{} total", self.label)
        };

        let rows: Vec<(&str, &Stats<Q>)> = self
            .splits
            .iter()
            .map(|split| (split.name.as_str(), &split.stats))
            .chain(std::iter::once((total_name.as_str(), totals)))
            .collect();

        let width = rows
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .expect("there is always the totals row")
            .checked_add(1)
            .expect("name length overflows usize - this indicates an unrealistic scenario");

        let headline = match Q::HEADLINE {
            Headline::Best => "best",
            Headline::Worst => "worst",
        };

        for (name, stats) in rows {
            let name = format!("{name}:");
            write!(
                f,
                "{name:<width$} {headline} {}",
                format_base(stats.headline().to_base(), self.unit)
            )?;

            if let Some(std_dev) = stats.std_dev {
                let base_units = self.unit.base_units();
                write!(
                    f,
                    " [mean {:.3} ± {:.3}{}]",
                    stats.average.to_base() / base_units,
                    std_dev / base_units,
                    self.unit.symbol()
                )?;
            }

            writeln!(f)?;
        }

        if self.failed_runs > 0 {
            writeln!(
                f,
                "{}: {} of {} runs failed",
                self.label,
                self.failed_runs,
                self.failed_runs
                    .checked_add(totals.samples)
                    .expect("run count overflows usize - this indicates an unrealistic scenario")
            )?;
        }

        Ok(())
    }
}
