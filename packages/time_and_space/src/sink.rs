//! Destinations for benchmark reports.

use std::fmt;
use std::io::{self, Write};

use tracing::warn;

/// Where benchmarks and trends write their reports.
///
/// Failing to write a report never fails the measurement: the error is logged and the
/// measured results are returned as usual.
///
/// # Examples
///
/// ```
/// use time_and_space::{BenchmarkConfig, Sink, Timeit};
///
/// let mut timeit = Timeit::new(BenchmarkConfig::new("sum").repetitions(3))
///     .unwrap()
///     .with_sink(Sink::writer(std::io::stderr()));
///
/// let summary = timeit.run(|| (0..1000_u64).sum::<u64>()).unwrap();
/// assert_eq!(summary.samples(), 3);
/// ```
#[derive(Default)]
#[non_exhaustive]
pub enum Sink {
    /// Reports are printed to standard output.
    #[default]
    Stdout,

    /// Reports are discarded.
    Silent,

    /// Reports are written to a caller-supplied writer.
    Writer(Box<dyn Write + Send>),
}

impl Sink {
    /// Creates a sink that writes reports to the given writer.
    #[must_use]
    pub fn writer(writer: impl Write + Send + 'static) -> Self {
        Self::Writer(Box::new(writer))
    }

    /// Writes a rendered report. Empty reports are not written at all.
    pub(crate) fn write_report(&mut self, report: &str) {
        if report.is_empty() {
            return;
        }

        let outcome = match self {
            Self::Stdout => print_to_stdout(report),
            Self::Silent => Ok(()),
            Self::Writer(writer) => writer
                .write_all(report.as_bytes())
                .and_then(|()| writer.flush()),
        };

        if let Err(error) = outcome {
            warn!(%error, "failed to write benchmark report");
        }
    }
}

#[cfg_attr(test, mutants::skip)] // Too difficult to test stdout output reliably.
#[cfg_attr(coverage_nightly, coverage(off))]
fn print_to_stdout(report: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(report.as_bytes())?;
    stdout.flush()
}

impl fmt::Debug for Sink {
    #[cfg_attr(test, mutants::skip)] // No API contract to test.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("Stdout"),
            Self::Silent => f.write_str("Silent"),
            Self::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

/// A writer whose output can be inspected after it has been handed to a sink.
#[cfg(test)]
#[derive(Clone, Debug, Default)]
pub(crate) struct SharedBuffer {
    bytes: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[cfg(test)]
impl SharedBuffer {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8(
            self.bytes
                .lock()
                .expect("SharedBuffer lock should not be poisoned")
                .clone(),
        )
        .expect("reports are always valid UTF-8")
    }
}

#[cfg(test)]
impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .expect("SharedBuffer lock should not be poisoned")
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
