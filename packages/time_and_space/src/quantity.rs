//! Measured quantities and the units they are reported in.

use std::fmt::{self, Debug, Display};
use std::time::Duration;

/// Which statistic a report leads with for a given kind of quantity.
///
/// Low time is good, so time reports lead with the best run. High memory use is what
/// hurts, so memory reports lead with the worst run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Headline {
    /// Lead with the smallest sample.
    Best,

    /// Lead with the largest sample.
    Worst,
}

/// A unit that a [`Quantity`] can be displayed in.
pub trait Unit: Copy + Debug + Default + Send + Sync + 'static {
    /// How many base units (nanoseconds, bytes, ...) make up one of this unit.
    fn base_units(self) -> f64;

    /// The suffix printed after values in this unit.
    fn symbol(self) -> &'static str;
}

/// A value produced by comparing two samples of a [`SampleSource`](crate::SampleSource).
///
/// Quantities are totally ordered so that best (smallest) and worst (largest) samples
/// can be identified, and they can be summed so that a run total can be computed from
/// its splits.
pub trait Quantity: Copy + Ord + Debug + Send + Sync + 'static {
    /// The unit used when displaying this quantity.
    type Unit: Unit;

    /// The quantity that represents "nothing measured".
    const ZERO: Self;

    /// The statistic that reports of this quantity lead with.
    const HEADLINE: Headline;

    /// Adds two quantities, returning `None` on overflow.
    fn checked_add(self, rhs: Self) -> Option<Self>;

    /// The arithmetic mean of the samples, or [`Self::ZERO`] if there are none.
    fn mean(samples: &[Self]) -> Self;

    /// The quantity expressed in base units (nanoseconds, bytes, ...).
    fn to_base(self) -> f64;
}

/// Formats a value given in base units in the requested unit, with three decimals.
pub(crate) fn format_base<U: Unit>(base: f64, unit: U) -> String {
    format!("{:.3}{}", base / unit.base_units(), unit.symbol())
}

/// Time units that durations can be reported in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum TimeUnit {
    /// Seconds.
    #[default]
    Seconds,

    /// Milliseconds.
    Milliseconds,

    /// Microseconds.
    Microseconds,

    /// Nanoseconds.
    Nanoseconds,
}

impl Unit for TimeUnit {
    fn base_units(self) -> f64 {
        match self {
            Self::Seconds => 1e9,
            Self::Milliseconds => 1e6,
            Self::Microseconds => 1e3,
            Self::Nanoseconds => 1.0,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Seconds => "s",
            Self::Milliseconds => "ms",
            Self::Microseconds => "us",
            Self::Nanoseconds => "ns",
        }
    }
}

/// Memory units that byte counts can be reported in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[non_exhaustive]
pub enum MemoryUnit {
    /// Bytes.
    Bytes,

    /// Kibibytes (1024 bytes).
    Kibibytes,

    /// Mebibytes (1024 KiB).
    #[default]
    Mebibytes,

    /// Gibibytes (1024 MiB).
    Gibibytes,
}

impl Unit for MemoryUnit {
    fn base_units(self) -> f64 {
        match self {
            Self::Bytes => 1.0,
            Self::Kibibytes => 1024.0,
            Self::Mebibytes => 1_048_576.0,
            Self::Gibibytes => 1_073_741_824.0,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Bytes => "B",
            Self::Kibibytes => "KiB",
            Self::Mebibytes => "MiB",
            Self::Gibibytes => "GiB",
        }
    }
}

/// The unit of quantities that were never measured.
impl Unit for () {
    fn base_units(self) -> f64 {
        1.0
    }

    fn symbol(self) -> &'static str {
        ""
    }
}

impl Quantity for Duration {
    type Unit = TimeUnit;

    const ZERO: Self = Self::ZERO;
    const HEADLINE: Headline = Headline::Best;

    fn checked_add(self, rhs: Self) -> Option<Self> {
        Self::checked_add(self, rhs)
    }

    fn mean(samples: &[Self]) -> Self {
        if samples.is_empty() {
            return Self::ZERO;
        }

        let total_nanos = samples.iter().fold(0_u128, |total, sample| {
            total
                .checked_add(sample.as_nanos())
                .expect("sum of sample durations overflows u128 - this indicates an unrealistic scenario")
        });

        let count = u128::try_from(samples.len()).expect("usize always fits into u128");

        Self::from_nanos(
            total_nanos
                .checked_div(count)
                .expect("guarded by if condition")
                .try_into()
                .expect("mean of realistic durations fits in u64 nanoseconds"),
        )
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "reporting tolerates precision loss for durations above 2^53 ns"
    )]
    fn to_base(self) -> f64 {
        self.as_nanos() as f64
    }
}

/// A signed number of bytes.
///
/// Signed because the live memory of a process can shrink between two checkpoints when
/// the measured code frees more than it allocates.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Bytes(i64);

impl Bytes {
    /// Zero bytes.
    pub const ZERO: Self = Self(0);

    /// Creates a byte count.
    #[must_use]
    pub const fn new(bytes: i64) -> Self {
        Self(bytes)
    }

    /// Returns the byte count.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for Bytes {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bytes", self.0)
    }
}

impl Quantity for Bytes {
    type Unit = MemoryUnit;

    const ZERO: Self = Self(0);
    const HEADLINE: Headline = Headline::Worst;

    fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    fn mean(samples: &[Self]) -> Self {
        if samples.is_empty() {
            return Self::ZERO;
        }

        let total = samples
            .iter()
            .fold(0_i128, |total, sample| {
                total
                    .checked_add(i128::from(sample.0))
                    .expect("sum of i64 samples cannot overflow i128 for any realistic count")
            });

        let count = i128::try_from(samples.len()).expect("usize always fits into i128");

        Self(
            total
                .checked_div(count)
                .expect("guarded by if condition")
                .try_into()
                .expect("mean of i64 values always fits in i64"),
        )
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "reporting tolerates precision loss above 2^53 bytes"
    )]
    fn to_base(self) -> f64 {
        self.0 as f64
    }
}

/// The quantity produced by disabled instruments: nothing at all.
impl Quantity for () {
    type Unit = ();

    const ZERO: Self = ();
    const HEADLINE: Headline = Headline::Best;

    fn checked_add(self, (): Self) -> Option<Self> {
        Some(())
    }

    fn mean(_samples: &[Self]) -> Self {}

    fn to_base(self) -> f64 {
        0.0
    }
}
