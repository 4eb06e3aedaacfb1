//! Shows how time and memory use of an operation scale with input size.
//!
//! Run with: `cargo run --example time_and_space_trend`

use time_and_space::{Allocator, BenchmarkConfig, MemTrend, MemoryUnit, TimeTrend, TimeUnit};

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

fn squares(count: usize) -> Vec<u64> {
    let count = u64::try_from(count).unwrap();
    (0..count).map(|n| n.wrapping_mul(n)).collect()
}

fn main() {
    let sizes = [1_000, 10_000, 100_000, 1_000_000];

    let mut time_trend = TimeTrend::new(BenchmarkConfig::new("squares").repetitions(5))
        .unwrap()
        .unit(TimeUnit::Microseconds);

    for point in time_trend
        .sweep(sizes, |size| move || squares(size))
        .unwrap()
    {
        let point = point.unwrap();
        println!("{:>9} items measured", point.size());
    }

    println!();

    let mut mem_trend = MemTrend::new(BenchmarkConfig::new("squares"))
        .unwrap()
        .unit(MemoryUnit::Kibibytes);

    let points: Vec<_> = mem_trend
        .sweep(sizes, |size| move || squares(size))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let growth = points
        .last()
        .map(|point| point.summary().worst().get())
        .unwrap_or_default();
    println!("largest step retained {growth} bytes");
}
