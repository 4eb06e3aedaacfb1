//! Integration tests for time instruments with the real clock.

use std::thread;
use std::time::Duration;

use time_and_space::{
    Benchmark, BenchmarkConfig, Clock, ClockKind, Disabled, Error, FailurePolicy, Instrument,
    InstrumentState, Sink, Split, TimeTrend, TimeUnit, Timeit, Timer, Trend,
};

const NAP: Duration = Duration::from_millis(2);

#[test]
#[cfg_attr(miri, ignore)] // Sleeping under Miri is very slow.
fn timer_splits_sum_to_total() {
    let mut timer = Timer::new("naps");

    timer.start().unwrap();
    thread::sleep(NAP);
    timer.split().unwrap();
    thread::sleep(NAP);
    timer.split().unwrap();
    let result = timer.stop().unwrap();

    assert_eq!(result.splits().len(), 3);
    let sum: Duration = result.splits().iter().map(Split::value).sum();
    assert_eq!(result.total(), sum);
    assert!(result.total() >= NAP.checked_mul(2).unwrap());
}

#[test]
fn lifecycle_misuse_is_reported() {
    let mut timer = Timer::new("misuse");

    assert!(matches!(
        timer.split(),
        Err(Error::InvalidState {
            state: InstrumentState::Idle,
            ..
        })
    ));

    timer.start().unwrap();
    assert!(matches!(timer.start(), Err(Error::InvalidState { .. })));
}

#[test]
#[cfg_attr(miri, ignore)] // Sleeping under Miri is very slow.
fn decorated_function_is_transparent() {
    fn double(value: u32) -> u32 {
        thread::sleep(NAP);
        value.checked_mul(2).unwrap()
    }

    let mut measured = Timer::new("double").decorate(double);

    assert_eq!(measured.call(21), double(21));
    assert!(measured.last_result().unwrap().total() >= NAP);
}

#[test]
fn thread_cpu_clock_ignores_sleep() {
    let mut timer = Instrument::with_source("cpu", Clock::new(ClockKind::ThreadCpu));

    timer.start().unwrap();
    thread::sleep(Duration::from_millis(50));
    let result = timer.stop().unwrap();

    assert!(result.total() < Duration::from_millis(50), "{:?}", result.total());
}

#[test]
#[cfg_attr(miri, ignore)] // Sleeping under Miri is very slow.
fn timeit_orders_statistics() {
    let mut timeit = Timeit::new(BenchmarkConfig::new("nap").repetitions(5).warmup(1))
        .unwrap()
        .with_sink(Sink::Silent)
        .unit(TimeUnit::Milliseconds);

    let summary = timeit.run(|| thread::sleep(NAP)).unwrap();

    assert_eq!(summary.samples(), 5);
    assert!(summary.best() >= NAP);
    assert!(summary.best() <= summary.average());
    assert!(summary.average() <= summary.worst());
    assert!(summary.std_dev().is_some());
}

#[test]
fn timeit_single_repetition_collapses() {
    let mut timeit = Timeit::new(BenchmarkConfig::new("once"))
        .unwrap()
        .with_sink(Sink::Silent);

    let summary = timeit.run(|| (0..1_000_u64).sum::<u64>()).unwrap();

    assert_eq!(summary.best(), summary.average());
    assert_eq!(summary.average(), summary.worst());
}

#[test]
fn timeit_rejects_zero_repetitions() {
    assert!(matches!(
        Timeit::new(BenchmarkConfig::new("never").repetitions(0)),
        Err(Error::InvalidArgument { .. })
    ));
}

#[test]
fn timeit_abort_surfaces_operation_error() {
    let mut timeit = Timeit::new(
        BenchmarkConfig::new("parse")
            .repetitions(3)
            .failure_policy(FailurePolicy::Abort),
    )
    .unwrap()
    .with_sink(Sink::Silent);

    let error = timeit.try_run(|| "not a number".parse::<u32>()).unwrap_err();

    assert!(error.into_operation_error().is_some());
}

#[test]
fn time_trend_yields_points_in_order() {
    let mut trend = TimeTrend::new(BenchmarkConfig::new("sum").repetitions(2))
        .unwrap()
        .with_sink(Sink::Silent);

    let mut sweep = trend
        .sweep([1, 2, 4], |size| move || (0..size).sum::<usize>())
        .unwrap();

    let sizes: Vec<usize> = sweep
        .by_ref()
        .map(|point| point.unwrap().size())
        .collect();

    assert_eq!(sizes, [1, 2, 4]);
    assert!(sweep.next().is_none());
}

#[test]
fn disabled_variants_do_nothing() {
    let mut instrument = Instrument::<Disabled>::new("off");
    instrument.start().unwrap();
    assert!(instrument.stop().unwrap().splits().is_empty());

    let mut calls = 0_u32;
    let mut benchmark =
        Benchmark::<Disabled>::new(BenchmarkConfig::new("off").repetitions(100)).unwrap();
    let summary = benchmark
        .run(|| calls = calls.checked_add(1).unwrap())
        .unwrap();
    assert!(summary.is_empty());
    assert_eq!(calls, 1);

    let mut trend = Trend::<Disabled>::new(BenchmarkConfig::new("off")).unwrap();
    let points: Vec<_> = trend
        .sweep([1, 2, 4], |_| || ())
        .unwrap()
        .map(|point| point.unwrap())
        .collect();
    assert_eq!(points.len(), 3);
    assert!(points.iter().all(|point| point.summary().is_empty()));
}
