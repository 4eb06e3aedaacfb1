//! Basic usage of the time instruments: manual, scoped, decorated and repeated.
//!
//! Run with: `cargo run --example time_and_space_basic`

use std::collections::BTreeMap;
use std::hint::black_box;

use time_and_space::{BenchmarkConfig, TimeUnit, Timeit, Timer};

fn word_counts(text: &str) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();

    for word in text.split_whitespace() {
        let count = counts.entry(word).or_insert(0_usize);
        *count = count.saturating_add(1);
    }

    counts
}

fn main() {
    let text = "the quick brown fox jumps over the lazy dog ".repeat(10_000);

    println!("=== Manual start, split and stop ===");
    let mut timer = Timer::new("words");
    timer.start().unwrap();
    let words: Vec<&str> = text.split_whitespace().collect();
    timer.split_named("split").unwrap();
    let longest = words.iter().map(|word| word.len()).max();
    let result = timer.stop().unwrap();
    print!("{result}");
    println!("longest word: {longest:?}");
    println!();

    println!("=== Scoped block ===");
    let mut timer = Timer::new("scoped");
    {
        let mut scope = timer.scope().unwrap();
        black_box(text.to_uppercase());
        scope.split_named("uppercase");
        black_box(text.to_lowercase());
    }
    print!("{}", timer.last_result().unwrap());
    println!();

    println!("=== Decorated function ===");
    let mut counted = Timer::new("word_counts").decorate(word_counts);
    let counts = counted.call(text.as_str());
    print!("{}", counted.last_result().unwrap());
    println!("distinct words: {}", counts.len());
    println!();

    println!("=== Repeated runs ===");
    let mut timeit = Timeit::new(BenchmarkConfig::new("word_counts").repetitions(10).warmup(1))
        .unwrap()
        .unit(TimeUnit::Milliseconds);
    let summary = timeit.run(|| word_counts(&text)).unwrap();
    println!(
        "best run: {:?}, worst run: {:?}",
        summary.best_run(),
        summary.worst_run()
    );
}
