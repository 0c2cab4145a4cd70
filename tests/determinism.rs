use std::collections::HashSet;

use blake3::hash;

mod common;

use common::*;
use trackengine::io::render_bedgraph;
use trackengine::operation::{
    ComputeStats, FindIslands, IslandResult, IslandThreshold, MovingAverage, Operation,
    StandardDeviation,
};

fn fingerprint(threads: usize, text: &str) -> blake3::Hash {
    let pool = pool(threads);
    let genome = genome();
    let list = generic_from_bedgraph(&pool, &genome, text);
    let bins = bins_from_bedgraph(&pool, &genome, text, 25);

    let statistics = ComputeStats::new(context(&pool), &list)
        .compute()
        .expect("statistics succeed")
        .expect("not stopped");
    let deviation = StandardDeviation::new(context(&pool), &list)
        .compute()
        .expect("deviation succeeds")
        .expect("not stopped");
    let smoothed = MovingAverage::new(context(&pool), &bins, 50, true)
        .compute()
        .expect("smoothing succeeds")
        .expect("not stopped");
    let islands = FindIslands::new(context(&pool), &bins, IslandThreshold::ReadCount(5.0))
        .with_gap(1)
        .with_result(IslandResult::IslandScore)
        .compute()
        .expect("island calling succeeds")
        .expect("not stopped");

    let mut output = serde_json::to_string(&statistics).expect("statistics serialise");
    output.push_str(&format!("\n{:e}\n", deviation));
    output.push_str(&render_bedgraph(&smoothed, "smoothed").expect("render"));
    output.push_str(&render_bedgraph(&islands, "islands").expect("render"));
    hash(output.as_bytes())
}

#[test]
fn results_do_not_depend_on_the_thread_count() {
    let text = synthetic_bedgraph(7, 40);
    let fingerprints: HashSet<_> = [1, 2, 3, 8]
        .into_iter()
        .map(|threads| fingerprint(threads, &text))
        .collect();
    assert_eq!(fingerprints.len(), 1, "outputs diverged across pool sizes");
}

#[test]
fn repeated_runs_are_identical() {
    let text = synthetic_bedgraph(11, 60);
    let mut fingerprints = HashSet::new();
    for _ in 0..5 {
        fingerprints.insert(fingerprint(4, &text));
    }
    assert_eq!(fingerprints.len(), 1, "outputs diverged across runs");
}
