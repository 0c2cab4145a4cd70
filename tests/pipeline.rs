//! End-to-end pipelines: extraction, list creation, operations, output.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Barrier;
use std::thread;
use std::time::Duration;

use common::*;
use trackengine::io::render_bedgraph;
use trackengine::operation::{
    ApplyMask, ComputeStats, ConvertIntoBinList, ConvertIntoMask, FilterThreshold, InvertMask,
    LogBase, LogOnAverageWithDamper, MultiplyConstant, Operation, TwoLayers,
};
use trackengine::{
    FlattenMode, PileupFlattener, ScoreOperation, ScorePrecision, StopToken,
};

const TRACK: &str = "\
chr1\t0\t10\t1.5
chr1\t10\t20\t4
chr1\t30\t40\t8
chr2\t0\t50\t2
";

fn windows(list: &trackengine::ScwList, chromosome: usize) -> Vec<(u32, u32, f64)> {
    list.get(chromosome)
        .map(|view| {
            view.iter()
                .filter(|w| !w.is_null())
                .map(|w| (w.start, w.stop, w.score))
                .collect()
        })
        .unwrap_or_default()
}

#[test]
fn threshold_filter_matches_golden_output() {
    let pool = pool(2);
    let genome = genome();
    let list = generic_from_bedgraph(&pool, &genome, TRACK);

    let dropped = FilterThreshold::new(context(&pool), &list, 2.0, 5.0, false)
        .compute()
        .expect("filter succeeds")
        .expect("not stopped");
    let saturated = FilterThreshold::new(context(&pool), &list, 2.0, 5.0, true)
        .compute()
        .expect("filter succeeds")
        .expect("not stopped");

    let mut rendered = render_bedgraph(&dropped, "dropped").expect("render");
    rendered.push_str(&render_bedgraph(&saturated, "saturated").expect("render"));
    assert_snapshot("threshold_filter.bedgraph", &rendered);
}

#[test]
fn statistics_are_length_weighted_and_per_chromosome() {
    let pool = pool(3);
    let genome = genome();
    let list = generic_from_bedgraph(&pool, &genome, TRACK);

    let statistics = ComputeStats::new(context(&pool), &list)
        .compute()
        .expect("statistics succeed")
        .expect("not stopped");
    let overall = statistics.genome();
    assert_eq!(overall.minimum, 1.5);
    assert_eq!(overall.maximum, 8.0);
    assert_eq!(overall.score_sum, 15.5);
    assert_eq!(overall.non_null_length, 80);
    assert!((overall.average - 235.0 / 80.0).abs() < 1e-12);
    assert_eq!(statistics.chromosome(1).map(|s| s.average), Some(2.0));
    assert!(statistics.chromosome(2).is_none());
    // the cached statistics agree with the parallel computation
    assert_eq!(list.statistics(), &statistics);
}

#[test]
fn bin_lists_keep_every_bin() {
    let pool = pool(2);
    let genome = genome();
    let bins = bins_from_bedgraph(&pool, &genome, TRACK, 10);

    assert_eq!(bins.bin_size(), 10);
    let chr1 = bins.get(0).expect("chr1 present");
    assert_eq!(chr1.len(), 100);
    let scores: Vec<f64> = chr1.iter().take(5).map(|w| w.score).collect();
    assert_eq!(scores, vec![1.5, 4.0, 0.0, 8.0, 0.0]);
    assert_eq!(bins.get(1).map(|v| v.len()), Some(100));
    assert!(bins.get(2).is_none());
}

#[test]
fn masks_invert_and_clip() {
    let pool = pool(2);
    let genome = genome();
    let list = generic_from_bedgraph(&pool, &genome, TRACK);
    let mask = ConvertIntoMask::new(context(&pool), &list)
        .compute()
        .unwrap()
        .unwrap();
    let inverse = InvertMask::new(context(&pool), &mask)
        .compute()
        .unwrap()
        .unwrap();
    assert_eq!(windows(&inverse, 0), vec![(20, 30, 1.0), (40, 1_000, 1.0)]);
    assert_eq!(windows(&inverse, 1), vec![(50, 1_000, 1.0)]);
    assert_eq!(windows(&inverse, 2), vec![(0, 500, 1.0)]);

    let other = generic_from_bedgraph(&pool, &genome, "chr1\t15\t35\t7\nchr2\t40\t60\t3\n");
    let masked = ApplyMask::new(context(&pool), &other, &inverse)
        .compute()
        .unwrap()
        .unwrap();
    assert_eq!(windows(&masked, 0), vec![(20, 30, 7.0)]);
    assert_eq!(windows(&masked, 1), vec![(50, 60, 3.0)]);
}

#[test]
fn chained_operations_share_one_pool() {
    let pool = pool(4);
    let genome = genome();
    let list = generic_from_bedgraph(&pool, &genome, TRACK);
    let doubled = MultiplyConstant::new(context(&pool), &list, 2.0)
        .compute()
        .unwrap()
        .unwrap();
    let summed = TwoLayers::new(context(&pool), &list, &list, ScoreOperation::Addition)
        .compute()
        .unwrap()
        .unwrap();
    assert_eq!(windows(&doubled, 0), windows(&summed, 0));
    assert_eq!(windows(&doubled, 1), windows(&summed, 1));
}

#[test]
fn a_stopped_operation_returns_nothing() {
    let pool = pool(2);
    let genome = genome();
    let list = generic_from_bedgraph(&pool, &genome, TRACK);
    let operation = ComputeStats::new(context(&pool), &list);
    operation.stop();
    assert!(operation.compute().expect("no error").is_none());

    // a sibling operation on the same pool is unaffected
    let sibling = ComputeStats::new(context(&pool), &list).compute().unwrap();
    assert!(sibling.is_some());
}

#[test]
fn stopping_a_running_operation_reaches_its_nested_operations() {
    let pool = pool(1);
    let genome = genome();
    let list = generic_from_bedgraph(&pool, &genome, &synthetic_bedgraph(13, 40));
    let submitted_before = pool.progress().total;
    let operation = LogOnAverageWithDamper::new(context(&pool), &list, LogBase::Two, 1.0);
    let gate = Barrier::new(2);
    let worker_busy = AtomicBool::new(false);

    let result = thread::scope(|scope| {
        // occupy the only worker so the operation's tasks stay queued
        let blocker = scope.spawn(|| {
            pool.map_indices(1, &StopToken::new(), |_| {
                worker_busy.store(true, Ordering::Release);
                gate.wait();
                Ok(())
            })
        });
        while !worker_busy.load(Ordering::Acquire) {
            thread::sleep(Duration::from_millis(1));
        }
        let running = scope.spawn(|| operation.compute());
        // the nested average has submitted one task per chromosome
        while pool.progress().total < submitted_before + 1 + genome.len() {
            thread::sleep(Duration::from_millis(1));
        }
        operation.stop();
        gate.wait();
        assert!(blocker.join().expect("blocker joins").is_ok());
        running.join().expect("operation joins")
    });

    assert!(result.expect("no error").is_none());
    let progress = pool.progress();
    assert_eq!(progress.done, progress.total);
    assert_eq!(progress.total, submitted_before + 1 + genome.len());

    // a sibling on the same pool still completes
    let sibling = LogOnAverageWithDamper::new(context(&pool), &list, LogBase::Two, 1.0)
        .compute()
        .expect("sibling succeeds");
    assert!(sibling.is_some());
    let progress = pool.progress();
    assert_eq!(progress.done, progress.total);
}

#[test]
fn sequential_flattening_matches_parallel_bin_conversion() {
    let pool = pool(3);
    let genome = genome();
    let list = generic_from_bedgraph(&pool, &genome, &synthetic_bedgraph(17, 30));

    let converted = ConvertIntoBinList::new(
        context(&pool),
        &list,
        20,
        ScoreOperation::Average,
        ScorePrecision::Bit64,
    )
    .compute()
    .expect("conversion succeeds")
    .expect("not stopped");

    let mut flattener = PileupFlattener::new(
        std::sync::Arc::clone(&genome),
        FlattenMode::Bins { bin_size: 20 },
        ScoreOperation::Average,
        ScorePrecision::Bit64,
    )
    .expect("valid flattener");
    for (chromosome, view) in list.shards().present() {
        for window in view.iter() {
            flattener
                .add_window(chromosome, &window)
                .expect("sorted windows");
        }
    }
    let sequential = flattener.into_genomic_list().expect("flush succeeds");

    for chromosome in 0..genome.len() {
        assert_eq!(sequential.get(chromosome), converted.get(chromosome));
    }
}
