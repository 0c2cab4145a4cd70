//! Operation throughput on a synthetic genome

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trackengine::operation::{
    ComputeStats, FilterThreshold, FindIslands, IslandThreshold, MovingAverage, Operation,
};
use trackengine::{
    BinList, ChromosomeSet, OperationContext, OperationPool, ScorePrecision, ScwListBuilder,
    ScwListType,
};

const CHROMOSOME_LENGTH: u32 = 2_000_000;
const BIN_SIZE: u32 = 100;

fn synthetic_bins() -> BinList {
    let genome = Arc::new(
        ChromosomeSet::new((1..=8).map(|index| (format!("chr{index}"), CHROMOSOME_LENGTH)))
            .expect("valid genome"),
    );
    let mut builder = ScwListBuilder::new(
        Arc::clone(&genome),
        ScwListType::Bin { bin_size: BIN_SIZE },
        ScorePrecision::Bit32,
    );
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    for chromosome in 0..genome.len() {
        for bin in 0..CHROMOSOME_LENGTH / BIN_SIZE {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let score = (state % 12) as f64;
            let start = bin * BIN_SIZE;
            builder
                .add(chromosome, start, start + BIN_SIZE, score)
                .expect("bins in order");
        }
    }
    BinList::from_list(builder.build().expect("list builds")).expect("bin list")
}

fn benchmark_operations(c: &mut Criterion) {
    let bins = synthetic_bins();
    let mut group = c.benchmark_group("operations");
    group.sample_size(10);

    for threads in [1, 4] {
        let pool = Arc::new(OperationPool::new(Some(threads)).expect("pool starts"));

        group.bench_with_input(BenchmarkId::new("compute_stats", threads), &pool, |b, pool| {
            b.iter(|| black_box(ComputeStats::new(OperationContext::new(pool), &bins).compute()))
        });
        group.bench_with_input(BenchmarkId::new("filter_threshold", threads), &pool, |b, pool| {
            b.iter(|| {
                black_box(FilterThreshold::new(OperationContext::new(pool), &bins, 2.0, 9.0, true).compute())
            })
        });
        group.bench_with_input(BenchmarkId::new("moving_average", threads), &pool, |b, pool| {
            b.iter(|| {
                black_box(MovingAverage::new(OperationContext::new(pool), &bins, 500, false).compute())
            })
        });
        group.bench_with_input(BenchmarkId::new("find_islands", threads), &pool, |b, pool| {
            b.iter(|| {
                black_box(
                    FindIslands::new(OperationContext::new(pool), &bins, IslandThreshold::PValue(1e-3))
                        .with_gap(2)
                        .compute(),
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_operations);
criterion_main!(benches);
