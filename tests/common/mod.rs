#![allow(dead_code)]

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use trackengine::io::{BedFormat, BedReader, ExtractionOptions, RawGenomicData};
use trackengine::list::ScwListFactory;
use trackengine::{
    BinList, ChromosomeSet, IdentityMapper, OperationContext, OperationPool, ScoreOperation,
    ScorePrecision, ScwList,
};

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("TRACKENGINE_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set TRACKENGINE_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}

pub fn pool(threads: usize) -> Arc<OperationPool> {
    Arc::new(OperationPool::new(Some(threads)).expect("pool starts"))
}

pub fn context(pool: &Arc<OperationPool>) -> OperationContext {
    OperationContext::new(pool)
}

/// Two chromosomes of 1 kb and one of 500 b.
pub fn genome() -> Arc<ChromosomeSet> {
    Arc::new(
        ChromosomeSet::new([("chr1", 1_000), ("chr2", 1_000), ("chrM", 500)])
            .expect("valid genome"),
    )
}

pub fn extract(text: &str, genome: &Arc<ChromosomeSet>) -> RawGenomicData {
    let mut reader = BedReader::new(Cursor::new(text.to_string()), BedFormat::BedGraph);
    let (raw, log) = RawGenomicData::extract(
        &mut reader,
        Arc::clone(genome),
        &IdentityMapper,
        &ExtractionOptions::default(),
    )
    .expect("extraction succeeds");
    assert_eq!(log.rejected, 0, "unexpected rejected lines: {:?}", log.messages());
    raw
}

pub fn generic_from_bedgraph(
    pool: &Arc<OperationPool>,
    genome: &Arc<ChromosomeSet>,
    text: &str,
) -> ScwList {
    let raw = extract(text, genome);
    ScwListFactory::generic(&context(pool), &raw, ScorePrecision::Bit64, ScoreOperation::Addition)
        .expect("list builds")
        .expect("not stopped")
}

pub fn bins_from_bedgraph(
    pool: &Arc<OperationPool>,
    genome: &Arc<ChromosomeSet>,
    text: &str,
    bin_size: u32,
) -> BinList {
    let raw = extract(text, genome);
    ScwListFactory::bins(
        &context(pool),
        &raw,
        bin_size,
        ScoreOperation::Average,
        ScorePrecision::Bit64,
    )
    .expect("bin list builds")
    .expect("not stopped")
}

/// Deterministic pseudo-random bedGraph covering every chromosome of
/// [`genome`].
pub fn synthetic_bedgraph(seed: u64, records_per_chromosome: usize) -> String {
    let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
    let mut next = move |bound: u64| {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) % bound
    };
    let mut text = String::new();
    for (name, length) in [("chr1", 1_000u64), ("chr2", 1_000), ("chrM", 500)] {
        let mut position = 0;
        for _ in 0..records_per_chromosome {
            let start = position + next(20);
            let stop = start + 1 + next(30);
            if stop > length {
                break;
            }
            let score = (next(200) as f64 - 50.0) / 4.0;
            text.push_str(&format!("{name}\t{start}\t{stop}\t{score}\n"));
            position = stop;
        }
    }
    text
}
