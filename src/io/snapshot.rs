//! Gzip-compressed bin list snapshots.
//!
//! The blob is `gzip(json(snapshot))` where the snapshot stores the bin size,
//! the score precision, the chromosome layout it was taken on and one score
//! column per chromosome. Cached statistics are never stored: they are
//! recomputed by the loaded list.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::genome::{ChromosomeSelection, ChromosomeSet, ChromosomeShardedList, GenomeError};
use crate::list::BinList;
use crate::view::{ListView, ScoreArray};
use crate::window::ScorePrecision;

const SNAPSHOT_VERSION: u32 = 1;

/// Errors raised while saving or loading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Reading or writing the blob failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The blob is not a valid snapshot document.
    #[error("snapshot (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The snapshot was written by an incompatible version.
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    /// The snapshot was taken on another chromosome layout.
    #[error("snapshot genome mismatch: {0}")]
    GenomeMismatch(String),

    /// The restored list could not be assembled.
    #[error(transparent)]
    Genome(#[from] GenomeError),
}

#[derive(Debug, Serialize, Deserialize)]
struct BinListSnapshot {
    version: u32,
    bin_size: u32,
    precision: ScorePrecision,
    chromosomes: Vec<(String, u32)>,
    scores: Vec<Option<ScoreArray>>,
}

/// Serialize `list` into `writer`.
pub fn save<W: Write>(list: &BinList, writer: W) -> Result<(), SnapshotError> {
    let snapshot = BinListSnapshot {
        version: SNAPSHOT_VERSION,
        bin_size: list.bin_size(),
        precision: list.precision(),
        chromosomes: list
            .chromosomes()
            .iter()
            .map(|c| (c.name().to_string(), c.length()))
            .collect(),
        scores: list
            .shards()
            .iter()
            .map(|(_, view)| view.and_then(ListView::bin_scores).cloned())
            .collect(),
    };
    let mut encoder = GzEncoder::new(writer, Compression::default());
    serde_json::to_writer(&mut encoder, &snapshot)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Restore a list from `reader`.
///
/// Chromosomes outside `selection` are left absent; statistics are
/// recomputed from the restored scores.
pub fn load<R: Read>(
    reader: R,
    chromosomes: &Arc<ChromosomeSet>,
    selection: &ChromosomeSelection,
) -> Result<BinList, SnapshotError> {
    let snapshot: BinListSnapshot = serde_json::from_reader(GzDecoder::new(reader))?;
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version));
    }
    check_layout(&snapshot, chromosomes)?;
    if selection.len() != chromosomes.len() {
        return Err(SnapshotError::GenomeMismatch(format!(
            "selection covers {} chromosomes, genome has {}",
            selection.len(),
            chromosomes.len()
        )));
    }

    let bin_size = snapshot.bin_size;
    let precision = snapshot.precision;
    let shards = snapshot
        .scores
        .into_iter()
        .enumerate()
        .map(|(index, scores)| {
            scores
                .filter(|_| selection.is_selected(index))
                .map(|scores| ListView::from_bin_scores(bin_size, scores.convert(precision)))
        })
        .collect();
    let list = BinList::new(
        Arc::clone(chromosomes),
        bin_size,
        precision,
        ChromosomeShardedList::from_shards(shards),
    )?;
    info!(
        bin_size,
        precision = %precision,
        selected = selection.count(),
        "bin list snapshot restored"
    );
    Ok(list)
}

fn check_layout(snapshot: &BinListSnapshot, chromosomes: &ChromosomeSet) -> Result<(), SnapshotError> {
    if snapshot.chromosomes.len() != chromosomes.len()
        || snapshot.scores.len() != chromosomes.len()
    {
        return Err(SnapshotError::GenomeMismatch(format!(
            "snapshot has {} chromosomes, genome has {}",
            snapshot.chromosomes.len(),
            chromosomes.len()
        )));
    }
    for ((name, length), chromosome) in snapshot.chromosomes.iter().zip(chromosomes.iter()) {
        if name != chromosome.name() || *length != chromosome.length() {
            return Err(SnapshotError::GenomeMismatch(format!(
                "expected {}:{}, found {name}:{length}",
                chromosome.name(),
                chromosome.length()
            )));
        }
    }
    Ok(())
}

/// Save `list` to the file at `path`.
pub fn save_to_path(list: &BinList, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
    let file = File::create(path)?;
    save(list, BufWriter::new(file))
}

/// Load a list from the file at `path`.
pub fn load_from_path(
    path: impl AsRef<Path>,
    chromosomes: &Arc<ChromosomeSet>,
    selection: &ChromosomeSelection,
) -> Result<BinList, SnapshotError> {
    let file = File::open(path)?;
    load(BufReader::new(file), chromosomes, selection)
}
