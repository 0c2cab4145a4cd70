use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ExtractionError, Extractor};
use crate::genome::{ChromosomeSet, ChromosomeShardedList, PositionMapper};
use crate::list::Exon;
use crate::view::ViewError;
use crate::window::Strand;

const MAX_LOGGED_REJECTS: usize = 100;

/// One accepted record, already validated and remapped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawRecord {
    /// 0-based start.
    pub start: u32,
    /// Exclusive stop.
    pub stop: u32,
    /// Score, `None` when the file has none.
    pub score: Option<f64>,
    /// Strand, when known.
    pub strand: Option<Strand>,
    /// Feature name.
    pub name: Option<String>,
    /// Exon structure.
    pub exons: Option<Vec<Exon>>,
}

impl RawRecord {
    /// Record holding only an interval and a score.
    pub fn scored(start: u32, stop: u32, score: f64) -> Self {
        Self {
            start,
            stop,
            score: Some(score),
            ..Self::default()
        }
    }
}

/// Parallel columns of the records extracted for one chromosome, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawChromosomeData {
    starts: Vec<u32>,
    stops: Vec<u32>,
    scores: Vec<Option<f64>>,
    strands: Vec<Option<Strand>>,
    names: Vec<Option<String>>,
    exons: Vec<Option<Vec<Exon>>>,
}

impl RawChromosomeData {
    fn push(&mut self, record: RawRecord) {
        self.starts.push(record.start);
        self.stops.push(record.stop);
        self.scores.push(record.score);
        self.strands.push(record.strand);
        self.names.push(record.name);
        self.exons.push(record.exons);
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Whether no record was extracted.
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    /// Start of record `index`.
    pub fn start(&self, index: usize) -> u32 {
        self.starts[index]
    }

    /// Stop of record `index`.
    pub fn stop(&self, index: usize) -> u32 {
        self.stops[index]
    }

    /// Score of record `index`; records without a score count as `1`.
    pub fn score(&self, index: usize) -> f64 {
        self.scores[index].unwrap_or(1.0)
    }

    /// Whether record `index` carried an explicit score.
    pub fn has_score(&self, index: usize) -> bool {
        self.scores[index].is_some()
    }

    /// Strand of record `index`.
    pub fn strand(&self, index: usize) -> Option<Strand> {
        self.strands[index]
    }

    /// Name of record `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names[index].as_deref()
    }

    /// Exons of record `index`.
    pub fn exons(&self, index: usize) -> Option<&[Exon]> {
        self.exons[index].as_deref()
    }

    /// Record indices sorted by start then stop; ties keep file order.
    pub fn sorted_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by_key(|&index| (self.starts[index], self.stops[index]));
        order
    }
}

/// What extraction does with a line it cannot accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationMode {
    /// Log the line in the [`ExtractionLog`] and continue.
    #[default]
    Lenient,
    /// Abort the extraction on the first rejected line.
    Strict,
}

/// Adjustments applied to every record during extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionOptions {
    strand: Option<Strand>,
    read_length: Option<u32>,
    shift: u32,
    validation: ValidationMode,
}

impl ExtractionOptions {
    /// Choose how rejected lines are handled.
    pub fn with_validation(mut self, validation: ValidationMode) -> Self {
        self.validation = validation;
        self
    }

    /// Keep only records of `strand`.
    pub fn with_strand(mut self, strand: Strand) -> Self {
        self.strand = Some(strand);
        self
    }

    /// Extend every read to `read_length` bases from its 5' end.
    pub fn with_read_length(mut self, read_length: u32) -> Self {
        self.read_length = Some(read_length);
        self
    }

    /// Shift every read `shift` bases towards its 3' end.
    pub fn with_shift(mut self, shift: u32) -> Self {
        self.shift = shift;
        self
    }

    fn keeps(&self, strand: Option<Strand>) -> bool {
        match self.strand {
            Some(wanted) => strand == Some(wanted),
            None => true,
        }
    }

    fn adjust(&self, start: u32, stop: u32, strand: Option<Strand>) -> (u32, u32) {
        match strand {
            Some(Strand::Minus) => {
                let stop = stop.saturating_sub(self.shift);
                let start = match self.read_length {
                    Some(length) => stop.saturating_sub(length),
                    None => start.saturating_sub(self.shift),
                };
                (start, stop)
            }
            _ => {
                let start = start.saturating_add(self.shift);
                let stop = match self.read_length {
                    Some(length) => start.saturating_add(length),
                    None => stop.saturating_add(self.shift),
                };
                (start, stop)
            }
        }
    }
}

/// Outcome of an extraction: accepted, filtered and rejected lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionLog {
    /// Records kept.
    pub accepted: usize,
    /// Records dropped by the strand filter.
    pub filtered: usize,
    /// Lines rejected because of an error.
    pub rejected: usize,
    messages: Vec<String>,
}

impl ExtractionLog {
    fn reject(&mut self, err: &ExtractionError) {
        self.rejected += 1;
        debug!(error = %err, "line rejected");
        if self.messages.len() < MAX_LOGGED_REJECTS {
            self.messages.push(err.to_string());
        }
    }

    /// First rejection messages, in line order.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

/// Records extracted from one file, sharded by chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGenomicData {
    chromosomes: Arc<ChromosomeSet>,
    shards: ChromosomeShardedList<RawChromosomeData>,
}

impl RawGenomicData {
    /// Empty container for `chromosomes`.
    pub fn new(chromosomes: Arc<ChromosomeSet>) -> Self {
        let shards = ChromosomeShardedList::new(chromosomes.len());
        Self {
            chromosomes,
            shards,
        }
    }

    /// Chromosome set the records are laid out on.
    pub fn chromosomes(&self) -> &Arc<ChromosomeSet> {
        &self.chromosomes
    }

    /// Per-chromosome columns; chromosomes without records are absent.
    pub fn shards(&self) -> &ChromosomeShardedList<RawChromosomeData> {
        &self.shards
    }

    /// Total number of records.
    pub fn record_count(&self) -> usize {
        self.shards.present().map(|(_, data)| data.len()).sum()
    }

    /// Append an already validated record to chromosome `chromosome`.
    pub fn push(&mut self, chromosome: usize, record: RawRecord) -> Result<(), ViewError> {
        let count = self.shards.len();
        let data = self
            .shards
            .get_or_insert_with(chromosome, RawChromosomeData::default)
            .ok_or(ViewError::UnknownChromosome {
                index: chromosome,
                count,
            })?;
        data.push(record);
        Ok(())
    }

    /// Drain `extractor`, validating, filtering and remapping every record.
    ///
    /// Per-line errors are recorded in the returned log and the line is
    /// skipped; only I/O failures abort the extraction, unless the options
    /// ask for [`ValidationMode::Strict`].
    pub fn extract<E>(
        extractor: &mut E,
        chromosomes: Arc<ChromosomeSet>,
        mapper: &dyn PositionMapper,
        options: &ExtractionOptions,
    ) -> Result<(Self, ExtractionLog), ExtractionError>
    where
        E: Extractor + ?Sized,
    {
        let mut data = Self::new(chromosomes);
        let mut log = ExtractionLog::default();
        let strict = options.validation == ValidationMode::Strict;
        loop {
            match extractor.advance() {
                Ok(false) => break,
                Ok(true) => {}
                Err(err) if strict || err.is_fatal() => return Err(err),
                Err(err) => {
                    log.reject(&err);
                    continue;
                }
            }
            match data.accept(&*extractor, mapper, options) {
                Ok(true) => log.accepted += 1,
                Ok(false) => log.filtered += 1,
                Err(err) if strict => return Err(err),
                Err(err) => log.reject(&err),
            }
        }
        info!(
            accepted = log.accepted,
            filtered = log.filtered,
            rejected = log.rejected,
            "extraction finished"
        );
        Ok((data, log))
    }

    fn accept<E>(
        &mut self,
        extractor: &E,
        mapper: &dyn PositionMapper,
        options: &ExtractionOptions,
    ) -> Result<bool, ExtractionError>
    where
        E: Extractor + ?Sized,
    {
        let line = extractor.line_number();
        let name = extractor.chromosome_name();
        let chromosome =
            self.chromosomes
                .index_of(name)
                .ok_or_else(|| ExtractionError::UnknownChromosome {
                    line,
                    name: name.to_string(),
                })?;

        let strand = extractor.as_strand_reader().and_then(|r| r.strand());
        if !options.keeps(strand) {
            return Ok(false);
        }

        let (start, stop) = (extractor.start(), extractor.stop());
        if stop <= start {
            return Err(ExtractionError::InvalidInterval { line, start, stop });
        }
        let (start, stop) = options.adjust(start, stop, strand);
        let start = mapper.map(chromosome, start);
        let stop = mapper.map(chromosome, stop);
        let length = self.chromosomes.length(chromosome);
        if stop > length {
            return Err(ExtractionError::OutOfBounds {
                line,
                position: stop,
                length,
            });
        }
        if stop <= start {
            return Err(ExtractionError::InvalidInterval { line, start, stop });
        }

        let exons = extractor.as_exon_reader().and_then(|r| r.exons()).map(|exons| {
            exons
                .iter()
                .map(|exon| Exon {
                    start: mapper.map(chromosome, exon.start),
                    stop: mapper.map(chromosome, exon.stop),
                    score: exon.score,
                })
                .collect()
        });
        let record = RawRecord {
            start,
            stop,
            score: extractor.as_score_reader().and_then(|r| r.score()),
            strand,
            name: extractor
                .as_name_reader()
                .and_then(|r| r.name())
                .map(str::to_string),
            exons,
        };
        self.push(chromosome, record)
            .map_err(|err| ExtractionError::Format {
                line,
                reason: err.to_string(),
            })?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_extension_follows_the_strand() {
        let options = ExtractionOptions::default().with_read_length(50);
        assert_eq!(options.adjust(100, 120, Some(Strand::Plus)), (100, 150));
        assert_eq!(options.adjust(100, 120, Some(Strand::Minus)), (70, 120));
        let shifted = ExtractionOptions::default().with_shift(10);
        assert_eq!(shifted.adjust(100, 120, None), (110, 130));
        assert_eq!(shifted.adjust(100, 120, Some(Strand::Minus)), (90, 110));
    }

    #[test]
    fn strict_validation_stops_at_the_first_bad_line() {
        use crate::genome::IdentityMapper;
        use crate::io::{BedFormat, BedReader};
        use std::io::Cursor;

        let chromosomes = Arc::new(ChromosomeSet::new([("chr1", 1_000)]).unwrap());
        let input = "chr1\t0\t10\t1\nchrX\t0\t10\t2\nchr1\t20\t30\t3\n";

        let mut reader = BedReader::new(Cursor::new(input), BedFormat::BedGraph);
        let (data, log) = RawGenomicData::extract(
            &mut reader,
            Arc::clone(&chromosomes),
            &IdentityMapper,
            &ExtractionOptions::default(),
        )
        .unwrap();
        assert_eq!((log.accepted, log.rejected), (2, 1));
        assert_eq!(data.record_count(), 2);

        let mut reader = BedReader::new(Cursor::new(input), BedFormat::BedGraph);
        let strict = ExtractionOptions::default().with_validation(ValidationMode::Strict);
        let result = RawGenomicData::extract(&mut reader, chromosomes, &IdentityMapper, &strict);
        assert!(matches!(
            result,
            Err(ExtractionError::UnknownChromosome { line: 2, .. })
        ));
    }

    #[test]
    fn sorted_order_is_stable() {
        let chromosomes = Arc::new(ChromosomeSet::new([("chr1", 1_000)]).unwrap());
        let mut data = RawGenomicData::new(chromosomes);
        data.push(0, RawRecord::scored(50, 60, 1.0)).unwrap();
        data.push(0, RawRecord::scored(10, 20, 2.0)).unwrap();
        data.push(0, RawRecord::scored(10, 20, 3.0)).unwrap();
        assert!(data.push(3, RawRecord::scored(0, 1, 1.0)).is_err());
        let shard = data.shards().get(0).unwrap();
        assert_eq!(shard.sorted_order(), vec![1, 2, 0]);
        assert_eq!(data.record_count(), 3);
    }
}
