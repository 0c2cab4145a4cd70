use std::io::BufRead;
use std::str::FromStr;

use super::{
    ExonReader, ExtractionError, Extractor, IntervalReader, NameReader, ScoreReader, StrandReader,
};
use crate::list::Exon;
use crate::window::Strand;

/// Column layout of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedFormat {
    /// BED3 to BED12: name, score, strand and blocks are optional.
    Bed,
    /// bedGraph: chromosome, start, stop, score.
    BedGraph,
}

/// Streaming BED / bedGraph parser.
///
/// Header lines (`track`, `browser`, `#`) and blank lines are skipped.
#[derive(Debug)]
pub struct BedReader<R> {
    reader: R,
    format: BedFormat,
    buffer: String,
    line_number: usize,
    chromosome: String,
    start: u32,
    stop: u32,
    score: Option<f64>,
    strand: Option<Strand>,
    name: Option<String>,
    exons: Option<Vec<Exon>>,
}

impl<R: BufRead> BedReader<R> {
    /// Parser over `reader`.
    pub fn new(reader: R, format: BedFormat) -> Self {
        Self {
            reader,
            format,
            buffer: String::new(),
            line_number: 0,
            chromosome: String::new(),
            start: 0,
            stop: 0,
            score: None,
            strand: None,
            name: None,
            exons: None,
        }
    }

    fn parse_line(&mut self, line: &str) -> Result<(), String> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(format!("expected at least 3 columns, found {}", fields.len()));
        }
        self.chromosome.clear();
        self.chromosome.push_str(fields[0]);
        self.start = parse_field(&fields, 1, "start")?;
        self.stop = parse_field(&fields, 2, "stop")?;
        self.score = None;
        self.strand = None;
        self.name = None;
        self.exons = None;

        match self.format {
            BedFormat::BedGraph => {
                if fields.len() < 4 {
                    return Err("bedGraph line without score".to_string());
                }
                self.score = Some(parse_field(&fields, 3, "score")?);
            }
            BedFormat::Bed => {
                self.name = optional(&fields, 3).map(str::to_string);
                if optional(&fields, 4).is_some() {
                    self.score = Some(parse_field(&fields, 4, "score")?);
                }
                if let Some(strand) = optional(&fields, 5) {
                    self.strand = Some(
                        strand
                            .parse::<Strand>()
                            .map_err(|err| err.to_string())?,
                    );
                }
                if fields.len() >= 12 {
                    self.exons = Some(self.parse_blocks(&fields)?);
                }
            }
        }
        Ok(())
    }

    fn parse_blocks(&self, fields: &[&str]) -> Result<Vec<Exon>, String> {
        let count: usize = parse_field(fields, 9, "block count")?;
        let sizes = parse_list(fields[10], "block sizes")?;
        let starts = parse_list(fields[11], "block starts")?;
        if sizes.len() < count || starts.len() < count {
            return Err(format!("expected {count} blocks"));
        }
        Ok(starts
            .iter()
            .zip(&sizes)
            .take(count)
            .map(|(&offset, &size)| Exon {
                start: self.start.saturating_add(offset),
                stop: self.start.saturating_add(offset).saturating_add(size),
                score: None,
            })
            .collect())
    }
}

fn optional<'a>(fields: &[&'a str], index: usize) -> Option<&'a str> {
    fields.get(index).copied().filter(|field| *field != ".")
}

fn parse_field<T: FromStr>(fields: &[&str], index: usize, what: &str) -> Result<T, String> {
    let raw = fields
        .get(index)
        .ok_or_else(|| format!("missing {what}"))?;
    raw.parse()
        .map_err(|_| format!("invalid {what} '{raw}'"))
}

fn parse_list(raw: &str, what: &str) -> Result<Vec<u32>, String> {
    raw.split(',')
        .filter(|item| !item.is_empty())
        .map(|item| item.parse().map_err(|_| format!("invalid {what} '{raw}'")))
        .collect()
}

impl<R: BufRead> IntervalReader for BedReader<R> {
    fn chromosome_name(&self) -> &str {
        &self.chromosome
    }

    fn start(&self) -> u32 {
        self.start
    }

    fn stop(&self) -> u32 {
        self.stop
    }
}

impl<R: BufRead> ScoreReader for BedReader<R> {
    fn score(&self) -> Option<f64> {
        self.score
    }
}

impl<R: BufRead> StrandReader for BedReader<R> {
    fn strand(&self) -> Option<Strand> {
        self.strand
    }
}

impl<R: BufRead> NameReader for BedReader<R> {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl<R: BufRead> ExonReader for BedReader<R> {
    fn exons(&self) -> Option<&[Exon]> {
        self.exons.as_deref()
    }
}

impl<R: BufRead> Extractor for BedReader<R> {
    fn advance(&mut self) -> Result<bool, ExtractionError> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(false);
            }
            self.line_number += 1;
            let line = std::mem::take(&mut self.buffer);
            let trimmed = line.trim();
            if trimmed.is_empty()
                || trimmed.starts_with('#')
                || trimmed.starts_with("track")
                || trimmed.starts_with("browser")
            {
                self.buffer = line;
                continue;
            }
            let parsed = self.parse_line(trimmed);
            self.buffer = line;
            return parsed
                .map(|()| true)
                .map_err(|reason| ExtractionError::Format {
                    line: self.line_number,
                    reason,
                });
        }
    }

    fn line_number(&self) -> usize {
        self.line_number
    }

    fn as_score_reader(&self) -> Option<&dyn ScoreReader> {
        Some(self)
    }

    fn as_strand_reader(&self) -> Option<&dyn StrandReader> {
        match self.format {
            BedFormat::Bed => Some(self),
            BedFormat::BedGraph => None,
        }
    }

    fn as_name_reader(&self) -> Option<&dyn NameReader> {
        match self.format {
            BedFormat::Bed => Some(self),
            BedFormat::BedGraph => None,
        }
    }

    fn as_exon_reader(&self) -> Option<&dyn ExonReader> {
        match self.format {
            BedFormat::Bed => Some(self),
            BedFormat::BedGraph => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn bed12_lines_expose_every_capability() {
        let input = "track name=test\nchr1\t100\t200\tgeneA\t5\t-\t100\t200\t0\t2\t10,20,\t0,80,\n";
        let mut reader = BedReader::new(Cursor::new(input), BedFormat::Bed);
        assert!(reader.advance().unwrap());
        assert_eq!(reader.line_number(), 2);
        assert_eq!(reader.chromosome_name(), "chr1");
        assert_eq!(reader.as_score_reader().and_then(|r| r.score()), Some(5.0));
        assert_eq!(reader.as_strand_reader().and_then(|r| r.strand()), Some(Strand::Minus));
        assert_eq!(reader.as_name_reader().and_then(|r| r.name()), Some("geneA"));
        let exons = reader.as_exon_reader().and_then(|r| r.exons()).unwrap();
        assert_eq!((exons[1].start, exons[1].stop), (180, 200));
        assert!(!reader.advance().unwrap());
    }

    #[test]
    fn malformed_lines_are_skippable() {
        let input = "chr1\tx\t10\t1\nchr1\t0\t10\t2.5\n";
        let mut reader = BedReader::new(Cursor::new(input), BedFormat::BedGraph);
        assert!(matches!(
            reader.advance(),
            Err(ExtractionError::Format { line: 1, .. })
        ));
        assert!(reader.advance().unwrap());
        assert_eq!(reader.as_score_reader().and_then(|r| r.score()), Some(2.5));
        assert!(reader.as_strand_reader().is_none());
    }
}
