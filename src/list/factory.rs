use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{BinList, Exon, Gene, GeneList, RepeatFamily, RepeatFamilyList, ScwList, ScwListType};
use crate::flatten::{ChromosomeFlattener, FlattenMode};
use crate::framework::{OperationContext, OperationError};
use crate::genome::ChromosomeShardedList;
use crate::io::{RawChromosomeData, RawGenomicData};
use crate::view::{ListView, ListViewBuilder, MaskViewBuilder, ScwViewBuilder};
use crate::window::{ScoreOperation, ScorePrecision, ScoredWindow, Strand};

fn has_overlaps(data: &RawChromosomeData, order: &[usize]) -> bool {
    order
        .windows(2)
        .any(|pair| data.stop(pair[0]) > data.start(pair[1]))
}

fn flatten_chromosome(
    data: &RawChromosomeData,
    order: &[usize],
    mode: FlattenMode,
    operation: ScoreOperation,
    precision: ScorePrecision,
    chromosome_length: u32,
    context: &OperationContext,
) -> Result<ListView, OperationError> {
    let mut flattener = ChromosomeFlattener::new(mode, operation, precision, chromosome_length)?;
    for &index in order.iter().take_while(|_| !context.is_stopped()) {
        flattener.add_window(&ScoredWindow::new(
            data.start(index),
            data.stop(index),
            data.score(index),
        ))?;
    }
    Ok(flattener.finish()?)
}

/// Converts extracted records into interval, mask or bin lists.
#[derive(Debug, Clone, Copy)]
pub struct ScwListFactory;

impl ScwListFactory {
    /// Generic list; overlapping records of a chromosome are flattened with
    /// `overlap_operation`.
    pub fn generic(
        context: &OperationContext,
        raw: &RawGenomicData,
        precision: ScorePrecision,
        overlap_operation: ScoreOperation,
    ) -> Result<Option<ScwList>, OperationError> {
        let chromosomes = raw.chromosomes();
        let shards = context.map_shards(raw.shards(), |chromosome, data| {
            let order = data.sorted_order();
            if has_overlaps(data, &order) {
                debug!(chromosome, "flattening overlapping records");
                return flatten_chromosome(
                    data,
                    &order,
                    FlattenMode::Variable,
                    overlap_operation,
                    precision,
                    chromosomes.length(chromosome),
                    context,
                );
            }
            let mut builder = ScwViewBuilder::new(precision);
            for &index in order.iter().take_while(|_| !context.is_stopped()) {
                builder.add_element(data.start(index), data.stop(index), data.score(index))?;
            }
            Ok(builder.build())
        })?;
        let Some(shards) = shards else {
            return Ok(None);
        };
        Ok(Some(ScwList::new(
            Arc::clone(chromosomes),
            shards,
            ScwListType::Generic,
            precision,
        )?))
    }

    /// Mask list; scores are ignored and touching records fused.
    pub fn mask(
        context: &OperationContext,
        raw: &RawGenomicData,
    ) -> Result<Option<ScwList>, OperationError> {
        let shards = context.map_shards(raw.shards(), |_, data| {
            let mut builder = MaskViewBuilder::new();
            for index in data
                .sorted_order()
                .into_iter()
                .take_while(|_| !context.is_stopped())
            {
                builder.add_element(data.start(index), data.stop(index), 1.0)?;
            }
            Ok(builder.build())
        })?;
        let Some(shards) = shards else {
            return Ok(None);
        };
        Ok(Some(ScwList::new(
            Arc::clone(raw.chromosomes()),
            shards,
            ScwListType::Mask,
            ScorePrecision::default(),
        )?))
    }

    /// Bin list of `bin_size` bases aggregating overlapping records with
    /// `operation`.
    pub fn bins(
        context: &OperationContext,
        raw: &RawGenomicData,
        bin_size: u32,
        operation: ScoreOperation,
        precision: ScorePrecision,
    ) -> Result<Option<BinList>, OperationError> {
        if bin_size == 0 {
            return Err(OperationError::invalid_argument("bin size must be > 0"));
        }
        let chromosomes = raw.chromosomes();
        let shards = context.map_shards(raw.shards(), |chromosome, data| {
            flatten_chromosome(
                data,
                &data.sorted_order(),
                FlattenMode::Bins { bin_size },
                operation,
                precision,
                chromosomes.length(chromosome),
                context,
            )
        })?;
        let Some(shards) = shards else {
            return Ok(None);
        };
        Ok(Some(BinList::new(
            Arc::clone(chromosomes),
            bin_size,
            precision,
            shards,
        )?))
    }
}

/// Converts extracted records into a [`GeneList`].
#[derive(Debug, Clone, Copy)]
pub struct GeneListFactory;

impl GeneListFactory {
    /// Build genes sorted by start. Records without a name are named after
    /// their position; records without exons get a single exon spanning the
    /// gene.
    pub fn build(
        context: &OperationContext,
        raw: &RawGenomicData,
    ) -> Result<Option<GeneList>, OperationError> {
        let chromosomes = raw.chromosomes();
        let shards = context.map_shards(raw.shards(), |chromosome, data| {
            let name = chromosomes
                .get(chromosome)
                .map(|c| c.name())
                .unwrap_or_default();
            let genes: Vec<Gene> = data
                .sorted_order()
                .into_iter()
                .take_while(|_| !context.is_stopped())
                .map(|index| {
                    let (start, stop) = (data.start(index), data.stop(index));
                    let mut exons = data.exons(index).map(<[Exon]>::to_vec).unwrap_or_else(|| {
                        vec![Exon {
                            start,
                            stop,
                            score: None,
                        }]
                    });
                    exons.sort_by_key(|exon| exon.start);
                    Gene {
                        name: data
                            .name(index)
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("{name}:{start}-{stop}")),
                        strand: data.strand(index).unwrap_or(Strand::Plus),
                        start,
                        stop,
                        score: data.has_score(index).then(|| data.score(index)),
                        exons,
                    }
                })
                .collect();
            Ok(Arc::<[Gene]>::from(genes))
        })?;
        let Some(shards) = shards else {
            return Ok(None);
        };
        Ok(Some(GeneList::new(Arc::clone(chromosomes), shards)?))
    }
}

/// Converts extracted records into a [`RepeatFamilyList`], one family per
/// distinct record name.
#[derive(Debug, Clone, Copy)]
pub struct RepeatFamilyListFactory;

impl RepeatFamilyListFactory {
    /// Name given to records without a name.
    pub const UNNAMED_FAMILY: &'static str = "unnamed";

    /// Group records by family name.
    pub fn build(
        context: &OperationContext,
        raw: &RawGenomicData,
    ) -> Result<Option<RepeatFamilyList>, OperationError> {
        let per_chromosome = context.map_shards(raw.shards(), |_, data| {
            let mut families: BTreeMap<String, MaskViewBuilder> = BTreeMap::new();
            for index in data
                .sorted_order()
                .into_iter()
                .take_while(|_| !context.is_stopped())
            {
                let name = data.name(index).unwrap_or(Self::UNNAMED_FAMILY);
                families
                    .entry(name.to_string())
                    .or_default()
                    .add_element(data.start(index), data.stop(index), 1.0)?;
            }
            Ok(families
                .into_iter()
                .map(|(name, builder)| (name, builder.build()))
                .collect::<Vec<_>>())
        })?;
        let Some(per_chromosome) = per_chromosome else {
            return Ok(None);
        };

        let chromosome_count = raw.chromosomes().len();
        let mut families: BTreeMap<String, ChromosomeShardedList<ListView>> = BTreeMap::new();
        for (chromosome, views) in per_chromosome.present() {
            for (name, view) in views {
                families
                    .entry(name.clone())
                    .or_insert_with(|| ChromosomeShardedList::new(chromosome_count))
                    .set(chromosome, view.clone());
            }
        }
        let families = families
            .into_iter()
            .map(|(name, windows)| RepeatFamily::new(name, windows))
            .collect();
        Ok(Some(RepeatFamilyList::new(
            Arc::clone(raw.chromosomes()),
            families,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::OperationPool;
    use crate::genome::ChromosomeSet;
    use crate::io::RawRecord;

    fn context() -> OperationContext {
        OperationContext::new(&Arc::new(OperationPool::new(Some(2)).unwrap()))
    }

    fn raw(records: &[(usize, u32, u32, f64)]) -> RawGenomicData {
        let genome = Arc::new(ChromosomeSet::new([("chr1", 1_000), ("chr2", 1_000)]).unwrap());
        let mut raw = RawGenomicData::new(genome);
        for &(chromosome, start, stop, score) in records {
            raw.push(chromosome, RawRecord::scored(start, stop, score)).unwrap();
        }
        raw
    }

    #[test]
    fn generic_lists_are_sorted_and_flattened() {
        let data = raw(&[(0, 50, 60, 1.0), (0, 0, 10, 2.0), (0, 5, 15, 3.0)]);
        let list = ScwListFactory::generic(&context(), &data, ScorePrecision::Bit64, ScoreOperation::Addition)
            .unwrap()
            .unwrap();
        let windows = list.get(0).unwrap().to_vec();
        assert_eq!(
            windows,
            vec![
                ScoredWindow::new(0, 5, 2.0),
                ScoredWindow::new(5, 10, 5.0),
                ScoredWindow::new(10, 15, 3.0),
                ScoredWindow::new(50, 60, 1.0),
            ]
        );
        assert!(list.get(1).is_none());
    }

    #[test]
    fn bin_lists_cover_each_chromosome() {
        let data = raw(&[(1, 0, 150, 2.0)]);
        let list = ScwListFactory::bins(&context(), &data, 100, ScoreOperation::Average, ScorePrecision::Bit32)
            .unwrap()
            .unwrap();
        let view = list.get(1).unwrap();
        assert_eq!(view.len(), 10);
        assert_eq!(view.score(0), Some(2.0));
        assert_eq!(view.score(1), Some(2.0));
        assert_eq!(view.score(2), Some(0.0));
    }

    #[test]
    fn repeat_families_group_by_name() {
        let genome = Arc::new(ChromosomeSet::new([("chr1", 1_000)]).unwrap());
        let mut data = RawGenomicData::new(genome);
        for (start, name) in [(0, "LINE"), (100, "SINE"), (200, "LINE")] {
            let record = RawRecord {
                start,
                stop: start + 50,
                name: Some(name.to_string()),
                ..RawRecord::default()
            };
            data.push(0, record).unwrap();
        }
        let list = RepeatFamilyListFactory::build(&context(), &data).unwrap().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.family("LINE").map(RepeatFamily::repeat_count), Some(2));
        assert!(list.family("LTR").is_none());
    }

    #[test]
    fn genes_default_to_one_exon() {
        let data = raw(&[(0, 100, 200, 1.0)]);
        let genes = GeneListFactory::build(&context(), &data).unwrap().unwrap();
        let gene = &genes.get(0).unwrap()[0];
        assert_eq!(gene.name, "chr1:100-200");
        assert_eq!(gene.exons.len(), 1);
        assert_eq!(genes.overlapping(0, 150, 160).count(), 1);
    }
}
