use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use trackengine::io::{snapshot, write_bedgraph, BedFormat, BedReader, RawGenomicData, ValidationMode};
use trackengine::list::ScwListFactory;
use trackengine::operation::{
    CleanList, ComputeStats, FilterThreshold, FindIslands, Gauss, IslandResult, IslandScore,
    IslandThreshold, Loess, Log, LogBase, LogOnAverageWithDamper, MergeWindows, MovingAverage,
    Operation, Transfrag,
};
use trackengine::{
    BinList, ChromosomeSelection, ChromosomeSet, EngineConfig, IdentityMapper, OperationContext,
    ScoreOperation, ScorePrecision, ScwList, ScwListBuilder, ScwListType,
};

#[derive(Parser, Debug)]
#[command(name = "trackengine", about = "Parallel transformations of genome-wide score tracks")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalArgs {
    /// Chromosome sizes file (`<name>\t<length>` per line).
    #[arg(long, short = 'g', global = true)]
    genome: Option<PathBuf>,
    /// Worker threads (default: TRACKENGINE_THREADS or the CPU count).
    #[arg(long, global = true)]
    threads: Option<usize>,
    /// Score storage precision (8, 16, 32 or 64).
    #[arg(long, global = true)]
    precision: Option<ScorePrecision>,
    /// Abort on the first malformed input line instead of skipping it.
    #[arg(long, global = true)]
    strict: bool,
    /// Log filter used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "info")]
    log: String,
}

#[derive(Args, Debug)]
struct TrackArgs {
    /// Input track (BED or bedGraph).
    input: PathBuf,
    /// Input format.
    #[arg(long, value_enum, default_value_t = InputFormat::BedGraph)]
    format: InputFormat,
    /// Output bedGraph file (default: stdout).
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BinArgs {
    /// Bin width in bases.
    #[arg(long, default_value_t = 100)]
    bin_size: u32,
    /// Aggregation of the records overlapping a bin.
    #[arg(long, default_value = "average")]
    operation: ScoreOperation,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum InputFormat {
    Bed,
    BedGraph,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SmoothingMethod {
    MovingAverage,
    Gauss,
    Loess,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum IslandScoreArg {
    Average,
    Sum,
    Maximum,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print genome-wide and per-chromosome statistics as JSON.
    Stats {
        #[command(flatten)]
        track: TrackArgs,
    },
    /// Keep scores within [low, high].
    Filter {
        #[command(flatten)]
        track: TrackArgs,
        /// Lower bound.
        #[arg(long, default_value_t = f64::NEG_INFINITY, allow_hyphen_values = true)]
        low: f64,
        /// Upper bound.
        #[arg(long, default_value_t = f64::INFINITY, allow_hyphen_values = true)]
        high: f64,
        /// Clamp out-of-range scores instead of dropping them.
        #[arg(long)]
        saturate: bool,
    },
    /// Merge overlapping records (summing their scores).
    Clean {
        #[command(flatten)]
        track: TrackArgs,
        /// Keep the score of the first record of each run instead of the sum.
        #[arg(long)]
        keep_first: bool,
    },
    /// Re-bucket a track into fixed bins.
    Bin {
        #[command(flatten)]
        track: TrackArgs,
        #[command(flatten)]
        bins: BinArgs,
    },
    /// Replace islands of data with a single scored region.
    Transfrag {
        #[command(flatten)]
        track: TrackArgs,
        /// Null bases (or bins with --bin-size) tolerated inside an island.
        #[arg(long, default_value_t = 0)]
        gap: u32,
        /// Island summary.
        #[arg(long, value_enum, default_value_t = IslandScoreArg::Average)]
        score: IslandScoreArg,
        /// Work on bins of this width.
        #[arg(long)]
        bin_size: Option<u32>,
    },
    /// Call islands enriched over a Poisson background.
    Islands {
        #[command(flatten)]
        track: TrackArgs,
        #[command(flatten)]
        bins: BinArgs,
        /// Bin p-value threshold.
        #[arg(long, conflicts_with = "read_count")]
        p_value: Option<f64>,
        /// Bin read-count threshold.
        #[arg(long)]
        read_count: Option<f64>,
        /// Ineligible bins tolerated inside an island.
        #[arg(long, default_value_t = 0)]
        gap: u32,
        /// Minimum island length in bins.
        #[arg(long, default_value_t = 1)]
        min_length: u32,
        /// Minimum island score.
        #[arg(long, default_value_t = 0.0)]
        min_score: f64,
        /// Write island scores instead of the original bin scores.
        #[arg(long)]
        island_score: bool,
    },
    /// Smooth a track.
    Smooth {
        #[command(flatten)]
        track: TrackArgs,
        /// Kernel.
        #[arg(long, value_enum, default_value_t = SmoothingMethod::MovingAverage)]
        method: SmoothingMethod,
        /// Half width (sigma for the gaussian kernel) in bases.
        #[arg(long, default_value_t = 500)]
        width: u32,
        /// Also give a value to bins without data.
        #[arg(long)]
        fill_null: bool,
        /// Work on bins of this width.
        #[arg(long)]
        bin_size: Option<u32>,
    },
    /// Log-transform the scores.
    Log {
        #[command(flatten)]
        track: TrackArgs,
        /// Logarithm base (e, 2, 10 or any positive number).
        #[arg(long, default_value = "2")]
        base: LogBase,
        /// Compute log((score + damper) / (average + damper)) instead.
        #[arg(long)]
        damper: Option<f64>,
    },
    /// Bin a track and save it as a gzip snapshot.
    Snapshot {
        #[command(flatten)]
        track: TrackArgs,
        #[command(flatten)]
        bins: BinArgs,
        /// Snapshot file to write.
        #[arg(long)]
        snapshot: PathBuf,
    },
    /// Load a snapshot and write it as bedGraph.
    Restore {
        /// Snapshot file.
        snapshot: PathBuf,
        /// Chromosomes to load (default: all).
        #[arg(long, value_delimiter = ',')]
        chromosomes: Vec<String>,
        /// Output bedGraph file (default: stdout).
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

/// Everything a command needs: the genome, the pool and the settings.
struct Session {
    genome: Arc<ChromosomeSet>,
    config: EngineConfig,
    pool: Arc<trackengine::OperationPool>,
}

impl Session {
    fn context(&self) -> OperationContext {
        OperationContext::new(&self.pool)
    }

    fn extract(&self, track: &TrackArgs) -> Result<RawGenomicData> {
        let file = File::open(&track.input)
            .with_context(|| format!("failed to open track {}", track.input.display()))?;
        let format = match track.format {
            InputFormat::Bed => BedFormat::Bed,
            InputFormat::BedGraph => BedFormat::BedGraph,
        };
        let mut reader = BedReader::new(BufReader::new(file), format);
        let (raw, log) = RawGenomicData::extract(
            &mut reader,
            Arc::clone(&self.genome),
            &IdentityMapper,
            &self.config.extraction_options(),
        )
        .with_context(|| format!("failed to extract {}", track.input.display()))?;
        if log.rejected > 0 {
            warn!(rejected = log.rejected, "some lines were rejected");
            for message in log.messages() {
                warn!("{message}");
            }
        }
        Ok(raw)
    }

    fn generic_list(&self, track: &TrackArgs) -> Result<ScwList> {
        let raw = self.extract(track)?;
        ScwListFactory::generic(&self.context(), &raw, self.config.precision, ScoreOperation::Addition)?
            .ok_or_else(|| anyhow!("list creation was stopped"))
    }

    fn bin_list(&self, track: &TrackArgs, bin_size: u32, operation: ScoreOperation) -> Result<BinList> {
        let raw = self.extract(track)?;
        ScwListFactory::bins(&self.context(), &raw, bin_size, operation, self.config.precision)?
            .ok_or_else(|| anyhow!("bin list creation was stopped"))
    }

    /// Records as they are, overlaps included.
    fn overlapping_list(&self, track: &TrackArgs) -> Result<ScwList> {
        let raw = self.extract(track)?;
        let mut builder =
            ScwListBuilder::new(Arc::clone(&self.genome), ScwListType::Generic, self.config.precision)
                .allowing_overlaps();
        for (chromosome, data) in raw.shards().present() {
            for index in data.sorted_order() {
                builder.add(chromosome, data.start(index), data.stop(index), data.score(index))?;
            }
        }
        Ok(builder.build()?)
    }

    fn list(&self, track: &TrackArgs, bin_size: Option<u32>) -> Result<ScwList> {
        match bin_size {
            Some(bin_size) => Ok(self.bin_list(track, bin_size, ScoreOperation::Average)?.into()),
            None => self.generic_list(track),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.global.log);

    let mut config = EngineConfig::from_env()?
        .with_log_filter(cli.global.log.clone())
        .with_validation(if cli.global.strict {
            ValidationMode::Strict
        } else {
            ValidationMode::Lenient
        });
    if let Some(threads) = cli.global.threads {
        config = config.with_threads(threads);
    }
    if let Some(precision) = cli.global.precision {
        config = config.with_precision(precision);
    }

    let genome_path = cli
        .global
        .genome
        .as_deref()
        .ok_or_else(|| anyhow!("a chromosome sizes file is required (--genome)"))?;
    let genome = Arc::new(load_genome(genome_path)?);
    let pool = config.build_pool().context("failed to start the operation pool")?;
    info!(chromosomes = genome.len(), threads = config.threads, "session ready");
    let session = Session {
        genome,
        config,
        pool,
    };

    match cli.command {
        Commands::Stats { track } => run_stats(&session, &track)?,
        Commands::Filter {
            track,
            low,
            high,
            saturate,
        } => {
            let list = session.generic_list(&track)?;
            let filtered =
                compute(FilterThreshold::new(session.context(), &list, low, high, saturate))?;
            emit(&filtered, track.output.as_deref(), "filtered")?;
        }
        Commands::Clean { track, keep_first } => {
            let list = session.overlapping_list(&track)?;
            let cleaned = if keep_first {
                compute(MergeWindows::new(session.context(), &list))?
            } else {
                compute(CleanList::new(session.context(), &list))?
            };
            emit(&cleaned, track.output.as_deref(), "cleaned")?;
        }
        Commands::Bin { track, bins } => {
            let list = session.bin_list(&track, bins.bin_size, bins.operation)?;
            emit(&list, track.output.as_deref(), "binned")?;
        }
        Commands::Transfrag {
            track,
            gap,
            score,
            bin_size,
        } => {
            let list = session.list(&track, bin_size)?;
            let score = match score {
                IslandScoreArg::Average => IslandScore::Average,
                IslandScoreArg::Sum => IslandScore::Sum,
                IslandScoreArg::Maximum => IslandScore::Maximum,
            };
            let islands = compute(Transfrag::new(session.context(), &list, gap, score))?;
            emit(&islands, track.output.as_deref(), "transfrag")?;
        }
        Commands::Islands {
            track,
            bins,
            p_value,
            read_count,
            gap,
            min_length,
            min_score,
            island_score,
        } => {
            let threshold = match (p_value, read_count) {
                (Some(p), _) => IslandThreshold::PValue(p),
                (None, Some(count)) => IslandThreshold::ReadCount(count),
                (None, None) => bail!("either --p-value or --read-count is required"),
            };
            let list = session.bin_list(&track, bins.bin_size, bins.operation)?;
            let result = if island_score {
                IslandResult::IslandScore
            } else {
                IslandResult::Filtered
            };
            let islands = compute(
                FindIslands::new(session.context(), &list, threshold)
                    .with_gap(gap)
                    .with_min_length(min_length)
                    .with_min_score(min_score)
                    .with_result(result),
            )?;
            emit(&islands, track.output.as_deref(), "islands")?;
        }
        Commands::Smooth {
            track,
            method,
            width,
            fill_null,
            bin_size,
        } => {
            let list = session.list(&track, bin_size)?;
            let context = session.context();
            let smoothed = match method {
                SmoothingMethod::MovingAverage => {
                    compute(MovingAverage::new(context, &list, width, fill_null))?
                }
                SmoothingMethod::Gauss => {
                    compute(Gauss::new(context, &list, f64::from(width), fill_null))?
                }
                SmoothingMethod::Loess => compute(Loess::new(context, &list, width, fill_null))?,
            };
            emit(&smoothed, track.output.as_deref(), "smoothed")?;
        }
        Commands::Log {
            track,
            base,
            damper,
        } => {
            let list = session.generic_list(&track)?;
            let logged = match damper {
                Some(damper) => compute(LogOnAverageWithDamper::new(
                    session.context(),
                    &list,
                    base,
                    damper,
                ))?,
                None => compute(Log::new(session.context(), &list, base))?,
            };
            emit(&logged, track.output.as_deref(), "log")?;
        }
        Commands::Snapshot {
            track,
            bins,
            snapshot: path,
        } => {
            let list = session.bin_list(&track, bins.bin_size, bins.operation)?;
            snapshot::save_to_path(&list, &path)
                .with_context(|| format!("failed to write snapshot {}", path.display()))?;
            info!(path = %path.display(), "snapshot written");
        }
        Commands::Restore {
            snapshot: path,
            chromosomes,
            output,
        } => {
            let selection = if chromosomes.is_empty() {
                ChromosomeSelection::all(session.genome.len())
            } else {
                ChromosomeSelection::from_names(
                    &session.genome,
                    chromosomes.iter().map(String::as_str),
                )?
            };
            let list = snapshot::load_from_path(&path, &session.genome, &selection)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?;
            emit(&list, output.as_deref(), "restored")?;
        }
    }

    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_genome(path: &Path) -> Result<ChromosomeSet> {
    let file = File::open(path)
        .with_context(|| format!("failed to open chromosome sizes {}", path.display()))?;
    ChromosomeSet::from_sizes_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse chromosome sizes {}", path.display()))
}

fn compute<O: Operation>(operation: O) -> Result<O::Output> {
    info!("{}", operation.processing_description());
    let output = operation
        .compute()
        .with_context(|| format!("{} failed", operation.description()))?
        .ok_or_else(|| anyhow!("{} was stopped", operation.description()))?;
    let progress = operation.context().pool().progress();
    debug!(
        done = progress.done,
        total = progress.total,
        fraction = progress.fraction(),
        "{} finished",
        operation.description()
    );
    Ok(output)
}

fn run_stats(session: &Session, track: &TrackArgs) -> Result<()> {
    let list = session.generic_list(track)?;
    let statistics = compute(ComputeStats::new(session.context(), &list))?;
    let json = serde_json::to_string_pretty(&statistics)?;
    match &track.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

fn emit(list: &ScwList, output: Option<&Path>, track_name: &str) -> Result<()> {
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_bedgraph(&mut BufWriter::new(file), list, track_name)
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_bedgraph(&mut handle, list, track_name)?;
            handle.flush()?;
            Ok(())
        }
    }
}
