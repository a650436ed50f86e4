use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use strtyper::genotyping::classify_stutter;
use strtyper::engine::DEFAULT_BATCH_SIZE;
use strtyper::locus::{LocusParseError, TsvLocusReader};
use strtyper::report::{
    format_general, report_header, ReportRow, StutterDistribution, StutterTally,
};
use strtyper::{GenotypingConfig, GenotypingEngine, StutterClass};

#[derive(Parser, Debug)]
#[command(name = "strtyper", about = "Genotype short tandem repeats and flag polymerase stutter")]
struct Cli {
    /// Log debug output.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Call genotypes for every locus in a tab-delimited read table.
    Genotype {
        /// Loci file (`chrom, start, end, unit, region, lengths, strands, mapqs`).
        loci: PathBuf,
        /// Probability that a read reports the wrong allele.
        #[arg(long, default_value_t = 0.01)]
        error_rate: f64,
        /// Append stutter classification columns.
        #[arg(long)]
        stutter: bool,
        #[command(flatten)]
        stutter_args: StutterArgs,
        /// Worker threads (default: all cores).
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Tabulate stutter rates by repeat unit and reference length.
    StutterDistn {
        /// Report file written by `genotype`.
        report: PathBuf,
        #[command(flatten)]
        stutter_args: StutterArgs,
    },
    /// Classify multi-allele loci as heterozygous or stutter and summarize.
    AnalyzeStutter {
        /// Report file written by `genotype`.
        report: PathBuf,
        #[command(flatten)]
        stutter_args: StutterArgs,
    },
}

#[derive(Args, Debug, Clone, Copy)]
struct StutterArgs {
    /// P-value cutoff for the binomial stutter test.
    #[arg(long, default_value_t = 0.05)]
    significance: f64,
    /// Treat every read off the top allele as stutter instead of testing.
    #[arg(long)]
    no_binomial: bool,
}

impl StutterArgs {
    fn apply(self, config: GenotypingConfig) -> GenotypingConfig {
        config
            .with_significance_threshold(self.significance)
            .with_binomial_stutter_test(!self.no_binomial)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Genotype {
            loci,
            error_rate,
            stutter,
            stutter_args,
            threads,
        } => {
            let config = stutter_args.apply(GenotypingConfig::default().with_error_rate(error_rate));
            run_genotype(loci, config, stutter, threads)?
        }
        Commands::StutterDistn {
            report,
            stutter_args,
        } => run_stutter_distn(report, stutter_args.apply(GenotypingConfig::default()))?,
        Commands::AnalyzeStutter {
            report,
            stutter_args,
        } => run_analyze_stutter(report, stutter_args.apply(GenotypingConfig::default()))?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run_genotype(
    loci_path: PathBuf,
    config: GenotypingConfig,
    with_stutter: bool,
    threads: Option<usize>,
) -> Result<()> {
    if let Some(threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure worker threads")?;
    }

    let engine = GenotypingEngine::new(config)
        .context("invalid genotyping configuration")?
        .with_stutter(with_stutter);

    let file = File::open(&loci_path)
        .with_context(|| format!("failed to open loci file {}", loci_path.display()))?;
    info!(path = %loci_path.display(), "streaming loci");

    let mut read_error = None;
    let loci = TsvLocusReader::new(BufReader::new(file))
        .map_while(|locus| match locus {
            Err(LocusParseError::Io(err)) => {
                read_error = Some(err);
                None
            }
            other => Some(other),
        })
        .filter_map(|locus| match locus {
            Ok(locus) => Some(locus),
            Err(err) => {
                warn!("skipping malformed locus: {err}");
                None
            }
        });

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    writeln!(writer, "{}", report_header(with_stutter)).context("failed to write reports")?;
    let summary = engine
        .process_stream(loci, DEFAULT_BATCH_SIZE, |report| {
            writeln!(writer, "{}", report.to_row())
        })
        .context("failed to write reports")?;
    writer.flush().context("failed to write reports")?;

    if let Some(err) = read_error {
        return Err(err).with_context(|| format!("failed to read {}", loci_path.display()));
    }
    info!(
        genotyped = summary.genotyped,
        skipped = summary.skipped,
        "genotyping finished"
    );
    Ok(())
}

/// Feed each well-formed row of a report file to `handle`, returning the
/// number of rows seen.
fn for_each_report_row<F>(path: &Path, mut handle: F) -> Result<usize>
where
    F: FnMut(ReportRow) -> Result<()>,
{
    let file = File::open(path)
        .with_context(|| format!("failed to open report file {}", path.display()))?;
    let reader = BufReader::new(file);
    let mut rows = 0;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read {}", path.display()))?;
        if line.trim().is_empty() || ReportRow::is_header(&line) {
            continue;
        }
        match line.parse::<ReportRow>() {
            Ok(row) => {
                rows += 1;
                handle(row)?;
            }
            Err(err) => warn!(line = line_no + 1, "skipping report row: {err}"),
        }
    }
    Ok(rows)
}

fn run_stutter_distn(report_path: PathBuf, config: GenotypingConfig) -> Result<()> {
    config.validate().context("invalid stutter configuration")?;
    let mut distribution = StutterDistribution::new();
    let rows = for_each_report_row(&report_path, |row| {
        let verdict = classify_stutter(
            &row.alleles,
            config.significance_threshold,
            config.stutter_policy,
        )?;
        distribution.record(row.unit, row.reference_length, &row.alleles, &verdict);
        Ok(())
    })?;
    info!(loci = rows, "stutter distribution computed");

    print!("{}", distribution.render());
    Ok(())
}

fn run_analyze_stutter(report_path: PathBuf, config: GenotypingConfig) -> Result<()> {
    config.validate().context("invalid stutter configuration")?;
    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut tally = StutterTally::new();
    let rows = for_each_report_row(&report_path, |row| {
        let verdict = classify_stutter(
            &row.alleles,
            config.significance_threshold,
            config.stutter_policy,
        )?;
        tally.record(&row.alleles, &verdict);

        if verdict.class != StutterClass::Homozygous {
            let pval = verdict
                .p_value
                .map(format_general)
                .unwrap_or_else(|| "NA".to_string());
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}",
                verdict.class, pval, row.chrom, row.start, row.end, row.alleles
            )?;
        }
        Ok(())
    })?;
    info!(loci = rows, "stutter analysis computed");

    write!(out, "{}", tally.render(config.significance_threshold))?;
    out.flush()?;
    Ok(())
}
