use clap::{Parser, ValueEnum};
use popc::{Clustering, Dataset, Params};
use snafu::{prelude::*, Whatever};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, level_filters::LevelFilter, warn};

/// Generate POPC cluster assignments from tabular Boolean data.
///
/// Input is a header line naming the columns followed by rows of 0/1 values.
/// Output is one integer cluster assignment per line, one line per data row.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Data file; standard input is read when omitted
    file: Option<PathBuf>,

    /// Field separator, a single character or "\t"
    #[arg(short = 't', long, default_value = "\\t", value_parser = parse_delimiter)]
    delimiter: char,

    /// File with pre-generated cluster assignments, one per line in instance order;
    /// k-means is run when omitted
    #[arg(short, long, value_name = "CFILE")]
    clusters: Option<PathBuf>,

    /// Multiplying constant
    #[arg(short, long, value_name = "MULT", default_value_t = popc::DEFAULT_MULTIPLIER)]
    multiplier: f64,

    /// Power constant
    #[arg(short, long, value_name = "POW", default_value_t = popc::DEFAULT_POWER)]
    power: f64,

    /// Stop refining after this many passes
    #[arg(long, value_name = "N")]
    max_passes: Option<usize>,

    /// Seed for the k-means initializer
    #[arg(long, default_value_t = popc::DEFAULT_SEED)]
    seed: u64,

    #[arg(short, long, value_enum, default_value_t = Verbosity::Warning)]
    verbosity: Verbosity,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Verbosity {
    #[value(alias = "0")]
    Quiet,
    #[value(alias = "1")]
    Warning,
    #[value(alias = "2")]
    Info,
    #[value(alias = "3")]
    Debug,
}

impl From<Verbosity> for LevelFilter {
    fn from(v: Verbosity) -> Self {
        match v {
            Verbosity::Quiet => LevelFilter::ERROR,
            Verbosity::Warning => LevelFilter::WARN,
            Verbosity::Info => LevelFilter::INFO,
            Verbosity::Debug => LevelFilter::DEBUG,
        }
    }
}

fn parse_delimiter(s: &str) -> Result<char, String> {
    if s == "\\t" {
        return Ok('\t');
    }
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err("must be a single character".to_owned()),
    }
}

fn open(path: &Option<PathBuf>) -> Result<Box<dyn BufRead>, Whatever> {
    Ok(match path {
        Some(path) => {
            debug!(file = %path.display(), "reading from file");
            let file = File::open(path)
                .with_whatever_context(|_| format!("cannot open {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => {
            debug!("reading from standard input");
            Box::new(io::stdin().lock())
        }
    })
}

#[snafu::report]
fn main() -> Result<(), Whatever> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(LevelFilter::from(args.verbosity))
        .init();

    let t = Instant::now();
    let ds = Dataset::from_reader(open(&args.file)?, args.delimiter)
        .whatever_context("cannot read data")?;
    info!(
        instances = ds.num_instances(),
        attributes = ds.num_attributes(),
        elapsed = ?t.elapsed(),
        "read data"
    );

    let num_clusters = popc::default_num_clusters(ds.num_instances());
    let t = Instant::now();
    let assignments = match &args.clusters {
        Some(path) => {
            let file = File::open(path)
                .with_whatever_context(|_| format!("cannot open {}", path.display()))?;
            let assignments =
                popc::read_assignments(BufReader::new(file), ds.num_instances(), num_clusters)
                    .whatever_context("cannot read cluster assignments")?;
            info!(elapsed = ?t.elapsed(), "read cluster assignments");
            assignments
        }
        None => {
            let assignments = popc::initial_assignments_seeded(&ds, num_clusters, args.seed);
            info!(k = num_clusters, elapsed = ?t.elapsed(), "performed k-means");
            assignments
        }
    };

    let t = Instant::now();
    let params = Params {
        max_passes: args.max_passes,
        ..Params::new(args.multiplier, args.power)
    };
    let mut clustering = Clustering::from_assignments(&ds, &assignments)
        .whatever_context("invalid cluster assignments")?;
    let result = popc::refine(&ds, &mut clustering, &params, &mut ())
        .whatever_context("cannot run POPC")?;
    info!(
        passes = result.passes,
        moves = result.moves,
        clusters = clustering.live_count(),
        elapsed = ?t.elapsed(),
        "executed POPC algorithm"
    );
    if !result.converged() {
        warn!(termination = ?result.termination, "stopped before convergence");
    }

    let t = Instant::now();
    let mut out = BufWriter::new(io::stdout().lock());
    for label in &result.labels {
        writeln!(out, "{label}").whatever_context("cannot write output")?;
    }
    out.flush().whatever_context("cannot write output")?;
    info!(elapsed = ?t.elapsed(), "output results");

    Ok(())
}
