//! capsample - Estimate storage capacity by owner from statistical samples.
//!
//! Usage:
//!   capsample [OPTIONS] [PATH]
//!   capsample --dollars-per-terabyte 23 --confidence-interval /srv/share
//!   capsample --format json /srv/share
//!   capsample --help

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use color_eyre::eyre::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use capsample_core::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_LEAVES, DEFAULT_MIN_SAMPLES, DEFAULT_SAMPLES, OwnerTrees,
    Report, ReportConfig, ReportError, SampleError, SamplingConfig,
};
use capsample_sample::{
    CapacitySource, LocalBackend, LocalDirectory, OwnerCache, OwnerResolver, WorkerPool,
};

#[derive(Parser)]
#[command(
    name = "capsample",
    version,
    about = "Estimate storage capacity by owner from statistical samples",
    long_about = "capsample draws capacity-weighted samples of the files under a \
                  directory, attributes each sample to the file's owner and shows \
                  where each owner's capacity goes.\n\n\
                  Set RUST_LOG to see progress, e.g. `RUST_LOG=info capsample PATH`."
)]
struct Cli {
    /// Path to sample (defaults to current directory)
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Number of samples to draw
    #[arg(short, long, default_value_t = DEFAULT_SAMPLES)]
    samples: u64,

    /// Number of concurrent workers
    #[arg(short, long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Leaves with at most this many samples are merged into their parent
    #[arg(short, long, default_value_t = DEFAULT_MIN_SAMPLES)]
    min_samples: u64,

    /// Maximum number of leaves shown per owner
    #[arg(short = 'x', long, default_value_t = DEFAULT_MAX_LEAVES)]
    max_leaves: usize,

    /// Show monthly cost at this price per terabyte instead of capacity
    #[arg(short = 'D', long)]
    dollars_per_terabyte: Option<f64>,

    /// Show 95% confidence intervals instead of point estimates
    #[arg(short = 'i', long)]
    confidence_interval: bool,

    /// Seed for the sample generator (random by default)
    #[arg(long)]
    seed: Option<u64>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let sampling = SamplingConfig::builder()
        .root(cli.path.clone())
        .samples(cli.samples)
        .concurrency(cli.concurrency)
        .build()
        .map_err(SampleError::from)?;

    let mut report_config = ReportConfig::builder();
    report_config
        .max_leaves(cli.max_leaves)
        .min_samples(cli.min_samples)
        .confidence_interval(cli.confidence_interval);
    if let Some(rate) = cli.dollars_per_terabyte {
        report_config.dollars_per_terabyte(rate);
    }
    let report_config = report_config.build().map_err(ReportError::from)?;

    let report = run_report(&cli.path, sampling, cli.seed, &report_config)?;

    match cli.format {
        OutputFormat::Text => print!("{report}"),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}

/// Sample `path`, attribute samples to owners and build the report.
fn run_report(
    path: &Path,
    mut sampling: SamplingConfig,
    seed: Option<u64>,
    config: &ReportConfig,
) -> Result<Report> {
    eprintln!("Indexing {}...", path.display());

    let mut backend = LocalBackend::open(path, sampling.concurrency).context("Indexing failed")?;
    if let Some(seed) = seed {
        backend = backend.with_seed(seed);
    }
    sampling.root = backend.root().to_path_buf();

    let capacity = backend
        .total_capacity(&sampling.root)
        .context("Capacity lookup failed")?;

    eprintln!(
        "Drawing {} samples from {} files...",
        sampling.samples,
        backend.file_count()
    );

    let pool = WorkerPool::new(sampling.concurrency).context("Worker pool setup failed")?;
    let samples = pool
        .collect_samples(&backend, &sampling)
        .context("Sampling failed")?;

    let cache = OwnerCache::new();
    let resolver = OwnerResolver::new(&backend, &LocalDirectory, &cache);
    let owners = pool.resolve_owners(&resolver, &samples);
    info!(files = cache.len(), "owners resolved");

    let mut trees = OwnerTrees::new();
    for (owner, sample) in owners.iter().zip(&samples) {
        trees.insert(owner, &sample.path, 1);
    }

    if !backend.warnings().is_empty() {
        eprintln!("{} warning(s) during indexing", backend.warnings().len());
    }

    Report::build(trees, config, samples.len() as u64, capacity)
        .context("No samples could be drawn (is the tree empty?)")
}
