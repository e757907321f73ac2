// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for computing miss ratio curves from binary cache traces

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use mrc::trace::{decode_window, Format, RecordReader};
use mrc::{
    AnyEstimator, EvictingMap, FixedRateShards, FixedSizeShards, Olken, OutOfBoundsMode,
    TraceRunner,
};
use std::io::BufReader;
use std::path::PathBuf;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

fn init_tracing(quiet: bool, verbose: u8) {
    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Bridge log crate macros to tracing (for library code that uses log::*)
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let registry = Registry::default();

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("MRC_LOG")
        .from_env_lossy();

    let subscriber = registry.with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    let prev_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing_panic::panic_hook(info);
        prev_hook(info); // daisy-chain to old panic hook
    }));
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    Olken,
    FixedRateShards,
    FixedSizeShards,
    EvictingMap,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum TraceFormat {
    #[default]
    Kia,
    Sari,
}

impl From<TraceFormat> for Format {
    fn from(value: TraceFormat) -> Self {
        match value {
            TraceFormat::Kia => Self::Kia,
            TraceFormat::Sari => Self::Sari,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutOfBounds {
    #[default]
    AllowOverflow,
    Reject,
}

impl From<OutOfBounds> for OutOfBoundsMode {
    fn from(value: OutOfBounds) -> Self {
        match value {
            OutOfBounds::AllowOverflow => Self::AllowOverflow,
            OutOfBounds::Reject => Self::Reject,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Toggle {
    #[default]
    On,
    Off,
}

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short = 'q', long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Computes the miss ratio curve of a trace
    Run(RunArgs),

    /// Prints trace records in human-readable form
    Print(PrintArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path of the input trace
    #[arg(long)]
    trace: PathBuf,

    /// Binary format of the input trace
    #[arg(long, value_enum, default_value_t)]
    format: TraceFormat,

    /// Reuse-distance estimator to run
    #[arg(long, value_enum)]
    algorithm: Algorithm,

    /// Number of histogram bins
    #[arg(long, default_value_t = 1 << 20)]
    num_bins: u64,

    /// Number of reuse distances per histogram bin
    #[arg(long, default_value_t = 1)]
    bin_size: u64,

    /// Sampling rate in (0, 1] for the sampling estimators
    #[arg(long, default_value_t = 1e-3)]
    sampling_rate: f64,

    /// Sample budget for the size-bounded estimators
    #[arg(long, default_value_t = 1 << 13)]
    max_size: u64,

    /// What to do with out-of-range scaled histogram inserts
    #[arg(long, value_enum, default_value_t)]
    out_of_bounds: OutOfBounds,

    /// SHARDS end-of-trace adjustment (Fixed-Rate SHARDS only)
    #[arg(long, value_enum, default_value_t)]
    shards_adj: Toggle,

    /// Persist the sparse histogram here
    #[arg(long)]
    hist_path: Option<PathBuf>,

    /// Persist the packed miss ratio curve here
    #[arg(long)]
    mrc_path: Option<PathBuf>,
}

#[derive(clap::Args)]
struct PrintArgs {
    /// Path of the input trace
    #[arg(long)]
    trace: PathBuf,

    /// Binary format of the input trace
    #[arg(long, value_enum, default_value_t)]
    format: TraceFormat,

    /// Record offset to begin at
    #[arg(long, default_value_t = 0)]
    start: usize,

    /// Number of records to print
    #[arg(long, default_value_t = 10)]
    length: usize,
}

fn build_estimator(args: &RunArgs) -> mrc::Result<AnyEstimator> {
    let mode = args.out_of_bounds.into();

    Ok(match args.algorithm {
        Algorithm::Olken => Olken::with_mode(args.num_bins, args.bin_size, mode)?.into(),

        Algorithm::FixedRateShards => {
            FixedRateShards::with_mode(args.sampling_rate, args.num_bins, args.bin_size, mode)?
                .adjustment(args.shards_adj == Toggle::On)
                .into()
        }

        Algorithm::FixedSizeShards => FixedSizeShards::with_mode(
            args.sampling_rate,
            args.max_size,
            args.num_bins,
            args.bin_size,
            mode,
        )?
        .into(),

        Algorithm::EvictingMap => EvictingMap::with_mode(
            args.sampling_rate,
            args.max_size,
            args.num_bins,
            args.bin_size,
            mode,
        )?
        .into(),
    })
}

fn run(args: &RunArgs) {
    let mut estimator = match build_estimator(args) {
        Ok(estimator) => estimator,
        Err(e) => die!("invalid configuration: {e}"),
    };

    let file = match std::fs::File::open(&args.trace) {
        Ok(file) => file,
        Err(e) => die!("failed to open trace {:?}: {e}", args.trace),
    };

    let keys = RecordReader::new(BufReader::new(file), args.format.into()).map_while(
        |record| match record {
            Ok(record) => Some(record.key),
            Err(e) => {
                error!("trace read failed: {e}");
                None
            }
        },
    );

    let mut runner = TraceRunner::new();
    if let Some(path) = &args.hist_path {
        runner = runner.histogram_path(path);
    }
    if let Some(path) = &args.mrc_path {
        runner = runner.mrc_path(path);
    }

    match runner.run(&mut estimator, keys) {
        Ok(mrc) => {
            if let Some(final_ratio) = mrc.miss_ratios().last() {
                info!("final miss ratio: {final_ratio:.6}");
            }
        }
        Err(e) => die!("run failed: {e}"),
    }
}

fn print(args: &PrintArgs) {
    let bytes = match std::fs::read(&args.trace) {
        Ok(bytes) => bytes,
        Err(e) => die!("failed to read trace {:?}: {e}", args.trace),
    };

    let records = match decode_window(&bytes, args.format.into(), args.start, args.length) {
        Ok(records) => records,
        Err(e) => die!("failed to decode trace: {e}"),
    };

    println!("Timestamp Command Key Size TTL");
    for record in records {
        println!(
            "{} {} {} {} {}",
            record.timestamp, record.command, record.key, record.size, record.ttl,
        );
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    match &cli.command {
        Command::Run(args) => run(args),
        Command::Print(args) => print(args),
    }
}
