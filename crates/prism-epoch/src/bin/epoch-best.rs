//! Best-structure extraction
//!
//! Ranks every report of a sampling run by a column and writes the N best
//! frames as standalone PDB files.
//!
//! Usage:
//!   epoch-best Binding Energy -n 20 -s min -f 4 --path <sampling root> --out <dir>
//!
//! The positional words form one column name (`Binding Energy`). Further
//! criteria can be ranked in the same run with `--also`.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use prism_epoch::{run_best_structures, Direction, EpochConfig, SuffixPairResolver};

#[derive(Parser, Debug)]
#[command(name = "epoch-best")]
#[command(about = "Extract the best-ranked structures of a multi-epoch sampling run")]
#[command(version)]
struct Args {
    /// Criterion column; several words are joined with spaces
    #[arg(value_name = "CRITERION", num_args = 0..)]
    crit: Vec<String>,

    /// Additional criterion column to rank in the same run
    #[arg(long, value_name = "CRITERION")]
    also: Vec<String>,

    /// Column holding the accepted-step index
    #[arg(long)]
    steps: Option<String>,

    /// Sampling root folder (holds one folder per epoch)
    #[arg(long, default_value = ".")]
    path: PathBuf,

    /// Number of structures to extract
    #[arg(short = 'n', long = "nst")]
    n_structs: Option<usize>,

    /// Keep the lowest (min) or the highest (max) values
    #[arg(short, long)]
    sort: Option<Direction>,

    /// Steps between frames written to the trajectories
    #[arg(short = 'f', long = "ofreq")]
    output_stride: Option<usize>,

    /// Output folder; one subfolder per criterion
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Reduce reports in parallel
    #[arg(long)]
    parallel: bool,

    /// TOML configuration ([rank] table); flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = match &args.config {
        Some(path) => EpochConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
            .rank,
        None => Default::default(),
    };

    if !args.crit.is_empty() {
        config.criteria = vec![args.crit.join(" ")];
    }
    config.criteria.extend(args.also.iter().cloned());
    if let Some(steps) = args.steps {
        config.steps_column = steps;
    }
    if let Some(n) = args.n_structs {
        config.n_structs = n;
    }
    if let Some(direction) = args.sort {
        config.direction = direction;
    }
    if let Some(stride) = args.output_stride {
        config.output_stride = stride;
    }
    if let Some(out) = args.out {
        config.output_dir = out;
    }
    config.parallel |= args.parallel;
    config.validate().context("Invalid ranking options")?;

    let start = Instant::now();
    let resolver = SuffixPairResolver::new(config.trajectory_label.as_str())
        .with_extension(config.trajectory_extension.as_str());
    let summaries = run_best_structures(&args.path, &config, resolver)
        .with_context(|| format!("Best-structure extraction failed under {}", args.path.display()))?;

    for summary in &summaries {
        println!(
            "{}: {} structures from {} reports -> {}",
            summary.criterion,
            summary.structures.len(),
            summary.n_reports,
            summary.output_dir.display()
        );
    }
    log::info!("Done in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
