//! Cluster representatives
//!
//! Assigns every sampled snapshot to its nearest cluster centre and keeps
//! the closest one per cluster.
//!
//! Usage:
//!   epoch-cluster <n_clusters> --snapshots allTrajs --structures allTrajs -o <dir>
//!   epoch-cluster --centroids centres.txt --snapshots allTrajs -o <dir>

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use prism_epoch::{run_cluster_representatives, EpochConfig};

#[derive(Parser, Debug)]
#[command(name = "epoch-cluster")]
#[command(about = "Pick the snapshot nearest to each cluster centre")]
#[command(version)]
struct Args {
    /// Number of clusters (k-means)
    #[arg(value_name = "N_CLUSTERS")]
    n_clusters: Option<usize>,

    /// Folder of snapshot coordinate files
    #[arg(long)]
    snapshots: Option<PathBuf>,

    /// Glob for coordinate files inside the snapshot folder
    #[arg(long)]
    pattern: Option<String>,

    /// Folder holding the <origin>.pdb structures
    #[arg(long)]
    structures: Option<PathBuf>,

    /// Output folder
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Read centres from a file instead of running k-means
    #[arg(long)]
    centroids: Option<PathBuf>,

    /// k-means iteration cap
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Also write each winning frame as cluster_<id>.pdb
    #[arg(long)]
    extract_frames: bool,

    /// TOML configuration ([cluster] table); flags override it
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
            .cluster,
        None => Default::default(),
    };

    if let Some(n) = args.n_clusters {
        config.n_clusters = n;
    }
    if let Some(dir) = args.snapshots {
        config.snapshot_dir = dir;
    }
    if let Some(pattern) = args.pattern {
        config.snapshot_pattern = pattern;
    }
    if let Some(dir) = args.structures {
        config.structure_dir = dir;
    }
    if let Some(dir) = args.output {
        config.output_dir = dir;
    }
    if args.centroids.is_some() {
        config.centroids_file = args.centroids;
    }
    if let Some(n) = args.max_iterations {
        config.max_iterations = n;
    }
    config.extract_frames |= args.extract_frames;
    config.validate().context("Invalid clustering options")?;

    let start = Instant::now();
    let run = run_cluster_representatives(&config).with_context(|| {
        format!(
            "Representative selection failed for {}",
            config.snapshot_dir.display()
        )
    })?;

    println!(
        "{} clusters, {} snapshots scanned, {} representatives -> {}",
        run.n_clusters,
        run.snapshots_scanned,
        run.output.structures.len(),
        config.output_dir.display()
    );
    if !run.output.empty_clusters.is_empty() {
        println!("Empty clusters: {:?}", run.output.empty_clusters);
    }
    log::info!("Done in {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
