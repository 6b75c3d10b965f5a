//! End-to-end runs behind the two binaries.
//!
//! `run_best_structures`: discover → rank → pair → extract, once per criterion.
//! `run_cluster_representatives`: centres → stream assignment → copy + summary.

use log::{info, warn};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::assign::{assign, AssignmentSet};
use crate::centroids::{CentroidProvider, FileCentroids, KMeans};
use crate::config::{ClusterConfig, RankConfig};
use crate::errors::Result;
use crate::pairing::PairResolver;
use crate::ranking::{Direction, RankedSet, TopNMerger};
use crate::report::{discover_reports, TableSource};
use crate::representatives::{RepresentativeOutput, RepresentativeWriter};
use crate::snapshots::SnapshotSource;
use crate::trajectory::{FrameExtractor, FrameLocator, OutputNamer};

/// Summary file written next to the extracted structures.
pub const SUMMARY_JSON: &str = "summary.json";

/// Cluster run summary file.
pub const CLUSTER_SUMMARY_JSON: &str = "representatives.json";

/// One extracted structure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStructure {
    /// 1-based position in the ranking
    pub rank: usize,
    pub epoch: String,
    pub report: String,
    pub report_path: PathBuf,
    pub step: u64,
    pub value: f64,
    pub trajectory: PathBuf,
    pub model: usize,
    pub output: PathBuf,
}

/// Result of ranking and extracting one criterion.
#[derive(Debug, Clone, Serialize)]
pub struct CriterionSummary {
    pub criterion: String,
    pub direction: Direction,
    pub n_reports: usize,
    pub output_dir: PathBuf,
    pub structures: Vec<RankedStructure>,
}

/// Rank every report under `root` by each configured criterion and write
/// the winning frames to `<output_dir>/<criterion>/`.
///
/// Any missing trajectory or frame aborts the run.
pub fn run_best_structures<R: PairResolver>(
    root: &Path,
    config: &RankConfig,
    resolver: R,
) -> Result<Vec<CriterionSummary>> {
    config.validate()?;

    let reports = discover_reports(root, &config.report_label)?;
    let sources = reports
        .into_iter()
        .map(TableSource::open)
        .collect::<Result<Vec<_>>>()?;
    info!("Loaded {} reports from {}", sources.len(), root.display());

    let locator = FrameLocator::new(resolver, config.output_stride)?;
    let mut summaries = Vec::new();

    for criterion in config.criteria.iter().filter(|c| !c.trim().is_empty()) {
        let merger = TopNMerger::new(
            config.n_structs,
            criterion.as_str(),
            config.steps_column.as_str(),
            config.direction,
        )?;
        let ranked = if config.parallel {
            merger.rank_parallel(&sources)?
        } else {
            merger.rank(&sources)?
        };

        let output_dir = config.criterion_dir(criterion);
        let structures = extract_ranked(&ranked, &locator, criterion, &output_dir)?;
        let summary = CriterionSummary {
            criterion: criterion.clone(),
            direction: config.direction,
            n_reports: sources.len(),
            output_dir: output_dir.clone(),
            structures,
        };
        write_json(&output_dir.join(SUMMARY_JSON), &summary)?;
        summaries.push(summary);
    }

    Ok(summaries)
}

fn extract_ranked<R: PairResolver>(
    ranked: &RankedSet,
    locator: &FrameLocator<R>,
    criterion: &str,
    output_dir: &Path,
) -> Result<Vec<RankedStructure>> {
    let extractor = FrameExtractor::new(output_dir);
    let mut namer = OutputNamer::new();
    let mut structures = Vec::with_capacity(ranked.len());

    for (i, row) in ranked.rows().iter().enumerate() {
        let frame = locator.locate(&row.origin, row.step)?;
        let file_name = namer.name(&row.origin, row.step, criterion, row.value);
        let output = extractor.extract(&frame, &file_name)?;
        structures.push(RankedStructure {
            rank: i + 1,
            epoch: row.origin.epoch.clone(),
            report: row.origin.report_number.clone(),
            report_path: row.origin.path.clone(),
            step: row.step,
            value: row.value,
            trajectory: frame.reference.trajectory,
            model: frame.reference.ordinal,
            output,
        });
    }
    Ok(structures)
}

/// Result of one representative-selection run.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterRun {
    pub n_clusters: usize,
    pub snapshots_scanned: usize,
    /// Unparsable or wrong-length snapshot lines
    pub snapshots_skipped: usize,
    pub assignments: AssignmentSet,
    pub output: RepresentativeOutput,
}

/// Pick the nearest snapshot to every centre and write representatives.
///
/// Centres come from `centroids_file` when set, else from k-means over the
/// snapshots.
pub fn run_cluster_representatives(config: &ClusterConfig) -> Result<ClusterRun> {
    config.validate()?;
    let source = SnapshotSource::new(&config.snapshot_dir, config.snapshot_pattern.as_str());

    let centroids = match &config.centroids_file {
        Some(path) => FileCentroids::new(path).centroids(&source)?,
        None => KMeans::new(config.n_clusters, config.max_iterations)?.centroids(&source)?,
    };

    let dimension = centroids.first().map(Vec::len).unwrap_or_default();
    let mut stream = source.stream()?.with_dimension(dimension);
    let assignments = assign(centroids, stream.by_ref())?;
    let skipped = stream.malformed() + assignments.rejected();
    if skipped > 0 {
        warn!(
            "{} snapshot lines skipped in {}",
            skipped,
            config.snapshot_dir.display()
        );
    }
    let output = RepresentativeWriter::new(&config.structure_dir, &config.output_dir)
        .with_frames(config.extract_frames)
        .write(&assignments)?;

    let run = ClusterRun {
        n_clusters: assignments.len(),
        snapshots_scanned: assignments.scanned(),
        snapshots_skipped: skipped,
        assignments,
        output,
    };
    write_json(&config.output_dir.join(CLUSTER_SUMMARY_JSON), &run)?;
    Ok(run)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
