//! Per-cluster representative structures and the cluster summary document.

use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

use crate::assign::AssignmentSet;
use crate::errors::Result;
use crate::pairing::{structure_path, STRUCTURE_EXTENSION};
use crate::trajectory::{frame_ordinal, read_frame, FrameExtractor, FrameReference};

/// Charge column of the summary pseudo-atoms.
const ZERO_CHARGE: i32 = 0;

/// `clusters_<K>_KMeans_allSnapshots.pdb`
pub fn summary_file_name(n_clusters: usize) -> String {
    format!("clusters_{n_clusters}_KMeans_allSnapshots.pdb")
}

/// One fixed-width pseudo-atom line per cluster.
pub fn summary_line(cluster: usize, xyz: [f64; 3]) -> String {
    format!(
        "HETATM{:>5}  H{:<3}CLT L 502    {:>8.3}{:>8.3}{:>8.3}  0.75{}           H\n",
        cluster, cluster, xyz[0], xyz[1], xyz[2], ZERO_CHARGE
    )
}

fn first_three(v: &[f64]) -> [f64; 3] {
    let mut xyz = [0.0; 3];
    for (dst, src) in xyz.iter_mut().zip(v) {
        *dst = *src;
    }
    xyz
}

/// Summary text: each cluster's winning snapshot vector, in id order.
///
/// A cluster without a winner falls back to its centre.
pub fn summary_document(assignments: &AssignmentSet) -> String {
    let mut doc = String::new();
    for (id, record) in assignments.iter() {
        let vector = match &record.features {
            Some(features) => features.as_slice(),
            None => {
                warn!("Cluster {} is empty; summary uses its centre", id);
                assignments.centroids()[id].as_slice()
            }
        };
        doc.push_str(&summary_line(id, first_three(vector)));
    }
    doc
}

/// Files produced by one [`RepresentativeWriter::write`] call.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RepresentativeOutput {
    pub summary: PathBuf,
    pub structures: Vec<PathBuf>,
    pub frames: Vec<PathBuf>,
    pub empty_clusters: Vec<usize>,
}

/// Writes one representative per non-empty cluster.
#[derive(Debug, Clone)]
pub struct RepresentativeWriter {
    structure_dir: PathBuf,
    output_dir: PathBuf,
    extract_frames: bool,
}

impl RepresentativeWriter {
    pub fn new(structure_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            structure_dir: structure_dir.into(),
            output_dir: output_dir.into(),
            extract_frames: false,
        }
    }

    /// Also write the winning frame alone as `cluster_<id>.pdb`.
    pub fn with_frames(mut self, extract_frames: bool) -> Self {
        self.extract_frames = extract_frames;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Copy structures, optionally extract frames, write the summary.
    ///
    /// Output depends only on `assignments`, so a re-run overwrites every
    /// file with identical bytes.
    pub fn write(&self, assignments: &AssignmentSet) -> Result<RepresentativeOutput> {
        fs::create_dir_all(&self.output_dir)?;
        let mut output = RepresentativeOutput {
            empty_clusters: assignments.empty_clusters(),
            ..Default::default()
        };

        let extractor = FrameExtractor::new(&self.output_dir);
        for (id, record) in assignments.iter() {
            let Some(winner) = &record.winner else {
                continue;
            };
            let source = structure_path(&self.structure_dir, &winner.origin, STRUCTURE_EXTENSION)?;
            let target = self
                .output_dir
                .join(format!("cluster_{}_{}.{}", id, winner.origin, STRUCTURE_EXTENSION));
            fs::copy(&source, &target)?;
            output.structures.push(target);

            if self.extract_frames {
                // snapshot indices are 0-based, MODEL ordinals 1-based
                let frame = read_frame(&FrameReference {
                    trajectory: source,
                    ordinal: frame_ordinal(winner.index, 1)?,
                })?;
                let path = extractor.extract(&frame, &format!("cluster_{id}.{STRUCTURE_EXTENSION}"))?;
                output.frames.push(path);
            }
        }

        let summary = self.output_dir.join(summary_file_name(assignments.len()));
        fs::write(&summary, summary_document(assignments))?;
        output.summary = summary;

        info!(
            "Wrote {} representatives and {} to {}",
            output.structures.len(),
            summary_file_name(assignments.len()),
            self.output_dir.display()
        );
        Ok(output)
    }
}
