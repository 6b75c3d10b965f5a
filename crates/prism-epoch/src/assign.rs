//! Nearest-snapshot search for a fixed set of cluster centres.
//!
//! One pass over the snapshot stream, K distance evaluations per snapshot,
//! one running minimum per centre. Memory is O(K) whatever the stream length.

use log::{info, warn};
use serde::Serialize;

use crate::errors::{EpochError, Result};
use crate::snapshots::Snapshot;

/// Euclidean distance between two equal-length vectors.
#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Snapshot identity without its features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRef {
    pub origin: String,
    pub index: u64,
}

/// Best snapshot seen so far for one centre.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentRecord {
    /// `+inf` until a snapshot has been scanned
    pub min_distance: f64,
    pub winner: Option<SnapshotRef>,
    pub features: Option<Vec<f64>>,
}

impl AssignmentRecord {
    fn empty() -> Self {
        Self {
            min_distance: f64::INFINITY,
            winner: None,
            features: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.winner.is_none()
    }
}

/// Streaming assigner. Feed snapshots with [`observe`](Self::observe), then
/// [`finish`](Self::finish).
#[derive(Debug)]
pub struct CentroidAssigner {
    centroids: Vec<Vec<f64>>,
    records: Vec<AssignmentRecord>,
    scanned: usize,
    rejected: usize,
}

impl CentroidAssigner {
    pub fn new(centroids: Vec<Vec<f64>>) -> Result<Self> {
        let dim = match centroids.first() {
            Some(first) => first.len(),
            None => return Err(EpochError::EmptyCentroidSet),
        };
        if dim == 0 {
            return Err(EpochError::invalid("centroids must have at least one component"));
        }
        if let Some(bad) = centroids.iter().find(|c| c.len() != dim) {
            return Err(EpochError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }

        let records = vec![AssignmentRecord::empty(); centroids.len()];
        Ok(Self {
            centroids,
            records,
            scanned: 0,
            rejected: 0,
        })
    }

    pub fn dimension(&self) -> usize {
        self.centroids[0].len()
    }

    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// Scan one snapshot. A centre's record is replaced only on a strictly
    /// smaller distance, so the first snapshot seen wins ties.
    pub fn observe(&mut self, origin: &str, index: u64, features: &[f64]) -> Result<()> {
        if features.len() != self.dimension() {
            return Err(EpochError::DimensionMismatch {
                expected: self.dimension(),
                actual: features.len(),
            });
        }

        for (centroid, record) in self.centroids.iter().zip(self.records.iter_mut()) {
            let dist = euclidean(centroid, features);
            if dist < record.min_distance {
                *record = AssignmentRecord {
                    min_distance: dist,
                    winner: Some(SnapshotRef {
                        origin: origin.to_string(),
                        index,
                    }),
                    features: Some(features.to_vec()),
                };
            }
        }
        self.scanned += 1;
        Ok(())
    }

    pub fn finish(self) -> AssignmentSet {
        let set = AssignmentSet {
            centroids: self.centroids,
            records: self.records,
            scanned: self.scanned,
            rejected: self.rejected,
        };
        for id in set.empty_clusters() {
            warn!("Cluster {} received no snapshot (empty cluster)", id);
        }
        info!(
            "Assigned {} snapshots to {} clusters ({} skipped)",
            set.scanned,
            set.records.len(),
            set.rejected
        );
        set
    }
}

/// Assign every snapshot of `snapshots` in a single pass.
///
/// A snapshot whose length differs from the centroids is logged and
/// skipped; I/O errors from the stream still end the pass.
pub fn assign<I>(centroids: Vec<Vec<f64>>, snapshots: I) -> Result<AssignmentSet>
where
    I: IntoIterator<Item = Result<Snapshot>>,
{
    let mut assigner = CentroidAssigner::new(centroids)?;
    for snapshot in snapshots {
        let snapshot = snapshot?;
        match assigner.observe(&snapshot.origin, snapshot.index, &snapshot.features) {
            Ok(()) => {}
            Err(e @ EpochError::DimensionMismatch { .. }) => {
                warn!("Snapshot {}/{} skipped: {}", snapshot.origin, snapshot.index, e);
                assigner.rejected += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(assigner.finish())
}

/// Final per-centre records, indexed by cluster id.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentSet {
    centroids: Vec<Vec<f64>>,
    records: Vec<AssignmentRecord>,
    scanned: usize,
    rejected: usize,
}

impl AssignmentSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, cluster: usize) -> Option<&AssignmentRecord> {
        self.records.get(cluster)
    }

    pub fn records(&self) -> &[AssignmentRecord] {
        &self.records
    }

    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    /// Number of snapshots scanned.
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    /// Snapshots skipped for a dimension mismatch.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Clusters that never received a snapshot.
    pub fn empty_clusters(&self) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_empty())
            .map(|(id, _)| id)
            .collect()
    }

    /// `(cluster id, record)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &AssignmentRecord)> {
        self.records.iter().enumerate()
    }
}
