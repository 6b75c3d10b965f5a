//! Cluster centres consumed by the assigner.
//!
//! Centres normally come from an upstream clustering run. [`FileCentroids`]
//! reads such output; [`KMeans`] is a small Lloyd's-algorithm stand-in for
//! when no upstream result exists. Both sit behind [`CentroidProvider`].

use log::{debug, info, warn};
use std::fs;
use std::path::PathBuf;

use crate::assign::euclidean;
use crate::errors::{EpochError, Result};
use crate::snapshots::SnapshotSource;

/// Produces the centre list for one assignment pass.
pub trait CentroidProvider {
    fn centroids(&self, source: &SnapshotSource) -> Result<Vec<Vec<f64>>>;
}

/// Centres read from a text file, one whitespace-separated vector per line.
#[derive(Debug, Clone)]
pub struct FileCentroids {
    pub path: PathBuf,
}

impl FileCentroids {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn parse(text: &str) -> Result<Vec<Vec<f64>>> {
        let mut centroids = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let vector = line
                .split_whitespace()
                .map(|v| v.parse::<f64>().ok().filter(|x| x.is_finite()))
                .collect::<Option<Vec<f64>>>()
                .ok_or_else(|| {
                    EpochError::invalid(format!("centroid line {} is not a numeric vector", i + 1))
                })?;
            centroids.push(vector);
        }
        Ok(centroids)
    }
}

impl CentroidProvider for FileCentroids {
    fn centroids(&self, _source: &SnapshotSource) -> Result<Vec<Vec<f64>>> {
        let centroids = Self::parse(&fs::read_to_string(&self.path)?)?;
        info!("Loaded {} centroids from {}", centroids.len(), self.path.display());
        Ok(centroids)
    }
}

/// Lloyd's k-means over every snapshot vector.
///
/// Unlike the assigner this collects all vectors in memory.
#[derive(Debug, Clone)]
pub struct KMeans {
    pub k: usize,
    pub max_iterations: usize,
}

impl KMeans {
    pub fn new(k: usize, max_iterations: usize) -> Result<Self> {
        if k == 0 {
            return Err(EpochError::invalid("number of clusters must be positive"));
        }
        Ok(Self { k, max_iterations })
    }

    /// Cluster `points`, returning `k` centres.
    ///
    /// Initial centres are evenly spaced through the input, so the result is
    /// deterministic. A centre that loses all its points keeps its position.
    pub fn fit(&self, points: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let n = points.len();
        if n < self.k {
            return Err(EpochError::invalid(format!(
                "cannot build {} clusters from {} snapshots",
                self.k, n
            )));
        }
        let dim = points[0].len();
        if let Some(bad) = points.iter().find(|p| p.len() != dim) {
            return Err(EpochError::DimensionMismatch {
                expected: dim,
                actual: bad.len(),
            });
        }

        let mut centroids: Vec<Vec<f64>> =
            (0..self.k).map(|i| points[i * n / self.k].clone()).collect();
        let mut assignments = vec![usize::MAX; n];

        for iteration in 0..self.max_iterations {
            let mut changed = false;
            for (i, point) in points.iter().enumerate() {
                let mut best_cluster = 0;
                let mut best_dist = f64::INFINITY;
                for (c, centroid) in centroids.iter().enumerate() {
                    let dist = euclidean(point, centroid);
                    if dist < best_dist {
                        best_dist = dist;
                        best_cluster = c;
                    }
                }
                if assignments[i] != best_cluster {
                    assignments[i] = best_cluster;
                    changed = true;
                }
            }

            if !changed {
                debug!("k-means converged after {} iterations", iteration);
                break;
            }

            let mut sums = vec![vec![0.0; dim]; self.k];
            let mut counts = vec![0usize; self.k];
            for (point, &cluster) in points.iter().zip(&assignments) {
                counts[cluster] += 1;
                for (acc, v) in sums[cluster].iter_mut().zip(point) {
                    *acc += v;
                }
            }
            for ((centroid, sum), count) in centroids.iter_mut().zip(sums).zip(counts) {
                if count > 0 {
                    *centroid = sum.into_iter().map(|s| s / count as f64).collect();
                }
            }
        }

        Ok(centroids)
    }
}

impl CentroidProvider for KMeans {
    /// Fits on every snapshot whose length matches the first one seen;
    /// others are logged and left out.
    fn centroids(&self, source: &SnapshotSource) -> Result<Vec<Vec<f64>>> {
        let mut points: Vec<Vec<f64>> = Vec::new();
        for snapshot in source.stream()? {
            let snapshot = snapshot?;
            match points.first() {
                Some(first) if first.len() != snapshot.features.len() => {
                    warn!(
                        "Snapshot {}/{} has {} components, expected {}; left out of k-means",
                        snapshot.origin,
                        snapshot.index,
                        snapshot.features.len(),
                        first.len()
                    );
                }
                _ => points.push(snapshot.features),
            }
        }
        info!("Clustering {} snapshots into {} clusters", points.len(), self.k);
        self.fit(&points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_centroid_file() {
        let text = "# centres\n0.0 0.0 0.0\n\n10.0 10.0 10.0\n";
        let c = FileCentroids::parse(text).unwrap();
        assert_eq!(c, vec![vec![0.0; 3], vec![10.0; 3]]);
        assert!(FileCentroids::parse("1.0 abc\n").is_err());
    }

    #[test]
    fn test_kmeans_separates_two_blobs() {
        let mut points = Vec::new();
        for i in 0..10 {
            let d = i as f64 * 0.01;
            points.push(vec![d, d, d]);
            points.push(vec![10.0 + d, 10.0 + d, 10.0 + d]);
        }
        let km = KMeans::new(2, 50).unwrap();
        let mut centroids = km.fit(&points).unwrap();
        centroids.sort_by(|a, b| a[0].total_cmp(&b[0]));

        assert_relative_eq!(centroids[0][0], 0.045, epsilon = 1e-9);
        assert_relative_eq!(centroids[1][0], 10.045, epsilon = 1e-9);
    }

    #[test]
    fn test_kmeans_needs_enough_points() {
        let km = KMeans::new(3, 10).unwrap();
        assert!(km.fit(&[vec![1.0], vec![2.0]]).is_err());
        assert!(KMeans::new(0, 10).is_err());
    }

    #[test]
    fn test_kmeans_provider_skips_ragged_snapshots() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(
            tmp.path().join("traj_A.dat"),
            "0 0 0 0\n1 1 1\n2 0.1 0.1 0.1\n3 9 9 9\n4 9.1 9.1 9.1\n",
        )
        .unwrap();
        let source = SnapshotSource::new(tmp.path(), "traj_*");
        let mut centroids = KMeans::new(2, 20).unwrap().centroids(&source).unwrap();
        centroids.sort_by(|a, b| a[0].total_cmp(&b[0]));
        assert_eq!(centroids.len(), 2);
        assert_relative_eq!(centroids[0][0], 0.05, epsilon = 1e-9);
        assert_relative_eq!(centroids[1][0], 9.05, epsilon = 1e-9);
    }
}
