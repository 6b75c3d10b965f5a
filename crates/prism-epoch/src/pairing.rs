//! Report → trajectory pairing.
//!
//! The sampler writes `report_<n>` and `trajectory_<n>.pdb` side by side in
//! each epoch folder. That suffix convention lives behind [`PairResolver`] so
//! a manifest or metadata-based pairing can replace it without touching the
//! ranking or extraction code.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::{EpochError, Result};
use crate::report::{glob_files, ReportOrigin};

/// Default label identifying trajectory files by name.
pub const TRAJECTORY_LABEL: &str = "trajectory";

/// Default structure file extension.
pub const STRUCTURE_EXTENSION: &str = "pdb";

/// Maps a report to the trajectory holding its frames.
pub trait PairResolver: Send + Sync {
    fn resolve(&self, origin: &ReportOrigin) -> Result<PathBuf>;
}

/// Pairs by shared numeric suffix inside the report's folder.
#[derive(Debug, Clone)]
pub struct SuffixPairResolver {
    label: String,
    extension: String,
}

impl Default for SuffixPairResolver {
    fn default() -> Self {
        Self::new(TRAJECTORY_LABEL)
    }
}

impl SuffixPairResolver {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            extension: STRUCTURE_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl PairResolver for SuffixPairResolver {
    fn resolve(&self, origin: &ReportOrigin) -> Result<PathBuf> {
        let dir = origin.path.parent().unwrap_or_else(|| Path::new("."));
        let name = format!(
            "*{}*_{}.{}",
            glob::Pattern::escape(&self.label),
            glob::Pattern::escape(&origin.report_number),
            glob::Pattern::escape(&self.extension)
        );
        let pattern = format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), name);

        let mut matches = glob_files(&pattern)?;
        matches.sort();
        matches
            .into_iter()
            .next()
            .ok_or_else(|| EpochError::TrajectoryNotFound {
                pattern: dir.join(format!("*{}*_{}", self.label, origin.report_number))
                    .display()
                    .to_string(),
            })
    }
}

/// Explicit report → trajectory table.
#[derive(Debug, Clone, Default)]
pub struct ManifestPairResolver {
    pairs: HashMap<PathBuf, PathBuf>,
}

impl ManifestPairResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, report: impl Into<PathBuf>, trajectory: impl Into<PathBuf>) {
        self.pairs.insert(report.into(), trajectory.into());
    }
}

impl PairResolver for ManifestPairResolver {
    fn resolve(&self, origin: &ReportOrigin) -> Result<PathBuf> {
        match self.pairs.get(&origin.path) {
            Some(path) if path.is_file() => Ok(path.clone()),
            Some(path) => Err(EpochError::TrajectoryNotFound {
                pattern: path.display().to_string(),
            }),
            None => Err(EpochError::TrajectoryNotFound {
                pattern: format!("manifest entry for {}", origin.path.display()),
            }),
        }
    }
}

/// Structure file named after a snapshot origin (`<dir>/<origin>.<ext>`).
pub fn structure_path(dir: &Path, origin: &str, extension: &str) -> Result<PathBuf> {
    let path = dir.join(format!("{origin}.{extension}"));
    if path.is_file() {
        Ok(path)
    } else {
        Err(EpochError::TrajectoryNotFound {
            pattern: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_suffix_pairing_is_exact() {
        let tmp = TempDir::new().unwrap();
        let epoch = tmp.path().join("0");
        fs::create_dir_all(&epoch).unwrap();
        fs::write(epoch.join("report_1"), "Step    E\n").unwrap();
        fs::write(epoch.join("trajectory_1.pdb"), "MODEL        1\nENDMDL\n").unwrap();
        fs::write(epoch.join("trajectory_11.pdb"), "MODEL        1\nENDMDL\n").unwrap();

        let origin = ReportOrigin::from_path(epoch.join("report_1"));
        let path = SuffixPairResolver::default().resolve(&origin).unwrap();
        assert_eq!(path, epoch.join("trajectory_1.pdb"));
    }

    #[test]
    fn test_custom_extension() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("trajectory_3.pdb"), "MODEL        1\nENDMDL\n").unwrap();
        fs::write(tmp.path().join("trajectory_3.xyz"), "MODEL        1\nENDMDL\n").unwrap();

        let origin = ReportOrigin::from_path(tmp.path().join("report_3"));
        let resolver = SuffixPairResolver::default().with_extension("xyz");
        assert_eq!(resolver.resolve(&origin).unwrap(), tmp.path().join("trajectory_3.xyz"));

        let other = ReportOrigin::from_path(tmp.path().join("report_4"));
        assert!(resolver.resolve(&other).unwrap_err().is_missing_trajectory());
    }

    #[test]
    fn test_missing_trajectory() {
        let tmp = TempDir::new().unwrap();
        let origin = ReportOrigin::from_path(tmp.path().join("report_4"));
        let err = SuffixPairResolver::default().resolve(&origin).unwrap_err();
        assert!(err.is_missing_trajectory());
        assert!(err.to_string().contains("*trajectory*_4"));
    }

    #[test]
    fn test_manifest_pairing() {
        let tmp = TempDir::new().unwrap();
        let traj = tmp.path().join("frames.pdb");
        fs::write(&traj, "MODEL        1\nENDMDL\n").unwrap();

        let mut manifest = ManifestPairResolver::new();
        manifest.insert("a/report_1", &traj);
        let origin = ReportOrigin::from_path("a/report_1");
        assert_eq!(manifest.resolve(&origin).unwrap(), traj);

        let other = ReportOrigin::from_path("a/report_2");
        assert!(manifest.resolve(&other).unwrap_err().is_missing_trajectory());
    }
}
