//! Run configuration
//!
//! serde-based TOML configuration for both tools. Every field has a default,
//! so a config file only needs the values it changes; CLI flags override
//! whatever the file sets.
//!
//! ```toml
//! [rank]
//! criteria = ["Binding Energy", "sasaLig"]
//! n_structs = 20
//! direction = "min"
//! output_stride = 4
//!
//! [cluster]
//! n_clusters = 10
//! snapshot_dir = "allTrajs"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::errors::{EpochError, Result};
use crate::pairing::{STRUCTURE_EXTENSION, TRAJECTORY_LABEL};
use crate::ranking::Direction;
use crate::report::{ACCEPTED_STEPS_COLUMN, REPORT_LABEL};

/// Root configuration file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EpochConfig {
    #[serde(default)]
    pub rank: RankConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,
}

impl EpochConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

// =============================================================================
// Best-structure ranking
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankConfig {
    /// Report columns to rank by, one output folder each
    #[serde(default = "default_criteria")]
    pub criteria: Vec<String>,

    /// Column holding the accepted-step index
    #[serde(default = "default_steps_column")]
    pub steps_column: String,

    #[serde(default = "default_n_structs")]
    pub n_structs: usize,

    #[serde(default)]
    pub direction: Direction,

    /// Steps between frames written to the trajectories
    #[serde(default = "default_one")]
    pub output_stride: usize,

    #[serde(default = "default_metrics_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_report_label")]
    pub report_label: String,

    #[serde(default = "default_trajectory_label")]
    pub trajectory_label: String,

    /// Extension of the trajectory files
    #[serde(default = "default_structure_extension")]
    pub trajectory_extension: String,

    /// Reduce reports on the rayon pool
    #[serde(default)]
    pub parallel: bool,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            criteria: default_criteria(),
            steps_column: default_steps_column(),
            n_structs: default_n_structs(),
            direction: Direction::Min,
            output_stride: 1,
            output_dir: default_metrics_dir(),
            report_label: default_report_label(),
            trajectory_label: default_trajectory_label(),
            trajectory_extension: default_structure_extension(),
            parallel: false,
        }
    }
}

impl RankConfig {
    pub fn validate(&self) -> Result<()> {
        if self.criteria.iter().all(|c| c.trim().is_empty()) {
            return Err(EpochError::invalid("at least one ranking criterion is required"));
        }
        if self.n_structs == 0 {
            return Err(EpochError::invalid("n_structs must be positive"));
        }
        if self.output_stride == 0 {
            return Err(EpochError::invalid("output_stride must be a positive integer"));
        }
        if self.steps_column.trim().is_empty() {
            return Err(EpochError::invalid("steps_column must not be empty"));
        }

        // Each criterion owns one output folder.
        let mut folders = HashSet::new();
        for criterion in self.criteria.iter().filter(|c| !c.trim().is_empty()) {
            if !folders.insert(self.criterion_dir(criterion)) {
                return Err(EpochError::invalid(format!(
                    "criterion '{}' shares its output folder with another criterion",
                    criterion
                )));
            }
        }
        Ok(())
    }

    /// Output folder for one criterion (`<output_dir>/<criterion without spaces>`).
    pub fn criterion_dir(&self, criterion: &str) -> PathBuf {
        self.output_dir.join(criterion.replace(' ', ""))
    }
}

// =============================================================================
// Cluster representatives
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_n_clusters")]
    pub n_clusters: usize,

    /// Folder of per-trajectory coordinate files
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    #[serde(default = "default_snapshot_pattern")]
    pub snapshot_pattern: String,

    /// Folder holding the `<origin>.pdb` structures
    #[serde(default = "default_structure_dir")]
    pub structure_dir: PathBuf,

    #[serde(default = "default_cluster_dir")]
    pub output_dir: PathBuf,

    /// k-means iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Precomputed centres; skips k-means when set
    #[serde(default)]
    pub centroids_file: Option<PathBuf>,

    /// Also write each winning frame on its own
    #[serde(default)]
    pub extract_frames: bool,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            n_clusters: default_n_clusters(),
            snapshot_dir: default_snapshot_dir(),
            snapshot_pattern: default_snapshot_pattern(),
            structure_dir: default_structure_dir(),
            output_dir: default_cluster_dir(),
            max_iterations: default_max_iterations(),
            centroids_file: None,
            extract_frames: false,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.centroids_file.is_none() && self.n_clusters == 0 {
            return Err(EpochError::invalid("n_clusters must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(EpochError::invalid("max_iterations must be positive"));
        }
        Ok(())
    }
}

// =============================================================================
// Defaults
// =============================================================================

fn default_criteria() -> Vec<String> {
    vec!["Binding Energy".to_string()]
}

fn default_steps_column() -> String {
    ACCEPTED_STEPS_COLUMN.to_string()
}

fn default_n_structs() -> usize {
    10
}

fn default_one() -> usize {
    1
}

fn default_metrics_dir() -> PathBuf {
    PathBuf::from("analysis/metrics")
}

fn default_report_label() -> String {
    REPORT_LABEL.to_string()
}

fn default_trajectory_label() -> String {
    TRAJECTORY_LABEL.to_string()
}

fn default_structure_extension() -> String {
    STRUCTURE_EXTENSION.to_string()
}

fn default_n_clusters() -> usize {
    10
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("allTrajs")
}

fn default_snapshot_pattern() -> String {
    "*trajectory*".to_string()
}

fn default_structure_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_cluster_dir() -> PathBuf {
    PathBuf::from("analysis/clustering")
}

fn default_max_iterations() -> usize {
    100
}
