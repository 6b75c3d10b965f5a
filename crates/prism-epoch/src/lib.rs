//! PRISM epoch analysis
//!
//! Post-processing for multi-epoch Monte Carlo sampling runs. The sampler
//! leaves one folder per epoch holding `report_<n>` tables (one row per
//! accepted step) and `trajectory_<n>.pdb` multi-model trajectories.
//!
//! # Features
//!
//! - Global best-N selection across every report by one or more columns,
//!   with memory bounded by N per report
//! - Report → trajectory pairing and single-frame extraction
//! - Nearest-snapshot representative per cluster centre in one streaming pass
//! - Cluster summary document with one pseudo-atom per cluster
//!
//! # CLI Contract
//!
//! ```bash
//! epoch-best Binding Energy -n 20 -s min -f 4 --out analysis/metrics
//! epoch-cluster 10 --snapshots allTrajs --structures allTrajs -o analysis/clustering
//! ```

pub mod assign;
pub mod centroids;
pub mod config;
pub mod errors;
pub mod pairing;
pub mod pipeline;
pub mod ranking;
pub mod report;
pub mod representatives;
pub mod snapshots;
pub mod trajectory;

// Re-exports
pub use assign::{assign, AssignmentRecord, AssignmentSet, CentroidAssigner, SnapshotRef};
pub use centroids::{CentroidProvider, FileCentroids, KMeans};
pub use config::{ClusterConfig, EpochConfig, RankConfig};
pub use errors::{EpochError, Result};
pub use pairing::{ManifestPairResolver, PairResolver, SuffixPairResolver};
pub use pipeline::{
    run_best_structures, run_cluster_representatives, ClusterRun, CriterionSummary,
    RankedStructure,
};
pub use ranking::{Direction, RankedSet, TopNMerger};
pub use report::{discover_reports, ReportOrigin, ReportRow, TableSource};
pub use representatives::{RepresentativeOutput, RepresentativeWriter};
pub use snapshots::{Snapshot, SnapshotSource, SnapshotStream};
pub use trajectory::{FrameExtractor, FrameLocator, FrameReference, LocatedFrame, OutputNamer};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
