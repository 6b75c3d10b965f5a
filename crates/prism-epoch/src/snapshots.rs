//! Lazy stream of feature-space snapshots.
//!
//! Each coordinate file holds one snapshot per line: the snapshot index
//! followed by its feature vector (for example a ligand centre of mass).
//!
//! ```text
//! 0    12.113    4.870    -3.306
//! 1    12.402    4.915    -3.118
//! ```
//!
//! Files are opened one at a time and read line by line, so memory does not
//! grow with the number of snapshots.

use log::{debug, warn};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};

use crate::errors::{EpochError, Result};
use crate::report::{glob_files, step_in_range};

/// One sampled conformation in feature space.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Identifier of the originating structure file
    pub origin: String,
    /// Snapshot index within that file (0-based)
    pub index: u64,
    pub features: Vec<f64>,
}

/// Where coordinate files live.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    pub dir: PathBuf,
    pub pattern: String,
}

impl SnapshotSource {
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
        }
    }

    /// Matching coordinate files, sorted.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let pattern = format!(
            "{}/{}",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            self.pattern
        );
        let mut files = glob_files(&pattern)?;
        files.sort();
        Ok(files)
    }

    /// Fresh pass over every snapshot.
    pub fn stream(&self) -> Result<SnapshotStream> {
        let files = self.files()?;
        if files.is_empty() {
            return Err(EpochError::NoInput {
                root: self.dir.join(&self.pattern),
            });
        }
        debug!("Streaming snapshots from {} files", files.len());
        Ok(SnapshotStream::from_files(files))
    }
}

/// Origin id of a coordinate file: the stem after its first `_`
/// (`traj_3_12.dat` → `3_12`).
pub fn origin_id(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once('_') {
        Some((_, rest)) => rest.to_string(),
        None => stem,
    }
}

/// Parse `index f1 f2 ...`.
pub fn parse_snapshot_line(line: &str) -> std::result::Result<(u64, Vec<f64>), String> {
    let mut fields = line.split_whitespace();
    let raw_index = fields.next().ok_or("empty line")?;
    let index = raw_index
        .parse::<f64>()
        .ok()
        .filter(|i| step_in_range(*i))
        .ok_or_else(|| format!("snapshot index '{raw_index}' is not a non-negative integer in range"))?;

    let features = fields
        .map(|f| {
            f.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| format!("coordinate '{f}' is not a finite number"))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if features.is_empty() {
        return Err("no coordinates after the snapshot index".to_string());
    }
    Ok((index.trunc() as u64, features))
}

/// Iterator over snapshots of a list of files.
pub struct SnapshotStream {
    files: std::vec::IntoIter<PathBuf>,
    current: Option<OpenFile>,
    dimension: Option<usize>,
    malformed: usize,
}

struct OpenFile {
    path: PathBuf,
    origin: String,
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl SnapshotStream {
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self {
            files: files.into_iter(),
            current: None,
            dimension: None,
            malformed: 0,
        }
    }

    /// Treat lines with a component count other than `dimension` as
    /// malformed.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Lines skipped so far because they did not parse.
    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl Iterator for SnapshotStream {
    type Item = Result<Snapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current.is_none() {
                let path = self.files.next()?;
                let file = match File::open(&path) {
                    Ok(f) => f,
                    Err(e) => return Some(Err(e.into())),
                };
                self.current = Some(OpenFile {
                    origin: origin_id(&path),
                    path,
                    lines: BufReader::new(file).lines(),
                    line_no: 0,
                });
            }
            let open = self.current.as_mut()?;

            let line = match open.lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => return Some(Err(e.into())),
                None => {
                    self.current = None;
                    continue;
                }
            };
            open.line_no += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let dimension = self.dimension;
            let parsed = parse_snapshot_line(trimmed).and_then(|(index, features)| {
                match dimension {
                    Some(dim) if features.len() != dim => Err(format!(
                        "{} coordinates, expected {}",
                        features.len(),
                        dim
                    )),
                    _ => Ok((index, features)),
                }
            });
            match parsed {
                Ok((index, features)) => {
                    return Some(Ok(Snapshot {
                        origin: open.origin.clone(),
                        index,
                        features,
                    }))
                }
                Err(reason) => {
                    warn!(
                        "{}",
                        EpochError::malformed(&open.path, open.line_no, reason)
                    );
                    self.malformed += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_origin_id() {
        assert_eq!(origin_id(Path::new("allTrajs/traj_3_12.dat")), "3_12");
        assert_eq!(origin_id(Path::new("coords.dat")), "coords");
    }

    #[test]
    fn test_parse_line() {
        let (idx, v) = parse_snapshot_line("4.0  1.5 -2.0  3.25").unwrap();
        assert_eq!(idx, 4);
        assert_eq!(v, vec![1.5, -2.0, 3.25]);
        assert!(parse_snapshot_line("7").is_err());
        assert!(parse_snapshot_line("x 1 2 3").is_err());
        assert!(parse_snapshot_line("1 nan 2 3").is_err());
    }

    #[test]
    fn test_stream_spans_files_and_skips_bad_lines() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("traj_0_1.dat"), "0 0 0 0\n\n1 1 1 1\n").unwrap();
        fs::write(tmp.path().join("traj_0_2.dat"), "# header\n0 9 9 9\nbroken\n").unwrap();

        let source = SnapshotSource::new(tmp.path(), "traj_*");
        let mut stream = source.stream().unwrap();
        let snaps: Vec<Snapshot> = stream.by_ref().collect::<Result<_>>().unwrap();

        let ids: Vec<(&str, u64)> = snaps.iter().map(|s| (s.origin.as_str(), s.index)).collect();
        assert_eq!(ids, vec![("0_1", 0), ("0_1", 1), ("0_2", 0)]);
        assert_eq!(stream.malformed(), 1);
    }

    #[test]
    fn test_empty_source_is_no_input() {
        let tmp = TempDir::new().unwrap();
        let source = SnapshotSource::new(tmp.path(), "*trajectory*");
        assert!(matches!(source.stream(), Err(EpochError::NoInput { .. })));
    }

    #[test]
    fn test_ragged_lines_dropped_with_dimension() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("traj_A.dat"), "0 0 0 0\n1 1 1\n2 5 5 5\n").unwrap();

        let source = SnapshotSource::new(tmp.path(), "traj_*");
        let mut stream = source.stream().unwrap().with_dimension(3);
        let indices: Vec<u64> = stream
            .by_ref()
            .map(|s| s.unwrap().index)
            .collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(stream.malformed(), 1);
    }

    #[test]
    fn test_index_beyond_u64_is_malformed() {
        assert!(parse_snapshot_line("1e20 1 2 3").is_err());
        assert_eq!(parse_snapshot_line("12.0 1 2 3").unwrap().0, 12);
    }
}
