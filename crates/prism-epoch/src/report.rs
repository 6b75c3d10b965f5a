//! Report tables: discovery under a sampling root and row streaming.
//!
//! A report is a column table written by the sampler, one row per accepted
//! step. Columns are separated by a tab or by two or more spaces so that
//! multi-word names such as `Binding Energy` stay intact:
//!
//! ```text
//! #Task    Step    numberOfAcceptedPeleSteps    currentEnergy    Binding Energy    sasaLig
//!     1       0                            0    -7823.12             -45.31        0.12
//! ```

use log::{debug, warn};
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{EpochError, Result};

/// Default label that identifies report files by name.
pub const REPORT_LABEL: &str = "report";

/// Default name of the accepted-step column.
pub const ACCEPTED_STEPS_COLUMN: &str = "numberOfAcceptedPeleSteps";

/// Identity of one report file, shared by every row it produces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReportOrigin {
    /// Path of the report file
    pub path: PathBuf,
    /// Numeric suffix shared with the paired trajectory (`report_7` → `7`)
    pub report_number: String,
    /// Name of the folder holding the report (one folder per epoch)
    pub epoch: String,
}

impl ReportOrigin {
    /// Derive report number and epoch from the report path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let report_number = file_name
            .rsplit('_')
            .next()
            .unwrap_or(file_name.as_str())
            .to_string();
        let epoch = path
            .parent()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            report_number,
            epoch,
        }
    }

    /// File name of the report (used to disambiguate output names).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// One scored simulation step.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub origin: Arc<ReportOrigin>,
    pub step: u64,
    pub value: f64,
}

enum SourceInput {
    File,
    Text(String),
}

/// One report table. Rows are read lazily, one line at a time.
pub struct TableSource {
    origin: Arc<ReportOrigin>,
    input: SourceInput,
}

impl TableSource {
    /// Wrap a report file on disk.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(EpochError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("report {} does not exist", path.display()),
            )));
        }
        Ok(Self {
            origin: Arc::new(ReportOrigin::from_path(path)),
            input: SourceInput::File,
        })
    }

    /// Wrap in-memory report text attributed to `path`.
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        Self {
            origin: Arc::new(ReportOrigin::from_path(path)),
            input: SourceInput::Text(text.into()),
        }
    }

    pub fn origin(&self) -> &Arc<ReportOrigin> {
        &self.origin
    }

    pub fn path(&self) -> &Path {
        &self.origin.path
    }

    /// Stream `(step, criterion)` rows.
    ///
    /// Fails with `MissingColumn` when the header does not name both
    /// columns. A report without any header line yields no rows. Rows whose
    /// values do not parse are logged and skipped.
    pub fn rows(&self, criterion: &str, steps_column: &str) -> Result<ReportRows> {
        let mut reader: Box<dyn BufRead + Send> = match &self.input {
            SourceInput::File => Box::new(BufReader::new(File::open(&self.origin.path)?)),
            SourceInput::Text(text) => Box::new(Cursor::new(text.clone().into_bytes())),
        };

        let mut line = String::new();
        let mut line_no = 0usize;
        let header = loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break None;
            }
            line_no += 1;
            if !line.trim().is_empty() {
                break Some(parse_header(&line));
            }
        };

        // An epoch still being written can leave a report with no header yet.
        let Some(header) = header else {
            warn!("Report {} is empty; skipping it", self.origin.path.display());
            return Ok(ReportRows {
                origin: Arc::clone(&self.origin),
                reader: Box::new(std::io::empty()),
                width: 0,
                step_idx: 0,
                value_idx: 0,
                line_no,
                dropped: 0,
                buf: String::new(),
            });
        };

        let column = |name: &str| -> Result<usize> {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| EpochError::MissingColumn {
                    path: self.origin.path.clone(),
                    column: name.to_string(),
                })
        };
        let value_idx = column(criterion)?;
        let step_idx = column(steps_column)?;

        Ok(ReportRows {
            origin: Arc::clone(&self.origin),
            reader,
            width: header.len(),
            step_idx,
            value_idx,
            line_no,
            dropped: 0,
            buf: String::new(),
        })
    }
}

/// Lazy iterator over the usable rows of a report.
pub struct ReportRows {
    origin: Arc<ReportOrigin>,
    reader: Box<dyn BufRead + Send>,
    width: usize,
    step_idx: usize,
    value_idx: usize,
    line_no: usize,
    dropped: usize,
    buf: String,
}

impl ReportRows {
    /// Rows skipped so far because they did not parse.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn parse_row(&self, line: &str) -> Result<ReportRow> {
        let mut cells = split_columns(line);
        if cells.len() != self.width {
            let loose: Vec<&str> = line.split_whitespace().collect();
            if loose.len() == self.width {
                cells = loose;
            }
        }

        let cell = |idx: usize, what: &str| {
            cells.get(idx).copied().ok_or_else(|| {
                EpochError::malformed(&self.origin.path, self.line_no, format!("missing {what} value"))
            })
        };

        let raw_value = cell(self.value_idx, "criterion")?;
        let value: f64 = raw_value.parse().map_err(|_| {
            EpochError::malformed(
                &self.origin.path,
                self.line_no,
                format!("criterion '{raw_value}' is not a number"),
            )
        })?;
        if !value.is_finite() {
            return Err(EpochError::malformed(
                &self.origin.path,
                self.line_no,
                format!("criterion '{raw_value}' is not finite"),
            ));
        }

        let raw_step = cell(self.step_idx, "step")?;
        let step = raw_step
            .parse::<f64>()
            .ok()
            .filter(|s| step_in_range(*s))
            .ok_or_else(|| {
                EpochError::malformed(
                    &self.origin.path,
                    self.line_no,
                    format!("step '{raw_step}' is not a non-negative integer in range"),
                )
            })?;

        Ok(ReportRow {
            origin: Arc::clone(&self.origin),
            step: step.trunc() as u64,
            value,
        })
    }
}

impl Iterator for ReportRows {
    type Item = Result<ReportRow>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => {
                    if self.dropped > 0 {
                        debug!(
                            "{}: {} malformed rows dropped",
                            self.origin.path.display(),
                            self.dropped
                        );
                    }
                    return None;
                }
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line_no += 1;
            if self.buf.trim().is_empty() {
                continue;
            }
            match self.parse_row(&self.buf) {
                Ok(row) => return Some(Ok(row)),
                Err(e) if e.is_recoverable() => {
                    warn!("{}", e);
                    self.dropped += 1;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// True for a finite, non-negative value whose integer part fits a `u64`.
pub(crate) fn step_in_range(value: f64) -> bool {
    // `u64::MAX as f64` rounds up to 2^64, which itself does not fit.
    value.is_finite() && value >= 0.0 && value < u64::MAX as f64
}

fn parse_header(line: &str) -> Vec<String> {
    let mut names: Vec<String> = split_columns(line).into_iter().map(str::to_string).collect();
    if let Some(first) = names.first_mut() {
        if let Some(stripped) = first.strip_prefix('#') {
            *first = stripped.trim().to_string();
        }
    }
    names
}

/// Split on tabs or runs of two or more spaces.
pub fn split_columns(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut cells = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let delimiter = bytes[i] == b'\t'
            || bytes[i] == b'\n'
            || bytes[i] == b'\r'
            || (bytes[i] == b' ' && matches!(bytes.get(i + 1), Some(b' ' | b'\t')));
        if delimiter {
            let cell = line[start..i].trim();
            if !cell.is_empty() {
                cells.push(cell);
            }
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            start = i;
        } else {
            i += 1;
        }
    }

    let cell = line[start..].trim();
    if !cell.is_empty() {
        cells.push(cell);
    }
    cells
}

/// Find report files under `root`.
///
/// Looks one folder down first (`root/<epoch>/*report*`); falls back to
/// `root/*report*`. The result is sorted so runs are reproducible.
pub fn discover_reports(root: &Path, label: &str) -> Result<Vec<PathBuf>> {
    let escaped = glob::Pattern::escape(&root.to_string_lossy());
    let label = glob::Pattern::escape(label);

    let mut reports = glob_files(&format!("{escaped}/*/*{label}*"))?;
    if reports.is_empty() {
        reports = glob_files(&format!("{escaped}/*{label}*"))?;
    }
    if reports.is_empty() {
        return Err(EpochError::NoInput {
            root: root.to_path_buf(),
        });
    }

    reports.sort();
    debug!("Discovered {} reports under {}", reports.len(), root.display());
    Ok(reports)
}

pub(crate) fn glob_files(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("Glob error: {}", e),
        }
    }
    Ok(files)
}
