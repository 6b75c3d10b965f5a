//! Multi-model trajectory access: locate one frame, write it standalone.
//!
//! Trajectories are multi-model PDB text. Every frame sits between a
//! `MODEL <ordinal>` line and an `ENDMDL` line; frame sizes vary, so a frame
//! is found by a forward scan over the markers rather than by offset.

use log::{debug, info};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::errors::{EpochError, Result};
use crate::pairing::PairResolver;
use crate::report::ReportOrigin;

const START_MARKER: &str = "MODEL";
const END_MARKER: &str = "ENDMDL";

/// Frame ordinal for a step: `step / stride + 1`.
pub fn frame_ordinal(step: u64, stride: usize) -> Result<usize> {
    if stride == 0 {
        return Err(EpochError::invalid("output stride must be a positive integer"));
    }
    usize::try_from(step / stride as u64)
        .ok()
        .and_then(|index| index.checked_add(1))
        .ok_or_else(|| EpochError::invalid(format!("step {step} is beyond the last addressable frame")))
}

/// Start marker in the fixed-width layout used by the sampler.
pub fn start_marker(ordinal: usize) -> String {
    format!("{START_MARKER}     {ordinal:>4}")
}

/// A frame inside a trajectory file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameReference {
    pub trajectory: PathBuf,
    pub ordinal: usize,
}

/// A frame read back from disk. `body` is every line strictly between the
/// frame's markers, byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFrame {
    pub reference: FrameReference,
    pub body: String,
}

/// Resolves report rows to frames.
pub struct FrameLocator<R: PairResolver> {
    resolver: R,
    stride: usize,
}

impl<R: PairResolver> FrameLocator<R> {
    pub fn new(resolver: R, stride: usize) -> Result<Self> {
        if stride == 0 {
            return Err(EpochError::invalid("output stride must be a positive integer"));
        }
        Ok(Self { resolver, stride })
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Trajectory and ordinal for a step, without reading the frame.
    pub fn reference(&self, origin: &ReportOrigin, step: u64) -> Result<FrameReference> {
        Ok(FrameReference {
            trajectory: self.resolver.resolve(origin)?,
            ordinal: frame_ordinal(step, self.stride)?,
        })
    }

    /// Resolve and read the frame recorded for `step`.
    pub fn locate(&self, origin: &ReportOrigin, step: u64) -> Result<LocatedFrame> {
        read_frame(&self.reference(origin, step)?)
    }
}

/// Read the frame named by `reference`.
pub fn read_frame(reference: &FrameReference) -> Result<LocatedFrame> {
    let file = File::open(&reference.trajectory).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EpochError::TrajectoryNotFound {
            pattern: reference.trajectory.display().to_string(),
        },
        _ => EpochError::Io(e),
    })?;

    match scan_frame(BufReader::new(file), reference.ordinal)? {
        Some(body) => {
            debug!(
                "MODEL {} found in {} ({} bytes)",
                reference.ordinal,
                reference.trajectory.display(),
                body.len()
            );
            Ok(LocatedFrame {
                reference: reference.clone(),
                body,
            })
        }
        None => Err(EpochError::FrameNotFound {
            path: reference.trajectory.clone(),
            ordinal: reference.ordinal,
        }),
    }
}

/// Single forward pass; stops at the end marker of the requested frame.
///
/// A block left open at end of input does not count as found.
pub fn scan_frame<B: BufRead>(mut reader: B, ordinal: usize) -> std::io::Result<Option<String>> {
    let mut line = String::new();
    let mut body: Option<String> = None;

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        if let Some(collected) = body.as_mut() {
            if line.starts_with(END_MARKER) {
                break;
            }
            collected.push_str(&line);
        } else if marker_ordinal(&line) == Some(ordinal) {
            body = Some(String::new());
        }
    }
    Ok(body)
}

fn marker_ordinal(line: &str) -> Option<usize> {
    let rest = line.strip_prefix(START_MARKER)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    rest.split_whitespace().next()?.parse().ok()
}

/// Writes located frames as standalone single-model files.
#[derive(Debug, Clone)]
pub struct FrameExtractor {
    output_dir: PathBuf,
}

impl FrameExtractor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Single-frame document, renumbered to MODEL 1.
    pub fn render(frame: &LocatedFrame) -> String {
        let mut doc = String::with_capacity(frame.body.len() + 32);
        doc.push_str(&start_marker(1));
        doc.push('\n');
        doc.push_str(&frame.body);
        if !frame.body.is_empty() && !frame.body.ends_with('\n') {
            doc.push('\n');
        }
        doc.push_str(END_MARKER);
        doc.push('\n');
        doc
    }

    /// Write the frame to `<output_dir>/<file_name>`.
    pub fn extract(&self, frame: &LocatedFrame, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name);
        fs::write(&path, Self::render(frame))?;
        info!("MODEL {} has been selected", file_name);
        Ok(path)
    }
}

/// Metric as written into file names: shortest round-trip decimal, with a
/// trailing `.0` on integral values (`5.0`, `-45.31`).
pub fn format_metric_value(value: f64) -> String {
    let text = format!("{value}");
    if value.is_finite() && value.fract() == 0.0 && !text.contains(['.', 'e', 'E']) {
        format!("{text}.0")
    } else {
        text
    }
}

/// `epoch<E>_trajectory_<report>.<step>_<criterion><value>.pdb`
pub fn structure_file_name(origin: &ReportOrigin, step: u64, criterion: &str, value: f64) -> String {
    format!(
        "epoch{}_trajectory_{}.{}_{}{}.pdb",
        origin.epoch,
        origin.report_number,
        step,
        criterion.replace(' ', ""),
        format_metric_value(value)
    )
}

/// Hands out output names, disambiguating repeats within one run.
#[derive(Debug, Default)]
pub struct OutputNamer {
    used: HashSet<String>,
}

impl OutputNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Conventional name, or `<name>.<report file>.pdb` if already taken.
    pub fn name(&mut self, origin: &ReportOrigin, step: u64, criterion: &str, value: f64) -> String {
        let base = structure_file_name(origin, step, criterion, value);
        if self.used.insert(base.clone()) {
            return base;
        }

        let stem = base.strip_suffix(".pdb").unwrap_or(&base);
        let mut candidate = format!("{}.{}.pdb", stem, origin.file_name());
        let mut counter = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{}.{}.{}.pdb", stem, origin.file_name(), counter);
            counter += 1;
        }
        candidate
    }
}
