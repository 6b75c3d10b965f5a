//! Global best-N selection across any number of report tables.
//!
//! Each table is reduced to its own best `n` rows first, then merged into a
//! running [`RankedSet`] that never holds more than `n` rows. Peak memory is
//! bounded by `n` per table in flight, never by the total number of rows.
//!
//! Ordering is the metric in the requested direction, then the report path,
//! then the step index. Exactly equal metrics are therefore ordered by a
//! secondary key rather than by arrival order, so the result does not depend
//! on the order in which tables are visited or on how they are batched.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::errors::{EpochError, Result};
use crate::report::{ReportRow, TableSource};

/// Which end of the metric is "best".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Lowest values first
    #[default]
    Min,
    /// Highest values first
    Max,
}

impl Direction {
    fn compare(self, a: f64, b: f64) -> Ordering {
        match self {
            Direction::Min => a.total_cmp(&b),
            Direction::Max => b.total_cmp(&a),
        }
    }
}

impl FromStr for Direction {
    type Err = EpochError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(Direction::Min),
            "max" => Ok(Direction::Max),
            other => Err(EpochError::invalid(format!(
                "sort direction must be 'min' or 'max', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Min => write!(f, "min"),
            Direction::Max => write!(f, "max"),
        }
    }
}

fn row_cmp(direction: Direction, a: &ReportRow, b: &ReportRow) -> Ordering {
    direction
        .compare(a.value, b.value)
        .then_with(|| a.origin.path.cmp(&b.origin.path))
        .then_with(|| a.step.cmp(&b.step))
}

/// Sorted container holding at most `capacity` rows.
#[derive(Debug, Clone)]
pub struct RankedSet {
    capacity: usize,
    direction: Direction,
    rows: Vec<ReportRow>,
}

impl RankedSet {
    pub fn new(capacity: usize, direction: Direction) -> Self {
        Self {
            capacity,
            direction,
            rows: Vec::with_capacity(capacity.min(1024)),
        }
    }

    /// Insert `row` if it belongs in the best `capacity`.
    ///
    /// Returns whether the row was kept. Once full, a row that does not beat
    /// the current worst is rejected without touching the container.
    pub fn offer(&mut self, row: ReportRow) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.rows.len() == self.capacity {
            if let Some(worst) = self.rows.last() {
                if row_cmp(self.direction, &row, worst) != Ordering::Less {
                    return false;
                }
            }
        }

        let direction = self.direction;
        let pos = self
            .rows
            .partition_point(|r| row_cmp(direction, r, &row) != Ordering::Greater);
        self.rows.insert(pos, row);
        self.rows.truncate(self.capacity);
        true
    }

    /// Merge another set into this one and re-truncate.
    pub fn merge(&mut self, other: RankedSet) {
        for row in other.rows {
            if !self.offer(row) && self.rows.len() == self.capacity {
                // `other` is sorted the same way: nothing after this can win.
                if other.direction == self.direction {
                    break;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Rows, best first.
    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<ReportRow> {
        self.rows
    }

    /// Current worst kept row.
    pub fn worst(&self) -> Option<&ReportRow> {
        self.rows.last()
    }

    /// True when no neighbour pair violates the ordering.
    pub fn is_ordered(&self) -> bool {
        self.rows
            .windows(2)
            .all(|w| row_cmp(self.direction, &w[0], &w[1]) != Ordering::Greater)
    }
}

/// Ranks report rows by one criterion across many tables.
#[derive(Debug, Clone)]
pub struct TopNMerger {
    n: usize,
    criterion: String,
    steps_column: String,
    direction: Direction,
}

impl TopNMerger {
    pub fn new(
        n: usize,
        criterion: impl Into<String>,
        steps_column: impl Into<String>,
        direction: Direction,
    ) -> Result<Self> {
        if n == 0 {
            return Err(EpochError::invalid("number of structures must be positive"));
        }
        Ok(Self {
            n,
            criterion: criterion.into(),
            steps_column: steps_column.into(),
            direction,
        })
    }

    pub fn criterion(&self) -> &str {
        &self.criterion
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Best `n` rows of a single table.
    pub fn local_top(&self, source: &TableSource) -> Result<RankedSet> {
        let mut local = RankedSet::new(self.n, self.direction);
        let mut rows = source.rows(&self.criterion, &self.steps_column)?;
        for row in rows.by_ref() {
            local.offer(row?);
        }
        if local.is_empty() {
            warn!(
                "No usable '{}' rows in {} ({} dropped)",
                self.criterion,
                source.path().display(),
                rows.dropped()
            );
        } else {
            debug!(
                "{}: local best {} rows, worst {:?}",
                source.path().display(),
                local.len(),
                local.worst().map(|r| r.value)
            );
        }
        Ok(local)
    }

    /// Rank sequentially, one table at a time.
    pub fn rank(&self, sources: &[TableSource]) -> Result<RankedSet> {
        if sources.is_empty() {
            return Err(EpochError::NoInput {
                root: "<empty source list>".into(),
            });
        }

        let mut ranked = RankedSet::new(self.n, self.direction);
        for source in sources {
            ranked.merge(self.local_top(source)?);
        }
        self.log_result(&ranked, sources.len());
        Ok(ranked)
    }

    /// Rank with per-table reductions fanned out on the rayon pool.
    ///
    /// The merge into the shared set stays on the calling thread.
    pub fn rank_parallel(&self, sources: &[TableSource]) -> Result<RankedSet> {
        if sources.is_empty() {
            return Err(EpochError::NoInput {
                root: "<empty source list>".into(),
            });
        }

        let locals: Vec<RankedSet> = sources
            .par_iter()
            .map(|source| self.local_top(source))
            .collect::<Result<_>>()?;

        let mut ranked = RankedSet::new(self.n, self.direction);
        for local in locals {
            ranked.merge(local);
        }
        self.log_result(&ranked, sources.len());
        Ok(ranked)
    }

    fn log_result(&self, ranked: &RankedSet, n_sources: usize) {
        info!(
            "Ranked '{}' ({}) over {} reports: kept {} of {} requested",
            self.criterion,
            self.direction,
            n_sources,
            ranked.len(),
            self.n
        );
    }
}
