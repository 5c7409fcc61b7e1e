//! Design Schedule
//!
//! Builds the per-node tree switching order used by BIBD routing.
//!
//! A symmetric `(n, r, 1)` block design is resolved into `r` rounds by
//! repeated maximum matching on its element/block incidence graph; the
//! complement design contributes another `n - r` rounds. Each element row
//! then lists every block exactly once. [`extend_matrix`] widens an `n × n`
//! result to any larger `N × N` without repeating a value inside a row.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

pub mod design;
pub mod generator;
pub mod table;

pub use design::{builtin_design, fano_plane, projective_plane_21, BlockDesign};
pub use generator::{build_schedule, extend_matrix, resolve, schedule_for};

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Design has no blocks")]
    EmptyDesign,
    #[error("Design is not symmetric: {elements} elements, {blocks} blocks")]
    NotSymmetric { elements: usize, blocks: usize },
    #[error("Block {block} has {found} elements, expected {expected}")]
    UnevenBlock { block: usize, expected: usize, found: usize },
    #[error("Block {block} contains invalid or repeated element {element}")]
    InvalidElement { block: usize, element: usize },
    #[error("Element {element} appears in {found} blocks, expected {expected}")]
    NotRegular { element: usize, expected: usize, found: usize },
    #[error("Elements {a} and {b} share {found} blocks, expected exactly one")]
    NotPairwiseBalanced { a: usize, b: usize, found: usize },
    #[error("No perfect matching in round {round}: element {element} left unmatched")]
    NoPerfectMatching { round: usize, element: usize },
    #[error("Cannot extend a {rows}x{width} schedule to size {target}")]
    TargetTooSmall { rows: usize, width: usize, target: usize },
    #[error("Row {row} has {found} entries, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },
    #[error("Invalid table entry {token:?} on line {line}")]
    Parse { line: usize, token: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;

/// Rectangular switching table: row `i`, column `j` is the tree to use at
/// node-row `i` after `j` failures there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesignSchedule {
    rows: Vec<Vec<usize>>,
}

impl DesignSchedule {
    /// Wrap a row-major table, rejecting ragged or empty input
    pub fn from_rows(rows: Vec<Vec<usize>>) -> Result<Self> {
        let width = rows.first().map(|r| r.len()).ok_or(ScheduleError::EmptyDesign)?;
        for (i, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(ScheduleError::RaggedRow {
                    row: i,
                    expected: width,
                    found: row.len(),
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    pub fn row(&self, index: usize) -> &[usize] {
        &self.rows[index]
    }

    pub fn row_mut(&mut self, index: usize) -> &mut [usize] {
        &mut self.rows[index]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[usize]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    /// Largest entry in the table
    pub fn max_entry(&self) -> Option<usize> {
        self.rows.iter().flatten().copied().max()
    }

    /// First row (if any) that repeats a value within its first `prefix`
    /// columns
    pub fn first_repeating_row(&self, prefix: usize) -> Option<usize> {
        self.rows.iter().position(|row| {
            let upto = prefix.min(row.len());
            let distinct: HashSet<usize> = row[..upto].iter().copied().collect();
            distinct.len() != upto
        })
    }

    /// Every row is pairwise distinct across its full width
    pub fn has_distinct_rows(&self) -> bool {
        self.first_repeating_row(self.width()).is_none()
    }
}
