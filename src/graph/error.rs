//! Errors raised by the layout engine.
//!
//! Every variant is a caller contract violation. Truncated or disconnected
//! history is never an error: it shows up as unresolved trace ends instead.

use thiserror::Error;

use super::commit::CommitId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    /// Expansion requested for a row the snapshot does not have.
    #[error("row {row} is out of range for a snapshot with {row_count} rows")]
    RowOutOfRange { row: usize, row_count: usize },

    /// Commits must arrive in display order with consecutive row indices.
    #[error("commit {id} has row {found}, expected row {expected}")]
    NonSequentialRow {
        id: CommitId,
        expected: usize,
        found: usize,
    },

    /// The same hash appeared twice in the loaded history.
    #[error("commit {0} appears more than once")]
    DuplicateCommit(CommitId),

    /// The working-changes pseudo commit may only occupy row 0.
    #[error("working-changes commit {id} at row {row}; it must be the single commit at row 0")]
    MisplacedWorkingChanges { id: CommitId, row: usize },

    #[error("palette size must be at least 1")]
    InvalidPaletteSize,

    #[error("extra height must be finite and non-negative, got {0}")]
    InvalidExtraHeight(f32),
}
