//! Error taxonomy for the engine.
//!
//! Structural mutators are total over well-formed input: they fail loudly
//! only for the two cardinality invariants and for malformed ids. Validation
//! returns structured results instead of errors, and display formatting
//! degrades to raw content rather than failing.

use tablecraft_core::{CellId, ColumnId, IdError, RowId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A table must always keep at least one row.
    #[error("cannot delete the last remaining row")]
    CannotDeleteLastRow,

    /// A table must always keep at least one column.
    #[error("cannot delete the last remaining column")]
    CannotDeleteLastColumn,

    #[error("row not found: {0}")]
    RowNotFound(RowId),

    #[error("column not found: {0}")]
    ColumnNotFound(ColumnId),

    #[error("cell not found: {0}")]
    CellNotFound(CellId),

    #[error(transparent)]
    MalformedIdentifier(#[from] IdError),

    /// Undo/redo requested with nothing on the corresponding stack.
    #[error("nothing to {0}")]
    NothingToRevert(&'static str),

    /// The table is configured read-only.
    #[error("table is not editable")]
    NotEditable,
}
