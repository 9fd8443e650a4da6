//! Stable identity for rows, columns, and cells.
//!
//! Row and column ids are generated once and never change for the lifetime
//! of a table. A cell id is derived from its owning (row, column) pair and
//! can always be parsed back into exactly that pair.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator used inside a composed cell id.
///
/// Generated row/column ids never contain this character, which keeps
/// parsing unambiguous.
pub const CELL_ID_SEPARATOR: char = ':';

const CELL_ID_PREFIX: &str = "cell";

/// Failure to interpret an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The id does not have the `cell:{rowId}:{columnId}` shape.
    #[error("malformed cell identifier: `{0}`")]
    Malformed(String),
}

/// Generate a collision-resistant id fragment: `{prefix}-{millis}-{rand}`.
///
/// Timestamp plus a random suffix rather than a sequential counter, so two
/// tables (or two concurrent callers) never mint the same id.
fn generate_fragment(prefix: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let rand = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, millis, &rand[..8])
}

macro_rules! axis_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh id.
            pub fn generate() -> Self {
                Self(generate_fragment($prefix))
            }

            /// Wrap an existing id (e.g. read back from JSON).
            ///
            /// Ids must not contain `:`, or composed cell ids would become
            /// unparseable.
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new(raw)
            }
        }
    };
}

axis_id!(
    /// Unique identifier for a row. Stable across structural edits.
    RowId,
    "row"
);
axis_id!(
    /// Unique identifier for a column. Stable across structural edits.
    ColumnId,
    "col"
);

/// Unique identifier for a cell, derived from its (row, column) pair.
///
/// Shape: `cell:{rowId}:{columnId}`. Identity is never reused: merged-away
/// cells are deleted and cells created by a split get fresh sibling column
/// ids, so a cell id names exactly one (row, column) pair forever.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    /// Compose a cell id from its owning row and column.
    pub fn compose(row: &RowId, column: &ColumnId) -> Self {
        Self(format!(
            "{}{}{}{}{}",
            CELL_ID_PREFIX, CELL_ID_SEPARATOR, row.0, CELL_ID_SEPARATOR, column.0
        ))
    }

    /// Recover the (row, column) pair this id was composed from.
    ///
    /// Fails with [`IdError::Malformed`] for anything that does not match
    /// the `cell:{rowId}:{columnId}` shape; callers must not coerce.
    pub fn parse(&self) -> Result<(RowId, ColumnId), IdError> {
        let mut parts = self.0.split(CELL_ID_SEPARATOR);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(CELL_ID_PREFIX), Some(row), Some(col), None) if !row.is_empty() && !col.is_empty() => {
                Ok((RowId::new(row), ColumnId::new(col)))
            }
            _ => Err(IdError::Malformed(self.0.clone())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
