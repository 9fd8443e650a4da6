use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tablecraft_core::{ColumnId, RowId};

use crate::cell::Cell;
use crate::column::Column;

/// A row: a complete mapping from column id to cell.
///
/// Invariant: the key set of `cells` equals the table's current column set
/// (restored immediately by column insert/delete), except for cells that a
/// merge removed in favor of a spanning neighbor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub id: RowId,
    pub cells: FxHashMap<ColumnId, Cell>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub hidden: bool,
    /// Parent row for grouped rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<RowId>,
}

impl Row {
    /// A row with one empty cell per column (content "", type = the
    /// column's declared type, or the column default value when set).
    pub fn empty(columns: &[Column]) -> Self {
        let id = RowId::generate();
        let now = Utc::now();
        let cells = columns
            .iter()
            .map(|column| {
                let cell = match &column.default_value {
                    Some(default) => Cell::with_content(&id, &column.id, column.value_type, default.clone()),
                    None => Cell::empty(&id, &column.id, column.value_type),
                };
                (column.id.clone(), cell)
            })
            .collect();

        Self {
            id,
            cells,
            height: None,
            created_at: now,
            updated_at: now,
            locked: false,
            hidden: false,
            parent: None,
        }
    }

    pub fn cell(&self, column_id: &ColumnId) -> Option<&Cell> {
        self.cells.get(column_id)
    }

    pub fn cell_mut(&mut self, column_id: &ColumnId) -> Option<&mut Cell> {
        self.cells.get_mut(column_id)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Caller-supplied parts of a new row; everything else defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSeed {
    pub height: Option<u32>,
    /// Initial content per column; columns not listed stay empty.
    pub values: Vec<(ColumnId, String)>,
}
