//! The table snapshot: a complete, immutable state of the grid at one
//! version. Mutators clone the snapshot, edit the clone, and bump the
//! version counter. The counter (plus `updated_at`) is the only
//! cache-invalidation signal collaborators get.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tablecraft_core::{CellId, ColumnId, Range, RowId};

use crate::cell::{Cell, ValueType};
use crate::column::Column;
use crate::row::Row;
use crate::validate::{validate_cell, ValidationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One entry of the active sort specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortKey {
    pub column_id: ColumnId,
    pub direction: SortDirection,
    /// Lower priority sorts first (0 = primary key).
    pub priority: u32,
}

/// Filter condition applied to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FilterCondition {
    Contains { text: String },
    Equals { text: String },
    NotEquals { text: String },
    IsEmpty,
    NotEmpty,
}

impl FilterCondition {
    pub fn matches(&self, content: &str) -> bool {
        match self {
            FilterCondition::Contains { text } => content.to_lowercase().contains(&text.to_lowercase()),
            FilterCondition::Equals { text } => content == text,
            FilterCondition::NotEquals { text } => content != text,
            FilterCondition::IsEmpty => content.trim().is_empty(),
            FilterCondition::NotEmpty => !content.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnFilter {
    pub column_id: ColumnId,
    pub condition: FilterCondition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub title: String,
    /// Bumped by every mutation.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub show_headers: bool,
    pub show_grid: bool,
    pub striped: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { show_headers: true, show_grid: true, striped: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorSettings {
    pub editable: bool,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self { editable: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeSettings {
    pub default_row_height: u32,
    pub default_column_width: u32,
    pub min_column_width: u32,
    pub max_column_width: u32,
}

impl Default for SizeSettings {
    fn default() -> Self {
        Self {
            default_row_height: 32,
            default_column_width: 150,
            min_column_width: 50,
            max_column_width: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSettings {
    /// Undo stack depth; oldest entries are evicted past this.
    pub max_undo_depth: usize,
}

impl Default for PerformanceSettings {
    fn default() -> Self {
        Self { max_undo_depth: 100 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSettings {
    pub display: DisplaySettings,
    pub behavior: BehaviorSettings,
    pub size: SizeSettings,
    pub performance: PerformanceSettings,
}

/// The canonical snapshot. Rows reference column ids, never column
/// objects, so the whole structure JSON-encodes without cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    pub metadata: TableMetadata,
    #[serde(default)]
    pub settings: TableSettings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<ColumnFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortKey>,
    /// Per-cell validation results, refreshed by `revalidate`.
    #[serde(default, skip_serializing_if = "FxHashMap::is_empty")]
    pub validation_index: FxHashMap<CellId, ValidationReport>,
}

impl Table {
    /// A fresh table with the given columns and one empty row (a table
    /// always has at least one row and one column).
    pub fn new(title: impl Into<String>, mut columns: Vec<Column>) -> Self {
        if columns.is_empty() {
            columns.push(Column::new("Column 1", ValueType::Text));
        }
        for (i, column) in columns.iter_mut().enumerate() {
            column.order = i;
        }
        let rows = vec![Row::empty(&columns)];
        let now = Utc::now();

        Self {
            columns,
            rows,
            metadata: TableMetadata {
                title: title.into(),
                version: 0,
                created_at: now,
                updated_at: now,
            },
            settings: TableSettings::default(),
            filters: Vec::new(),
            sort: Vec::new(),
            validation_index: FxHashMap::default(),
        }
    }

    /// A title-only table of the given dimensions, all cells empty text.
    pub fn with_size(title: impl Into<String>, rows: usize, cols: usize) -> Self {
        let columns: Vec<Column> = (0..cols.max(1))
            .map(|i| Column::new(format!("Column {}", i + 1), ValueType::Text))
            .collect();
        let mut table = Self::new(title, columns);
        while table.rows.len() < rows.max(1) {
            table.rows.push(Row::empty(&table.columns));
        }
        table
    }

    /// Record a mutation: bump the version counter and refresh the
    /// table-level updated timestamp.
    pub fn bump_version(&mut self) {
        self.metadata.version += 1;
        self.metadata.updated_at = Utc::now();
    }

    // ========================================================================
    // Geometry
    // ========================================================================

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_position(&self, row_id: &RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == *row_id)
    }

    pub fn column_position(&self, column_id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id == *column_id)
    }

    /// Resolve a cell id to its (row position, column position).
    pub fn cell_position(&self, cell_id: &CellId) -> Option<(usize, usize)> {
        let (row_id, column_id) = cell_id.parse().ok()?;
        Some((self.row_position(&row_id)?, self.column_position(&column_id)?))
    }

    pub fn row(&self, row_id: &RowId) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == *row_id)
    }

    pub fn column(&self, column_id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == *column_id)
    }

    /// Look up a cell by id. `None` when the row/column is gone or the
    /// cell was removed by a merge.
    pub fn cell(&self, cell_id: &CellId) -> Option<&Cell> {
        let (row_id, column_id) = cell_id.parse().ok()?;
        self.row(&row_id)?.cell(&column_id)
    }

    pub(crate) fn cell_mut(&mut self, cell_id: &CellId) -> Option<&mut Cell> {
        let (row_id, column_id) = cell_id.parse().ok()?;
        self.rows
            .iter_mut()
            .find(|r| r.id == row_id)?
            .cell_mut(&column_id)
    }

    /// The id a cell at this position would have (whether or not the cell
    /// currently exists in the row map).
    pub fn cell_id_at(&self, row: usize, col: usize) -> Option<CellId> {
        let row_id = &self.rows.get(row)?.id;
        let column_id = &self.columns.get(col)?.id;
        Some(CellId::compose(row_id, column_id))
    }

    /// Ids of all existing cells covered by the range, row-major. Positions
    /// outside the table and positions merged away are skipped.
    pub fn cells_in_range(&self, range: &Range) -> Vec<CellId> {
        range
            .cells()
            .filter_map(|(r, c)| {
                let row = self.rows.get(r)?;
                let column = self.columns.get(c)?;
                row.cell(&column.id).map(|cell| cell.id.clone())
            })
            .collect()
    }

    /// The rectangle covering the whole table.
    pub fn full_range(&self) -> Range {
        Range::new(
            0,
            0,
            self.rows.len().saturating_sub(1),
            self.columns.len().saturating_sub(1),
        )
    }

    // ========================================================================
    // Filters and validation
    // ========================================================================

    /// Rows surviving the active filters, in table order.
    pub fn visible_rows(&self) -> Vec<&Row> {
        self.rows
            .iter()
            .filter(|row| !row.hidden && self.row_matches_filters(row))
            .collect()
    }

    fn row_matches_filters(&self, row: &Row) -> bool {
        self.filters.iter().all(|filter| {
            let content = row
                .cell(&filter.column_id)
                .map(|cell| cell.content.as_str())
                .unwrap_or("");
            filter.condition.matches(content)
        })
    }

    /// Re-run validation for every cell and rebuild the validation index.
    /// Only cells with at least one issue are indexed.
    pub fn revalidate(&mut self) {
        let mut index = FxHashMap::default();
        for row in &self.rows {
            for column in &self.columns {
                let Some(cell) = row.cell(&column.id) else { continue };
                let report = validate_cell(cell, column);
                if report.issue_count() > 0 {
                    index.insert(cell.id.clone(), report);
                }
            }
        }
        self.validation_index = index;
    }

    /// Completeness invariant check (used by tests): every row's cell map
    /// covers exactly the current column set. Cells removed by a merge are
    /// accounted for through their spanning neighbor.
    pub fn is_complete(&self) -> bool {
        use std::collections::BTreeSet;

        let column_set: BTreeSet<&ColumnId> = self.columns.iter().map(|c| &c.id).collect();
        self.rows.iter().all(|row| {
            let row_set: BTreeSet<&ColumnId> = row.cells.keys().collect();
            row_set == column_set
        })
    }
}
