//! Structural mutation: pure functions from one snapshot to the next.
//!
//! Every operation here takes the prior [`Table`] by reference and returns
//! a fresh snapshot with the version bumped. Mutators are total over
//! well-formed input: an "insert after X" whose reference no longer
//! resolves appends at the end instead of failing. The only loud failures
//! are the two cardinality invariants (a table always keeps at least one
//! row and one column) and malformed ids.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tablecraft_core::{CellId, ColumnId, RowId};

use crate::cell::{Cell, CellMetadata, CellPayload, CellSpan, CellStyle, ValueType};
use crate::column::{Column, ColumnSeed};
use crate::error::EngineError;
use crate::history::{
    OperationBackup, OperationKind, OperationRecord, OperationScope, OperationTarget,
};
use crate::row::{Row, RowSeed};
use crate::table::{ColumnFilter, SortDirection, SortKey, Table};

/// Targeted change to a single cell. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellDelta {
    pub content: Option<String>,
    pub value_type: Option<ValueType>,
    /// Shallow-merged onto the existing style.
    pub style: Option<CellStyle>,
    /// Replaces the cell's metadata wholesale.
    pub metadata: Option<CellMetadata>,
    pub payload: Option<CellPayload>,
    pub clear_payload: bool,
}

impl CellDelta {
    pub fn content(text: impl Into<String>) -> Self {
        Self { content: Some(text.into()), ..Self::default() }
    }

    pub fn style(delta: CellStyle) -> Self {
        Self { style: Some(delta), ..Self::default() }
    }
}

/// The closed set of operations the controller dispatches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Operation {
    InsertRow { after: Option<RowId>, seed: Option<RowSeed> },
    DeleteRow { row_id: RowId },
    InsertColumn { after: Option<ColumnId>, seed: Option<ColumnSeed> },
    DeleteColumn { column_id: ColumnId },
    UpdateCell { cell_id: CellId, delta: CellDelta },
    ApplyStyle { cell_ids: Vec<CellId>, delta: CellStyle },
    MergeCells { cell_ids: Vec<CellId>, primary: CellId },
    SplitCell { cell_id: CellId, rows: u32, cols: u32 },
    ResizeColumn { column_id: ColumnId, width: u32 },
    MoveColumn { column_id: ColumnId, to_index: usize },
    SortRows { keys: Vec<SortKey> },
    SetFilter { filter: ColumnFilter },
    ClearFilters,
    Paste { at: CellId, grid: Vec<Vec<String>> },
}

/// Result of applying one operation: the next snapshot plus the completed
/// record for the operation log.
#[derive(Debug, Clone)]
pub struct Applied {
    pub table: Table,
    pub record: OperationRecord,
}

// ============================================================================
// Row operations
// ============================================================================

/// Insert a new row, after `after` when it resolves, at the end otherwise.
/// Returns the new snapshot and the new row's id so callers can focus it.
pub fn insert_row(table: &Table, after: Option<&RowId>, seed: Option<&RowSeed>) -> (Table, RowId) {
    let mut next = table.clone();
    let mut row = Row::empty(&next.columns);
    if let Some(seed) = seed {
        if seed.height.is_some() {
            row.height = seed.height;
        }
        for (column_id, content) in &seed.values {
            if let Some(cell) = row.cell_mut(column_id) {
                cell.content = content.clone();
            }
        }
    }
    let row_id = row.id.clone();
    let index = after
        .and_then(|id| next.row_position(id))
        .map(|p| p + 1)
        .unwrap_or(next.rows.len());
    next.rows.insert(index, row);
    next.bump_version();
    (next, row_id)
}

pub fn delete_row(table: &Table, row_id: &RowId) -> Result<Table, EngineError> {
    if table.rows.len() <= 1 {
        return Err(EngineError::CannotDeleteLastRow);
    }
    let mut next = table.clone();
    let index = next
        .row_position(row_id)
        .ok_or_else(|| EngineError::RowNotFound(row_id.clone()))?;
    next.rows.remove(index);
    next.validation_index
        .retain(|id, _| !matches!(id.parse(), Ok((r, _)) if r == *row_id));
    clamp_spans(&mut next);
    next.bump_version();
    Ok(next)
}

// ============================================================================
// Column operations
// ============================================================================

/// Insert a new column and, in the same operation, add an empty cell for it
/// to every existing row (a row is never left missing a cell for a live
/// column). Returns the new snapshot and the new column's id.
pub fn insert_column(table: &Table, after: Option<&ColumnId>, seed: Option<&ColumnSeed>) -> (Table, ColumnId) {
    let mut next = table.clone();
    let mut column = Column::new(format!("Column {}", next.columns.len() + 1), ValueType::Text);
    if let Some(seed) = seed {
        if let Some(name) = &seed.name {
            column.name = name.clone();
        }
        if let Some(value_type) = seed.value_type {
            column.value_type = value_type;
        }
        if let Some(width) = seed.width {
            column.width.value = column.width.clamped(width);
        }
        column.format = seed.format.clone();
        column.rules = seed.rules.clone();
        column.default_value = seed.default_value.clone();
    }
    let column_id = column.id.clone();
    let value_type = column.value_type;
    let default_value = column.default_value.clone();

    let index = after
        .and_then(|id| next.column_position(id))
        .map(|p| p + 1)
        .unwrap_or(next.columns.len());
    next.columns.insert(index, column);
    fix_column_orders(&mut next);

    for row in &mut next.rows {
        let cell = match &default_value {
            Some(value) => Cell::with_content(&row.id, &column_id, value_type, value.clone()),
            None => Cell::empty(&row.id, &column_id, value_type),
        };
        row.cells.insert(column_id.clone(), cell);
    }
    next.bump_version();
    (next, column_id)
}

/// Delete a column and exactly the cells that reference it, from every row.
/// Filters and sort keys on the column are dropped with it.
pub fn delete_column(table: &Table, column_id: &ColumnId) -> Result<Table, EngineError> {
    if table.columns.len() <= 1 {
        return Err(EngineError::CannotDeleteLastColumn);
    }
    let mut next = table.clone();
    let index = next
        .column_position(column_id)
        .ok_or_else(|| EngineError::ColumnNotFound(column_id.clone()))?;
    next.columns.remove(index);
    fix_column_orders(&mut next);
    for row in &mut next.rows {
        row.cells.remove(column_id);
    }
    next.filters.retain(|f| f.column_id != *column_id);
    next.sort.retain(|k| k.column_id != *column_id);
    next.validation_index
        .retain(|id, _| !matches!(id.parse(), Ok((_, c)) if c == *column_id));
    clamp_spans(&mut next);
    next.bump_version();
    Ok(next)
}

// ============================================================================
// Merge / split
// ============================================================================

/// Merge the given cells into `primary`: non-primary content is appended to
/// the primary (space-joined, canonical row-major order regardless of the
/// order ids were supplied), non-primary cells are deleted, and the primary
/// span covers the merged bounding box. Fewer than two resolvable cells is
/// a no-op.
pub fn merge_cells(table: &Table, cell_ids: &[CellId], primary: &CellId) -> Result<Table, EngineError> {
    let mut next = table.clone();

    let mut resolved: Vec<(usize, usize, CellId)> = Vec::new();
    for id in cell_ids {
        let (row_id, column_id) = id.parse()?;
        if let (Some(r), Some(c)) = (next.row_position(&row_id), next.column_position(&column_id)) {
            if next.rows[r].cells.contains_key(&column_id) && !resolved.iter().any(|(_, _, seen)| seen == id) {
                resolved.push((r, c, id.clone()));
            }
        }
    }
    if resolved.len() < 2 {
        return Ok(next);
    }
    if !resolved.iter().any(|(_, _, id)| id == primary) {
        return Err(EngineError::CellNotFound(primary.clone()));
    }
    resolved.sort_by_key(|(r, c, _)| (*r, *c));

    let min_r = resolved.iter().map(|(r, _, _)| *r).min().unwrap_or(0);
    let max_r = resolved.iter().map(|(r, _, _)| *r).max().unwrap_or(0);
    let min_c = resolved.iter().map(|(_, c, _)| *c).min().unwrap_or(0);
    let max_c = resolved.iter().map(|(_, c, _)| *c).max().unwrap_or(0);

    let mut parts: Vec<String> = Vec::new();
    if let Some(cell) = next.cell(primary) {
        if !cell.content.is_empty() {
            parts.push(cell.content.clone());
        }
    }
    for (_, _, id) in &resolved {
        if id == primary {
            continue;
        }
        if let Some(cell) = next.cell(id) {
            if !cell.content.is_empty() {
                parts.push(cell.content.clone());
            }
        }
    }
    let merged = parts.join(" ");

    for (_, _, id) in &resolved {
        if id == primary {
            continue;
        }
        let (row_id, column_id) = id.parse()?;
        if let Some(row) = next.rows.iter_mut().find(|r| r.id == row_id) {
            row.cells.remove(&column_id);
            row.touch();
        }
    }

    let span = CellSpan {
        rows: (max_r - min_r + 1) as u32,
        cols: (max_c - min_c + 1) as u32,
    };
    let cell = next
        .cell_mut(primary)
        .ok_or_else(|| EngineError::CellNotFound(primary.clone()))?;
    cell.content = merged;
    cell.span = span;
    cell.touch();

    next.bump_version();
    Ok(next)
}

/// Split a cell: reset its span to 1x1 and create empty sibling cells for
/// the `cols - 1` columns to its right that lack one (fresh cells where a
/// merge removed them).
///
/// Splitting is column-only: `rows > 1` is accepted but inserts no rows;
/// row-splitting is deliberately unimplemented pending a product decision.
/// Returns the created cell ids.
pub fn split_cell(table: &Table, cell_id: &CellId, _rows: u32, cols: u32) -> Result<(Table, Vec<CellId>), EngineError> {
    let mut next = table.clone();
    let (row_id, column_id) = cell_id.parse()?;
    let col_pos = next
        .column_position(&column_id)
        .ok_or_else(|| EngineError::ColumnNotFound(column_id.clone()))?;
    let row_index = next
        .row_position(&row_id)
        .ok_or_else(|| EngineError::RowNotFound(row_id.clone()))?;

    {
        let row = &mut next.rows[row_index];
        let cell = row
            .cell_mut(&column_id)
            .ok_or_else(|| EngineError::CellNotFound(cell_id.clone()))?;
        cell.span = CellSpan::default();
        cell.touch();
    }

    let siblings: Vec<(ColumnId, ValueType)> = (1..cols as usize)
        .filter_map(|i| next.columns.get(col_pos + i).map(|c| (c.id.clone(), c.value_type)))
        .collect();

    let mut created = Vec::new();
    let row = &mut next.rows[row_index];
    for (sibling_id, value_type) in siblings {
        if !row.cells.contains_key(&sibling_id) {
            let cell = Cell::empty(&row.id, &sibling_id, value_type);
            created.push(cell.id.clone());
            row.cells.insert(sibling_id, cell);
        }
    }
    row.touch();

    next.bump_version();
    Ok((next, created))
}

// ============================================================================
// Cell content
// ============================================================================

/// Replace only the targeted fields on one cell, refreshing that cell's own
/// updated timestamp independently of the table-level timestamp.
pub fn update_cell(table: &Table, cell_id: &CellId, delta: &CellDelta) -> Result<Table, EngineError> {
    let mut next = table.clone();
    let (row_id, _) = cell_id.parse()?;
    let row_index = next
        .row_position(&row_id)
        .ok_or_else(|| EngineError::RowNotFound(row_id.clone()))?;

    let row = &mut next.rows[row_index];
    let cell = row
        .cells
        .values_mut()
        .find(|c| c.id == *cell_id)
        .ok_or_else(|| EngineError::CellNotFound(cell_id.clone()))?;

    if let Some(content) = &delta.content {
        cell.content = content.clone();
    }
    if let Some(value_type) = delta.value_type {
        cell.value_type = value_type;
    }
    if let Some(style_delta) = &delta.style {
        match &mut cell.style {
            Some(style) => style.merge_from(style_delta),
            None => cell.style = Some(style_delta.clone()),
        }
    }
    if let Some(metadata) = &delta.metadata {
        cell.metadata = Some(metadata.clone());
    }
    if delta.clear_payload {
        cell.payload = None;
    } else if let Some(payload) = &delta.payload {
        cell.payload = Some(payload.clone());
    }
    cell.touch();
    row.touch();

    next.bump_version();
    Ok(next)
}

/// Write a grid of plain content starting at `at` (row-major). Positions
/// past the table edge are dropped. Returns the affected cell ids.
pub fn paste(table: &Table, at: &CellId, grid: &[Vec<String>]) -> Result<(Table, Vec<CellId>), EngineError> {
    at.parse()?;
    let (r0, c0) = table
        .cell_position(at)
        .ok_or_else(|| EngineError::CellNotFound(at.clone()))?;

    let mut next = table.clone();
    let column_ids: Vec<ColumnId> = next.columns.iter().map(|c| c.id.clone()).collect();
    let mut affected = Vec::new();

    for (dr, row_values) in grid.iter().enumerate() {
        let Some(row) = next.rows.get_mut(r0 + dr) else { break };
        let mut touched = false;
        for (dc, value) in row_values.iter().enumerate() {
            let Some(column_id) = column_ids.get(c0 + dc) else { break };
            if let Some(cell) = row.cell_mut(column_id) {
                cell.content = value.clone();
                cell.touch();
                affected.push(cell.id.clone());
                touched = true;
            }
        }
        if touched {
            row.touch();
        }
    }

    next.bump_version();
    Ok((next, affected))
}

// ============================================================================
// Layout operations
// ============================================================================

pub fn resize_column(table: &Table, column_id: &ColumnId, width: u32) -> Result<Table, EngineError> {
    let mut next = table.clone();
    let index = next
        .column_position(column_id)
        .ok_or_else(|| EngineError::ColumnNotFound(column_id.clone()))?;
    let column = &mut next.columns[index];
    column.width.value = column.width.clamped(width);
    next.bump_version();
    Ok(next)
}

pub fn move_column(table: &Table, column_id: &ColumnId, to_index: usize) -> Result<Table, EngineError> {
    let mut next = table.clone();
    let from = next
        .column_position(column_id)
        .ok_or_else(|| EngineError::ColumnNotFound(column_id.clone()))?;
    let column = next.columns.remove(from);
    let to = to_index.min(next.columns.len());
    next.columns.insert(to, column);
    fix_column_orders(&mut next);
    next.bump_version();
    Ok(next)
}

/// Stable, type-aware sort. The sort spec is stored on the snapshot so
/// collaborators can display it.
pub fn sort_rows(table: &Table, keys: &[SortKey]) -> Table {
    let mut next = table.clone();
    let mut spec = keys.to_vec();
    spec.sort_by_key(|k| k.priority);

    let types: FxHashMap<ColumnId, ValueType> = next
        .columns
        .iter()
        .map(|c| (c.id.clone(), c.value_type))
        .collect();

    let mut rows = std::mem::take(&mut next.rows);
    rows.sort_by(|a, b| {
        for key in &spec {
            let content_a = a.cell(&key.column_id).map(|c| c.content.as_str()).unwrap_or("");
            let content_b = b.cell(&key.column_id).map(|c| c.content.as_str()).unwrap_or("");
            let value_type = types.get(&key.column_id).copied().unwrap_or_default();
            let mut ord = compare_content(value_type, content_a, content_b);
            if key.direction == SortDirection::Descending {
                ord = ord.reverse();
            }
            if ord != std::cmp::Ordering::Equal {
                return ord;
            }
        }
        std::cmp::Ordering::Equal
    });
    next.rows = rows;

    next.sort = spec;
    next.bump_version();
    next
}

fn compare_content(value_type: ValueType, a: &str, b: &str) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    match value_type {
        ValueType::Number | ValueType::Currency | ValueType::Percentage => {
            match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
                (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => a.cmp(b),
            }
        }
        ValueType::Date => a.cmp(b), // ISO dates compare lexicographically
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

/// Set (or replace) the filter for one column.
pub fn set_filter(table: &Table, filter: ColumnFilter) -> Table {
    let mut next = table.clone();
    next.filters.retain(|f| f.column_id != filter.column_id);
    next.filters.push(filter);
    next.bump_version();
    next
}

pub fn clear_filters(table: &Table) -> Table {
    let mut next = table.clone();
    next.filters.clear();
    next.bump_version();
    next
}

// ============================================================================
// Dispatch
// ============================================================================

/// Apply one operation to a snapshot, producing the next snapshot and the
/// completed operation record (with the backup data reversal needs).
pub fn apply(table: &Table, op: &Operation) -> Result<Applied, EngineError> {
    match op {
        Operation::InsertRow { after, seed } => {
            let (next, row_id) = insert_row(table, after.as_ref(), seed.as_ref());
            let record = OperationRecord::pending(OperationKind::Insert, OperationScope::Row, OperationTarget::row(row_id.clone()))
                .completed(OperationBackup::RowInserted { row_id });
            Ok(Applied { table: next, record })
        }
        Operation::DeleteRow { row_id } => {
            // Cardinality is checked before existence: delete on a one-row
            // table reports the invariant, not a lookup miss.
            if table.rows.len() <= 1 {
                return Err(EngineError::CannotDeleteLastRow);
            }
            let index = table
                .row_position(row_id)
                .ok_or_else(|| EngineError::RowNotFound(row_id.clone()))?;
            let row = Box::new(table.rows[index].clone());
            let next = delete_row(table, row_id)?;
            let clamped = clamped_spans(table, &next);
            let record = OperationRecord::pending(OperationKind::Delete, OperationScope::Row, OperationTarget::row(row_id.clone()))
                .completed(OperationBackup::RowRemoved { index, row, clamped });
            Ok(Applied { table: next, record })
        }
        Operation::InsertColumn { after, seed } => {
            let (next, column_id) = insert_column(table, after.as_ref(), seed.as_ref());
            let record = OperationRecord::pending(OperationKind::Insert, OperationScope::Column, OperationTarget::column(column_id.clone()))
                .completed(OperationBackup::ColumnInserted { column_id });
            Ok(Applied { table: next, record })
        }
        Operation::DeleteColumn { column_id } => {
            if table.columns.len() <= 1 {
                return Err(EngineError::CannotDeleteLastColumn);
            }
            let index = table
                .column_position(column_id)
                .ok_or_else(|| EngineError::ColumnNotFound(column_id.clone()))?;
            let column = Box::new(table.columns[index].clone());
            let cells: Vec<Cell> = table
                .rows
                .iter()
                .filter_map(|row| row.cell(column_id).cloned())
                .collect();
            let filters: Vec<ColumnFilter> = table
                .filters
                .iter()
                .filter(|f| f.column_id == *column_id)
                .cloned()
                .collect();
            let sort: Vec<SortKey> = table
                .sort
                .iter()
                .filter(|k| k.column_id == *column_id)
                .cloned()
                .collect();
            let next = delete_column(table, column_id)?;
            let clamped = clamped_spans(table, &next);
            let record = OperationRecord::pending(OperationKind::Delete, OperationScope::Column, OperationTarget::column(column_id.clone()))
                .completed(OperationBackup::ColumnRemoved { index, column, cells, filters, sort, clamped });
            Ok(Applied { table: next, record })
        }
        Operation::UpdateCell { cell_id, delta } => {
            let prior = table
                .cell(cell_id)
                .cloned()
                .ok_or_else(|| EngineError::CellNotFound(cell_id.clone()))?;
            let next = update_cell(table, cell_id, delta)?;
            let record = OperationRecord::pending(OperationKind::Update, OperationScope::Cell, OperationTarget::cells(vec![cell_id.clone()]))
                .completed(OperationBackup::CellsReplaced { prior: vec![prior] });
            Ok(Applied { table: next, record })
        }
        Operation::ApplyStyle { cell_ids, delta } => {
            let prior: Vec<(CellId, Option<CellStyle>)> = cell_ids
                .iter()
                .filter_map(|id| table.cell(id).map(|cell| (id.clone(), cell.style.clone())))
                .collect();
            let next = crate::style::apply_style(table, cell_ids, delta);
            let record = OperationRecord::pending(OperationKind::Format, OperationScope::Range, OperationTarget::cells(cell_ids.clone()))
                .completed(OperationBackup::StylesReplaced { prior });
            Ok(Applied { table: next, record })
        }
        Operation::MergeCells { cell_ids, primary } => {
            let prior_primary = table.cell(primary).cloned();
            let removed: Vec<Cell> = cell_ids
                .iter()
                .filter(|id| *id != primary)
                .filter_map(|id| table.cell(id).cloned())
                .collect();
            let next = merge_cells(table, cell_ids, primary)?;
            let backup = if next.metadata.version == table.metadata.version {
                OperationBackup::None // no-op merge
            } else {
                OperationBackup::MergeApplied {
                    primary: primary.clone(),
                    prior_primary: Box::new(prior_primary.ok_or_else(|| EngineError::CellNotFound(primary.clone()))?),
                    removed,
                }
            };
            let record = OperationRecord::pending(OperationKind::Merge, OperationScope::Range, OperationTarget::cells(cell_ids.clone()))
                .completed(backup);
            Ok(Applied { table: next, record })
        }
        Operation::SplitCell { cell_id, rows, cols } => {
            let prior = table
                .cell(cell_id)
                .cloned()
                .ok_or_else(|| EngineError::CellNotFound(cell_id.clone()))?;
            let (next, created) = split_cell(table, cell_id, *rows, *cols)?;
            let record = OperationRecord::pending(OperationKind::Split, OperationScope::Cell, OperationTarget::cells(vec![cell_id.clone()]))
                .completed(OperationBackup::SplitApplied {
                    cell_id: cell_id.clone(),
                    prior: Box::new(prior),
                    created,
                    rows: *rows,
                    cols: *cols,
                });
            Ok(Applied { table: next, record })
        }
        Operation::ResizeColumn { column_id, width } => {
            let prior_width = table
                .column(column_id)
                .map(|c| c.width.value)
                .ok_or_else(|| EngineError::ColumnNotFound(column_id.clone()))?;
            let next = resize_column(table, column_id, *width)?;
            let record = OperationRecord::pending(OperationKind::Resize, OperationScope::Column, OperationTarget::column(column_id.clone()))
                .completed(OperationBackup::WidthChanged { column_id: column_id.clone(), width: prior_width });
            Ok(Applied { table: next, record })
        }
        Operation::MoveColumn { column_id, to_index } => {
            let order: Vec<ColumnId> = table.columns.iter().map(|c| c.id.clone()).collect();
            let next = move_column(table, column_id, *to_index)?;
            let record = OperationRecord::pending(OperationKind::Reorder, OperationScope::Column, OperationTarget::column(column_id.clone()))
                .completed(OperationBackup::ColumnOrder { order });
            Ok(Applied { table: next, record })
        }
        Operation::SortRows { keys } => {
            let order: Vec<RowId> = table.rows.iter().map(|r| r.id.clone()).collect();
            let sort = table.sort.clone();
            let next = sort_rows(table, keys);
            let record = OperationRecord::pending(OperationKind::Sort, OperationScope::Table, OperationTarget::table())
                .completed(OperationBackup::RowOrder { order, sort });
            Ok(Applied { table: next, record })
        }
        Operation::SetFilter { filter } => {
            let filters = table.filters.clone();
            let next = set_filter(table, filter.clone());
            let record = OperationRecord::pending(OperationKind::Filter, OperationScope::Table, OperationTarget::table())
                .completed(OperationBackup::FiltersReplaced { filters });
            Ok(Applied { table: next, record })
        }
        Operation::ClearFilters => {
            let filters = table.filters.clone();
            let next = clear_filters(table);
            let record = OperationRecord::pending(OperationKind::Filter, OperationScope::Table, OperationTarget::table())
                .completed(OperationBackup::FiltersReplaced { filters });
            Ok(Applied { table: next, record })
        }
        Operation::Paste { at, grid } => {
            let (next, affected) = paste(table, at, grid)?;
            let prior: Vec<Cell> = affected
                .iter()
                .filter_map(|id| table.cell(id).cloned())
                .collect();
            let record = OperationRecord::pending(OperationKind::Paste, OperationScope::Range, OperationTarget::cells(affected))
                .completed(OperationBackup::CellsReplaced { prior });
            Ok(Applied { table: next, record })
        }
    }
}

// ============================================================================
// Reversal
// ============================================================================

/// Reverse a recorded operation. Returns the restored snapshot and the
/// inverse record, ready for the opposite stack. Undo and redo both run
/// through here.
pub fn revert(table: &Table, record: &OperationRecord) -> Result<(Table, OperationRecord), EngineError> {
    let inverse_of = |backup: OperationBackup| {
        OperationRecord::pending(record.kind, record.scope, record.target.clone()).completed(backup)
    };

    match &record.backup {
        OperationBackup::None => Ok((table.clone(), inverse_of(OperationBackup::None))),

        OperationBackup::RowInserted { row_id } => {
            let index = table
                .row_position(row_id)
                .ok_or_else(|| EngineError::RowNotFound(row_id.clone()))?;
            let row = Box::new(table.rows[index].clone());
            let next = delete_row(table, row_id)?;
            let clamped = clamped_spans(table, &next);
            Ok((next, inverse_of(OperationBackup::RowRemoved { index, row, clamped })))
        }

        OperationBackup::RowRemoved { index, row, clamped } => {
            let mut next = table.clone();
            let at = (*index).min(next.rows.len());
            next.rows.insert(at, (**row).clone());
            restore_spans(&mut next, clamped);
            next.bump_version();
            Ok((next, inverse_of(OperationBackup::RowInserted { row_id: row.id.clone() })))
        }

        OperationBackup::ColumnInserted { column_id } => {
            let index = table
                .column_position(column_id)
                .ok_or_else(|| EngineError::ColumnNotFound(column_id.clone()))?;
            let column = Box::new(table.columns[index].clone());
            let cells: Vec<Cell> = table
                .rows
                .iter()
                .filter_map(|row| row.cell(column_id).cloned())
                .collect();
            let filters: Vec<ColumnFilter> = table
                .filters
                .iter()
                .filter(|f| f.column_id == *column_id)
                .cloned()
                .collect();
            let sort: Vec<SortKey> = table
                .sort
                .iter()
                .filter(|k| k.column_id == *column_id)
                .cloned()
                .collect();
            let next = delete_column(table, column_id)?;
            let clamped = clamped_spans(table, &next);
            Ok((next, inverse_of(OperationBackup::ColumnRemoved { index, column, cells, filters, sort, clamped })))
        }

        OperationBackup::ColumnRemoved { index, column, cells, filters, sort, clamped } => {
            let mut next = table.clone();
            let at = (*index).min(next.columns.len());
            next.columns.insert(at, (**column).clone());
            fix_column_orders(&mut next);
            for cell in cells {
                put_cell(&mut next, cell.clone());
            }
            next.filters.extend(filters.iter().cloned());
            next.sort.extend(sort.iter().cloned());
            next.sort.sort_by_key(|k| k.priority);
            restore_spans(&mut next, clamped);
            next.bump_version();
            Ok((next, inverse_of(OperationBackup::ColumnInserted { column_id: column.id.clone() })))
        }

        OperationBackup::CellsReplaced { prior } => {
            let mut next = table.clone();
            let current: Vec<Cell> = prior
                .iter()
                .filter_map(|cell| next.cell(&cell.id).cloned())
                .collect();
            for cell in prior {
                put_cell(&mut next, cell.clone());
            }
            next.bump_version();
            Ok((next, inverse_of(OperationBackup::CellsReplaced { prior: current })))
        }

        OperationBackup::StylesReplaced { prior } => {
            let mut next = table.clone();
            let current: Vec<(CellId, Option<CellStyle>)> = prior
                .iter()
                .filter_map(|(id, _)| next.cell(id).map(|cell| (id.clone(), cell.style.clone())))
                .collect();
            for (id, style) in prior {
                if let Some(cell) = next.cell_mut(id) {
                    cell.style = style.clone();
                    cell.touch();
                }
            }
            next.bump_version();
            Ok((next, inverse_of(OperationBackup::StylesReplaced { prior: current })))
        }

        OperationBackup::MergeApplied { primary, prior_primary, removed } => {
            let mut next = table.clone();
            let mut cell_ids: Vec<CellId> = vec![primary.clone()];
            cell_ids.extend(removed.iter().map(|c| c.id.clone()));

            put_cell(&mut next, (**prior_primary).clone());
            for cell in removed {
                put_cell(&mut next, cell.clone());
            }
            next.bump_version();
            Ok((next, inverse_of(OperationBackup::MergeReverted { cell_ids, primary: primary.clone() })))
        }

        OperationBackup::MergeReverted { cell_ids, primary } => {
            let prior_primary = Box::new(
                table
                    .cell(primary)
                    .cloned()
                    .ok_or_else(|| EngineError::CellNotFound(primary.clone()))?,
            );
            let removed: Vec<Cell> = cell_ids
                .iter()
                .filter(|id| *id != primary)
                .filter_map(|id| table.cell(id).cloned())
                .collect();
            let next = merge_cells(table, cell_ids, primary)?;
            Ok((
                next,
                inverse_of(OperationBackup::MergeApplied {
                    primary: primary.clone(),
                    prior_primary,
                    removed,
                }),
            ))
        }

        OperationBackup::SplitApplied { cell_id, prior, created, rows, cols } => {
            let mut next = table.clone();
            put_cell(&mut next, (**prior).clone());
            for id in created {
                if let Ok((row_id, column_id)) = id.parse() {
                    if let Some(row) = next.rows.iter_mut().find(|r| r.id == row_id) {
                        row.cells.remove(&column_id);
                    }
                }
            }
            next.bump_version();
            Ok((
                next,
                inverse_of(OperationBackup::SplitReverted { cell_id: cell_id.clone(), rows: *rows, cols: *cols }),
            ))
        }

        OperationBackup::SplitReverted { cell_id, rows, cols } => {
            let prior = Box::new(
                table
                    .cell(cell_id)
                    .cloned()
                    .ok_or_else(|| EngineError::CellNotFound(cell_id.clone()))?,
            );
            let (next, created) = split_cell(table, cell_id, *rows, *cols)?;
            Ok((
                next,
                inverse_of(OperationBackup::SplitApplied {
                    cell_id: cell_id.clone(),
                    prior,
                    created,
                    rows: *rows,
                    cols: *cols,
                }),
            ))
        }

        OperationBackup::WidthChanged { column_id, width } => {
            let mut next = table.clone();
            let index = next
                .column_position(column_id)
                .ok_or_else(|| EngineError::ColumnNotFound(column_id.clone()))?;
            let current = next.columns[index].width.value;
            // Restore the stored width verbatim; bounds were applied when
            // the forward resize ran.
            next.columns[index].width.value = *width;
            next.bump_version();
            Ok((next, inverse_of(OperationBackup::WidthChanged { column_id: column_id.clone(), width: current })))
        }

        OperationBackup::ColumnOrder { order } => {
            let mut next = table.clone();
            let current: Vec<ColumnId> = next.columns.iter().map(|c| c.id.clone()).collect();
            next.columns = reorder_by(std::mem::take(&mut next.columns), order, |c| &c.id);
            fix_column_orders(&mut next);
            next.bump_version();
            Ok((next, inverse_of(OperationBackup::ColumnOrder { order: current })))
        }

        OperationBackup::RowOrder { order, sort } => {
            let mut next = table.clone();
            let current_order: Vec<RowId> = next.rows.iter().map(|r| r.id.clone()).collect();
            let current_sort = next.sort.clone();
            next.rows = reorder_by(std::mem::take(&mut next.rows), order, |r| &r.id);
            next.sort = sort.clone();
            next.bump_version();
            Ok((next, inverse_of(OperationBackup::RowOrder { order: current_order, sort: current_sort })))
        }

        OperationBackup::FiltersReplaced { filters } => {
            let mut next = table.clone();
            let current = std::mem::replace(&mut next.filters, filters.clone());
            next.bump_version();
            Ok((next, inverse_of(OperationBackup::FiltersReplaced { filters: current })))
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Keep `Column::order` equal to each column's index.
fn fix_column_orders(table: &mut Table) {
    for (i, column) in table.columns.iter_mut().enumerate() {
        column.order = i;
    }
}

/// Put a cell back into its owning row, as named by its id. Rows that no
/// longer exist are skipped.
fn put_cell(table: &mut Table, cell: Cell) {
    if let Ok((row_id, column_id)) = cell.id.parse() {
        if let Some(row) = table.rows.iter_mut().find(|r| r.id == row_id) {
            row.cells.insert(column_id, cell);
        }
    }
}

/// Rearrange `items` to match the id order in `order`; items not listed
/// keep their relative position at the end.
fn reorder_by<T, I: Eq + std::hash::Hash>(items: Vec<T>, order: &[I], id_of: impl Fn(&T) -> &I) -> Vec<T> {
    let rank: FxHashMap<&I, usize> = order.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let mut items = items;
    items.sort_by_key(|item| rank.get(id_of(item)).copied().unwrap_or(usize::MAX));
    items
}

/// Spans that a structural delete clamped, with their prior values. Cells
/// that no longer exist in `after` are the deleted ones themselves and are
/// already covered by the row/column backup.
fn clamped_spans(before: &Table, after: &Table) -> Vec<(CellId, CellSpan)> {
    let mut prior = Vec::new();
    for row in &before.rows {
        for cell in row.cells.values() {
            if cell.span.is_unit() {
                continue;
            }
            if let Some(now) = after.cell(&cell.id) {
                if now.span != cell.span {
                    prior.push((cell.id.clone(), cell.span));
                }
            }
        }
    }
    prior
}

/// Put clamped spans back. Cells that still do not resolve are skipped.
fn restore_spans(table: &mut Table, clamped: &[(CellId, CellSpan)]) {
    for (id, span) in clamped {
        if let Some(cell) = table.cell_mut(id) {
            cell.span = *span;
        }
    }
}

/// Clamp cell spans so no merged region extends past the table edge after
/// a structural delete.
fn clamp_spans(table: &mut Table) {
    let row_count = table.rows.len();
    let positions: FxHashMap<ColumnId, usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.clone(), i))
        .collect();
    let column_count = table.columns.len();

    for (row_index, row) in table.rows.iter_mut().enumerate() {
        for (column_id, cell) in row.cells.iter_mut() {
            if cell.span.is_unit() {
                continue;
            }
            let col_index = positions.get(column_id).copied().unwrap_or(0);
            let max_rows = (row_count - row_index) as u32;
            let max_cols = (column_count - col_index) as u32;
            cell.span.rows = cell.span.rows.min(max_rows).max(1);
            cell.span.cols = cell.span.cols.min(max_cols).max(1);
        }
    }
}
