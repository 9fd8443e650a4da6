//! The operation log backing undo/redo.
//!
//! Every completed operation is recorded together with the backup data
//! needed to reverse it exactly (deleted rows' full content, prior styles,
//! prior column order, ...). Undoing a record produces its inverse record,
//! which lands on the redo stack; any new forward operation clears redo.
//! Both stacks are bounded: exceeding the bound silently evicts the oldest
//! entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablecraft_core::{CellId, ColumnId, Range, RowId};

use crate::cell::{Cell, CellSpan, CellStyle};
use crate::column::Column;
use crate::row::Row;
use crate::table::{ColumnFilter, SortKey};

/// What an operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    Insert,
    Delete,
    Update,
    Move,
    Copy,
    Paste,
    Merge,
    Split,
    Format,
    Sort,
    Filter,
    Resize,
    Reorder,
}

/// What an operation acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationScope {
    Cell,
    Row,
    Column,
    Range,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationStatus {
    Pending,
    Completed,
    Failed,
}

/// Explicit ids and/or rectangle an operation targeted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationTarget {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cell_ids: Vec<CellId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub row_ids: Vec<RowId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_ids: Vec<ColumnId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Range>,
}

impl OperationTarget {
    pub fn cells(cell_ids: Vec<CellId>) -> Self {
        Self { cell_ids, ..Self::default() }
    }

    pub fn row(row_id: RowId) -> Self {
        Self { row_ids: vec![row_id], ..Self::default() }
    }

    pub fn column(column_id: ColumnId) -> Self {
        Self { column_ids: vec![column_id], ..Self::default() }
    }

    pub fn table() -> Self {
        Self::default()
    }
}

/// Backup data sufficient to reverse one operation exactly.
///
/// Reversal is symmetric: applying a backup yields the backup for the
/// opposite direction, so undo and redo share one code path
/// (`mutate::revert`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum OperationBackup {
    /// Nothing to reverse (e.g. copy).
    None,
    /// A row was inserted; reversal deletes it.
    RowInserted { row_id: RowId },
    /// A row was removed; reversal restores it at its old index and puts
    /// back the merge spans the delete clamped on surviving rows.
    RowRemoved {
        index: usize,
        row: Box<Row>,
        clamped: Vec<(CellId, CellSpan)>,
    },
    /// A column was inserted; reversal deletes it and its cells.
    ColumnInserted { column_id: ColumnId },
    /// A column was removed; reversal restores it, every removed cell
    /// (cell ids encode their owning rows), the filters and sort keys that
    /// depended on it, and the merge spans the delete clamped.
    ColumnRemoved {
        index: usize,
        column: Box<Column>,
        cells: Vec<Cell>,
        filters: Vec<ColumnFilter>,
        sort: Vec<SortKey>,
        clamped: Vec<(CellId, CellSpan)>,
    },
    /// Cells were replaced wholesale (update/paste); reversal writes the
    /// prior cells back.
    CellsReplaced { prior: Vec<Cell> },
    /// Styles were replaced; reversal writes the prior styles back.
    StylesReplaced { prior: Vec<(CellId, Option<CellStyle>)> },
    /// Cells were merged; reversal restores the primary and the removed
    /// cells.
    MergeApplied {
        primary: CellId,
        prior_primary: Box<Cell>,
        removed: Vec<Cell>,
    },
    /// A merge was undone; reversal re-merges.
    MergeReverted { cell_ids: Vec<CellId>, primary: CellId },
    /// A cell was split; reversal restores the prior cell and deletes the
    /// created siblings.
    SplitApplied {
        cell_id: CellId,
        prior: Box<Cell>,
        created: Vec<CellId>,
        rows: u32,
        cols: u32,
    },
    /// A split was undone; reversal re-splits.
    SplitReverted { cell_id: CellId, rows: u32, cols: u32 },
    /// A column width changed; reversal restores the stored width.
    WidthChanged { column_id: ColumnId, width: u32 },
    /// Column order changed; reversal restores the stored id order.
    ColumnOrder { order: Vec<ColumnId> },
    /// Row order (and sort spec) changed; reversal restores both.
    RowOrder { order: Vec<RowId>, sort: Vec<SortKey> },
    /// Active filters changed; reversal restores the stored set.
    FiltersReplaced { filters: Vec<ColumnFilter> },
}

/// One reversible operation as recorded in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    pub kind: OperationKind,
    pub scope: OperationScope,
    pub target: OperationTarget,
    pub status: OperationStatus,
    pub at: DateTime<Utc>,
    pub backup: OperationBackup,
}

impl OperationRecord {
    /// A pending record, created at dispatch time.
    pub fn pending(kind: OperationKind, scope: OperationScope, target: OperationTarget) -> Self {
        Self {
            kind,
            scope,
            target,
            status: OperationStatus::Pending,
            at: Utc::now(),
            backup: OperationBackup::None,
        }
    }

    pub fn completed(mut self, backup: OperationBackup) -> Self {
        self.status = OperationStatus::Completed;
        self.backup = backup;
        self
    }

    pub fn failed(mut self) -> Self {
        self.status = OperationStatus::Failed;
        self
    }
}

/// Bounded undo/redo stacks of operation records.
pub struct History {
    undo_stack: Vec<OperationRecord>,
    redo_stack: Vec<OperationRecord>,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record a new forward operation. Clears the redo stack and evicts the
    /// oldest entry past the depth bound (no error).
    pub fn push_forward(&mut self, record: OperationRecord) {
        self.undo_stack.push(record);
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_entries {
            self.undo_stack.remove(0);
        }
    }

    /// Pop the record to undo next.
    pub fn pop_undo(&mut self) -> Option<OperationRecord> {
        self.undo_stack.pop()
    }

    /// Pop the record to redo next.
    pub fn pop_redo(&mut self) -> Option<OperationRecord> {
        self.redo_stack.pop()
    }

    /// Push the inverse of an undone record onto the redo stack.
    pub fn push_undone(&mut self, inverse: OperationRecord) {
        self.redo_stack.push(inverse);
    }

    /// Push the inverse of a redone record back onto the undo stack
    /// (without clearing redo).
    pub fn push_redone(&mut self, inverse: OperationRecord) {
        self.undo_stack.push(inverse);
        if self.undo_stack.len() > self.max_entries {
            self.undo_stack.remove(0);
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> OperationRecord {
        OperationRecord::pending(OperationKind::Insert, OperationScope::Row, OperationTarget::table())
            .completed(OperationBackup::None)
    }

    #[test]
    fn test_forward_clears_redo() {
        let mut history = History::new(10);
        history.push_forward(record());
        let undone = history.pop_undo().unwrap();
        history.push_undone(undone);
        assert!(history.can_redo());

        history.push_forward(record());
        assert!(!history.can_redo());
        assert!(history.can_undo());
    }

    #[test]
    fn test_depth_bound_evicts_oldest() {
        let mut history = History::new(3);
        for _ in 0..5 {
            history.push_forward(record());
        }
        assert_eq!(history.undo_depth(), 3);
    }

    #[test]
    fn test_record_lifecycle() {
        let pending = OperationRecord::pending(
            OperationKind::Delete,
            OperationScope::Row,
            OperationTarget::row(RowId::new("r1")),
        );
        assert_eq!(pending.status, OperationStatus::Pending);

        let done = pending.clone().completed(OperationBackup::RowInserted { row_id: RowId::new("r1") });
        assert_eq!(done.status, OperationStatus::Completed);

        let failed = pending.failed();
        assert_eq!(failed.status, OperationStatus::Failed);
    }
}
