//! The interaction layer: one controller owns the current snapshot, the
//! selection, the operation log, and the clipboard, and turns user gestures
//! into dispatched operations.
//!
//! Mutation goes through [`TableController::dispatch`] only. Each committed
//! operation produces exactly one version change and one batch of events;
//! a failed operation leaves the snapshot, the selection, and the log
//! untouched.

use tablecraft_core::{CellId, ColumnId, Range, RowId, Selection};

use crate::error::EngineError;
use crate::events::{
    CellsChangedEvent, EventCallback, OperationAppliedEvent, TableEvent, VersionChangedEvent,
};
use crate::history::{History, OperationRecord};
use crate::mutate::{self, CellDelta, Operation};
use crate::table::Table;

// ============================================================================
// Clipboard
// ============================================================================

/// Plain-text clipboard seam. The engine ships an in-memory implementation;
/// hosts provide a system-backed one.
pub trait Clipboard {
    fn write_text(&mut self, text: String);
    fn read_text(&self) -> Option<String>;
}

/// In-memory clipboard, used by tests and headless hosts.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Option<String>,
}

impl Clipboard for MemoryClipboard {
    fn write_text(&mut self, text: String) {
        self.text = Some(text);
    }

    fn read_text(&self) -> Option<String> {
        self.text.clone()
    }
}

// ============================================================================
// Interaction sessions
// ============================================================================

/// An in-progress cell edit. Committing dispatches the update; cancelling
/// discards the draft without touching the snapshot.
#[derive(Debug, Clone)]
pub struct EditSession {
    pub cell_id: CellId,
    pub original: String,
    pub draft: String,
}

/// An in-progress column resize drag.
#[derive(Debug, Clone)]
pub struct ResizeSession {
    pub column_id: ColumnId,
    pub start_width: u32,
}

// ============================================================================
// Controller
// ============================================================================

pub struct TableController {
    table: Table,
    selection: Selection,
    history: History,
    clipboard: Box<dyn Clipboard>,
    edit: Option<EditSession>,
    resize: Option<ResizeSession>,
    on_event: Option<EventCallback>,
}

impl TableController {
    pub fn new(table: Table) -> Self {
        let depth = table.settings.performance.max_undo_depth;
        Self {
            table,
            selection: Selection::empty(),
            history: History::new(depth),
            clipboard: Box::new(MemoryClipboard::default()),
            edit: None,
            resize: None,
            on_event: None,
        }
    }

    pub fn with_clipboard(mut self, clipboard: Box<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn set_event_callback(&mut self, callback: EventCallback) {
        self.on_event = Some(callback);
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Apply one operation to the current snapshot. On success the new
    /// snapshot is installed, the record pushed onto the undo stack (which
    /// clears redo), the selection pruned of dead ids, and events emitted.
    pub fn dispatch(&mut self, op: Operation) -> Result<(), EngineError> {
        if !self.table.settings.behavior.editable {
            return Err(EngineError::NotEditable);
        }
        let previous = self.table.metadata.version;
        let applied = mutate::apply(&self.table, &op)?;
        // A gesture that changed nothing (e.g. a one-cell merge) stays out
        // of the log entirely: no redo loss, no events, no dead undo step.
        if applied.table.metadata.version == previous {
            return Ok(());
        }
        let record = applied.record;
        self.table = applied.table;
        self.table.revalidate();
        self.prune_selection();
        self.emit_committed(&record, previous, false);
        self.history.push_forward(record);
        Ok(())
    }

    pub fn undo(&mut self) -> Result<(), EngineError> {
        let record = self
            .history
            .pop_undo()
            .ok_or(EngineError::NothingToRevert("undo"))?;
        let previous = self.table.metadata.version;
        match mutate::revert(&self.table, &record) {
            Ok((table, inverse)) => {
                self.table = table;
                self.table.revalidate();
                self.prune_selection();
                self.emit_committed(&inverse, previous, true);
                self.history.push_undone(inverse);
                Ok(())
            }
            Err(err) => {
                // Put the record back so the log stays consistent with the
                // snapshot we still hold.
                self.history.push_redone(record);
                Err(err)
            }
        }
    }

    pub fn redo(&mut self) -> Result<(), EngineError> {
        let record = self
            .history
            .pop_redo()
            .ok_or(EngineError::NothingToRevert("redo"))?;
        let previous = self.table.metadata.version;
        match mutate::revert(&self.table, &record) {
            Ok((table, inverse)) => {
                self.table = table;
                self.table.revalidate();
                self.prune_selection();
                self.emit_committed(&inverse, previous, true);
                self.history.push_redone(inverse);
                Ok(())
            }
            Err(err) => {
                self.history.push_undone(record);
                Err(err)
            }
        }
    }

    fn emit_committed(&mut self, record: &OperationRecord, previous: u64, reverted: bool) {
        let version = self.table.metadata.version;
        let Some(callback) = self.on_event.as_mut() else { return };

        callback(TableEvent::OperationApplied(OperationAppliedEvent {
            kind: record.kind,
            scope: record.scope,
            version,
            reverted,
        }));
        if !record.target.cell_ids.is_empty() {
            callback(TableEvent::CellsChanged(CellsChangedEvent {
                version,
                cells: record.target.cell_ids.clone(),
            }));
        }
        if version != previous {
            callback(TableEvent::VersionChanged(VersionChangedEvent { version, previous }));
        }
    }

    /// Drop selection entries whose targets no longer resolve. Structural
    /// deletes otherwise leave the selection pointing at ghosts.
    fn prune_selection(&mut self) {
        let table = &self.table;
        self.selection.cell_ids.retain(|id| table.cell(id).is_some());
        self.selection.row_ids.retain(|id| table.row(id).is_some());
        self.selection
            .column_ids
            .retain(|id| table.column(id).is_some());
        if self.selection.is_empty() {
            self.selection.clear();
        }
    }

    // ========================================================================
    // Selection gestures
    // ========================================================================

    /// Plain click on a cell.
    pub fn click_cell(&mut self, row: usize, col: usize) {
        if let Some(id) = self.table.cell_id_at(row, col) {
            self.selection.select_cell(id, row, col);
        }
    }

    /// Modifier-click on a cell.
    pub fn toggle_cell(&mut self, row: usize, col: usize) {
        if let Some(id) = self.table.cell_id_at(row, col) {
            self.selection.toggle_cell(id, row, col);
        }
    }

    /// Shift-click: rectangle from the anchor to the clicked cell.
    pub fn shift_click(&mut self, row: usize, col: usize) {
        let Some(focus) = self.table.cell_id_at(row, col) else { return };
        let anchor_pos = self
            .selection
            .anchor
            .as_ref()
            .and_then(|a| self.table.cell_position(a))
            .unwrap_or((row, col));
        let range = Range::new(anchor_pos.0, anchor_pos.1, row, col);
        let covered = self.table.cells_in_range(&range);
        self.selection.extend_to(focus, range, covered);
    }

    /// Row-header click.
    pub fn click_row_header(&mut self, row: usize) {
        let Some((row_id, range, covered)) = self.row_extent(row) else { return };
        self.selection.select_row(row_id, covered, range);
    }

    /// Modifier row-header click.
    pub fn toggle_row_header(&mut self, row: usize) {
        let Some((row_id, range, covered)) = self.row_extent(row) else { return };
        self.selection.toggle_row(row_id, covered, range);
    }

    /// Column-header click.
    pub fn click_column_header(&mut self, col: usize) {
        let Some((column_id, range, covered)) = self.column_extent(col) else { return };
        self.selection.select_column(column_id, covered, range);
    }

    /// Modifier column-header click.
    pub fn toggle_column_header(&mut self, col: usize) {
        let Some((column_id, range, covered)) = self.column_extent(col) else { return };
        self.selection.toggle_column(column_id, covered, range);
    }

    /// Select the entire table.
    pub fn select_all(&mut self) {
        let full = self.table.full_range();
        let covered = self.table.cells_in_range(&full);
        let row_ids = self.table.rows.iter().map(|r| r.id.clone()).collect();
        let column_ids = self.table.columns.iter().map(|c| c.id.clone()).collect();
        self.selection.select_all(row_ids, column_ids, covered, full);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    fn row_extent(&self, row: usize) -> Option<(RowId, Range, Vec<CellId>)> {
        let row_id = self.table.rows.get(row)?.id.clone();
        let range = Range::new(row, 0, row, self.table.column_count().saturating_sub(1));
        let covered = self.table.cells_in_range(&range);
        Some((row_id, range, covered))
    }

    fn column_extent(&self, col: usize) -> Option<(ColumnId, Range, Vec<CellId>)> {
        let column_id = self.table.columns.get(col)?.id.clone();
        let range = Range::new(0, col, self.table.row_count().saturating_sub(1), col);
        let covered = self.table.cells_in_range(&range);
        Some((column_id, range, covered))
    }

    // ========================================================================
    // Editing sessions
    // ========================================================================

    /// Start editing a cell. Fails when the table, the row, or the cell is
    /// not editable.
    pub fn begin_edit(&mut self, cell_id: &CellId) -> Result<(), EngineError> {
        if !self.table.settings.behavior.editable {
            return Err(EngineError::NotEditable);
        }
        let cell = self
            .table
            .cell(cell_id)
            .ok_or_else(|| EngineError::CellNotFound(cell_id.clone()))?;
        let guarded = cell
            .metadata
            .as_ref()
            .map(|m| m.locked || m.readonly)
            .unwrap_or(false);
        let row_locked = cell_id
            .parse()
            .ok()
            .and_then(|(row_id, _)| self.table.row(&row_id))
            .map(|row| row.locked)
            .unwrap_or(false);
        if guarded || row_locked {
            return Err(EngineError::NotEditable);
        }

        self.edit = Some(EditSession {
            cell_id: cell_id.clone(),
            original: cell.content.clone(),
            draft: cell.content.clone(),
        });
        Ok(())
    }

    pub fn editing(&self) -> Option<&EditSession> {
        self.edit.as_ref()
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        if let Some(edit) = self.edit.as_mut() {
            edit.draft = text.into();
        }
    }

    /// Commit the active edit. An unchanged draft ends the session without
    /// dispatching (no version bump, nothing on the undo stack).
    pub fn commit_edit(&mut self) -> Result<(), EngineError> {
        let Some(edit) = self.edit.take() else { return Ok(()) };
        if edit.draft == edit.original {
            return Ok(());
        }
        self.dispatch(Operation::UpdateCell {
            cell_id: edit.cell_id,
            delta: CellDelta::content(edit.draft),
        })
    }

    pub fn cancel_edit(&mut self) {
        self.edit = None;
    }

    // ========================================================================
    // Resize sessions
    // ========================================================================

    pub fn begin_resize(&mut self, column_id: &ColumnId) -> Result<(), EngineError> {
        let column = self
            .table
            .column(column_id)
            .ok_or_else(|| EngineError::ColumnNotFound(column_id.clone()))?;
        self.resize = Some(ResizeSession {
            column_id: column_id.clone(),
            start_width: column.width.value,
        });
        Ok(())
    }

    /// Commit the drag as a single resize operation (one undo step per
    /// drag, not one per mouse move).
    pub fn commit_resize(&mut self, width: u32) -> Result<(), EngineError> {
        let Some(session) = self.resize.take() else { return Ok(()) };
        if self
            .table
            .column(&session.column_id)
            .map(|c| c.width.clamped(width) == session.start_width)
            .unwrap_or(true)
        {
            return Ok(());
        }
        self.dispatch(Operation::ResizeColumn { column_id: session.column_id, width })
    }

    pub fn cancel_resize(&mut self) {
        self.resize = None;
    }

    // ========================================================================
    // Clipboard
    // ========================================================================

    /// Copy the selection's bounding rectangle to the clipboard as
    /// tab-separated text. Copying does not enter the operation log.
    pub fn copy_selection(&mut self) {
        let Some(range) = self.selection_bounds() else { return };
        let mut lines = Vec::new();
        for r in range.start_row..=range.end_row.min(self.table.row_count().saturating_sub(1)) {
            let mut fields = Vec::new();
            for c in range.start_col..=range.end_col.min(self.table.column_count().saturating_sub(1)) {
                let content = self
                    .table
                    .cell_id_at(r, c)
                    .and_then(|id| self.table.cell(&id).map(|cell| cell.content.clone()))
                    .unwrap_or_default();
                fields.push(content);
            }
            lines.push(fields.join("\t"));
        }
        self.clipboard.write_text(lines.join("\n"));
    }

    /// Paste tab-separated clipboard text starting at the selection focus
    /// (falling back to the anchor).
    pub fn paste_from_clipboard(&mut self) -> Result<(), EngineError> {
        let Some(text) = self.clipboard.read_text() else { return Ok(()) };
        let Some(at) = self.selection.focus.clone().or_else(|| self.selection.anchor.clone()) else {
            return Ok(());
        };
        let grid: Vec<Vec<String>> = text
            .lines()
            .map(|line| line.split('\t').map(str::to_string).collect())
            .collect();
        if grid.is_empty() {
            return Ok(());
        }
        self.dispatch(Operation::Paste { at, grid })
    }

    /// Bounding rectangle over all selected ranges.
    fn selection_bounds(&self) -> Option<Range> {
        let first = self.selection.ranges.first()?;
        let mut bounds = *first;
        for range in &self.selection.ranges[1..] {
            bounds = Range::new(
                bounds.start_row.min(range.start_row),
                bounds.start_col.min(range.start_col),
                bounds.end_row.max(range.end_row),
                bounds.end_col.max(range.end_col),
            );
        }
        Some(bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventCollector;
    use std::sync::{Arc, Mutex};
    use tablecraft_core::SelectionKind;

    fn controller() -> TableController {
        TableController::new(Table::with_size("t", 3, 3))
    }

    fn set_cell(ctrl: &mut TableController, row: usize, col: usize, content: &str) {
        let id = ctrl.table().cell_id_at(row, col).unwrap();
        ctrl.dispatch(Operation::UpdateCell {
            cell_id: id,
            delta: CellDelta::content(content),
        })
        .unwrap();
    }

    #[test]
    fn test_click_then_shift_click_selects_rectangle() {
        let mut ctrl = controller();
        ctrl.click_cell(0, 0);
        ctrl.shift_click(1, 2);

        let sel = ctrl.selection();
        assert_eq!(sel.kind, SelectionKind::Range);
        assert_eq!(sel.ranges, vec![Range::new(0, 0, 1, 2)]);
        assert_eq!(sel.cell_count(), 6);
        assert_eq!(sel.anchor, ctrl.table().cell_id_at(0, 0));
        assert_eq!(sel.focus, ctrl.table().cell_id_at(1, 2));
    }

    #[test]
    fn test_select_all_covers_table() {
        let mut ctrl = controller();
        ctrl.select_all();
        assert_eq!(ctrl.selection().kind, SelectionKind::All);
        assert_eq!(ctrl.selection().cell_count(), 9);
        assert_eq!(ctrl.selection().row_ids.len(), 3);
        assert_eq!(ctrl.selection().column_ids.len(), 3);
    }

    #[test]
    fn test_dispatch_rejected_when_not_editable() {
        let mut table = Table::with_size("t", 2, 2);
        table.settings.behavior.editable = false;
        let mut ctrl = TableController::new(table);
        let err = ctrl.dispatch(Operation::InsertRow { after: None, seed: None }).unwrap_err();
        assert_eq!(err, EngineError::NotEditable);
        assert!(!ctrl.can_undo());
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut ctrl = controller();
        set_cell(&mut ctrl, 0, 0, "hello");
        let id = ctrl.table().cell_id_at(0, 0).unwrap();
        assert_eq!(ctrl.table().cell(&id).unwrap().content, "hello");

        ctrl.undo().unwrap();
        assert_eq!(ctrl.table().cell(&id).unwrap().content, "");
        assert!(ctrl.can_redo());

        ctrl.redo().unwrap();
        assert_eq!(ctrl.table().cell(&id).unwrap().content, "hello");
        assert!(ctrl.can_undo());
        assert!(!ctrl.can_redo());
    }

    #[test]
    fn test_undo_empty_stack_is_error() {
        let mut ctrl = controller();
        assert_eq!(ctrl.undo().unwrap_err(), EngineError::NothingToRevert("undo"));
    }

    #[test]
    fn test_new_operation_clears_redo() {
        let mut ctrl = controller();
        set_cell(&mut ctrl, 0, 0, "one");
        ctrl.undo().unwrap();
        assert!(ctrl.can_redo());

        set_cell(&mut ctrl, 0, 1, "two");
        assert!(!ctrl.can_redo());
    }

    #[test]
    fn test_noop_merge_keeps_redo_and_emits_nothing() {
        let mut ctrl = controller();
        set_cell(&mut ctrl, 0, 0, "kept");
        ctrl.undo().unwrap();
        assert!(ctrl.can_redo());

        let collector = Arc::new(Mutex::new(EventCollector::new()));
        let sink = Arc::clone(&collector);
        ctrl.set_event_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        // A one-cell merge resolves to nothing; the gesture must not
        // disturb the log.
        let id = ctrl.table().cell_id_at(0, 0).unwrap();
        let version = ctrl.table().metadata.version;
        ctrl.dispatch(Operation::MergeCells { cell_ids: vec![id.clone()], primary: id })
            .unwrap();

        assert!(ctrl.can_redo());
        assert!(!ctrl.can_undo());
        assert_eq!(ctrl.table().metadata.version, version);
        assert!(collector.lock().unwrap().is_empty());

        ctrl.redo().unwrap();
        let restored = ctrl.table().cell_id_at(0, 0).unwrap();
        assert_eq!(ctrl.table().cell(&restored).unwrap().content, "kept");
    }

    #[test]
    fn test_structural_delete_prunes_selection() {
        let mut ctrl = controller();
        ctrl.click_cell(1, 1);
        let row_id = ctrl.table().rows[1].id.clone();
        ctrl.dispatch(Operation::DeleteRow { row_id }).unwrap();
        assert!(ctrl.selection().cell_ids.is_empty());
    }

    #[test]
    fn test_edit_session_commit_dispatches_once() {
        let mut ctrl = controller();
        let id = ctrl.table().cell_id_at(0, 0).unwrap();
        ctrl.begin_edit(&id).unwrap();
        ctrl.set_draft("typed");
        ctrl.commit_edit().unwrap();

        assert_eq!(ctrl.table().cell(&id).unwrap().content, "typed");
        assert!(ctrl.can_undo());
        assert!(ctrl.editing().is_none());
    }

    #[test]
    fn test_edit_session_unchanged_draft_skips_dispatch() {
        let mut ctrl = controller();
        let id = ctrl.table().cell_id_at(0, 0).unwrap();
        ctrl.begin_edit(&id).unwrap();
        ctrl.commit_edit().unwrap();
        assert!(!ctrl.can_undo());
    }

    #[test]
    fn test_edit_cancel_discards_draft() {
        let mut ctrl = controller();
        let id = ctrl.table().cell_id_at(0, 0).unwrap();
        ctrl.begin_edit(&id).unwrap();
        ctrl.set_draft("discarded");
        ctrl.cancel_edit();
        assert_eq!(ctrl.table().cell(&id).unwrap().content, "");
        assert!(!ctrl.can_undo());
    }

    #[test]
    fn test_begin_edit_readonly_cell_rejected() {
        let mut ctrl = controller();
        let id = ctrl.table().cell_id_at(0, 0).unwrap();
        let mut meta = crate::cell::CellMetadata::default();
        meta.readonly = true;
        ctrl.dispatch(Operation::UpdateCell {
            cell_id: id.clone(),
            delta: CellDelta { metadata: Some(meta), ..CellDelta::default() },
        })
        .unwrap();

        assert_eq!(ctrl.begin_edit(&id).unwrap_err(), EngineError::NotEditable);
    }

    #[test]
    fn test_resize_session_is_one_undo_step() {
        let mut ctrl = controller();
        let column_id = ctrl.table().columns[0].id.clone();
        ctrl.begin_resize(&column_id).unwrap();
        ctrl.commit_resize(300).unwrap();

        assert_eq!(ctrl.table().column(&column_id).unwrap().width.value, 300);
        assert_eq!(ctrl.history.undo_depth(), 1);

        ctrl.undo().unwrap();
        assert_eq!(ctrl.table().column(&column_id).unwrap().width.value, 150);
    }

    #[test]
    fn test_copy_paste_rectangle() {
        let mut ctrl = controller();
        set_cell(&mut ctrl, 0, 0, "a");
        set_cell(&mut ctrl, 0, 1, "b");
        set_cell(&mut ctrl, 1, 0, "c");
        set_cell(&mut ctrl, 1, 1, "d");

        ctrl.click_cell(0, 0);
        ctrl.shift_click(1, 1);
        ctrl.copy_selection();

        ctrl.click_cell(1, 1);
        ctrl.paste_from_clipboard().unwrap();

        let table = ctrl.table();
        assert_eq!(table.cell(&table.cell_id_at(1, 1).unwrap()).unwrap().content, "a");
        assert_eq!(table.cell(&table.cell_id_at(1, 2).unwrap()).unwrap().content, "b");
        assert_eq!(table.cell(&table.cell_id_at(2, 1).unwrap()).unwrap().content, "c");
        assert_eq!(table.cell(&table.cell_id_at(2, 2).unwrap()).unwrap().content, "d");
    }

    #[test]
    fn test_events_emitted_per_commit() {
        let collector = Arc::new(Mutex::new(EventCollector::new()));
        let sink = Arc::clone(&collector);

        let mut ctrl = controller();
        ctrl.set_event_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));

        set_cell(&mut ctrl, 0, 0, "x");
        ctrl.undo().unwrap();

        let collector = collector.lock().unwrap();
        let versions = collector.version_changed();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].previous + 1, versions[0].version);
        assert_eq!(collector.operations_applied().len(), 2);
        assert!(collector.operations_applied()[1].reverted);
    }

    #[test]
    fn test_validation_index_refreshed_on_dispatch() {
        let mut table = Table::with_size("t", 2, 1);
        table.columns[0].rules = vec![crate::validate::ValidationRule::required()];
        let mut ctrl = TableController::new(table);

        let id = ctrl.table().cell_id_at(0, 0).unwrap();
        ctrl.dispatch(Operation::UpdateCell {
            cell_id: id.clone(),
            delta: CellDelta::content("filled"),
        })
        .unwrap();

        // The filled cell dropped out of the problem index; the untouched
        // empty cell remains.
        assert!(!ctrl.table().validation_index.contains_key(&id));
        assert_eq!(ctrl.table().validation_index.len(), 1);
    }
}
