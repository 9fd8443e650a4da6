//! The selection model: which cells, rows, columns, or ranges are selected.
//!
//! A selection always carries both the rectangle list and the flattened
//! primitive id sets. The two representations are kept in lockstep by the
//! mutation methods here; callers resolve ids to positions (and back) since
//! only the table knows the current ordering.

use serde::{Deserialize, Serialize};

use crate::id::{CellId, ColumnId, RowId};
use crate::range::Range;

/// What the selection is anchored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionKind {
    #[default]
    Cell,
    Row,
    Column,
    Range,
    All,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Selection {
    pub kind: SelectionKind,
    pub cell_ids: Vec<CellId>,
    pub row_ids: Vec<RowId>,
    pub column_ids: Vec<ColumnId>,
    pub ranges: Vec<Range>,
    /// Where a shift-extension starts from.
    pub anchor: Option<CellId>,
    /// The most recently clicked cell of the current gesture.
    pub focus: Option<CellId>,
}

impl Selection {
    /// An empty selection (nothing highlighted).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Plain click: exactly one cell.
    pub fn select_cell(&mut self, id: CellId, row: usize, col: usize) {
        *self = Self {
            kind: SelectionKind::Cell,
            cell_ids: vec![id.clone()],
            ranges: vec![Range::single(row, col)],
            anchor: Some(id.clone()),
            focus: Some(id),
            ..Self::default()
        };
    }

    /// Modifier-click: toggle one cell's membership.
    ///
    /// More than one selected cell escalates the kind to `Range` (each
    /// scattered cell contributes its own 1x1 rectangle, which keeps the
    /// rectangle list and the flat set in agreement); toggling back down to
    /// one cell returns the kind to `Cell`.
    pub fn toggle_cell(&mut self, id: CellId, row: usize, col: usize) {
        if let Some(pos) = self.cell_ids.iter().position(|c| *c == id) {
            self.cell_ids.remove(pos);
            if let Some(rpos) = self.ranges.iter().position(|r| *r == Range::single(row, col)) {
                self.ranges.remove(rpos);
            }
            if self.anchor.as_ref() == Some(&id) {
                self.anchor = self.cell_ids.first().cloned();
            }
        } else {
            self.cell_ids.push(id.clone());
            self.ranges.push(Range::single(row, col));
            self.anchor.get_or_insert_with(|| id.clone());
        }
        self.focus = self.cell_ids.last().cloned();
        self.row_ids.clear();
        self.column_ids.clear();
        self.kind = if self.cell_ids.len() > 1 {
            SelectionKind::Range
        } else {
            SelectionKind::Cell
        };
    }

    /// Shift-click: replace the selection with the rectangle from the anchor
    /// to `focus`. `covered` must be the row-major flattening of `range`.
    pub fn extend_to(&mut self, focus: CellId, range: Range, covered: Vec<CellId>) {
        self.kind = SelectionKind::Range;
        self.cell_ids = covered;
        self.row_ids.clear();
        self.column_ids.clear();
        self.ranges = vec![range];
        self.anchor.get_or_insert_with(|| focus.clone());
        self.focus = Some(focus);
    }

    /// Row-header click: one whole row.
    pub fn select_row(&mut self, row_id: RowId, covered: Vec<CellId>, range: Range) {
        *self = Self {
            kind: SelectionKind::Row,
            cell_ids: covered,
            row_ids: vec![row_id],
            ranges: vec![range],
            ..Self::default()
        };
    }

    /// Modifier row-header click: toggle a row in a multi-row selection.
    pub fn toggle_row(&mut self, row_id: RowId, covered: Vec<CellId>, range: Range) {
        if self.kind != SelectionKind::Row {
            self.select_row(row_id, covered, range);
            return;
        }
        if let Some(pos) = self.row_ids.iter().position(|r| *r == row_id) {
            self.row_ids.remove(pos);
            self.ranges.remove(pos);
            self.cell_ids.retain(|c| !covered.contains(c));
            // Toggling the last row off leaves nothing selected.
            if self.row_ids.is_empty() {
                self.clear();
            }
        } else {
            self.row_ids.push(row_id);
            self.ranges.push(range);
            self.cell_ids.extend(covered);
        }
    }

    /// Column-header click: one whole column.
    pub fn select_column(&mut self, column_id: ColumnId, covered: Vec<CellId>, range: Range) {
        *self = Self {
            kind: SelectionKind::Column,
            cell_ids: covered,
            column_ids: vec![column_id],
            ranges: vec![range],
            ..Self::default()
        };
    }

    /// Modifier column-header click: toggle a column in a multi-column selection.
    pub fn toggle_column(&mut self, column_id: ColumnId, covered: Vec<CellId>, range: Range) {
        if self.kind != SelectionKind::Column {
            self.select_column(column_id, covered, range);
            return;
        }
        if let Some(pos) = self.column_ids.iter().position(|c| *c == column_id) {
            self.column_ids.remove(pos);
            self.ranges.remove(pos);
            self.cell_ids.retain(|c| !covered.contains(c));
            if self.column_ids.is_empty() {
                self.clear();
            }
        } else {
            self.column_ids.push(column_id);
            self.ranges.push(range);
            self.cell_ids.extend(covered);
        }
    }

    /// Select the whole table as a single full rectangle.
    pub fn select_all(
        &mut self,
        row_ids: Vec<RowId>,
        column_ids: Vec<ColumnId>,
        covered: Vec<CellId>,
        full: Range,
    ) {
        *self = Self {
            kind: SelectionKind::All,
            cell_ids: covered,
            row_ids,
            column_ids,
            ranges: vec![full],
            ..Self::default()
        };
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.cell_ids.is_empty() && self.row_ids.is_empty() && self.column_ids.is_empty()
    }

    pub fn contains_cell(&self, id: &CellId) -> bool {
        self.cell_ids.iter().any(|c| c == id)
    }

    pub fn contains_row(&self, id: &RowId) -> bool {
        self.row_ids.iter().any(|r| r == id)
    }

    pub fn contains_column(&self, id: &ColumnId) -> bool {
        self.column_ids.iter().any(|c| c == id)
    }

    pub fn cell_count(&self) -> usize {
        self.cell_ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(n: usize) -> CellId {
        CellId::compose(&RowId::new(format!("r{n}")), &ColumnId::new(format!("c{n}")))
    }

    #[test]
    fn test_single_click_is_cell_kind() {
        let mut sel = Selection::empty();
        sel.select_cell(cid(1), 0, 0);
        assert_eq!(sel.kind, SelectionKind::Cell);
        assert_eq!(sel.cell_ids.len(), 1);
        assert_eq!(sel.anchor, Some(cid(1)));
    }

    #[test]
    fn test_toggle_escalates_and_collapses() {
        let mut sel = Selection::empty();
        sel.select_cell(cid(1), 0, 0);
        sel.toggle_cell(cid(2), 0, 1);
        assert_eq!(sel.kind, SelectionKind::Range);
        assert_eq!(sel.cell_ids.len(), 2);
        assert_eq!(sel.ranges.len(), 2);

        sel.toggle_cell(cid(2), 0, 1);
        assert_eq!(sel.kind, SelectionKind::Cell);
        assert_eq!(sel.cell_ids, vec![cid(1)]);
        assert_eq!(sel.ranges, vec![Range::single(0, 0)]);
    }

    #[test]
    fn test_extend_sets_single_rectangle() {
        let mut sel = Selection::empty();
        sel.select_cell(cid(1), 0, 0);
        let covered = vec![cid(1), cid(2), cid(3), cid(4)];
        sel.extend_to(cid(4), Range::new(0, 0, 1, 1), covered.clone());
        assert_eq!(sel.kind, SelectionKind::Range);
        assert_eq!(sel.ranges, vec![Range::new(0, 0, 1, 1)]);
        assert_eq!(sel.cell_ids, covered);
        // Anchor survives the extension.
        assert_eq!(sel.anchor, Some(cid(1)));
        assert_eq!(sel.focus, Some(cid(4)));
    }

    #[test]
    fn test_toggle_row_membership() {
        let mut sel = Selection::empty();
        sel.select_row(RowId::new("r1"), vec![cid(1)], Range::new(0, 0, 0, 3));
        sel.toggle_row(RowId::new("r2"), vec![cid(2)], Range::new(1, 0, 1, 3));
        assert_eq!(sel.kind, SelectionKind::Row);
        assert_eq!(sel.row_ids.len(), 2);
        assert_eq!(sel.cell_ids.len(), 2);

        sel.toggle_row(RowId::new("r1"), vec![cid(1)], Range::new(0, 0, 0, 3));
        assert_eq!(sel.row_ids, vec![RowId::new("r2")]);
        assert_eq!(sel.cell_ids, vec![cid(2)]);
    }

    #[test]
    fn test_toggle_last_row_off_resets_to_empty() {
        let mut sel = Selection::empty();
        sel.select_row(RowId::new("r1"), vec![cid(1)], Range::new(0, 0, 0, 3));
        sel.toggle_row(RowId::new("r1"), vec![cid(1)], Range::new(0, 0, 0, 3));
        assert!(sel.is_empty());
        assert_eq!(sel.kind, SelectionKind::Cell);
        assert!(sel.ranges.is_empty());
    }

    #[test]
    fn test_toggle_last_column_off_resets_to_empty() {
        let mut sel = Selection::empty();
        sel.select_column(ColumnId::new("c1"), vec![cid(1)], Range::new(0, 0, 3, 0));
        sel.toggle_column(ColumnId::new("c1"), vec![cid(1)], Range::new(0, 0, 3, 0));
        assert!(sel.is_empty());
        assert_eq!(sel.kind, SelectionKind::Cell);
        assert!(sel.ranges.is_empty());
    }
}
