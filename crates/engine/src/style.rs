//! Bulk style application.

use rustc_hash::FxHashSet;
use tablecraft_core::CellId;

use crate::cell::CellStyle;
use crate::table::Table;

/// Merge a style delta onto every targeted cell. Set fields overwrite, unset
/// fields keep the cell's existing values. Ids that no longer resolve are
/// skipped; cells outside the target set are untouched.
pub fn apply_style(table: &Table, cell_ids: &[CellId], delta: &CellStyle) -> Table {
    let mut next = table.clone();
    let targets: FxHashSet<&CellId> = cell_ids.iter().collect();

    for row in &mut next.rows {
        let mut touched = false;
        for cell in row.cells.values_mut() {
            if !targets.contains(&cell.id) {
                continue;
            }
            match &mut cell.style {
                Some(style) => style.merge_from(delta),
                None => cell.style = Some(delta.clone()),
            }
            cell.touch();
            touched = true;
        }
        if touched {
            row.touch();
        }
    }

    next.bump_version();
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Alignment;

    #[test]
    fn test_delta_merges_onto_existing_style() {
        let table = Table::with_size("t", 2, 2);
        let target = table.cell_id_at(0, 0).unwrap();

        let bold = CellStyle { bold: Some(true), ..CellStyle::default() };
        let table = apply_style(&table, &[target.clone()], &bold);

        let centered = CellStyle { alignment: Some(Alignment::Center), ..CellStyle::default() };
        let table = apply_style(&table, &[target.clone()], &centered);

        let style = table.cell(&target).unwrap().style.as_ref().unwrap();
        assert_eq!(style.bold, Some(true));
        assert_eq!(style.alignment, Some(Alignment::Center));
    }

    #[test]
    fn test_untargeted_cells_untouched() {
        let table = Table::with_size("t", 2, 2);
        let target = table.cell_id_at(0, 0).unwrap();
        let other = table.cell_id_at(1, 1).unwrap();

        let delta = CellStyle { bold: Some(true), ..CellStyle::default() };
        let next = apply_style(&table, &[target], &delta);

        assert!(next.cell(&other).unwrap().style.is_none());
    }

    #[test]
    fn test_unresolved_ids_skipped() {
        let table = Table::with_size("t", 1, 1);
        let ghost = CellId::compose(&tablecraft_core::RowId::new("row-x"), &tablecraft_core::ColumnId::new("col-y"));
        let delta = CellStyle { bold: Some(true), ..CellStyle::default() };
        let next = apply_style(&table, &[ghost], &delta);
        assert_eq!(next.metadata.version, table.metadata.version + 1);
    }
}
