// Property-based tests for the table engine.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use chrono::TimeZone;
use proptest::prelude::*;

use tablecraft_core::{CellId, ColumnId, Range, RowId};
use tablecraft_engine::controller::TableController;
use tablecraft_engine::mutate::{self, CellDelta, Operation};
use tablecraft_engine::table::{SortDirection, SortKey, Table};
use tablecraft_engine::EngineError;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn config_64() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(64),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Strip everything that legitimately differs between two otherwise equal
/// snapshots: version counter, timestamps, and the validation index.
fn normalized(table: &Table) -> Table {
    let epoch = chrono::Utc.timestamp_opt(0, 0).unwrap();
    let mut t = table.clone();
    t.metadata.version = 0;
    t.metadata.created_at = epoch;
    t.metadata.updated_at = epoch;
    t.validation_index.clear();
    for row in &mut t.rows {
        row.created_at = epoch;
        row.updated_at = epoch;
        for cell in row.cells.values_mut() {
            cell.updated_at = epoch;
        }
    }
    t
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

/// One structural or content step, with indices resolved against the
/// table's dimensions at apply time.
#[derive(Debug, Clone)]
enum Step {
    InsertRow(usize),
    DeleteRow(usize),
    InsertColumn(usize),
    DeleteColumn(usize),
    Update(usize, usize, String),
    Resize(usize, u32),
    Sort(usize, bool),
}

fn arb_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0usize..16).prop_map(Step::InsertRow),
        2 => (0usize..16).prop_map(Step::DeleteRow),
        3 => (0usize..8).prop_map(Step::InsertColumn),
        2 => (0usize..8).prop_map(Step::DeleteColumn),
        4 => ((0usize..16), (0usize..8), "[a-zA-Z0-9 ]{0,12}")
            .prop_map(|(r, c, s)| Step::Update(r, c, s)),
        1 => ((0usize..8), (10u32..1000)).prop_map(|(c, w)| Step::Resize(c, w)),
        1 => ((0usize..8), any::<bool>()).prop_map(|(c, asc)| Step::Sort(c, asc)),
    ]
}

/// Resolve a step against the current table into a dispatchable operation.
/// Deletes that would break the cardinality floor are resolved anyway; the
/// caller asserts the engine rejects them.
fn resolve(table: &Table, step: &Step) -> Operation {
    match step {
        Step::InsertRow(i) => {
            let after = table.rows.get(i % table.row_count()).map(|r| r.id.clone());
            Operation::InsertRow { after, seed: None }
        }
        Step::DeleteRow(i) => Operation::DeleteRow {
            row_id: table.rows[i % table.row_count()].id.clone(),
        },
        Step::InsertColumn(i) => {
            let after = table.columns.get(i % table.column_count()).map(|c| c.id.clone());
            Operation::InsertColumn { after, seed: None }
        }
        Step::DeleteColumn(i) => Operation::DeleteColumn {
            column_id: table.columns[i % table.column_count()].id.clone(),
        },
        Step::Update(r, c, content) => {
            let r = r % table.row_count();
            let c = c % table.column_count();
            Operation::UpdateCell {
                cell_id: table.cell_id_at(r, c).unwrap(),
                delta: CellDelta::content(content.clone()),
            }
        }
        Step::Resize(c, width) => Operation::ResizeColumn {
            column_id: table.columns[c % table.column_count()].id.clone(),
            width: *width,
        },
        Step::Sort(c, ascending) => Operation::SortRows {
            keys: vec![SortKey {
                column_id: table.columns[c % table.column_count()].id.clone(),
                direction: if *ascending {
                    SortDirection::Ascending
                } else {
                    SortDirection::Descending
                },
                priority: 0,
            }],
        },
    }
}

fn is_floor_delete(table: &Table, op: &Operation) -> bool {
    match op {
        Operation::DeleteRow { .. } => table.row_count() == 1,
        Operation::DeleteColumn { .. } => table.column_count() == 1,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Identifier scheme
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    /// Composing a cell id from any separator-free row/column ids and
    /// parsing it back is the identity.
    #[test]
    fn prop_cell_id_round_trip(row in "[a-z0-9-]{1,20}", col in "[a-z0-9-]{1,20}") {
        let row_id = RowId::new(row);
        let column_id = ColumnId::new(col);
        let cell_id = CellId::compose(&row_id, &column_id);
        prop_assert_eq!(cell_id.parse().unwrap(), (row_id, column_id));
    }

    /// Generated ids always survive the round trip.
    #[test]
    fn prop_generated_id_round_trip(_seed in 0u8..8) {
        let row_id = RowId::generate();
        let column_id = ColumnId::generate();
        let cell_id = CellId::compose(&row_id, &column_id);
        prop_assert_eq!(cell_id.parse().unwrap(), (row_id, column_id));
    }
}

// ---------------------------------------------------------------------------
// Structural invariants
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_64())]

    /// Any sequence of inserts, deletes, updates, resizes, and sorts keeps
    /// every row's cell map exactly covering the column set, and never
    /// drops below one row and one column.
    #[test]
    fn prop_completeness_under_random_steps(steps in proptest::collection::vec(arb_step(), 1..40)) {
        let mut table = Table::with_size("t", 2, 2);

        for step in &steps {
            let op = resolve(&table, step);
            if is_floor_delete(&table, &op) {
                let err = mutate::apply(&table, &op).unwrap_err();
                prop_assert!(matches!(
                    err,
                    EngineError::CannotDeleteLastRow | EngineError::CannotDeleteLastColumn
                ));
                continue;
            }
            table = mutate::apply(&table, &op).unwrap().table;

            prop_assert!(table.is_complete());
            prop_assert!(table.row_count() >= 1);
            prop_assert!(table.column_count() >= 1);
        }
    }

    /// Every applied operation bumps the version by at least one; versions
    /// never repeat along a history.
    #[test]
    fn prop_version_strictly_increases(steps in proptest::collection::vec(arb_step(), 1..20)) {
        let mut table = Table::with_size("t", 2, 2);
        let mut last = table.metadata.version;

        for step in &steps {
            let op = resolve(&table, step);
            if is_floor_delete(&table, &op) {
                continue;
            }
            table = mutate::apply(&table, &op).unwrap().table;
            prop_assert!(table.metadata.version > last);
            last = table.metadata.version;
        }
    }
}

// ---------------------------------------------------------------------------
// Undo / redo
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_64())]

    /// Undoing every operation restores the initial snapshot, and redoing
    /// them all restores the final one (modulo version and timestamps).
    #[test]
    fn prop_undo_redo_round_trip(steps in proptest::collection::vec(arb_step(), 1..20)) {
        let initial = Table::with_size("t", 2, 2);
        let mut ctrl = TableController::new(initial.clone());
        let mut applied = 0usize;

        for step in &steps {
            let op = resolve(ctrl.table(), step);
            if is_floor_delete(ctrl.table(), &op) {
                continue;
            }
            ctrl.dispatch(op).unwrap();
            applied += 1;
        }
        let final_state = normalized(ctrl.table());

        for _ in 0..applied {
            ctrl.undo().unwrap();
        }
        prop_assert_eq!(normalized(ctrl.table()), normalized(&initial));
        prop_assert!(!ctrl.can_undo());

        for _ in 0..applied {
            ctrl.redo().unwrap();
        }
        prop_assert_eq!(normalized(ctrl.table()), final_state);
        prop_assert!(!ctrl.can_redo());
    }
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_256())]

    /// A shift-click rectangle always keeps the flat cell-id set equal to
    /// the row-major flattening of the single range.
    #[test]
    fn prop_rectangle_selection_consistent(
        r1 in 0usize..6, c1 in 0usize..6, r2 in 0usize..6, c2 in 0usize..6,
    ) {
        let mut ctrl = TableController::new(Table::with_size("t", 6, 6));
        ctrl.click_cell(r1, c1);
        ctrl.shift_click(r2, c2);

        let sel = ctrl.selection();
        let range = Range::new(r1, c1, r2, c2);
        prop_assert_eq!(sel.ranges.clone(), vec![range]);
        prop_assert_eq!(sel.cell_count(), range.cell_count());

        let expected: Vec<CellId> = ctrl.table().cells_in_range(&range);
        prop_assert_eq!(sel.cell_ids.clone(), expected);
    }

    /// Toggled scattered cells keep one 1x1 rectangle per selected cell.
    #[test]
    fn prop_scattered_selection_consistent(
        picks in proptest::collection::vec((0usize..4, 0usize..4), 1..10),
    ) {
        let mut ctrl = TableController::new(Table::with_size("t", 4, 4));
        for (r, c) in &picks {
            ctrl.toggle_cell(*r, *c);
        }
        let sel = ctrl.selection();
        prop_assert_eq!(sel.cell_ids.len(), sel.ranges.len());
        for range in &sel.ranges {
            prop_assert_eq!(range.cell_count(), 1);
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(config_64())]

    /// Merged content is the row-major concatenation of non-empty parts,
    /// regardless of the order the cell ids were supplied in.
    #[test]
    fn prop_merge_order_canonical(shuffle_seed in 0usize..24, contents in proptest::collection::vec("[a-z]{0,4}", 3..=3)) {
        let mut table = Table::with_size("t", 1, 3);
        let mut ids = Vec::new();
        for (c, content) in contents.iter().enumerate() {
            let id = table.cell_id_at(0, c).unwrap();
            table = mutate::update_cell(&table, &id, &CellDelta::content(content.clone())).unwrap();
            ids.push(id);
        }
        let primary = ids[0].clone();

        let mut shuffled = ids.clone();
        shuffled.rotate_left(shuffle_seed % 3);
        if shuffle_seed % 2 == 1 {
            shuffled.reverse();
        }

        let merged = mutate::merge_cells(&table, &shuffled, &primary).unwrap();
        let expected: Vec<&str> = contents.iter().map(|s| s.as_str()).filter(|s| !s.is_empty()).collect();
        prop_assert_eq!(merged.cell(&primary).unwrap().content.clone(), expected.join(" "));
    }
}
