// CSV/TSV import and export

use tablecraft_engine::cell::ValueType;
use tablecraft_engine::column::Column;
use tablecraft_engine::row::Row;
use tablecraft_engine::table::Table;

use crate::error::IoError;

/// Export raw cell content as CSV. The header row is included when the
/// table's display settings say headers are shown. Fields containing the
/// delimiter, quotes, or newlines come out quoted.
pub fn table_to_csv(table: &Table) -> Result<String, IoError> {
    table_to_delimited(table, b',')
}

pub fn table_to_tsv(table: &Table) -> Result<String, IoError> {
    table_to_delimited(table, b'\t')
}

pub fn table_to_delimited(table: &Table, delimiter: u8) -> Result<String, IoError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    if table.settings.display.show_headers {
        writer.write_record(table.columns.iter().map(|c| c.name.as_str()))?;
    }
    for row in &table.rows {
        let record: Vec<&str> = table
            .columns
            .iter()
            .map(|column| {
                row.cell(&column.id)
                    .map(|cell| cell.content.as_str())
                    .unwrap_or("")
            })
            .collect();
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| IoError::Malformed(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| IoError::Malformed(e.to_string()))
}

/// Import CSV content, sniffing the delimiter. The first record supplies
/// the column names; every following record becomes a row.
pub fn table_from_csv(content: &str) -> Result<Table, IoError> {
    table_from_delimited(content, sniff_delimiter(content))
}

pub fn table_from_delimited(content: &str, delimiter: u8) -> Result<Table, IoError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(IoError::Malformed("no header record".into()));
    }
    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let name = if name.is_empty() {
                format!("Column {}", i + 1)
            } else {
                name.to_string()
            };
            Column::new(name, ValueType::Text)
        })
        .collect();

    let mut table = Table::new("Imported table", columns);
    table.rows.clear();

    for result in reader.records() {
        let record = result?;
        let mut row = Row::empty(&table.columns);
        for (i, field) in record.iter().enumerate() {
            let Some(column) = table.columns.get(i) else { break };
            if let Some(cell) = row.cell_mut(&column.id) {
                cell.content = field.to_string();
            }
        }
        table.rows.push(row);
    }
    if table.rows.is_empty() {
        let row = Row::empty(&table.columns);
        table.rows.push(row);
    }

    Ok(table)
}

/// Detect the most likely field delimiter by checking consistency across
/// the first few lines. The candidate producing the most consistent field
/// count (>1 field) wins; comma is the fallback.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablecraft_engine::mutate::{update_cell, CellDelta};

    fn filled_table() -> Table {
        let mut table = Table::with_size("t", 2, 2);
        table.columns[0].name = "Name".into();
        table.columns[1].name = "Note".into();
        for (r, c, content) in [(0, 0, "Ada"), (0, 1, "first"), (1, 0, "Grace"), (1, 1, "second")] {
            let id = table.cell_id_at(r, c).unwrap();
            table = update_cell(&table, &id, &CellDelta::content(content)).unwrap();
        }
        table
    }

    #[test]
    fn test_export_includes_headers() {
        let csv = table_to_csv(&filled_table()).unwrap();
        assert_eq!(csv, "Name,Note\nAda,first\nGrace,second\n");
    }

    #[test]
    fn test_export_without_headers() {
        let mut table = filled_table();
        table.settings.display.show_headers = false;
        let csv = table_to_csv(&table).unwrap();
        assert_eq!(csv, "Ada,first\nGrace,second\n");
    }

    #[test]
    fn test_quoted_fields_round_trip() {
        let mut table = filled_table();
        let id = table.cell_id_at(0, 1).unwrap();
        table = update_cell(&table, &id, &CellDelta::content("has, comma\nand newline \"quoted\"")).unwrap();

        let csv = table_to_csv(&table).unwrap();
        let imported = table_from_csv(&csv).unwrap();

        assert_eq!(imported.row_count(), 2);
        let back = imported.cell_id_at(0, 1).unwrap();
        assert_eq!(
            imported.cell(&back).unwrap().content,
            "has, comma\nand newline \"quoted\""
        );
    }

    #[test]
    fn test_import_builds_columns_from_header() {
        let table = table_from_csv("A,B,C\n1,2,3\n").unwrap();
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.columns[0].name, "A");
        assert_eq!(table.row_count(), 1);
        assert!(table.is_complete());
    }

    #[test]
    fn test_import_header_only_keeps_row_floor() {
        let table = table_from_csv("A,B\n").unwrap();
        assert_eq!(table.row_count(), 1);
        assert!(table.is_complete());
    }

    #[test]
    fn test_import_sniffs_semicolons() {
        let table = table_from_csv("a;b;c\n1;2;3\n").unwrap();
        assert_eq!(table.column_count(), 3);
    }

    #[test]
    fn test_short_records_leave_cells_empty() {
        let table = table_from_csv("A,B,C\nonly\n").unwrap();
        let id = table.cell_id_at(0, 2).unwrap();
        assert_eq!(table.cell(&id).unwrap().content, "");
    }
}
