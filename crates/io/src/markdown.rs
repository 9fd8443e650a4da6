// Markdown export: GitHub-flavored pipe table.

use tablecraft_engine::display::format_cell_value;
use tablecraft_engine::table::Table;

/// Render the table as a Markdown pipe table. The header row is always
/// emitted (the format requires one). Pipes are escaped and embedded
/// newlines become `<br>` so multi-line content stays in one table row.
pub fn table_to_markdown(table: &Table) -> String {
    let columns: Vec<_> = table.columns.iter().filter(|c| !c.hidden).collect();
    let mut out = String::new();

    out.push('|');
    for column in &columns {
        out.push(' ');
        out.push_str(&escape(&column.name));
        out.push_str(" |");
    }
    out.push('\n');

    out.push('|');
    for _ in &columns {
        out.push_str(" --- |");
    }
    out.push('\n');

    for row in table.visible_rows() {
        out.push('|');
        for column in &columns {
            let content = row
                .cell(&column.id)
                .map(|cell| format_cell_value(&cell.content, column.format.as_ref()))
                .unwrap_or_default();
            out.push(' ');
            out.push_str(&escape(&content));
            out.push_str(" |");
        }
        out.push('\n');
    }

    out
}

fn escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', "<br>")
}
