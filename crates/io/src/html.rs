// HTML export: formatted values, merge spans, visible rows only.

use tablecraft_engine::display::format_cell_value;
use tablecraft_engine::table::Table;

/// Render the table as an HTML `<table>`. Hidden columns and filtered-out
/// rows are omitted; merged cells get `rowspan`/`colspan` attributes and
/// cells a merge removed produce no element at all. Content is formatted
/// through the owning column's display format.
pub fn table_to_html(table: &Table) -> String {
    let columns: Vec<_> = table.columns.iter().filter(|c| !c.hidden).collect();
    let mut out = String::from("<table>\n");

    if table.settings.display.show_headers {
        out.push_str("  <thead>\n    <tr>");
        for column in &columns {
            out.push_str("<th>");
            out.push_str(&escape(&column.name));
            out.push_str("</th>");
        }
        out.push_str("</tr>\n  </thead>\n");
    }

    out.push_str("  <tbody>\n");
    for row in table.visible_rows() {
        out.push_str("    <tr>");
        for column in &columns {
            let Some(cell) = row.cell(&column.id) else { continue };
            out.push_str("<td");
            if cell.span.rows > 1 {
                out.push_str(&format!(" rowspan=\"{}\"", cell.span.rows));
            }
            if cell.span.cols > 1 {
                out.push_str(&format!(" colspan=\"{}\"", cell.span.cols));
            }
            out.push('>');
            out.push_str(&escape(&format_cell_value(&cell.content, column.format.as_ref())));
            out.push_str("</td>");
        }
        out.push_str("</tr>\n");
    }
    out.push_str("  </tbody>\n</table>\n");
    out
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
