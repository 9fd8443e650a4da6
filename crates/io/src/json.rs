// Native JSON format: the full table model with a version envelope.

use serde::{Deserialize, Serialize};
use tablecraft_engine::table::Table;

use crate::error::IoError;
use crate::NATIVE_FORMAT_VERSION;

#[derive(Serialize, Deserialize)]
struct Document {
    format_version: u32,
    table: Table,
}

/// Serialize the complete table (columns, rows, styles, settings, filters,
/// sort spec) so that deserializing reproduces an identical snapshot.
pub fn table_to_json(table: &Table) -> Result<String, IoError> {
    let document = Document {
        format_version: NATIVE_FORMAT_VERSION,
        table: table.clone(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn table_from_json(content: &str) -> Result<Table, IoError> {
    let document: Document = serde_json::from_str(content)?;
    if document.format_version > NATIVE_FORMAT_VERSION {
        return Err(IoError::Malformed(format!(
            "format version {} is newer than supported version {}",
            document.format_version, NATIVE_FORMAT_VERSION
        )));
    }
    Ok(document.table)
}
