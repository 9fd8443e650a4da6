use serde::{Deserialize, Serialize};
use tablecraft_core::ColumnId;

use crate::cell::ValueType;
use crate::display::ValueFormat;
use crate::validate::ValidationRule;

/// Column width with resize bounds (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnWidth {
    pub value: u32,
    pub min: u32,
    pub max: u32,
}

impl Default for ColumnWidth {
    fn default() -> Self {
        Self { value: 150, min: 50, max: 600 }
    }
}

impl ColumnWidth {
    /// Clamp a requested width into this column's bounds.
    pub fn clamped(&self, requested: u32) -> u32 {
        requested.clamp(self.min, self.max)
    }
}

/// What users may do with a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFlags {
    pub sortable: bool,
    pub filterable: bool,
    pub resizable: bool,
    pub reorderable: bool,
    pub hideable: bool,
    pub pinnable: bool,
}

impl Default for ColumnFlags {
    fn default() -> Self {
        Self {
            sortable: true,
            filterable: true,
            resizable: true,
            reorderable: true,
            hideable: true,
            pinnable: false,
        }
    }
}

/// A column definition. The id is immutable for the lifetime of the table;
/// deleting a column removes exactly the cells that reference it from every
/// row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub width: ColumnWidth,
    #[serde(default)]
    pub flags: ColumnFlags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<ValueFormat>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<ValidationRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub auto_increment: bool,
    #[serde(default)]
    pub hidden: bool,
    /// Display order; kept equal to the column's index in `Table::columns`.
    pub order: usize,
}

impl Column {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            id: ColumnId::generate(),
            name: name.into(),
            value_type,
            width: ColumnWidth::default(),
            flags: ColumnFlags::default(),
            format: None,
            rules: Vec::new(),
            default_value: None,
            unique: false,
            auto_increment: false,
            hidden: false,
            order: 0,
        }
    }

    pub fn with_format(mut self, format: ValueFormat) -> Self {
        self.format = Some(format);
        self
    }

    pub fn with_rules(mut self, rules: Vec<ValidationRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }
}

/// Caller-supplied parts of a new column; everything else defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSeed {
    pub name: Option<String>,
    pub value_type: Option<ValueType>,
    pub width: Option<u32>,
    pub format: Option<ValueFormat>,
    pub rules: Vec<ValidationRule>,
    pub default_value: Option<String>,
}
