use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tablecraft_core::{CellId, ColumnId, RowId};

/// Declared value type of a column or an individual cell.
///
/// A cell inherits its column's type at creation and may override it later
/// (e.g. one rich-text cell inside a text column).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    #[default]
    Text,
    Number,
    Date,
    Boolean,
    Formula,
    Image,
    Link,
    Currency,
    Percentage,
    Email,
    Phone,
    Color,
    RichText,
}

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum VerticalAlignment {
    Top,
    #[default]
    Middle,
    Bottom,
}

/// Text overflow behavior
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum TextOverflow {
    #[default]
    Clip, // Text is clipped at cell boundary
    Wrap,     // Text wraps to multiple lines within the cell
    Overflow, // Text overflows into adjacent empty cells
}

/// A style delta. Every field is optional: `None` means "leave as is",
/// `Some` wins when merged onto an existing style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellStyle {
    pub background_color: Option<String>,
    pub text_color: Option<String>,
    pub font_family: Option<String>,
    pub font_size: Option<u16>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strikethrough: Option<bool>,
    pub alignment: Option<Alignment>,
    pub vertical_alignment: Option<VerticalAlignment>,
    pub text_overflow: Option<TextOverflow>,
    pub border_color: Option<String>,
}

macro_rules! merge_field {
    ($self:ident, $delta:ident, $($field:ident),+) => {
        $(if $delta.$field.is_some() {
            $self.$field = $delta.$field.clone();
        })+
    };
}

impl CellStyle {
    /// Shallow-merge `delta` into this style: specified keys win,
    /// unspecified keys are preserved.
    pub fn merge_from(&mut self, delta: &CellStyle) {
        merge_field!(
            self,
            delta,
            background_color,
            text_color,
            font_family,
            font_size,
            bold,
            italic,
            underline,
            strikethrough,
            alignment,
            vertical_alignment,
            text_overflow,
            border_color
        );
    }

    pub fn is_empty(&self) -> bool {
        *self == CellStyle::default()
    }
}

/// How many grid positions a cell covers. 1x1 for ordinary cells; merge
/// sets the primary cell's span to the merged bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSpan {
    pub rows: u32,
    pub cols: u32,
}

impl Default for CellSpan {
    fn default() -> Self {
        Self { rows: 1, cols: 1 }
    }
}

impl CellSpan {
    pub fn is_unit(&self) -> bool {
        self.rows == 1 && self.cols == 1
    }
}

/// Per-cell metadata: formula text (stored, never evaluated), computed
/// display value, behavioral flags, and a free-form note.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellMetadata {
    pub formula: Option<String>,
    pub computed_value: Option<String>,
    pub locked: bool,
    pub readonly: bool,
    pub required: bool,
    pub masked: bool,
    pub note: Option<String>,
}

/// Type-specific payload attached to a cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum CellPayload {
    Link { href: String, title: Option<String> },
    Image { src: String, alt: Option<String> },
    Dropdown { options: Vec<String> },
    RichText { html: String },
}

/// The smallest addressable unit of the grid, owned by exactly one row and
/// one column. Its id is derived from that (row, column) pair and never
/// reused for a different pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub content: String,
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<CellStyle>,
    #[serde(default)]
    pub span: CellSpan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<CellMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<CellPayload>,
    pub updated_at: DateTime<Utc>,
}

impl Cell {
    /// An empty cell for the given (row, column) pair.
    pub fn empty(row: &RowId, column: &ColumnId, value_type: ValueType) -> Self {
        Self {
            id: CellId::compose(row, column),
            content: String::new(),
            value_type,
            style: None,
            span: CellSpan::default(),
            metadata: None,
            payload: None,
            updated_at: Utc::now(),
        }
    }

    /// An empty cell pre-filled with initial content.
    pub fn with_content(row: &RowId, column: &ColumnId, value_type: ValueType, content: impl Into<String>) -> Self {
        let mut cell = Self::empty(row, column, value_type);
        cell.content = content.into();
        cell
    }

    /// Refresh this cell's own updated timestamp (independent of the
    /// table-level timestamp).
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}
