pub mod id;
pub mod range;
pub mod selection;

pub use id::{CellId, ColumnId, IdError, RowId};
pub use range::Range;
pub use selection::{Selection, SelectionKind};
