// Table serialization: CSV and JSON round-trip, HTML and Markdown export.

pub mod csv;
pub mod error;
pub mod html;
pub mod json;
pub mod markdown;

pub use error::IoError;

/// Native JSON format version.
/// Increment when the schema changes in a way old versions can't read.
pub const NATIVE_FORMAT_VERSION: u32 = 1;
