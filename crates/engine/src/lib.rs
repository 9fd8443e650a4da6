//! Table engine: snapshot model, structural mutation, selection-driven
//! interaction, validation, display formatting, and the undo/redo log.
//!
//! The snapshot ([`Table`]) is plain data; all mutation goes through the
//! pure functions in [`mutate`] or, at the interaction layer, through
//! [`controller::TableController::dispatch`].

pub mod cell;
pub mod column;
pub mod controller;
pub mod display;
pub mod error;
pub mod events;
pub mod history;
pub mod mutate;
pub mod row;
pub mod style;
pub mod table;
pub mod validate;

pub use controller::TableController;
pub use error::EngineError;
pub use mutate::Operation;
pub use table::Table;
