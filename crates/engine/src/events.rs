//! Event types for table change notifications.
//!
//! The controller emits these so a host can update its view without
//! polling. They're also used by the test harness to verify that every
//! structural operation produces exactly one version change.

use tablecraft_core::CellId;

use crate::history::{OperationKind, OperationScope};

/// Events emitted by the controller after each committed operation.
#[derive(Debug, Clone, PartialEq)]
pub enum TableEvent {
    /// An operation was applied (forward, undo, or redo).
    OperationApplied(OperationAppliedEvent),

    /// Cells changed content, style, or existence.
    /// Always tagged with the version that produced the changes.
    CellsChanged(CellsChangedEvent),

    /// Version number changed. Emitted exactly once per committed operation.
    VersionChanged(VersionChangedEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationAppliedEvent {
    pub kind: OperationKind,
    pub scope: OperationScope,
    /// Version after the operation.
    pub version: u64,
    /// True when this was an undo or redo rather than a forward operation.
    pub reverted: bool,
}

/// Emitted when cells change.
#[derive(Debug, Clone, PartialEq)]
pub struct CellsChangedEvent {
    /// Version that produced these changes.
    /// INVARIANT: all cells in this event belong to this single version.
    pub version: u64,
    pub cells: Vec<CellId>,
}

/// Emitted exactly once per committed operation.
#[derive(Debug, Clone, PartialEq)]
pub struct VersionChangedEvent {
    pub version: u64,
    pub previous: u64,
}

/// Callback type for receiving table events.
pub type EventCallback = Box<dyn FnMut(TableEvent) + Send>;

/// Simple event collector for testing.
#[derive(Default)]
pub struct EventCollector {
    events: Vec<TableEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: TableEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TableEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Filter to only OperationApplied events.
    pub fn operations_applied(&self) -> Vec<&OperationAppliedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TableEvent::OperationApplied(o) => Some(o),
                _ => None,
            })
            .collect()
    }

    /// Filter to only CellsChanged events.
    pub fn cells_changed(&self) -> Vec<&CellsChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TableEvent::CellsChanged(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    /// Filter to only VersionChanged events.
    pub fn version_changed(&self) -> Vec<&VersionChangedEvent> {
        self.events
            .iter()
            .filter_map(|e| match e {
                TableEvent::VersionChanged(v) => Some(v),
                _ => None,
            })
            .collect()
    }
}
