//! Synchronization store: the local element set of one board view plus its
//! undo/redo history.
//!
//! DESIGN
//! ======
//! Every mutation goes through `protocol::reduce`, the same reducer the
//! server fold uses. The element map sits behind an `Arc` that is replaced
//! only when an operation actually changes something, so comparing
//! `Arc::ptr_eq` (or `revision()`) is a cheap change check for renderers.
//!
//! History holds `{operation, inverse}` pairs. The inverse is computed from
//! the state just before the operation is applied. Entries whose inverse is
//! unsupported (clear, missing target) are never recorded.
//!
//! ERROR HANDLING
//! ==============
//! The store never fails. No-op operations, empty stacks, and stale undo
//! targets degrade to silent no-ops with a debug log.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use protocol::{Element, ElementId, ElementMap, Operation, elements_to_map, inverse_of, reduce};

/// Maximum entries kept on each history stack; the oldest is evicted first.
pub const MAX_HISTORY: usize = 50;

// =============================================================================
// TYPES
// =============================================================================

/// Outbound side of the store: where local operations are broadcast.
pub trait OperationSink {
    /// Best-effort, fire-and-forget send.
    fn send_operation(&self, op: &Operation);
}

/// Sink that discards everything, for offline stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl OperationSink for NullSink {
    fn send_operation(&self, _op: &Operation) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Originated here: broadcast after applying.
    pub local: bool,
    /// Record an undo entry.
    pub record_history: bool,
}

impl ApplyOptions {
    /// A local edit: recorded and broadcast.
    #[must_use]
    pub fn local() -> Self {
        Self { local: true, record_history: true }
    }

    /// An operation received from a peer: neither recorded nor broadcast.
    #[must_use]
    pub fn remote() -> Self {
        Self { local: false, record_history: false }
    }

    #[must_use]
    pub fn with_history(mut self, record_history: bool) -> Self {
        self.record_history = record_history;
        self
    }
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self::remote()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub operation: Operation,
    pub inverse: Operation,
}

// =============================================================================
// STORE
// =============================================================================

pub struct SyncStore<S> {
    elements: Arc<ElementMap>,
    undo: VecDeque<HistoryEntry>,
    redo: VecDeque<HistoryEntry>,
    revision: u64,
    sink: S,
}

impl<S: OperationSink> SyncStore<S> {
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self { elements: Arc::new(ElementMap::new()), undo: VecDeque::new(), redo: VecDeque::new(), revision: 0, sink }
    }

    /// Current element set. The `Arc` changes only when the set changes.
    #[must_use]
    pub fn elements(&self) -> &Arc<ElementMap> {
        &self.elements
    }

    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id)
    }

    /// Bumped once per successful mutation.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }

    /// Replace the element set wholesale (initial load or resync) and clear history.
    pub fn set_initial_elements(&mut self, elements: impl IntoIterator<Item = Element>) {
        self.elements = Arc::new(elements_to_map(elements));
        self.undo.clear();
        self.redo.clear();
        self.revision += 1;
    }

    /// Apply an operation. Returns whether the element set changed.
    pub fn apply_operation(&mut self, op: Operation, options: ApplyOptions) -> bool {
        let inverse = if options.record_history {
            match inverse_of(&op, &self.elements) {
                Ok(inverse) => Some(inverse),
                Err(reason) => {
                    debug!(kind = op.kind(), %reason, "operation not recorded in history");
                    None
                }
            }
        } else {
            None
        };

        let changed = self.mutate(&op);

        if let Some(inverse) = inverse {
            push_bounded(&mut self.undo, HistoryEntry { operation: op.clone(), inverse });
            self.redo.clear();
        }

        if options.local {
            self.sink.send_operation(&op);
        }
        changed
    }

    /// Undo the most recent recorded operation and broadcast its inverse.
    /// Returns whether there was an entry to undo.
    pub fn undo(&mut self, board_id: Uuid) -> bool {
        let Some(entry) = self.undo.pop_back() else {
            return false;
        };
        let inverse = entry.inverse.clone().with_board_id(board_id);
        if !self.mutate(&inverse) {
            debug!(kind = inverse.kind(), "undo target is stale; nothing changed");
        }
        push_bounded(&mut self.redo, entry);
        self.sink.send_operation(&inverse);
        true
    }

    /// Re-apply the most recently undone operation and broadcast it.
    /// Returns whether there was an entry to redo.
    pub fn redo(&mut self, board_id: Uuid) -> bool {
        let Some(entry) = self.redo.pop_back() else {
            return false;
        };
        let operation = entry.operation.clone().with_board_id(board_id);
        if !self.mutate(&operation) {
            debug!(kind = operation.kind(), "redo target is stale; nothing changed");
        }
        push_bounded(&mut self.undo, entry);
        self.sink.send_operation(&operation);
        true
    }

    /// Delete one element as a local, recorded edit.
    pub fn delete_element(&mut self, board_id: Uuid, id: impl Into<ElementId>) -> bool {
        self.apply_operation(Operation::delete(board_id, id), ApplyOptions::local())
    }

    fn mutate(&mut self, op: &Operation) -> bool {
        match reduce(&self.elements, op) {
            Some(next) => {
                self.elements = Arc::new(next);
                self.revision += 1;
                true
            }
            None => false,
        }
    }
}

fn push_bounded(stack: &mut VecDeque<HistoryEntry>, entry: HistoryEntry) {
    if stack.len() == MAX_HISTORY {
        stack.pop_front();
    }
    stack.push_back(entry);
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
