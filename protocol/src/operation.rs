//! Operations and the shared four-case reducer.
//!
//! DESIGN
//! ======
//! An `Operation` is one atomic intended change to a board's element set.
//! `reduce` is the only place the four cases are interpreted; the client
//! store and the server fold both call it, so a live view and the durable
//! snapshot converge on the same result for the same operation sequence.
//!
//! `reduce` never mutates its input. It returns `None` for a no-op and a new
//! map otherwise, which lets callers keep the old value (and its identity)
//! when nothing happened.
//!
//! ERROR HANDLING
//! ==============
//! Missing targets are not errors for `reduce`. `inverse_of` reports them as
//! `Unsupported` so that history bookkeeping can skip the entry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::element::{Element, ElementId, ElementMap, ElementPatch};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Operation {
    Add { board_id: Uuid, element: Element },
    Update { board_id: Uuid, element_id: ElementId, changes: ElementPatch },
    Delete { board_id: Uuid, element_id: ElementId },
    Clear { board_id: Uuid },
}

/// Why no inverse exists for an operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Unsupported {
    #[error("clear cannot be undone")]
    ClearNotUndoable,
    #[error("element not found: {0}")]
    MissingTarget(ElementId),
}

impl Operation {
    #[must_use]
    pub fn add(board_id: Uuid, element: Element) -> Self {
        Self::Add { board_id, element }
    }

    #[must_use]
    pub fn update(board_id: Uuid, element_id: impl Into<ElementId>, changes: ElementPatch) -> Self {
        Self::Update { board_id, element_id: element_id.into(), changes }
    }

    #[must_use]
    pub fn delete(board_id: Uuid, element_id: impl Into<ElementId>) -> Self {
        Self::Delete { board_id, element_id: element_id.into() }
    }

    #[must_use]
    pub fn clear(board_id: Uuid) -> Self {
        Self::Clear { board_id }
    }

    #[must_use]
    pub fn board_id(&self) -> Uuid {
        match self {
            Self::Add { board_id, .. }
            | Self::Update { board_id, .. }
            | Self::Delete { board_id, .. }
            | Self::Clear { board_id } => *board_id,
        }
    }

    /// Re-stamp the operation with another board id.
    #[must_use]
    pub fn with_board_id(mut self, id: Uuid) -> Self {
        match &mut self {
            Self::Add { board_id, .. }
            | Self::Update { board_id, .. }
            | Self::Delete { board_id, .. }
            | Self::Clear { board_id } => *board_id = id,
        }
        self
    }

    /// Element the operation targets. `None` for `clear`.
    #[must_use]
    pub fn element_id(&self) -> Option<&ElementId> {
        match self {
            Self::Add { element, .. } => Some(&element.id),
            Self::Update { element_id, .. } | Self::Delete { element_id, .. } => Some(element_id),
            Self::Clear { .. } => None,
        }
    }

    /// Wire name of the variant, for logging.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Clear { .. } => "clear",
        }
    }
}

// =============================================================================
// REDUCER
// =============================================================================

/// Apply `op` to `elements`, returning the new element set, or `None` when
/// the operation changes nothing.
///
/// - `add` inserts or overwrites by id (an overwrite keeps the draw slot).
/// - `update` shallow-merges into an existing element; missing ids are ignored.
/// - `delete` removes by id; missing ids are ignored.
/// - `clear` empties the set.
#[must_use]
pub fn reduce(elements: &ElementMap, op: &Operation) -> Option<ElementMap> {
    match op {
        Operation::Add { element, .. } => {
            let mut next = elements.clone();
            next.insert(element.id.clone(), element.clone());
            Some(next)
        }
        Operation::Update { element_id, changes, .. } => {
            if !elements.contains_key(element_id) {
                return None;
            }
            let mut next = elements.clone();
            if let Some(existing) = next.get_mut(element_id) {
                changes.merge_into(existing);
            }
            Some(next)
        }
        Operation::Delete { element_id, .. } => {
            if !elements.contains_key(element_id) {
                return None;
            }
            let mut next = elements.clone();
            next.shift_remove(element_id);
            Some(next)
        }
        Operation::Clear { .. } => {
            if elements.is_empty() {
                return None;
            }
            Some(ElementMap::new())
        }
    }
}

// =============================================================================
// INVERSE
// =============================================================================

/// The operation that undoes `op`, computed from the state observed just
/// before `op` is applied.
///
/// # Errors
///
/// Returns `Unsupported::ClearNotUndoable` for `clear`, and
/// `Unsupported::MissingTarget` when a `delete`/`update` targets an element
/// that is not in `elements`.
pub fn inverse_of(op: &Operation, elements: &ElementMap) -> Result<Operation, Unsupported> {
    match op {
        Operation::Add { board_id, element } => Ok(Operation::Delete { board_id: *board_id, element_id: element.id.clone() }),
        Operation::Delete { board_id, element_id } => {
            let current = elements
                .get(element_id)
                .ok_or_else(|| Unsupported::MissingTarget(element_id.clone()))?;
            Ok(Operation::Add { board_id: *board_id, element: current.clone() })
        }
        Operation::Update { board_id, element_id, changes } => {
            let current = elements
                .get(element_id)
                .ok_or_else(|| Unsupported::MissingTarget(element_id.clone()))?;
            Ok(Operation::Update {
                board_id: *board_id,
                element_id: element_id.clone(),
                changes: changes.capture_from(current),
            })
        }
        Operation::Clear { .. } => Err(Unsupported::ClearNotUndoable),
    }
}

#[cfg(test)]
#[path = "operation_test.rs"]
mod tests;
