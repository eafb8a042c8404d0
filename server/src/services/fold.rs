//! Snapshot fold: apply a relayed operation to the stored board.
//!
//! DESIGN
//! ======
//! The fold runs after the relay, on its own task, so storage latency never
//! delays peers. It is a read-modify-write of the whole element set using
//! the shared reducer. Two folds for the same board can interleave; the last
//! writer wins and an earlier write can be lost. Relay order is unaffected.
//!
//! ERROR HANDLING
//! ==============
//! Fold failures are logged and dropped. A board that no longer exists
//! (deleted while the operation was in flight) is skipped with a warning.

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use protocol::{BoardSnapshot, Operation, reduce};

use crate::services::board::{BoardStore, StorageError};
use crate::state::AppState;

/// Fold one operation into the stored snapshot.
///
/// A no-op operation (missing target, clear on an empty board) still
/// rewrites the unchanged set, which bumps the board's update time.
///
/// # Errors
///
/// Returns `StorageError::NotFound` when the board is missing, or a database
/// error from the read or the write.
pub async fn fold_operation(store: &dyn BoardStore, op: &Operation) -> Result<BoardSnapshot, StorageError> {
    let board_id = op.board_id();
    let snapshot = store.get_board(board_id).await?;
    let elements = snapshot.element_map();
    let next = reduce(&elements, op).unwrap_or(elements);
    store.put_elements(board_id, next.into_values().collect()).await
}

/// Run `fold_operation` on a background task, logging failures.
pub fn spawn_fold(state: &AppState, op: Operation) -> JoinHandle<()> {
    let store = state.store.clone();
    tokio::spawn(async move {
        let board_id = op.board_id();
        match fold_operation(store.as_ref(), &op).await {
            Ok(snapshot) => {
                debug!(%board_id, kind = op.kind(), elements = snapshot.elements.len(), "folded operation");
            }
            Err(StorageError::NotFound(_)) => {
                warn!(%board_id, kind = op.kind(), "fold skipped: board not found");
            }
            Err(e) => {
                warn!(%board_id, kind = op.kind(), error = %e, "fold failed; snapshot not updated");
            }
        }
    })
}

#[cfg(test)]
#[path = "fold_test.rs"]
mod tests;
