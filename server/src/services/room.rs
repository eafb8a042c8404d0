//! Room membership and fan-out.
//!
//! DESIGN
//! ======
//! A room is the set of connections that joined a board id. Joining a board
//! that has no row in the store is allowed; the room simply exists until its
//! last member leaves.
//!
//! Delivery is best-effort. Each member has a bounded channel and `try_send`
//! drops the frame for a member whose queue is full or closed. Operations
//! are not queued or replayed for members that miss them.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use protocol::{ServerMessage, encode};

use crate::state::{AppState, Frame, RoomState};

/// Add a connection to a board's room. Returns the member count after joining.
pub async fn join(state: &AppState, board_id: Uuid, client_id: Uuid, tx: mpsc::Sender<Frame>) -> usize {
    let mut rooms = state.rooms.write().await;
    let room = rooms.entry(board_id).or_insert_with(RoomState::new);
    room.members.insert(client_id, tx);
    let members = room.members.len();
    info!(%board_id, %client_id, members, "client joined room");
    members
}

/// Remove a connection from one room. Returns whether it was a member.
pub async fn leave(state: &AppState, board_id: Uuid, client_id: Uuid) -> bool {
    let mut rooms = state.rooms.write().await;
    let Some(room) = rooms.get_mut(&board_id) else {
        return false;
    };
    let removed = room.members.remove(&client_id).is_some();
    let remaining = room.members.len();
    if remaining == 0 {
        rooms.remove(&board_id);
    }
    if removed {
        info!(%board_id, %client_id, remaining, "client left room");
    }
    removed
}

/// Remove a connection from every room it belongs to. Returns the boards left.
pub async fn leave_all(state: &AppState, client_id: Uuid) -> Vec<Uuid> {
    let mut rooms = state.rooms.write().await;
    let mut left = Vec::new();
    rooms.retain(|board_id, room| {
        if room.members.remove(&client_id).is_some() {
            left.push(*board_id);
        }
        !room.members.is_empty()
    });
    if !left.is_empty() {
        info!(%client_id, rooms = left.len(), "client removed from rooms");
    }
    left
}

/// Queue an encoded frame for every member of a room except `exclude`.
/// Returns how many members accepted it.
pub async fn broadcast(state: &AppState, board_id: Uuid, frame: &Frame, exclude: Option<Uuid>) -> usize {
    let rooms = state.rooms.read().await;
    let Some(room) = rooms.get(&board_id) else {
        return 0;
    };

    let mut delivered = 0;
    for (client_id, tx) in &room.members {
        if exclude == Some(*client_id) {
            continue;
        }
        if tx.try_send(Arc::clone(frame)).is_ok() {
            delivered += 1;
        } else {
            debug!(%board_id, %client_id, "dropped frame for slow or closed member");
        }
    }
    delivered
}

/// Encode `message` once and broadcast it.
pub async fn broadcast_message(
    state: &AppState,
    board_id: Uuid,
    message: &ServerMessage,
    exclude: Option<Uuid>,
) -> usize {
    match encode(message) {
        Ok(text) => broadcast(state, board_id, &Frame::from(text), exclude).await,
        Err(e) => {
            warn!(%board_id, error = %e, "failed to encode broadcast");
            0
        }
    }
}

/// Current member count of a room; zero when the room does not exist.
#[cfg(test)]
pub async fn member_count(state: &AppState, board_id: Uuid) -> usize {
    state.rooms.read().await.get(&board_id).map_or(0, |room| room.members.len())
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
