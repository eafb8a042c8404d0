//! WebSocket handler: room relay for operations and cursors.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - incoming client frames are decoded and dispatched by event
//! - messages relayed from room peers are forwarded to the client
//!
//! The relay is stateless with respect to board content. An `op` is
//! broadcast to the room (sender excluded) before its fold is spawned, so
//! peers never wait on storage. Peers receive the sender's `data` bytes
//! unchanged; the decoded `Operation` is used only by the fold. Cursor positions are broadcast
//! with the sender's id attached and are never stored.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade, then send `connected` with `clientId`
//! 2. Client sends `join-board` / `leave-board` / `op` / `cursor`
//! 3. On close, remove the connection from every room it joined

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use protocol::{
    ClientMessage, CursorPosition, Operation, ServerMessage, decode_client, encode, encode_op_payload,
    frame_payload,
};
use serde_json::value::RawValue;

use crate::services::{fold, room};
use crate::state::{AppState, Frame};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for frames relayed from room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.client_channel_capacity);

    if send_message(&mut socket, &ServerMessage::Connected { client_id }).await.is_err() {
        return;
    }

    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        let replies = process_inbound_text(&state, client_id, &client_tx, text.as_str()).await;
                        if send_replies(&mut socket, &replies).await.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if socket.send(Message::Text(frame.to_string().into())).await.is_err() {
                    break;
                }
            }
        }
    }

    let left = room::leave_all(&state, client_id).await;
    info!(%client_id, rooms = left.len(), "ws: client disconnected");
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Decode and handle one inbound text frame. Returns messages for the sender only.
async fn process_inbound_text(
    state: &AppState,
    client_id: Uuid,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<ServerMessage> {
    let message = match decode_client(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound message");
            return vec![ServerMessage::error_from(&e)];
        }
    };

    match message {
        ClientMessage::JoinBoard { board_id } => {
            room::join(state, board_id, client_id, client_tx.clone()).await;
        }
        ClientMessage::LeaveBoard { board_id } => {
            room::leave(state, board_id, client_id).await;
        }
        ClientMessage::Op(op) => match frame_payload(text) {
            Ok(payload) => {
                let _fold = relay_operation(state, client_id, op, payload).await;
            }
            Err(e) => return vec![ServerMessage::error_from(&e)],
        },
        ClientMessage::Cursor(position) => {
            relay_cursor(state, client_id, position).await;
        }
    }
    Vec::new()
}

/// Broadcast the sender's operation payload to the room, then spawn its fold.
async fn relay_operation(state: &AppState, client_id: Uuid, op: Operation, payload: &RawValue) -> JoinHandle<()> {
    let board_id = op.board_id();
    match encode_op_payload(payload) {
        Ok(text) => {
            let delivered = room::broadcast(state, board_id, &Frame::from(text), Some(client_id)).await;
            info!(%client_id, %board_id, kind = op.kind(), delivered, "ws: relayed op");
        }
        Err(e) => warn!(%client_id, %board_id, error = %e, "ws: failed to frame op for relay"),
    }
    fold::spawn_fold(state, op)
}

async fn relay_cursor(state: &AppState, client_id: Uuid, position: CursorPosition) {
    let message = ServerMessage::Cursor(position.from_client(client_id));
    room::broadcast_message(state, position.board_id, &message, Some(client_id)).await;
}

async fn send_replies(socket: &mut WebSocket, replies: &[ServerMessage]) -> Result<(), ()> {
    for reply in replies {
        send_message(socket, reply).await?;
    }
    Ok(())
}

async fn send_message(socket: &mut WebSocket, message: &ServerMessage) -> Result<(), ()> {
    let json = match encode(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "ws: failed to encode message");
            return Err(());
        }
    };
    if let ServerMessage::Error(payload) = message {
        warn!(code = %payload.code, message = %payload.message, "ws: send error");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
