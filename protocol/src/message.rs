//! Realtime wire messages and their JSON codec.
//!
//! DESIGN
//! ======
//! Every WebSocket text frame is one message, adjacently tagged:
//! `{"event": "<name>", "data": {...}}`. The event names are the room and
//! sync vocabulary (`join-board`, `leave-board`, `op`, `cursor`); the server
//! adds `connected` on upgrade and `error` for frames it cannot parse.
//!
//! Operations travel verbatim in both directions. The relay never rewrites
//! an `op` payload: it decodes the typed `Operation` for its own fold but
//! forwards the original `data` bytes (`frame_payload`, `encode_op_payload`),
//! so keys this crate does not model survive the hop. Only cursor frames gain
//! the sender's `clientId`.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use uuid::Uuid;

use crate::operation::Operation;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode message: {0}")]
    Encode(serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(serde_json::Error),
}

impl ErrorCode for CodecError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Encode(_) => "E_ENCODE",
            Self::Decode(_) => "E_INVALID_FRAME",
        }
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinBoard { board_id: Uuid },
    LeaveBoard { board_id: Uuid },
    Op(Operation),
    Cursor(CursorPosition),
}

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// First frame on every connection; carries the connection's own id.
    Connected { client_id: Uuid },
    Op(Operation),
    Cursor(CursorEvent),
    Error(ErrorPayload),
}

/// Cursor position as sent by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorPosition {
    pub board_id: Uuid,
    pub x: f64,
    pub y: f64,
}

/// Cursor position as relayed to peers, tagged with the sender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorEvent {
    pub board_id: Uuid,
    pub x: f64,
    pub y: f64,
    pub client_id: Uuid,
}

impl CursorPosition {
    #[must_use]
    pub fn from_client(self, client_id: Uuid) -> CursorEvent {
        CursorEvent { board_id: self.board_id, x: self.x, y: self.y, client_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl ServerMessage {
    /// Structured error frame from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::Error(ErrorPayload {
            code: err.error_code().to_owned(),
            message: err.to_string(),
            retryable: err.retryable(),
        })
    }
}

// =============================================================================
// CODEC
// =============================================================================

/// Encode any message as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode<T: Serialize>(message: &T) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(CodecError::Encode)
}

/// Decode a client-to-server text frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed JSON or unknown events.
pub fn decode_client(text: &str) -> Result<ClientMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

/// Decode a server-to-client text frame.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed JSON or unknown events.
pub fn decode_server(text: &str) -> Result<ServerMessage, CodecError> {
    serde_json::from_str(text).map_err(CodecError::Decode)
}

#[derive(Deserialize)]
struct FramePayload<'a> {
    #[serde(borrow)]
    data: &'a RawValue,
}

#[derive(Serialize)]
struct OpFrame<'a> {
    event: &'static str,
    data: &'a RawValue,
}

/// The `data` payload of a text frame, exactly as it appears in `text`.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] if `text` is not an object with a `data` key.
pub fn frame_payload(text: &str) -> Result<&RawValue, CodecError> {
    serde_json::from_str::<FramePayload<'_>>(text)
        .map(|frame| frame.data)
        .map_err(CodecError::Decode)
}

/// Wrap an operation payload in an `op` frame without re-encoding it.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_op_payload(data: &RawValue) -> Result<String, CodecError> {
    serde_json::to_string(&OpFrame { event: "op", data }).map_err(CodecError::Encode)
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
