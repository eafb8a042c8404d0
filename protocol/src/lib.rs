//! Shared board model and wire codec for realtime whiteboard sync.
//!
//! This crate owns everything both `server` and `client` must agree on:
//! the element and operation model, the four-case reducer that folds an
//! operation into an element set, inverse computation for undo, the durable
//! snapshot records, and the JSON messages exchanged over WebSocket.
//!
//! DESIGN
//! ======
//! - Element geometry is a closed sum type (`Shape`), matched exhaustively.
//! - The reducer is a pure function returning a new map, so a caller can
//!   detect "nothing changed" without comparing contents.
//! - Wire messages are adjacently tagged (`event` + `data`), one variant per
//!   named realtime event.

pub mod element;
pub mod message;
pub mod operation;
pub mod snapshot;

pub use element::{Element, ElementId, ElementMap, ElementPatch, Shape, elements_to_map};
pub use message::{
    ClientMessage, CodecError, CursorEvent, CursorPosition, ErrorCode, ErrorPayload, ServerMessage, decode_client,
    decode_server, encode, encode_op_payload, frame_payload,
};
pub use operation::{Operation, Unsupported, inverse_of, reduce};
pub use snapshot::{BoardSnapshot, BoardSummary, CreateBoardRequest, DEFAULT_BOARD_TITLE};
