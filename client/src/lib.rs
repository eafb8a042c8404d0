//! Native whiteboard client: REST board API, realtime session, local store.
//!
//! DESIGN
//! ======
//! `BoardView` is the entry point for an open board. It owns a
//! `TransportSession` and a `SyncStore` whose sink is the session handle, so
//! local edits broadcast through the same connection that delivers peers'
//! operations. `BoardsApi` covers the board lifecycle outside any session.

pub mod api;
pub mod config;
pub mod cursor;
pub mod session;
pub mod store;
pub mod view;

#[cfg(test)]
mod test_support;

pub use api::{ApiError, BoardsApi};
pub use config::{ClientConfig, InvalidServerUrl, ReconnectPolicy};
pub use cursor::{CursorInfo, CursorThrottle, CursorTracker, color_for_client};
pub use session::{ConnectionStatus, ObserverId, SessionError, SessionEvent, SessionHandle, TransportSession};
pub use store::{ApplyOptions, HistoryEntry, NullSink, OperationSink, SyncStore};
pub use view::{BoardView, ViewError, ViewEvent};
