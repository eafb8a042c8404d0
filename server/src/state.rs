//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the board store and the live room registry. Rooms are purely
//! in-memory: a room exists while at least one connection has joined it,
//! and membership is never persisted.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::services::board::BoardStore;

// =============================================================================
// ROOM STATE
// =============================================================================

/// Encoded text frame queued for a connection. Shared across every member of
/// a broadcast, so a message is serialized once per fan-out.
pub type Frame = Arc<str>;

/// Connections that joined one board.
pub struct RoomState {
    /// `client_id` -> sender for outgoing frames.
    pub members: HashMap<Uuid, mpsc::Sender<Frame>>,
}

impl RoomState {
    #[must_use]
    pub fn new() -> Self {
        Self { members: HashMap::new() }
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state. Clone is required by Axum; inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BoardStore>,
    pub rooms: Arc<RwLock<HashMap<Uuid, RoomState>>>,
    /// Outbound queue depth for each connection.
    pub client_channel_capacity: usize,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn BoardStore>, client_channel_capacity: usize) -> Self {
        Self { store, rooms: Arc::new(RwLock::new(HashMap::new())), client_channel_capacity }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
