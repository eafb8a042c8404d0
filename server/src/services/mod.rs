//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own storage, room membership, and the snapshot fold so
//! route handlers stay focused on protocol translation.

pub mod board;
pub mod fold;
pub mod memory;
pub mod room;
