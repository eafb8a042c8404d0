//! Cursor presence: outbound throttling and inbound peer tracking.
//!
//! Cursors are ephemeral. Nothing here touches the store or the history.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use protocol::CursorEvent;

/// Palette peers are colored from, indexed by a hash of the client id.
pub const CURSOR_COLORS: [&str; 8] = [
    "#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6", "#3b82f6", "#8b5cf6", "#ec4899",
];

/// Stable color for a peer. The same id always maps to the same color.
#[must_use]
pub fn color_for_client(client_id: &Uuid) -> &'static str {
    let hash = client_id
        .to_string()
        .bytes()
        .fold(0_i32, |hash, b| i32::from(b).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash)));
    CURSOR_COLORS[(hash.unsigned_abs() % 8) as usize]
}

// =============================================================================
// THROTTLE
// =============================================================================

/// Enforces a minimum interval between outbound cursor sends.
#[derive(Debug, Clone)]
pub struct CursorThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl CursorThrottle {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_sent: None }
    }

    /// Whether a send at `now` is allowed. An allowed send starts a new interval.
    pub fn allow(&mut self, now: Instant) -> bool {
        match self.last_sent {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last_sent = Some(now);
                true
            }
        }
    }
}

// =============================================================================
// TRACKER
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CursorInfo {
    pub client_id: Uuid,
    pub x: f64,
    pub y: f64,
    pub last_seen: Instant,
    pub color: &'static str,
}

/// Latest known cursor of every peer on one board.
#[derive(Debug, Clone)]
pub struct CursorTracker {
    own_id: Option<Uuid>,
    ttl: Duration,
    cursors: HashMap<Uuid, CursorInfo>,
}

impl CursorTracker {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { own_id: None, ttl, cursors: HashMap::new() }
    }

    /// Set this connection's id. Events carrying it are ignored from then on.
    pub fn set_own_id(&mut self, client_id: Uuid) {
        self.cursors.remove(&client_id);
        self.own_id = Some(client_id);
    }

    /// Record a peer's position. Returns `false` for our own echo.
    pub fn apply(&mut self, event: &CursorEvent, now: Instant) -> bool {
        if self.own_id == Some(event.client_id) {
            return false;
        }
        self.cursors.insert(
            event.client_id,
            CursorInfo {
                client_id: event.client_id,
                x: event.x,
                y: event.y,
                last_seen: now,
                color: color_for_client(&event.client_id),
            },
        );
        true
    }

    /// Drop cursors idle for longer than the TTL. Returns the removed ids.
    pub fn expire(&mut self, now: Instant) -> Vec<Uuid> {
        let ttl = self.ttl;
        let stale: Vec<Uuid> = self
            .cursors
            .values()
            .filter(|info| now.saturating_duration_since(info.last_seen) > ttl)
            .map(|info| info.client_id)
            .collect();
        for id in &stale {
            self.cursors.remove(id);
        }
        stale
    }

    #[must_use]
    pub fn get(&self, client_id: &Uuid) -> Option<&CursorInfo> {
        self.cursors.get(client_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CursorInfo> {
        self.cursors.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod tests;
