//! Board view: one open board with its store, session, and peer cursors.
//!
//! DESIGN
//! ======
//! `BoardView` owns its `TransportSession` explicitly; nothing is global.
//! Opening a view starts the snapshot fetch and the websocket connection in
//! parallel. The store stays empty until the snapshot arrives, and the fetch
//! task delivers only while the view's liveness flag holds, so a response
//! that lands after `close` is discarded.
//!
//! The owner drives the view by awaiting `next_event`, which applies inbound
//! operations to the store as remote, tracks peer cursors, and expires idle
//! cursors once per second.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{Instant, Interval, interval_at};
use tracing::{debug, info};
use uuid::Uuid;

use protocol::{BoardSnapshot, ErrorPayload, Operation};

use crate::api::{ApiError, BoardsApi};
use crate::config::ClientConfig;
use crate::cursor::CursorTracker;
use crate::session::{SessionError, SessionEvent, SessionHandle, TransportSession};
use crate::store::{ApplyOptions, SyncStore};

const CURSOR_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

type SnapshotResult = Result<BoardSnapshot, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ViewError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// What changed in the view after one `next_event` call.
#[derive(Debug)]
pub enum ViewEvent {
    SnapshotLoaded { title: String, elements: usize },
    SnapshotFailed(ApiError),
    Welcome { client_id: Uuid },
    RemoteOperation { kind: &'static str, changed: bool },
    CursorMoved { client_id: Uuid },
    CursorsExpired(Vec<Uuid>),
    ServerError(ErrorPayload),
}

enum Wake {
    Snapshot(Result<SnapshotResult, oneshot::error::RecvError>),
    Session(Option<SessionEvent>),
    Cleanup,
}

pub struct BoardView {
    board_id: Uuid,
    title: Option<String>,
    session: TransportSession,
    store: SyncStore<SessionHandle>,
    cursors: CursorTracker,
    alive: Arc<AtomicBool>,
    snapshot: Option<oneshot::Receiver<SnapshotResult>>,
    cleanup: Interval,
}

impl BoardView {
    /// Open `board_id`: fetch its snapshot and connect the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the server URL is unusable.
    pub async fn open(config: &ClientConfig, board_id: Uuid) -> Result<Self, ViewError> {
        let mut session = TransportSession::new(config)?;
        let api = BoardsApi::new(config)?;
        let alive = Arc::new(AtomicBool::new(true));

        let (snapshot_tx, snapshot_rx) = oneshot::channel();
        let flag = Arc::clone(&alive);
        tokio::spawn(async move {
            let result = api.get_board(board_id).await;
            deliver_if_alive(&flag, snapshot_tx, result);
        });

        let store = SyncStore::new(session.handle());
        session.connect(board_id).await?;
        info!(%board_id, "board view opened");

        Ok(Self {
            board_id,
            title: None,
            session,
            store,
            cursors: CursorTracker::new(config.cursor_ttl),
            alive,
            snapshot: Some(snapshot_rx),
            cleanup: interval_at(Instant::now() + CURSOR_CLEANUP_INTERVAL, CURSOR_CLEANUP_INTERVAL),
        })
    }

    #[must_use]
    pub fn board_id(&self) -> Uuid {
        self.board_id
    }

    /// Board title, once the snapshot has loaded.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    #[must_use]
    pub fn store(&self) -> &SyncStore<SessionHandle> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SyncStore<SessionHandle> {
        &mut self.store
    }

    #[must_use]
    pub fn cursors(&self) -> &CursorTracker {
        &self.cursors
    }

    #[must_use]
    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    /// Apply and broadcast a local edit.
    pub fn apply_local(&mut self, op: Operation) -> bool {
        self.store.apply_operation(op.with_board_id(self.board_id), ApplyOptions::local())
    }

    pub fn undo(&mut self) -> bool {
        self.store.undo(self.board_id)
    }

    pub fn redo(&mut self) -> bool {
        self.store.redo(self.board_id)
    }

    pub fn send_cursor(&self, x: f64, y: f64) -> bool {
        self.session.send_cursor(self.board_id, x, y)
    }

    /// Wait for the next change. `None` once the session has stopped for good.
    pub async fn next_event(&mut self) -> Option<ViewEvent> {
        loop {
            let wake = {
                let Self { session, snapshot, cleanup, .. } = self;
                tokio::select! {
                    result = async {
                        match snapshot.as_mut() {
                            Some(rx) => rx.await,
                            None => std::future::pending().await,
                        }
                    } => Wake::Snapshot(result),
                    event = session.next_event() => Wake::Session(event),
                    _ = cleanup.tick() => Wake::Cleanup,
                }
            };

            match wake {
                Wake::Snapshot(result) => {
                    self.snapshot = None;
                    match result {
                        Ok(Ok(board)) => return Some(self.load_snapshot(board)),
                        Ok(Err(e)) => return Some(ViewEvent::SnapshotFailed(e)),
                        Err(_) => debug!(board_id = %self.board_id, "snapshot fetch abandoned"),
                    }
                }
                Wake::Session(None) => return None,
                Wake::Session(Some(event)) => {
                    if let Some(event) = self.handle_session_event(event) {
                        return Some(event);
                    }
                }
                Wake::Cleanup => {
                    let expired = self.cursors.expire(std::time::Instant::now());
                    if !expired.is_empty() {
                        return Some(ViewEvent::CursorsExpired(expired));
                    }
                }
            }
        }
    }

    /// Invalidate the pending fetch, leave the board, and disconnect.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Driver`] if the session driver panicked.
    pub async fn close(mut self) -> Result<(), SessionError> {
        self.alive.store(false, Ordering::Release);
        self.snapshot = None;
        self.session.disconnect(self.board_id).await?;
        info!(board_id = %self.board_id, "board view closed");
        Ok(())
    }

    fn load_snapshot(&mut self, board: BoardSnapshot) -> ViewEvent {
        let elements = board.elements.len();
        info!(board_id = %self.board_id, elements, "snapshot loaded");
        self.store.set_initial_elements(board.elements);
        self.title = Some(board.title.clone());
        ViewEvent::SnapshotLoaded { title: board.title, elements }
    }

    fn handle_session_event(&mut self, event: SessionEvent) -> Option<ViewEvent> {
        match event {
            SessionEvent::Welcome { client_id } => {
                self.cursors.set_own_id(client_id);
                Some(ViewEvent::Welcome { client_id })
            }
            SessionEvent::Operation(op) => {
                if op.board_id() != self.board_id {
                    debug!(op_board = %op.board_id(), "ignoring operation for another board");
                    return None;
                }
                let kind = op.kind();
                let changed = self.store.apply_operation(op, ApplyOptions::remote());
                Some(ViewEvent::RemoteOperation { kind, changed })
            }
            SessionEvent::Cursor(cursor) => {
                if cursor.board_id != self.board_id {
                    return None;
                }
                self.cursors
                    .apply(&cursor, std::time::Instant::now())
                    .then_some(ViewEvent::CursorMoved { client_id: cursor.client_id })
            }
            SessionEvent::ServerError(payload) => Some(ViewEvent::ServerError(payload)),
        }
    }
}

impl Drop for BoardView {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}

/// Hand a fetched snapshot to the view only if it is still open.
fn deliver_if_alive(alive: &AtomicBool, tx: oneshot::Sender<SnapshotResult>, result: SnapshotResult) -> bool {
    if !alive.load(Ordering::Acquire) {
        debug!("discarding snapshot for a closed view");
        return false;
    }
    tx.send(result).is_ok()
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
