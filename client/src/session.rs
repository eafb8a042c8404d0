//! Transport session: one websocket connection to the relay for one board view.
//!
//! DESIGN
//! ======
//! `TransportSession` owns a driver task that connects, sends `join-board`
//! on every successful connect, pumps frames both ways, and reconnects with
//! capped exponential backoff. The application talks to the driver through a
//! cloneable `SessionHandle`, which is also the store's `OperationSink`.
//!
//! Sends are best-effort. Operations handed over while the session is not
//! connected are dropped with a debug log; there is no outbox.
//!
//! LIFECYCLE
//! =========
//! Disconnected → Connecting → Connected. A lost connection moves to
//! Reconnecting and back to Connected, or to Disconnected once the retry
//! budget is spent. Retries of the very first connect stay in Connecting.
//! `disconnect` sends `leave-board`, closes the socket, and ends in
//! Disconnected.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use uuid::Uuid;

use protocol::{
    ClientMessage, CursorEvent, CursorPosition, ErrorPayload, Operation, ServerMessage, decode_server, encode,
};

use crate::config::{ClientConfig, InvalidServerUrl, ReconnectPolicy};
use crate::cursor::CursorThrottle;
use crate::store::OperationSink;

const COMMAND_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// =============================================================================
// TYPES
// =============================================================================

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected; never started, closed, or gave up.
    #[default]
    Disconnected,
    /// First connection attempt (or its retries) in progress.
    Connecting,
    /// Socket open and `join-board` sent.
    Connected,
    /// Connection lost; retrying.
    Reconnecting,
}

/// Inbound events surfaced to the owner of the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The relay assigned this connection its id.
    Welcome { client_id: Uuid },
    /// A peer's operation, to be applied as remote.
    Operation(Operation),
    Cursor(CursorEvent),
    /// The relay rejected a frame we sent.
    ServerError(ErrorPayload),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    InvalidUrl(#[from] InvalidServerUrl),
    #[error("session is already connected")]
    AlreadyConnected,
    #[error("session driver failed: {0}")]
    Driver(#[from] tokio::task::JoinError),
}

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

type StatusObserver = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

enum Command {
    Send(ClientMessage),
    Disconnect { board_id: Uuid },
}

// =============================================================================
// SHARED STATE
// =============================================================================

#[derive(Default)]
struct Observers {
    next_id: u64,
    entries: Vec<(ObserverId, StatusObserver)>,
}

struct Shared {
    status: Mutex<ConnectionStatus>,
    client_id: Mutex<Option<Uuid>>,
    observers: Mutex<Observers>,
    throttle: Mutex<CursorThrottle>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn status(&self) -> ConnectionStatus {
        *lock(&self.status)
    }

    /// Record a transition and notify observers synchronously. Same-state
    /// writes are ignored.
    fn set_status(&self, next: ConnectionStatus) {
        {
            let mut status = lock(&self.status);
            if *status == next {
                return;
            }
            debug!(from = ?*status, to = ?next, "session status changed");
            *status = next;
        }
        // Snapshot so observers may subscribe or unsubscribe from inside the callback.
        let observers: Vec<StatusObserver> = lock(&self.observers)
            .entries
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in observers {
            observer(next);
        }
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cloneable sending side of a session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    shared: Arc<Shared>,
}

impl SessionHandle {
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.shared.status()
    }

    /// Id assigned by the relay on the current connection.
    #[must_use]
    pub fn client_id(&self) -> Option<Uuid> {
        *lock(&self.shared.client_id)
    }

    /// Send an operation if connected. Returns whether it was handed to the socket.
    pub fn send_operation(&self, op: &Operation) -> bool {
        self.send_if_connected(ClientMessage::Op(op.clone()))
    }

    /// Send a cursor position, subject to the throttle. Returns whether it was sent.
    pub fn send_cursor(&self, board_id: Uuid, x: f64, y: f64) -> bool {
        if self.status() != ConnectionStatus::Connected {
            return false;
        }
        if !lock(&self.shared.throttle).allow(Instant::now()) {
            return false;
        }
        self.send_if_connected(ClientMessage::Cursor(CursorPosition { board_id, x, y }))
    }

    /// Register a status observer, called on every transition.
    pub fn subscribe(&self, observer: impl Fn(ConnectionStatus) + Send + Sync + 'static) -> ObserverId {
        let mut observers = lock(&self.shared.observers);
        let id = ObserverId(observers.next_id);
        observers.next_id += 1;
        observers.entries.push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer. Returns whether it was registered.
    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        let mut observers = lock(&self.shared.observers);
        let before = observers.entries.len();
        observers.entries.retain(|(entry_id, _)| *entry_id != id);
        observers.entries.len() != before
    }

    fn send_if_connected(&self, message: ClientMessage) -> bool {
        if self.status() != ConnectionStatus::Connected {
            debug!("session not connected; dropping outbound message");
            return false;
        }
        match self.commands.try_send(Command::Send(message)) {
            Ok(()) => true,
            Err(_) => {
                debug!("session command queue full or closed; dropping outbound message");
                false
            }
        }
    }
}

impl OperationSink for SessionHandle {
    fn send_operation(&self, op: &Operation) {
        SessionHandle::send_operation(self, op);
    }
}

// =============================================================================
// SESSION
// =============================================================================

pub struct TransportSession {
    ws_url: String,
    policy: ReconnectPolicy,
    handle: SessionHandle,
    /// Held here while no driver runs; the driver hands it back when it stops.
    commands_rx: Option<mpsc::Receiver<Command>>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    driver: Option<JoinHandle<mpsc::Receiver<Command>>>,
}

impl TransportSession {
    /// Create a disconnected session for the configured relay.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidUrl`] if the server URL has no usable scheme.
    pub fn new(config: &ClientConfig) -> Result<Self, SessionError> {
        let ws_url = config.ws_url()?;
        let (commands, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        let shared = Arc::new(Shared {
            status: Mutex::new(ConnectionStatus::Disconnected),
            client_id: Mutex::new(None),
            observers: Mutex::new(Observers::default()),
            throttle: Mutex::new(CursorThrottle::new(config.cursor_throttle)),
        });
        Ok(Self {
            ws_url,
            policy: config.reconnect,
            handle: SessionHandle { commands, shared },
            commands_rx: Some(commands_rx),
            events: None,
            driver: None,
        })
    }

    #[must_use]
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.handle.status()
    }

    pub fn subscribe(&self, observer: impl Fn(ConnectionStatus) + Send + Sync + 'static) -> ObserverId {
        self.handle.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: ObserverId) -> bool {
        self.handle.unsubscribe(id)
    }

    /// Start connecting to the relay for `board_id`. Returns once the driver
    /// task is running; it joins the board on every successful connect.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AlreadyConnected`] if a driver is still running.
    pub async fn connect(&mut self, board_id: Uuid) -> Result<(), SessionError> {
        if self.driver.as_ref().is_some_and(|driver| !driver.is_finished()) {
            return Err(SessionError::AlreadyConnected);
        }
        self.reclaim_commands().await;
        let commands = match self.commands_rx.take() {
            Some(commands) => commands,
            None => {
                warn!("session command queue was lost; existing handles are detached");
                let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
                self.handle.commands = tx;
                rx
            }
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.events = Some(events_rx);

        self.handle.shared.set_status(ConnectionStatus::Connecting);
        info!(%board_id, url = %self.ws_url, "session connecting");
        self.driver = Some(tokio::spawn(run_driver(
            self.ws_url.clone(),
            board_id,
            self.policy,
            Arc::clone(&self.handle.shared),
            commands,
            events_tx,
        )));
        Ok(())
    }

    /// Send an operation if connected.
    pub fn send_operation(&self, op: &Operation) -> bool {
        self.handle.send_operation(op)
    }

    pub fn send_cursor(&self, board_id: Uuid, x: f64, y: f64) -> bool {
        self.handle.send_cursor(board_id, x, y)
    }

    /// Next inbound event. `None` once the driver has stopped and the queue is drained.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => None,
        }
    }

    /// Leave `board_id`, close the socket, and wait for the driver to stop.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Driver`] if the driver task panicked.
    pub async fn disconnect(&mut self, board_id: Uuid) -> Result<(), SessionError> {
        if let Some(driver) = self.driver.take() {
            if !driver.is_finished() && self.handle.commands.send(Command::Disconnect { board_id }).await.is_err() {
                debug!("session driver already stopped");
            }
            let result = driver.await;
            self.handle.shared.set_status(ConnectionStatus::Disconnected);
            self.commands_rx = Some(result?);
        }
        info!(%board_id, "session disconnected");
        Ok(())
    }

    /// Take the command receiver back from a driver that stopped on its own.
    async fn reclaim_commands(&mut self) {
        if let Some(driver) = self.driver.take() {
            match driver.await {
                Ok(commands) => self.commands_rx = Some(commands),
                Err(e) => warn!(error = %e, "previous session driver failed"),
            }
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

// =============================================================================
// DRIVER
// =============================================================================

enum ConnectionEnd {
    /// Explicit `disconnect`.
    Closed,
    /// Socket dropped or errored; eligible for reconnect.
    Lost,
}

async fn run_driver(
    ws_url: String,
    board_id: Uuid,
    policy: ReconnectPolicy,
    shared: Arc<Shared>,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> mpsc::Receiver<Command> {
    let mut has_connected = false;
    let mut attempt: u32 = 0;

    loop {
        let Some(result) = connect_or_cancel(&ws_url, &mut commands).await else {
            shared.set_status(ConnectionStatus::Disconnected);
            return commands;
        };

        match result {
            Ok(ws) => {
                attempt = 0;
                has_connected = true;
                match run_connection(ws, board_id, &shared, &mut commands, &events).await {
                    ConnectionEnd::Closed => {
                        shared.set_status(ConnectionStatus::Disconnected);
                        return commands;
                    }
                    ConnectionEnd::Lost => {
                        warn!(%board_id, "session connection lost");
                        // The relay retires the connection id with the socket.
                        *lock(&shared.client_id) = None;
                        shared.set_status(ConnectionStatus::Reconnecting);
                    }
                }
            }
            Err(e) => {
                warn!(%board_id, attempt, error = %e, "session connect failed");
            }
        }

        attempt += 1;
        if attempt > policy.max_attempts {
            warn!(%board_id, attempts = policy.max_attempts, "session giving up after retries");
            shared.set_status(ConnectionStatus::Disconnected);
            return commands;
        }

        shared.set_status(if has_connected { ConnectionStatus::Reconnecting } else { ConnectionStatus::Connecting });
        let delay = policy.delay_for(attempt);
        debug!(%board_id, attempt, delay_ms = delay.as_millis(), "session backing off");
        if !wait_or_cancel(delay, &mut commands).await {
            shared.set_status(ConnectionStatus::Disconnected);
            return commands;
        }
    }
}

/// Connect, discarding sends meanwhile. `None` means the session was told to stop.
async fn connect_or_cancel(
    ws_url: &str,
    commands: &mut mpsc::Receiver<Command>,
) -> Option<Result<WsStream, tokio_tungstenite::tungstenite::Error>> {
    let connecting = connect_async(ws_url);
    tokio::pin!(connecting);
    loop {
        tokio::select! {
            result = &mut connecting => return Some(result.map(|(ws, _response)| ws)),
            command = commands.recv() => match command {
                Some(Command::Send(_)) => debug!("dropping outbound message while connecting"),
                Some(Command::Disconnect { .. }) | None => return None,
            },
        }
    }
}

/// Sleep for `delay`, discarding sends meanwhile. `false` means the session was told to stop.
async fn wait_or_cancel(delay: Duration, commands: &mut mpsc::Receiver<Command>) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => return true,
            command = commands.recv() => match command {
                Some(Command::Send(_)) => debug!("dropping outbound message while disconnected"),
                Some(Command::Disconnect { .. }) | None => return false,
            },
        }
    }
}

async fn run_connection(
    ws: WsStream,
    board_id: Uuid,
    shared: &Shared,
    commands: &mut mpsc::Receiver<Command>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> ConnectionEnd {
    let (mut sink, mut stream) = ws.split();

    if let Err(e) = send_message(&mut sink, &ClientMessage::JoinBoard { board_id }).await {
        warn!(%board_id, error = %e, "failed to send join");
        return ConnectionEnd::Lost;
    }
    shared.set_status(ConnectionStatus::Connected);
    info!(%board_id, "session connected and joined");

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_inbound(text.as_str(), shared, events),
                Some(Ok(Message::Close(_))) | None => return ConnectionEnd::Lost,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(%board_id, error = %e, "session read failed");
                    return ConnectionEnd::Lost;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Send(message)) => {
                    if let Err(e) = send_message(&mut sink, &message).await {
                        warn!(%board_id, error = %e, "session write failed");
                        return ConnectionEnd::Lost;
                    }
                }
                Some(Command::Disconnect { board_id }) => {
                    let _ = send_message(&mut sink, &ClientMessage::LeaveBoard { board_id }).await;
                    let _ = sink.close().await;
                    return ConnectionEnd::Closed;
                }
                None => {
                    let _ = sink.close().await;
                    return ConnectionEnd::Closed;
                }
            },
        }
    }
}

fn handle_inbound(text: &str, shared: &Shared, events: &mpsc::UnboundedSender<SessionEvent>) {
    let message = match decode_server(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "session received undecodable frame");
            return;
        }
    };
    let event = match message {
        ServerMessage::Connected { client_id } => {
            *lock(&shared.client_id) = Some(client_id);
            SessionEvent::Welcome { client_id }
        }
        ServerMessage::Op(op) => SessionEvent::Operation(op),
        ServerMessage::Cursor(cursor) => SessionEvent::Cursor(cursor),
        ServerMessage::Error(payload) => {
            warn!(code = %payload.code, message = %payload.message, "relay rejected a frame");
            SessionEvent::ServerError(payload)
        }
    };
    if events.send(event).is_err() {
        debug!("session event receiver dropped");
    }
}

async fn send_message<S>(sink: &mut S, message: &ClientMessage) -> Result<(), SendError>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = encode(message)?;
    sink.send(Message::Text(text.into())).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
enum SendError {
    #[error(transparent)]
    Codec(#[from] protocol::CodecError),
    #[error(transparent)]
    Socket(#[from] tokio_tungstenite::tungstenite::Error),
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
