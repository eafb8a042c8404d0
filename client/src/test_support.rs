//! In-process stand-in for the relay: an axum router with the websocket at
//! `/api/ws` and canned HTTP responses on every other path, served on an
//! ephemeral port.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use uuid::Uuid;

use protocol::{ClientMessage, ServerMessage, decode_client, encode};

use crate::config::{ClientConfig, ReconnectPolicy};

const RECV_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

type Routes = Arc<Mutex<HashMap<(String, String), (u16, String)>>>;

#[derive(Clone)]
struct RelayState {
    connections: mpsc::UnboundedSender<FakeConnection>,
    routes: Routes,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct FakeRelay {
    pub addr: SocketAddr,
    connections: mpsc::UnboundedReceiver<FakeConnection>,
    routes: Routes,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct FakeConnection {
    pub client_id: Uuid,
    ws: WebSocket,
}

impl FakeRelay {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake relay");
        let addr = listener.local_addr().expect("local addr");
        let (conn_tx, connections) = mpsc::unbounded_channel();
        let state = RelayState { connections: conn_tx, routes: Arc::default(), requests: Arc::default() };
        let routes = Arc::clone(&state.routes);
        let requests = Arc::clone(&state.requests);

        let app = Router::new()
            .route("/api/ws", get(upgrade))
            .fallback(canned)
            .with_state(state);
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake relay failed");
        });

        Self { addr, connections, routes, requests }
    }

    /// Client config pointed at this relay with a fast retry curve.
    pub fn config(&self) -> ClientConfig {
        ClientConfig {
            reconnect: ReconnectPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(20),
                max_delay: Duration::from_millis(80),
            },
            ..ClientConfig::default()
        }
        .with_server_url(format!("http://{}", self.addr))
    }

    pub fn respond(&self, method: &str, path: &str, status: u16, body: impl Into<String>) {
        self.routes
            .lock()
            .expect("routes mutex")
            .insert((method.to_owned(), path.to_owned()), (status, body.into()));
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests mutex").clone()
    }

    pub async fn accept(&mut self) -> FakeConnection {
        timeout(RECV_TIMEOUT, self.connections.recv())
            .await
            .expect("no websocket connection arrived")
            .expect("fake relay stopped")
    }
}

impl FakeConnection {
    pub async fn recv(&mut self) -> ClientMessage {
        loop {
            let frame = timeout(RECV_TIMEOUT, self.ws.recv())
                .await
                .expect("timed out waiting for client frame")
                .expect("client closed the socket")
                .expect("websocket error");
            if let Message::Text(text) = frame {
                return decode_client(text.as_str()).expect("decode client frame");
            }
        }
    }

    /// Next frame or close. `None` when the client closed the socket.
    pub async fn recv_or_close(&mut self) -> Option<ClientMessage> {
        loop {
            let frame = timeout(RECV_TIMEOUT, self.ws.recv()).await.expect("timed out waiting for client frame");
            match frame {
                Some(Ok(Message::Text(text))) => return Some(decode_client(text.as_str()).expect("decode client frame")),
                Some(Ok(Message::Close(_)) | Err(_)) | None => return None,
                Some(Ok(_)) => {}
            }
        }
    }

    pub async fn assert_silent(&mut self, wait: Duration) {
        if let Ok(Some(Ok(Message::Text(text)))) = timeout(wait, self.ws.recv()).await {
            panic!("expected no client frame, got {}", text.as_str());
        }
    }

    pub async fn send(&mut self, message: &ServerMessage) {
        let text = encode(message).expect("encode server message");
        self.ws.send(Message::Text(text.into())).await.expect("send to client");
    }

    /// Close the connection from the relay side.
    pub async fn kill(mut self) {
        let _ = self.ws.send(Message::Close(None)).await;
    }
}

/// Upgrade, greet with a fresh client id, and hand the socket to the test.
async fn upgrade(State(state): State<RelayState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |mut socket| async move {
        let client_id = Uuid::new_v4();
        let welcome = encode(&ServerMessage::Connected { client_id }).expect("encode welcome");
        if socket.send(Message::Text(welcome.into())).await.is_ok() {
            let _ = state.connections.send(FakeConnection { client_id, ws: socket });
        }
    })
}

/// Record the request and answer with the registered response, or a 404.
async fn canned(State(state): State<RelayState>, method: Method, uri: Uri, body: Bytes) -> Response {
    let method = method.to_string();
    let path = uri.path().to_owned();
    state.requests.lock().expect("requests mutex").push(RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let (status, body) = state
        .routes
        .lock()
        .expect("routes mutex")
        .get(&(method, path))
        .cloned()
        .unwrap_or((404, r#"{"error":"Board not found"}"#.to_owned()));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, [(header::CONTENT_TYPE, "application/json")], body).into_response()
}
