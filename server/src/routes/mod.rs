//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router serves the board REST API under `/api/v1`, the realtime
//! websocket at `/api/ws`, and a liveness probe at `/healthz`.

pub mod boards;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/boards", get(boards::list_boards).post(boards::create_board))
        .route("/api/v1/boards/{id}", get(boards::get_board).delete(boards::delete_board))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
