//! Board REST routes.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, info};
use uuid::Uuid;

use protocol::{BoardSnapshot, BoardSummary, CreateBoardRequest, ErrorCode};

use crate::services::board::StorageError;
use crate::state::AppState;

/// Error response for the REST surface: status plus `{"error", "code"}` body.
#[derive(Debug)]
pub enum ApiError {
    Storage(StorageError),
    InvalidBody(serde_json::Error),
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

pub(crate) fn storage_error_to_status(err: &StorageError) -> StatusCode {
    match err {
        StorageError::NotFound(_) => StatusCode::NOT_FOUND,
        StorageError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match &self {
            Self::Storage(err @ StorageError::NotFound(_)) => {
                (storage_error_to_status(err), "Board not found".to_owned(), err.error_code())
            }
            Self::Storage(err) => {
                error!(error = %err, "board storage failed");
                (storage_error_to_status(err), "Internal server error".to_owned(), err.error_code())
            }
            Self::InvalidBody(err) => (StatusCode::BAD_REQUEST, format!("invalid request body: {err}"), "E_INVALID_BODY"),
        };
        (status, Json(serde_json::json!({ "error": message, "code": code }))).into_response()
    }
}

/// `GET /api/v1/boards`: list boards, most recently updated first.
pub async fn list_boards(State(state): State<AppState>) -> Result<Json<Vec<BoardSummary>>, ApiError> {
    Ok(Json(state.store.list_boards().await?))
}

/// `POST /api/v1/boards`: create a board. The body and its title are optional.
pub async fn create_board(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<BoardSnapshot>), ApiError> {
    let request = parse_create_body(&body)?;
    let board = state.store.create_board(request.title_or_default()).await?;
    info!(board_id = %board.id, title = %board.title, "board created");
    Ok((StatusCode::CREATED, Json(board)))
}

/// `GET /api/v1/boards/{id}`: full snapshot.
pub async fn get_board(State(state): State<AppState>, Path(board_id): Path<Uuid>) -> Result<Json<BoardSnapshot>, ApiError> {
    Ok(Json(state.store.get_board(board_id).await?))
}

/// `DELETE /api/v1/boards/{id}`: remove the board. Live rooms are left alone.
pub async fn delete_board(State(state): State<AppState>, Path(board_id): Path<Uuid>) -> Result<StatusCode, ApiError> {
    state.store.delete_board(board_id).await?;
    info!(%board_id, "board deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn parse_create_body(body: &[u8]) -> Result<CreateBoardRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CreateBoardRequest::default());
    }
    serde_json::from_slice(body).map_err(ApiError::InvalidBody)
}

#[cfg(test)]
#[path = "boards_test.rs"]
mod tests;
