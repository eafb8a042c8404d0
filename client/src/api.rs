//! REST client for the board endpoints.

use reqwest::StatusCode;
use serde_json::json;
use uuid::Uuid;

use protocol::{BoardSnapshot, BoardSummary};

use crate::config::{ClientConfig, InvalidServerUrl};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    InvalidUrl(#[from] InvalidServerUrl),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("board not found: {0}")]
    NotFound(Uuid),
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Clone)]
pub struct BoardsApi {
    http: reqwest::Client,
    base_url: String,
}

impl BoardsApi {
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] if the configured server URL is unusable.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(Self { http: reqwest::Client::new(), base_url: format!("{}/api/v1/boards", config.http_base()?) })
    }

    /// All boards, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn list_boards(&self) -> Result<Vec<BoardSummary>, ApiError> {
        let response = self.http.get(&self.base_url).send().await?;
        Ok(check(response, None).await?.json().await?)
    }

    /// Create a board; `None` lets the server pick the default title.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or a non-success status.
    pub async fn create_board(&self, title: Option<&str>) -> Result<BoardSnapshot, ApiError> {
        let body = title.map_or_else(|| json!({}), |title| json!({ "title": title }));
        let response = self.http.post(&self.base_url).json(&body).send().await?;
        Ok(check(response, None).await?.json().await?)
    }

    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown board.
    pub async fn get_board(&self, board_id: Uuid) -> Result<BoardSnapshot, ApiError> {
        let response = self.http.get(self.board_url(board_id)).send().await?;
        Ok(check(response, Some(board_id)).await?.json().await?)
    }

    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for an unknown board.
    pub async fn delete_board(&self, board_id: Uuid) -> Result<(), ApiError> {
        let response = self.http.delete(self.board_url(board_id)).send().await?;
        check(response, Some(board_id)).await?;
        Ok(())
    }

    fn board_url(&self, board_id: Uuid) -> String {
        format!("{}/{board_id}", self.base_url)
    }
}

async fn check(response: reqwest::Response, board_id: Option<Uuid>) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let (StatusCode::NOT_FOUND, Some(board_id)) = (status, board_id) {
        return Err(ApiError::NotFound(board_id));
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), body })
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
