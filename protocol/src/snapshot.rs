//! Durable board records shared by the REST API and the fold.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::element::{Element, ElementMap, elements_to_map};

/// Title used when a board is created without one.
pub const DEFAULT_BOARD_TITLE: &str = "Untitled Board";

/// Materialized state of one board. There is no operation log behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl BoardSnapshot {
    /// Id-keyed view of the stored elements.
    #[must_use]
    pub fn element_map(&self) -> ElementMap {
        elements_to_map(self.elements.iter().cloned())
    }
}

/// Board list entry, ordered by most recent update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSummary {
    pub id: Uuid,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// `POST /api/v1/boards` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBoardRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl CreateBoardRequest {
    /// Requested title, or the default when absent or blank.
    #[must_use]
    pub fn title_or_default(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title,
            _ => DEFAULT_BOARD_TITLE,
        }
    }
}
