//! Board storage: the `BoardStore` seam and its Postgres implementation.
//!
//! DESIGN
//! ======
//! A board is one row holding its title and a materialized snapshot
//! (`{"elements": [...]}` as JSONB). There is no operation log; the fold
//! overwrites the snapshot wholesale and bumps `updated_at`.
//!
//! Handlers and the fold only see `Arc<dyn BoardStore>`, so the relay runs
//! unchanged against `MemoryBoardStore` when no database is configured.
//!
//! ERROR HANDLING
//! ==============
//! A missing board is `StorageError::NotFound` for every operation, including
//! `put_elements`; callers decide whether that is a 404 or a skipped fold.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::types::Json;
use time::OffsetDateTime;
use uuid::Uuid;

use protocol::{BoardSnapshot, BoardSummary, Element, ErrorCode};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("board not found: {0}")]
    NotFound(Uuid),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_BOARD_NOT_FOUND",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Durable board storage used by the REST routes and the fold.
#[async_trait::async_trait]
pub trait BoardStore: Send + Sync {
    /// Create an empty board.
    async fn create_board(&self, title: &str) -> Result<BoardSnapshot, StorageError>;

    async fn get_board(&self, id: Uuid) -> Result<BoardSnapshot, StorageError>;

    /// All boards, most recently updated first.
    async fn list_boards(&self) -> Result<Vec<BoardSummary>, StorageError>;

    async fn delete_board(&self, id: Uuid) -> Result<(), StorageError>;

    /// Replace the board's element set and bump its update time.
    async fn put_elements(&self, id: Uuid, elements: Vec<Element>) -> Result<BoardSnapshot, StorageError>;
}

/// JSONB payload of the `snapshot` column.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSnapshot {
    #[serde(default)]
    elements: Vec<Element>,
}

type SnapshotRow = (Uuid, String, Json<StoredSnapshot>, OffsetDateTime);

fn snapshot_from_row((id, title, Json(stored), updated_at): SnapshotRow) -> BoardSnapshot {
    BoardSnapshot { id, title, elements: stored.elements, updated_at }
}

// =============================================================================
// POSTGRES
// =============================================================================

pub struct PgBoardStore {
    pool: PgPool,
}

impl PgBoardStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl BoardStore for PgBoardStore {
    async fn create_board(&self, title: &str) -> Result<BoardSnapshot, StorageError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "INSERT INTO boards (id, title, snapshot) VALUES ($1, $2, $3)
             RETURNING id, title, snapshot, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(title)
        .bind(Json(StoredSnapshot::default()))
        .fetch_one(&self.pool)
        .await?;

        Ok(snapshot_from_row(row))
    }

    async fn get_board(&self, id: Uuid) -> Result<BoardSnapshot, StorageError> {
        let row = sqlx::query_as::<_, SnapshotRow>("SELECT id, title, snapshot, updated_at FROM boards WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(snapshot_from_row).ok_or(StorageError::NotFound(id))
    }

    async fn list_boards(&self) -> Result<Vec<BoardSummary>, StorageError> {
        let rows = sqlx::query_as::<_, (Uuid, String, OffsetDateTime, OffsetDateTime)>(
            "SELECT id, title, created_at, updated_at FROM boards ORDER BY updated_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, title, created_at, updated_at)| BoardSummary { id, title, created_at, updated_at })
            .collect())
    }

    async fn delete_board(&self, id: Uuid) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM boards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(id));
        }
        Ok(())
    }

    async fn put_elements(&self, id: Uuid, elements: Vec<Element>) -> Result<BoardSnapshot, StorageError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "UPDATE boards SET snapshot = $2, updated_at = now() WHERE id = $1
             RETURNING id, title, snapshot, updated_at",
        )
        .bind(id)
        .bind(Json(StoredSnapshot { elements }))
        .fetch_optional(&self.pool)
        .await?;

        row.map(snapshot_from_row).ok_or(StorageError::NotFound(id))
    }
}

#[cfg(test)]
#[path = "board_test.rs"]
mod tests;
