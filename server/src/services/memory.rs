//! In-process board store used when no database is configured, and by tests.
//!
//! Timestamps are strictly increasing across writes so `list_boards` has a
//! stable order even when two writes land within the clock's resolution.

use std::collections::HashMap;

use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use protocol::{BoardSnapshot, BoardSummary, Element};

use super::board::{BoardStore, StorageError};

struct StoredBoard {
    title: String,
    elements: Vec<Element>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl StoredBoard {
    fn snapshot(&self, id: Uuid) -> BoardSnapshot {
        BoardSnapshot { id, title: self.title.clone(), elements: self.elements.clone(), updated_at: self.updated_at }
    }
}

#[derive(Default)]
struct Inner {
    boards: HashMap<Uuid, StoredBoard>,
    last_write: Option<OffsetDateTime>,
}

impl Inner {
    fn tick(&mut self) -> OffsetDateTime {
        let now = OffsetDateTime::now_utc();
        let next = match self.last_write {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_write = Some(next);
        next
    }
}

#[derive(Default)]
pub struct MemoryBoardStore {
    inner: RwLock<Inner>,
}

impl MemoryBoardStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BoardStore for MemoryBoardStore {
    async fn create_board(&self, title: &str) -> Result<BoardSnapshot, StorageError> {
        let mut inner = self.inner.write().await;
        let now = inner.tick();
        let id = Uuid::new_v4();
        let board = StoredBoard { title: title.to_owned(), elements: Vec::new(), created_at: now, updated_at: now };
        let snapshot = board.snapshot(id);
        inner.boards.insert(id, board);
        Ok(snapshot)
    }

    async fn get_board(&self, id: Uuid) -> Result<BoardSnapshot, StorageError> {
        let inner = self.inner.read().await;
        inner
            .boards
            .get(&id)
            .map(|board| board.snapshot(id))
            .ok_or(StorageError::NotFound(id))
    }

    async fn list_boards(&self) -> Result<Vec<BoardSummary>, StorageError> {
        let inner = self.inner.read().await;
        let mut summaries: Vec<BoardSummary> = inner
            .boards
            .iter()
            .map(|(id, board)| BoardSummary {
                id: *id,
                title: board.title.clone(),
                created_at: board.created_at,
                updated_at: board.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete_board(&self, id: Uuid) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        match inner.boards.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StorageError::NotFound(id)),
        }
    }

    async fn put_elements(&self, id: Uuid, elements: Vec<Element>) -> Result<BoardSnapshot, StorageError> {
        let mut inner = self.inner.write().await;
        if !inner.boards.contains_key(&id) {
            return Err(StorageError::NotFound(id));
        }
        let now = inner.tick();
        let board = inner.boards.get_mut(&id).ok_or(StorageError::NotFound(id))?;
        board.elements = elements;
        board.updated_at = now;
        Ok(board.snapshot(id))
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
