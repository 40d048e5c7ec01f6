use crate::{
    domain::{Board, BoardConfig, BoardId},
    error::{BoardError, EntityKind, Result},
    storage::{verified, Storage},
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// In-process storage, for tests and ephemeral boards
#[derive(Debug, Default)]
pub struct MemoryStorage {
    boards: RwLock<HashMap<BoardId, Board>>,
    template: BoardConfig,
    saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `template` for boards that were never saved
    pub fn with_template(mut self, template: BoardConfig) -> Self {
        self.template = template;
        self
    }

    /// Number of successful `save_board` calls so far
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The stored snapshot, without materializing a default board
    pub fn stored(&self, id: &BoardId) -> Option<Board> {
        self.boards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn load_board(&self, id: &BoardId) -> Result<Board> {
        if let Some(board) = self.stored(id) {
            return verified(board);
        }

        let board = self.template.instantiate(id.clone())?;
        let mut boards = self.boards.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have materialized the board meanwhile
        let stored = boards.entry(id.clone()).or_insert(board).clone();
        Ok(stored)
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        self.boards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(board.id.clone(), board.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_boards(&self) -> Result<Vec<BoardId>> {
        let mut ids: Vec<BoardId> = self
            .boards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete_board(&self, id: &BoardId) -> Result<()> {
        self.boards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| BoardError::not_found(EntityKind::Board, id))
    }

    async fn is_initialized(&self) -> bool {
        true
    }
}
