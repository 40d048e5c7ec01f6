use crate::{
    domain::{Board, BoardId},
    error::{BoardError, Result},
};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "file-storage")]
pub mod file_storage;
pub mod memory_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
#[cfg(feature = "sqlite-storage")]
pub use sqlite_storage::SqliteStorage;

/// Storage trait for persisting board snapshots
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Loads a board.
    ///
    /// A board id that was never saved yields a fresh board built from the
    /// backend's template. That board is stored immediately so the hashes of its
    /// seed columns stay stable across loads.
    async fn load_board(&self, id: &BoardId) -> Result<Board>;

    /// Saves a board snapshot, replacing whatever was stored under its id
    async fn save_board(&self, board: &Board) -> Result<()>;

    /// Lists the ids of all stored boards
    async fn list_boards(&self) -> Result<Vec<BoardId>>;

    /// Deletes a stored board
    async fn delete_board(&self, id: &BoardId) -> Result<()>;

    /// Checks if the backend is initialized
    async fn is_initialized(&self) -> bool;
}

/// Rejects stored boards that break the structural invariants
pub(crate) fn verified(board: Board) -> Result<Board> {
    board
        .check_invariants()
        .map_err(|violation| BoardError::CorruptBoard(format!("{}: {}", board.id, violation)))?;
    Ok(board)
}

/// Bounds a persistence call so a stuck backend surfaces as an error
pub async fn with_timeout<T>(
    operation: &str,
    limit: Duration,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(BoardError::PersistenceTimeout {
            operation: operation.to_string(),
            elapsed_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
