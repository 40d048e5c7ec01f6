use crate::{
    domain::{Board, BoardConfig, BoardId},
    error::{BoardError, EntityKind, Result},
    storage::{verified, Storage},
};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS boards (
    id TEXT PRIMARY KEY NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

/// SQLite-based storage: one row per board holding its JSON snapshot
pub struct SqliteStorage {
    connection: Arc<Mutex<Connection>>,
    template: BoardConfig,
}

impl SqliteStorage {
    /// Opens (or creates) the database file at `database_path`
    pub fn open(database_path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(database_path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(connection: Connection) -> Self {
        Self {
            connection: Arc::new(Mutex::new(connection)),
            template: BoardConfig::default(),
        }
    }

    /// Uses `template` for boards that were never saved
    pub fn with_template(mut self, template: BoardConfig) -> Self {
        self.template = template;
        self
    }

    /// Runs blocking database work off the async executor
    async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::task::spawn_blocking(move || {
            let guard = connection.lock().unwrap_or_else(PoisonError::into_inner);
            work(&guard)
        })
        .await
        .map_err(|err| BoardError::StorageError(format!("sqlite worker failed: {}", err)))?
    }

    async fn fetch(&self, id: &BoardId) -> Result<Option<String>> {
        let key = id.to_string();
        self.run(move |conn| {
            Ok(conn
                .query_row(
                    "SELECT data FROM boards WHERE id = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()?)
        })
        .await
    }

    /// Stores `board` unless a row for its id exists. Returns whether it was stored.
    async fn insert_if_absent(&self, board: &Board) -> Result<bool> {
        let key = board.id.to_string();
        let data = serde_json::to_string(board)?;
        let updated_at = board.updated_at.to_rfc3339();

        let inserted = self
            .run(move |conn| {
                Ok(conn.execute(
                    "INSERT INTO boards (id, data, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO NOTHING",
                    params![key, data, updated_at],
                )?)
            })
            .await?;
        Ok(inserted == 1)
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn initialize(&self) -> Result<()> {
        self.run(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }

    async fn load_board(&self, id: &BoardId) -> Result<Board> {
        self.initialize().await?;

        if let Some(data) = self.fetch(id).await? {
            return verified(serde_json::from_str(&data)?);
        }

        let board = self.template.instantiate(id.clone())?;
        if self.insert_if_absent(&board).await? {
            return Ok(board);
        }

        // Another caller materialized the board first
        match self.fetch(id).await? {
            Some(data) => verified(serde_json::from_str(&data)?),
            None => Err(BoardError::not_found(EntityKind::Board, id)),
        }
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        let key = board.id.to_string();
        let data = serde_json::to_string(board)?;
        let updated_at = board.updated_at.to_rfc3339();

        self.run(move |conn| {
            conn.execute_batch(SCHEMA)?;
            conn.execute(
                "INSERT INTO boards (id, data, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE
                 SET data = excluded.data, updated_at = excluded.updated_at",
                params![key, data, updated_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn list_boards(&self) -> Result<Vec<BoardId>> {
        self.initialize().await?;

        let keys = self
            .run(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM boards ORDER BY id")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut keys = Vec::new();
                for key in rows {
                    keys.push(key?);
                }
                Ok(keys)
            })
            .await?;

        Ok(keys
            .iter()
            .filter_map(|key| BoardId::from_str(key).ok())
            .collect())
    }

    async fn delete_board(&self, id: &BoardId) -> Result<()> {
        self.initialize().await?;

        let key = id.to_string();
        let deleted = self
            .run(move |conn| Ok(conn.execute("DELETE FROM boards WHERE id = ?1", params![key])?))
            .await?;

        if deleted == 0 {
            return Err(BoardError::not_found(EntityKind::Board, id));
        }
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.run(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'boards'",
                    [],
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
        .await
        .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoardStore;
    use tempfile::TempDir;

    fn id(s: &str) -> BoardId {
        BoardId::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        assert!(!storage.is_initialized().await);
        storage.initialize().await.unwrap();
        assert!(storage.is_initialized().await);
    }

    #[tokio::test]
    async fn test_save_and_reload_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("boards.db");

        let board = {
            let storage = SqliteStorage::open(&path).unwrap();
            let board = storage.load_board(&id("ops")).await.unwrap();
            let column = board.column_order[0];
            let board = BoardStore::seeded(5)
                .add_card(&board, column, "Rotate keys", None)
                .unwrap()
                .board;
            storage.save_board(&board).await.unwrap();
            board
        };

        let reopened = SqliteStorage::open(&path).unwrap();
        assert_eq!(reopened.load_board(&id("ops")).await.unwrap(), board);
        assert_eq!(reopened.list_boards().await.unwrap(), vec![id("ops")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_loads_agree() {
        let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());

        let loads: Vec<_> = (0..8)
            .map(|_| {
                let storage = Arc::clone(&storage);
                tokio::spawn(async move { storage.load_board(&id("fresh")).await })
            })
            .collect();

        let mut boards = Vec::new();
        for load in loads {
            boards.push(load.await.unwrap().unwrap());
        }

        let stored = storage.load_board(&id("fresh")).await.unwrap();
        assert_eq!(stored.column_order.len(), 3);
        assert!(boards.iter().all(|board| *board == stored));
    }

    #[tokio::test]
    async fn test_delete_board() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.load_board(&id("gone")).await.unwrap();

        storage.delete_board(&id("gone")).await.unwrap();
        assert!(matches!(
            storage.delete_board(&id("gone")).await,
            Err(BoardError::NotFound { .. })
        ));
    }
}
