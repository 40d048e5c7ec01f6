use crate::{
    domain::{Board, BoardConfig, BoardId},
    error::{BoardError, EntityKind, Result},
    storage::{verified, Storage},
};
use async_trait::async_trait;
use std::{
    io,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// File-based storage: one pretty-printed JSON document per board
pub struct FileStorage {
    root_path: PathBuf,
    template: BoardConfig,
}

impl FileStorage {
    const DATA_DIR: &'static str = ".taskboard";
    const BOARDS_DIR: &'static str = "boards";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::DATA_DIR),
            template: BoardConfig::default(),
        }
    }

    /// Uses `template` for boards that were never saved
    pub fn with_template(mut self, template: BoardConfig) -> Self {
        self.template = template;
        self
    }

    fn boards_dir(&self) -> PathBuf {
        self.root_path.join(Self::BOARDS_DIR)
    }

    fn board_file(&self, id: &BoardId) -> PathBuf {
        self.boards_dir().join(format!("{}.json", id.as_str()))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    /// Unique sibling of `path`, so concurrent writers never share a temp file
    fn temp_file(path: &Path) -> PathBuf {
        path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()))
    }

    /// Writes to a sibling temp file, then renames over the target
    async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
        let tmp_path = Self::temp_file(path);
        fs::write(&tmp_path, contents).await?;

        if let Err(err) = fs::rename(&tmp_path, path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    /// Writes `path` only if it does not exist yet.
    ///
    /// Returns `false` when another writer created the file first.
    async fn create_atomic(path: &Path, contents: &str) -> Result<bool> {
        let tmp_path = Self::temp_file(path);
        fs::write(&tmp_path, contents).await?;

        // Linking fails instead of replacing an existing target
        let linked = fs::hard_link(&tmp_path, path).await;
        fs::remove_file(&tmp_path).await?;

        match linked {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.boards_dir()).await?;

        let gitignore_path = self.root_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "# Interrupted writes\n*.tmp\n").await?;
        }

        Ok(())
    }

    async fn load_board(&self, id: &BoardId) -> Result<Board> {
        let board_file = self.board_file(id);

        if !board_file.exists() {
            let board = self.template.instantiate(id.clone())?;
            self.ensure_directory_exists(&self.boards_dir()).await?;

            let json = serde_json::to_string_pretty(&board)?;
            if Self::create_atomic(&board_file, &json).await? {
                debug!(board = %id, "no stored board, materialized template");
                return Ok(board);
            }
            debug!(board = %id, "board was materialized concurrently, reading it back");
        }

        let contents = fs::read_to_string(&board_file).await?;
        let board: Board = serde_json::from_str(&contents)?;

        verified(board)
    }

    async fn save_board(&self, board: &Board) -> Result<()> {
        self.ensure_directory_exists(&self.boards_dir()).await?;

        let json = serde_json::to_string_pretty(board)?;
        Self::write_atomic(&self.board_file(&board.id), &json).await?;

        debug!(board = %board.id, cards = board.cards.len(), "board saved");
        Ok(())
    }

    async fn list_boards(&self) -> Result<Vec<BoardId>> {
        let boards_dir = self.boards_dir();

        if !boards_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&boards_dir).await?;
        let mut ids: Vec<BoardId> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Ok(id) = BoardId::from_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn delete_board(&self, id: &BoardId) -> Result<()> {
        let file_path = self.board_file(id);

        if !file_path.exists() {
            return Err(BoardError::not_found(EntityKind::Board, id));
        }

        fs::remove_file(file_path).await?;
        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.boards_dir().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoardStore;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn id(s: &str) -> BoardId {
        BoardId::from_str(s).unwrap()
    }

    fn temp_files(storage: &FileStorage) -> Vec<PathBuf> {
        std::fs::read_dir(storage.boards_dir())
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect()
    }

    #[tokio::test]
    async fn test_storage_initialization() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        assert!(!storage.is_initialized().await);

        storage.initialize().await.unwrap();

        assert!(storage.is_initialized().await);
        assert!(storage.boards_dir().exists());
    }

    #[tokio::test]
    async fn test_missing_board_is_materialized() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let board = storage.load_board(&id("new-board")).await.unwrap();
        assert_eq!(board.column_order.len(), 3);
        assert!(storage.board_file(&id("new-board")).exists());

        let again = storage.load_board(&id("new-board")).await.unwrap();
        assert_eq!(again, board);
    }

    #[tokio::test]
    async fn test_board_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.initialize().await.unwrap();

        let mut store = BoardStore::seeded(3);
        let board = storage.load_board(&id("work")).await.unwrap();
        let column = board.column_order[1];
        let board = store
            .add_card(&board, column, "Persist me", Some("body".to_string()))
            .unwrap()
            .board;
        storage.save_board(&board).await.unwrap();

        let loaded = storage.load_board(&id("work")).await.unwrap();
        assert_eq!(loaded, board);
        assert!(temp_files(&storage).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_saves_of_one_board() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::new(temp_dir.path()));
        storage.initialize().await.unwrap();

        let empty = storage.load_board(&id("race")).await.unwrap();
        let column = empty.column_order[0];
        let mut store = BoardStore::seeded(11);
        let mut busy = empty.clone();
        for i in 0..200 {
            busy = store
                .add_card(&busy, column, &format!("card {}", i), None)
                .unwrap()
                .board;
        }

        for _ in 0..50 {
            let first = {
                let storage = Arc::clone(&storage);
                let board = busy.clone();
                tokio::spawn(async move { storage.save_board(&board).await })
            };
            let second = {
                let storage = Arc::clone(&storage);
                let board = empty.clone();
                tokio::spawn(async move { storage.save_board(&board).await })
            };

            first.await.unwrap().unwrap();
            second.await.unwrap().unwrap();

            // Last writer wins, and the file is always one whole snapshot
            let loaded = storage.load_board(&id("race")).await.unwrap();
            assert!(loaded == busy || loaded == empty);
        }

        assert!(temp_files(&storage).is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_loads_agree() {
        let temp_dir = TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::new(temp_dir.path()));
        storage.initialize().await.unwrap();

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
        assert!(boards.iter().all(|board| *board == stored));
        assert!(temp_files(&storage).is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_board_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());

        let mut board = storage.load_board(&id("bad")).await.unwrap();
        board.column_order.clear();
        storage.save_board(&board).await.unwrap();

        assert!(matches!(
            storage.load_board(&id("bad")).await,
            Err(BoardError::CorruptBoard(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete_boards() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStorage::new(temp_dir.path());
        storage.initialize().await.unwrap();

        assert!(storage.list_boards().await.unwrap().is_empty());

        storage.load_board(&id("beta")).await.unwrap();
        storage.load_board(&id("alpha")).await.unwrap();
        fs::write(storage.boards_dir().join("notes.txt"), "ignored")
            .await
            .unwrap();

        assert_eq!(
            storage.list_boards().await.unwrap(),
            vec![id("alpha"), id("beta")]
        );

        storage.delete_board(&id("alpha")).await.unwrap();
        assert_eq!(storage.list_boards().await.unwrap(), vec![id("beta")]);
        assert!(storage.delete_board(&id("alpha")).await.is_err());
    }
}
