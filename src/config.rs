//! Runtime configuration.

use crate::auth::CredentialConfig;
use crate::domain::column::validate_column_title;
use crate::domain::BoardConfig;
use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which persistence backend to use
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File {
        root: PathBuf,
    },
    Sqlite {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period after the last mutation before an interactive session saves
    pub save_debounce_ms: u64,
    /// Upper bound for a single load or save
    pub persistence_timeout_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 1000,
            persistence_timeout_ms: 5000,
        }
    }
}

impl SessionConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn persistence_timeout(&self) -> Duration {
        Duration::from_millis(self.persistence_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub storage: StorageBackend,
    pub board: BoardConfig,
    pub session: SessionConfig,
    pub credentials: Vec<CredentialConfig>,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| BoardError::ConfigError(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|err| {
            BoardError::ConfigError(format!("cannot read {}: {}", path.display(), err))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.credentials.iter().any(|c| c.token.trim().is_empty()) {
            return Err(BoardError::ConfigError(
                "credential token must not be empty".to_string(),
            ));
        }
        if self.session.persistence_timeout_ms == 0 {
            return Err(BoardError::ConfigError(
                "persistence_timeout_ms must be positive".to_string(),
            ));
        }
        for title in &self.board.columns {
            validate_column_title(title)
                .map_err(|err| BoardError::ConfigError(format!("board template: {}", err)))?;
        }
        Ok(())
    }
}
