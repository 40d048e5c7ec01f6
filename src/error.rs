use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardError>;

/// Kind of entity an identifier refers to, used in not-found reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Board,
    Card,
    Column,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Board => write!(f, "board"),
            Self::Card => write!(f, "card"),
            Self::Column => write!(f, "column"),
        }
    }
}

/// Broad classification of a [`BoardError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Auth,
    Persistence,
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: String },

    #[error("Column '{column}' has {count} cards and cannot be deleted")]
    ColumnNotEmpty { column: String, count: usize },

    #[error("No free {namespace} hash after {attempts} draws")]
    HashSpaceExhausted { namespace: String, attempts: usize },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid board ID: {0}")]
    InvalidBoardId(String),

    #[error("Invalid external hash: {0}")]
    InvalidHash(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Persistence {operation} timed out after {elapsed_ms}ms")]
    PersistenceTimeout { operation: String, elapsed_ms: u64 },

    #[error("Corrupt board: {0}")]
    CorruptBoard(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl BoardError {
    /// Create a validation error for the named field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } | Self::InvalidBoardId(_) | Self::InvalidHash(_) => {
                ErrorKind::Validation
            }
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ColumnNotEmpty { .. } | Self::HashSpaceExhausted { .. } => ErrorKind::Conflict,
            Self::Unauthorized => ErrorKind::Auth,
            Self::StorageError(_)
            | Self::PersistenceTimeout { .. }
            | Self::CorruptBoard(_)
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::ConfigError(_) => ErrorKind::Persistence,
        }
    }

    /// Only backend failures are worth retrying; engine outcomes are deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StorageError(_) | Self::PersistenceTimeout { .. } | Self::IoError(_)
        )
    }
}

#[cfg(feature = "sqlite-storage")]
impl From<rusqlite::Error> for BoardError {
    fn from(err: rusqlite::Error) -> Self {
        Self::StorageError(err.to_string())
    }
}
