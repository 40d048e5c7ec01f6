use crate::error::BoardError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Identifier of a whole board, as used by storage and the command surface
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BoardId(String);

impl BoardId {
    const MAX_LEN: usize = 64;

    /// Returns the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for BoardId {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Board ids double as file names, so keep them to a portable charset
        let valid = !s.is_empty()
            && s.len() <= Self::MAX_LEN
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(BoardError::InvalidBoardId(s.to_string()))
        }
    }
}

impl TryFrom<String> for BoardId {
    type Error = BoardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BoardId> for String {
    fn from(id: BoardId) -> Self {
        id.0
    }
}

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal card key. Never handed to external callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(Uuid);

impl CardId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CardId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal column key. Never handed to external callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(Uuid);

impl ColumnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ColumnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash namespaces. A card hash and a column hash may share a token value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Namespace {
    Card,
    Column,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Card => write!(f, "card"),
            Self::Column => write!(f, "column"),
        }
    }
}

/// Internal id resolved from an external hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityId {
    Card(CardId),
    Column(ColumnId),
}

/// Short external identifier (e.g., `k3x9`) issued to cards and columns
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExternalHash(String);

impl ExternalHash {
    /// Symbols a hash is drawn from
    pub const ALPHABET: &'static [u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    /// Number of symbols in every hash
    pub const LEN: usize = 4;

    /// Builds a hash from raw alphabet indices. Out-of-range indices wrap.
    pub(crate) fn from_indices(indices: [usize; Self::LEN]) -> Self {
        let token = indices
            .iter()
            .map(|&i| Self::ALPHABET[i % Self::ALPHABET.len()] as char)
            .collect();
        Self(token)
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ExternalHash {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept uppercase input from humans typing hashes
        let normalized = s.to_ascii_lowercase();

        if normalized.len() == Self::LEN
            && normalized.bytes().all(|b| Self::ALPHABET.contains(&b))
        {
            Ok(Self(normalized))
        } else {
            Err(BoardError::InvalidHash(s.to_string()))
        }
    }
}

impl TryFrom<String> for ExternalHash {
    type Error = BoardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ExternalHash> for String {
    fn from(hash: ExternalHash) -> Self {
        hash.0
    }
}

impl fmt::Display for ExternalHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
