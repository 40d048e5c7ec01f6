//! Credential checks for the command surface.

use crate::domain::BoardId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Approves or denies a request for a board before any board work happens
pub trait AuthGate: Send + Sync {
    fn authenticate(&self, credential: Option<&str>, board: &BoardId) -> bool;
}

/// Boards a credential may act on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Boards(BTreeSet<BoardId>),
}

impl Scope {
    pub fn covers(&self, board: &BoardId) -> bool {
        match self {
            Self::All => true,
            Self::Boards(boards) => boards.contains(board),
        }
    }
}

/// A configured bearer token. `"*"` in `boards` grants every board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub token: String,
    pub boards: Vec<String>,
}

/// Token table mapping bearer credentials to board scopes
#[derive(Debug, Clone, Default)]
pub struct CredentialTable {
    scopes: HashMap<String, Scope>,
}

impl CredentialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `token` access to every board
    pub fn allow_all(mut self, token: impl Into<String>) -> Self {
        self.scopes.insert(token.into(), Scope::All);
        self
    }

    /// Grants `token` access to the listed boards
    pub fn allow(
        mut self,
        token: impl Into<String>,
        boards: impl IntoIterator<Item = BoardId>,
    ) -> Self {
        self.scopes
            .insert(token.into(), Scope::Boards(boards.into_iter().collect()));
        self
    }

    /// Builds a table from configuration entries. Board ids that do not parse are
    /// reported back as errors.
    pub fn from_config(entries: &[CredentialConfig]) -> crate::Result<Self> {
        let mut table = Self::new();
        for entry in entries {
            if entry.token.trim().is_empty() {
                return Err(crate::BoardError::ConfigError(
                    "credential token must not be empty".to_string(),
                ));
            }
            table = if entry.boards.iter().any(|b| b == "*") {
                table.allow_all(entry.token.clone())
            } else {
                let boards = entry
                    .boards
                    .iter()
                    .map(|b| b.parse())
                    .collect::<crate::Result<Vec<BoardId>>>()?;
                table.allow(entry.token.clone(), boards)
            };
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Accepts either a bare token or an `Authorization` header value
pub fn bearer_token(credential: &str) -> &str {
    let trimmed = credential.trim();
    match trimmed.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
        _ => trimmed,
    }
}

impl AuthGate for CredentialTable {
    fn authenticate(&self, credential: Option<&str>, board: &BoardId) -> bool {
        let Some(credential) = credential else {
            debug!(%board, "request without credential");
            return false;
        };

        let allowed = self
            .scopes
            .get(bearer_token(credential))
            .is_some_and(|scope| scope.covers(board));
        if !allowed {
            debug!(%board, "credential rejected");
        }
        allowed
    }
}

/// Gate for trusted in-process callers
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AuthGate for AllowAll {
    fn authenticate(&self, _credential: Option<&str>, _board: &BoardId) -> bool {
        true
    }
}
