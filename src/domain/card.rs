use crate::domain::ids::{CardId, ColumnId, ExternalHash};
use crate::error::{BoardError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum card title length, in characters
pub const MAX_CARD_TITLE: usize = 500;

/// Trims and validates a card title
pub fn validate_card_title(title: &str) -> Result<String> {
    validate_title("title", title, MAX_CARD_TITLE)
}

pub(crate) fn validate_title(field: &str, title: &str, max: usize) -> Result<String> {
    let trimmed = title.trim();

    if trimmed.is_empty() {
        return Err(BoardError::validation(field, "must not be empty"));
    }

    let len = trimmed.chars().count();
    if len > max {
        return Err(BoardError::validation(
            field,
            format!("must be at most {} characters (got {})", max, len),
        ));
    }

    Ok(trimmed.to_string())
}

/// A single work item on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub column_id: ColumnId,
    /// Zero-based rank within the owning column
    pub order: usize,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_hash: Option<ExternalHash>,
}

impl Card {
    /// Creates a new card. The title is expected to be validated already.
    pub fn new(column_id: ColumnId, order: usize, title: String) -> Self {
        let now = Utc::now();
        Self {
            id: CardId::new(),
            column_id,
            order,
            title,
            description: None,
            created_at: now,
            updated_at: now,
            external_hash: None,
        }
    }

    /// Sets the description. An empty description clears it.
    pub fn set_description(&mut self, description: String) {
        self.description = if description.is_empty() {
            None
        } else {
            Some(description)
        };
        self.updated_at = Utc::now();
    }

    pub fn set_title(&mut self, title: String) {
        self.title = title;
        self.updated_at = Utc::now();
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Content changes for an existing card. Position is never part of a patch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CardPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}
