use crate::domain::card::validate_title;
use crate::domain::ids::{ColumnId, ExternalHash};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum column title length, in characters
pub const MAX_COLUMN_TITLE: usize = 100;

/// Trims and validates a column title
pub fn validate_column_title(title: &str) -> Result<String> {
    validate_title("title", title, MAX_COLUMN_TITLE)
}

/// Derives the addressable slug of a column title: lowercase, whitespace runs become `-`
pub fn slugify(title: &str) -> String {
    title
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// A workflow stage holding an ordered bucket of cards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub title: String,
    /// Rank among columns; always agrees with the board's column order
    pub order: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_hash: Option<ExternalHash>,
}

impl Column {
    pub fn new(title: String, order: usize) -> Self {
        Self {
            id: ColumnId::new(),
            title,
            order,
            created_at: Utc::now(),
            external_hash: None,
        }
    }

    pub fn slug(&self) -> String {
        slugify(&self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("In Progress"), "in-progress");
        assert_eq!(slugify("  To   Do "), "to-do");
        assert_eq!(slugify("Done"), "done");
    }

    #[test]
    fn test_column_title_validation() {
        assert_eq!(validate_column_title(" Review ").unwrap(), "Review");
        assert!(validate_column_title("").is_err());
        assert!(validate_column_title(&"c".repeat(100)).is_ok());
        assert!(validate_column_title(&"c".repeat(101)).is_err());
    }

    #[test]
    fn test_column_slug() {
        let column = Column::new("Ready For QA".to_string(), 0);
        assert_eq!(column.slug(), "ready-for-qa");
    }
}
