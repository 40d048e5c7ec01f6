//! JSON shapes exchanged over the command surface.

use crate::domain::{Board, Card, Column, ExternalHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDto {
    pub card_hash: Option<ExternalHash>,
    pub title: String,
    pub description: Option<String>,
    pub column_hash: Option<ExternalHash>,
    pub column_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CardDto {
    pub fn new(board: &Board, card: &Card) -> Self {
        let column = board.columns.get(&card.column_id);
        Self {
            card_hash: card.external_hash.clone(),
            title: card.title.clone(),
            description: card.description.clone(),
            column_hash: column.and_then(|c| c.external_hash.clone()),
            column_name: column.map(|c| c.title.clone()),
            created_at: card.created_at,
            updated_at: card.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDto {
    pub column_hash: Option<ExternalHash>,
    /// Slug of the title
    pub name: String,
    pub title: String,
    pub order: usize,
}

impl From<&Column> for ColumnDto {
    fn from(column: &Column) -> Self {
        Self {
            column_hash: column.external_hash.clone(),
            name: column.slug(),
            title: column.title.clone(),
            order: column.order,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCardBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub column_hash: Option<String>,
    pub column_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCardBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub column_hash: Option<String>,
    pub column_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateColumnBody {
    pub title: Option<String>,
    pub insert_after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
