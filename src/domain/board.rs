use crate::domain::card::Card;
use crate::domain::column::{slugify, Column};
use crate::domain::ids::{BoardId, CardId, ColumnId, ExternalHash, Namespace};
use crate::domain::store::{BoardStore, Command};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use thiserror::Error;

/// Template for boards that have never been saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub name: String,
    pub columns: Vec<String>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "Default Board".to_string(),
            columns: vec![
                "To Do".to_string(),
                "In Progress".to_string(),
                "Done".to_string(),
            ],
        }
    }
}

impl BoardConfig {
    /// Builds a fresh board, running each seed column through `AddColumn` so it gets a hash
    pub fn instantiate(&self, id: BoardId) -> Result<Board> {
        let mut store = BoardStore::new();
        let mut board = Board::new(id, self.name.clone());

        for title in &self.columns {
            board = store
                .apply(
                    &board,
                    Command::AddColumn {
                        title: title.clone(),
                        insert_after: None,
                    },
                )?
                .board;
        }

        Ok(board)
    }
}

/// Hashes whose holder was deleted. They are never issued again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetiredHashes {
    #[serde(default)]
    pub cards: BTreeSet<ExternalHash>,
    #[serde(default)]
    pub columns: BTreeSet<ExternalHash>,
}

impl RetiredHashes {
    pub fn get(&self, namespace: Namespace) -> &BTreeSet<ExternalHash> {
        match namespace {
            Namespace::Card => &self.cards,
            Namespace::Column => &self.columns,
        }
    }

    pub(crate) fn retire(&mut self, namespace: Namespace, hash: ExternalHash) {
        match namespace {
            Namespace::Card => self.cards.insert(hash),
            Namespace::Column => self.columns.insert(hash),
        };
    }
}

/// A structural rule a board snapshot breaks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("card {card} references missing column {column}")]
    DanglingColumn { card: CardId, column: ColumnId },

    #[error("cards in column {column} have orders {found:?}, expected 0..{expected}")]
    SparseCardOrder {
        column: ColumnId,
        expected: usize,
        found: Vec<usize>,
    },

    #[error("column order is not a permutation of the board's columns")]
    ColumnOrderMismatch,

    #[error("column {column} has order {order} but sits at position {position}")]
    ColumnRankMismatch {
        column: ColumnId,
        order: usize,
        position: usize,
    },

    #[error("{namespace} hash {hash} is held by more than one entity")]
    DuplicateHash {
        namespace: Namespace,
        hash: ExternalHash,
    },

    #[error("{namespace} hash {hash} was retired but is held by a live entity")]
    RecycledHash {
        namespace: Namespace,
        hash: ExternalHash,
    },
}

/// The full normalized board value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    pub cards: BTreeMap<CardId, Card>,
    pub columns: BTreeMap<ColumnId, Column>,
    /// Display order of columns
    pub column_order: Vec<ColumnId>,
    #[serde(default)]
    pub retired_hashes: RetiredHashes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn new(id: BoardId, name: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            cards: BTreeMap::new(),
            columns: BTreeMap::new(),
            column_order: Vec::new(),
            retired_hashes: RetiredHashes::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Columns in display order
    pub fn ordered_columns(&self) -> impl Iterator<Item = &Column> {
        self.column_order
            .iter()
            .filter_map(|id| self.columns.get(id))
    }

    /// Cards of a column in rank order
    pub fn cards_in_column(&self, column: ColumnId) -> Vec<&Card> {
        let mut cards: Vec<&Card> = self
            .cards
            .values()
            .filter(|card| card.column_id == column)
            .collect();
        cards.sort_by_key(|card| (card.order, card.id));
        cards
    }

    pub fn card_count(&self, column: ColumnId) -> usize {
        self.cards
            .values()
            .filter(|card| card.column_id == column)
            .count()
    }

    pub fn card_by_hash(&self, hash: &ExternalHash) -> Option<&Card> {
        self.cards
            .values()
            .find(|card| card.external_hash.as_ref() == Some(hash))
    }

    pub fn column_by_hash(&self, hash: &ExternalHash) -> Option<&Column> {
        self.columns
            .values()
            .find(|column| column.external_hash.as_ref() == Some(hash))
    }

    /// Finds a column by slug. With colliding slugs the first in display order wins.
    pub fn column_by_slug(&self, name: &str) -> Option<&Column> {
        let wanted = slugify(name);
        self.ordered_columns().find(|column| column.slug() == wanted)
    }

    /// Live hashes of a namespace
    pub fn live_hashes(&self, namespace: Namespace) -> Vec<&ExternalHash> {
        match namespace {
            Namespace::Card => self
                .cards
                .values()
                .filter_map(|card| card.external_hash.as_ref())
                .collect(),
            Namespace::Column => self
                .columns
                .values()
                .filter_map(|column| column.external_hash.as_ref())
                .collect(),
        }
    }

    /// Whether a hash was ever issued in the namespace, live or retired
    pub fn hash_in_use(&self, namespace: Namespace, hash: &ExternalHash) -> bool {
        self.retired_hashes.get(namespace).contains(hash)
            || self.live_hashes(namespace).into_iter().any(|h| h == hash)
    }

    /// Verifies the structural invariants every snapshot must satisfy
    pub fn check_invariants(&self) -> std::result::Result<(), InvariantViolation> {
        for card in self.cards.values() {
            if !self.columns.contains_key(&card.column_id) {
                return Err(InvariantViolation::DanglingColumn {
                    card: card.id,
                    column: card.column_id,
                });
            }
        }

        let mut orders: BTreeMap<ColumnId, Vec<usize>> = self
            .columns
            .keys()
            .map(|id| (*id, Vec::new()))
            .collect();
        for card in self.cards.values() {
            orders.entry(card.column_id).or_default().push(card.order);
        }
        for (column, mut found) in orders {
            found.sort_unstable();
            if found.iter().enumerate().any(|(i, &order)| i != order) {
                return Err(InvariantViolation::SparseCardOrder {
                    column,
                    expected: found.len(),
                    found,
                });
            }
        }

        let unique: HashSet<&ColumnId> = self.column_order.iter().collect();
        if unique.len() != self.column_order.len()
            || self.column_order.len() != self.columns.len()
            || !self.column_order.iter().all(|id| self.columns.contains_key(id))
        {
            return Err(InvariantViolation::ColumnOrderMismatch);
        }

        for (position, id) in self.column_order.iter().enumerate() {
            if let Some(column) = self.columns.get(id) {
                if column.order != position {
                    return Err(InvariantViolation::ColumnRankMismatch {
                        column: *id,
                        order: column.order,
                        position,
                    });
                }
            }
        }

        for namespace in [Namespace::Card, Namespace::Column] {
            let retired = self.retired_hashes.get(namespace);
            let mut seen = HashSet::new();
            for hash in self.live_hashes(namespace) {
                if !seen.insert(hash) {
                    return Err(InvariantViolation::DuplicateHash {
                        namespace,
                        hash: hash.clone(),
                    });
                }
                if retired.contains(hash) {
                    return Err(InvariantViolation::RecycledHash {
                        namespace,
                        hash: hash.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
