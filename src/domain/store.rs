//! The board mutation engine.
//!
//! [`BoardStore::apply`] consumes one immutable snapshot and one [`Command`] and
//! returns either a new snapshot or a typed error. A failed command never yields a
//! partially mutated board: every operation validates against the input snapshot
//! first and only then mutates a private copy.

use crate::domain::board::Board;
use crate::domain::card::{validate_card_title, Card, CardPatch};
use crate::domain::column::{validate_column_title, Column};
use crate::domain::identity::IdentityRegistry;
use crate::domain::ids::{CardId, ColumnId, ExternalHash, Namespace};
use crate::domain::ordering::{ranked_cards, relocate, renumber_cards, renumber_columns};
use crate::error::{BoardError, EntityKind, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

/// What to do with the cards of a column being deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteStrategy {
    /// Refuse to delete a column that still holds cards
    #[default]
    RejectIfNonEmpty,
    /// Append every card to the end of another column first
    MoveCardsTo(ColumnId),
    /// Delete the cards along with the column
    DeleteCardsToo,
}

/// A single board mutation
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddCard {
        column: ColumnId,
        title: String,
        description: Option<String>,
    },
    MoveCard {
        card: CardId,
        to_column: ColumnId,
        index: usize,
    },
    UpdateCard {
        card: CardId,
        patch: CardPatch,
    },
    DeleteCard {
        card: CardId,
    },
    AddColumn {
        title: String,
        insert_after: Option<ColumnId>,
    },
    RenameColumn {
        column: ColumnId,
        title: String,
    },
    MoveColumn {
        column: ColumnId,
        index: usize,
    },
    DeleteColumn {
        column: ColumnId,
        strategy: DeleteStrategy,
    },
    AssignMissingHashes,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddCard { .. } => "add_card",
            Self::MoveCard { .. } => "move_card",
            Self::UpdateCard { .. } => "update_card",
            Self::DeleteCard { .. } => "delete_card",
            Self::AddColumn { .. } => "add_column",
            Self::RenameColumn { .. } => "rename_column",
            Self::MoveColumn { .. } => "move_column",
            Self::DeleteColumn { .. } => "delete_column",
            Self::AssignMissingHashes => "assign_missing_hashes",
        }
    }
}

/// What a successful command did
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    CardAdded {
        id: CardId,
        hash: ExternalHash,
    },
    CardMoved {
        id: CardId,
        from: ColumnId,
        to: ColumnId,
    },
    CardUpdated {
        id: CardId,
    },
    CardDeleted {
        id: CardId,
        hash: Option<ExternalHash>,
    },
    ColumnAdded {
        id: ColumnId,
        hash: ExternalHash,
    },
    ColumnRenamed {
        id: ColumnId,
    },
    ColumnMoved {
        id: ColumnId,
    },
    ColumnDeleted {
        id: ColumnId,
        hash: Option<ExternalHash>,
        moved: usize,
        removed: usize,
    },
    HashesAssigned {
        count: usize,
    },
    /// The command was valid but changed nothing; the snapshot is the input
    Unchanged,
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub board: Board,
    pub effect: Effect,
}

impl Applied {
    fn unchanged(board: &Board) -> Self {
        Self {
            board: board.clone(),
            effect: Effect::Unchanged,
        }
    }

    fn changed(mut board: Board, effect: Effect) -> Self {
        board.updated_at = Utc::now();
        Self { board, effect }
    }

    pub fn is_unchanged(&self) -> bool {
        self.effect == Effect::Unchanged
    }
}

fn card_not_found(id: CardId) -> BoardError {
    BoardError::not_found(EntityKind::Card, id)
}

fn column_not_found(id: ColumnId) -> BoardError {
    BoardError::not_found(EntityKind::Column, id)
}

/// Applies commands to board snapshots
#[derive(Debug)]
pub struct BoardStore<R = StdRng> {
    registry: IdentityRegistry<R>,
}

impl Default for BoardStore<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardStore<StdRng> {
    pub fn new() -> Self {
        Self::with_registry(IdentityRegistry::new())
    }

    /// Store with a deterministic hash sequence
    pub fn seeded(seed: u64) -> Self {
        Self::with_registry(IdentityRegistry::seeded(seed))
    }
}

impl<R: Rng> BoardStore<R> {
    pub fn with_registry(registry: IdentityRegistry<R>) -> Self {
        Self { registry }
    }

    /// Applies one command to `board`, returning the new snapshot
    pub fn apply(&mut self, board: &Board, command: Command) -> Result<Applied> {
        let name = command.name();

        let result = match command {
            Command::AddCard {
                column,
                title,
                description,
            } => self.add_card(board, column, &title, description),
            Command::MoveCard {
                card,
                to_column,
                index,
            } => self.move_card(board, card, to_column, index),
            Command::UpdateCard { card, patch } => self.update_card(board, card, patch),
            Command::DeleteCard { card } => self.delete_card(board, card),
            Command::AddColumn {
                title,
                insert_after,
            } => self.add_column(board, &title, insert_after),
            Command::RenameColumn { column, title } => self.rename_column(board, column, &title),
            Command::MoveColumn { column, index } => self.move_column(board, column, index),
            Command::DeleteColumn { column, strategy } => {
                self.delete_column(board, column, strategy)
            }
            Command::AssignMissingHashes => self.assign_missing_hashes(board),
        };

        match &result {
            Ok(applied) => {
                debug_assert_eq!(applied.board.check_invariants(), Ok(()));
                debug!(
                    board = %board.id,
                    command = name,
                    effect = ?applied.effect,
                    "command applied"
                );
            }
            Err(err) => {
                debug!(board = %board.id, command = name, error = %err, "command rejected");
            }
        }

        result
    }

    pub fn add_card(
        &mut self,
        board: &Board,
        column: ColumnId,
        title: &str,
        description: Option<String>,
    ) -> Result<Applied> {
        let title = validate_card_title(title)?;
        if !board.columns.contains_key(&column) {
            return Err(column_not_found(column));
        }

        let order = board
            .cards_in_column(column)
            .last()
            .map(|card| card.order + 1)
            .unwrap_or(0);
        let hash = self.registry.issue(board, Namespace::Card)?;

        let mut card = Card::new(column, order, title);
        card.description = description.filter(|d| !d.is_empty());
        card.external_hash = Some(hash.clone());
        let id = card.id;

        let mut next = board.clone();
        next.cards.insert(id, card);
        Ok(Applied::changed(next, Effect::CardAdded { id, hash }))
    }

    /// Moves a card to `index` in `to_column`. Out-of-range indices saturate.
    pub fn move_card(
        &self,
        board: &Board,
        card: CardId,
        to_column: ColumnId,
        index: usize,
    ) -> Result<Applied> {
        let current = board.cards.get(&card).ok_or_else(|| card_not_found(card))?;
        if !board.columns.contains_key(&to_column) {
            return Err(column_not_found(to_column));
        }

        let from = current.column_id;
        // The moving card does not count toward its own column's capacity
        let capacity = board.card_count(to_column).saturating_sub(1);
        if from == to_column && index.min(capacity) == current.order {
            return Ok(Applied::unchanged(board));
        }

        let mut next = board.clone();
        relocate(&mut next, card, to_column, index);
        Ok(Applied::changed(
            next,
            Effect::CardMoved {
                id: card,
                from,
                to: to_column,
            },
        ))
    }

    /// Merges the provided fields into a card. Never touches position.
    pub fn update_card(&self, board: &Board, card: CardId, patch: CardPatch) -> Result<Applied> {
        if !board.cards.contains_key(&card) {
            return Err(card_not_found(card));
        }
        if patch.is_empty() {
            return Ok(Applied::unchanged(board));
        }

        let title = patch
            .title
            .as_deref()
            .map(validate_card_title)
            .transpose()?;

        let mut next = board.clone();
        if let Some(target) = next.cards.get_mut(&card) {
            if let Some(title) = title {
                target.set_title(title);
            }
            if let Some(description) = patch.description {
                target.set_description(description);
            }
        }

        Ok(Applied::changed(next, Effect::CardUpdated { id: card }))
    }

    /// Removes a card and compacts its former column
    pub fn delete_card(&self, board: &Board, card: CardId) -> Result<Applied> {
        let mut next = board.clone();
        let removed = next
            .cards
            .remove(&card)
            .ok_or_else(|| card_not_found(card))?;

        if let Some(hash) = removed.external_hash.clone() {
            next.retired_hashes.retire(Namespace::Card, hash);
        }
        let remaining = ranked_cards(&next, removed.column_id);
        renumber_cards(&mut next, &remaining);

        Ok(Applied::changed(
            next,
            Effect::CardDeleted {
                id: card,
                hash: removed.external_hash,
            },
        ))
    }

    /// Adds a column after `insert_after`, or at the end when omitted
    pub fn add_column(
        &mut self,
        board: &Board,
        title: &str,
        insert_after: Option<ColumnId>,
    ) -> Result<Applied> {
        let title = validate_column_title(title)?;

        let position = match insert_after {
            Some(after) => {
                board
                    .column_order
                    .iter()
                    .position(|id| *id == after)
                    .ok_or_else(|| column_not_found(after))?
                    + 1
            }
            None => board.column_order.len(),
        };
        let hash = self.registry.issue(board, Namespace::Column)?;

        let mut column = Column::new(title, position);
        column.external_hash = Some(hash.clone());
        let id = column.id;

        let mut next = board.clone();
        next.columns.insert(id, column);
        next.column_order.insert(position, id);
        renumber_columns(&mut next);

        Ok(Applied::changed(next, Effect::ColumnAdded { id, hash }))
    }

    pub fn rename_column(&self, board: &Board, column: ColumnId, title: &str) -> Result<Applied> {
        let title = validate_column_title(title)?;
        let current = board
            .columns
            .get(&column)
            .ok_or_else(|| column_not_found(column))?;
        if current.title == title {
            return Ok(Applied::unchanged(board));
        }

        let mut next = board.clone();
        if let Some(target) = next.columns.get_mut(&column) {
            target.title = title;
        }
        Ok(Applied::changed(next, Effect::ColumnRenamed { id: column }))
    }

    /// Moves a column to `index` in display order. Out-of-range indices saturate.
    pub fn move_column(&self, board: &Board, column: ColumnId, index: usize) -> Result<Applied> {
        let current = board
            .column_order
            .iter()
            .position(|id| *id == column)
            .ok_or_else(|| column_not_found(column))?;

        let mut order = board.column_order.clone();
        order.remove(current);
        let index = index.min(order.len());
        if index == current {
            return Ok(Applied::unchanged(board));
        }
        order.insert(index, column);

        let mut next = board.clone();
        next.column_order = order;
        renumber_columns(&mut next);
        Ok(Applied::changed(next, Effect::ColumnMoved { id: column }))
    }

    pub fn delete_column(
        &self,
        board: &Board,
        column: ColumnId,
        strategy: DeleteStrategy,
    ) -> Result<Applied> {
        let target = board
            .columns
            .get(&column)
            .ok_or_else(|| column_not_found(column))?;
        let members = ranked_cards(board, column);

        match strategy {
            DeleteStrategy::RejectIfNonEmpty if !members.is_empty() => {
                return Err(BoardError::ColumnNotEmpty {
                    column: target.title.clone(),
                    count: members.len(),
                });
            }
            DeleteStrategy::MoveCardsTo(destination)
                if destination == column || !board.columns.contains_key(&destination) =>
            {
                return Err(BoardError::validation(
                    "target column",
                    "must be an existing column other than the one being deleted",
                ));
            }
            _ => {}
        }

        let mut next = board.clone();
        let mut moved = 0;
        let mut removed = 0;

        match strategy {
            DeleteStrategy::MoveCardsTo(destination) => {
                for card in &members {
                    let end = next.card_count(destination);
                    relocate(&mut next, *card, destination, end);
                    moved += 1;
                }
            }
            DeleteStrategy::DeleteCardsToo => {
                for card in &members {
                    if let Some(gone) = next.cards.remove(card) {
                        if let Some(hash) = gone.external_hash {
                            next.retired_hashes.retire(Namespace::Card, hash);
                        }
                        removed += 1;
                    }
                }
            }
            DeleteStrategy::RejectIfNonEmpty => {}
        }

        let hash = next
            .columns
            .remove(&column)
            .and_then(|gone| gone.external_hash);
        if let Some(hash) = hash.clone() {
            next.retired_hashes.retire(Namespace::Column, hash);
        }
        next.column_order.retain(|id| *id != column);
        renumber_columns(&mut next);

        Ok(Applied::changed(
            next,
            Effect::ColumnDeleted {
                id: column,
                hash,
                moved,
                removed,
            },
        ))
    }

    /// Issues hashes to entities saved before they had one. Existing hashes stay.
    pub fn assign_missing_hashes(&mut self, board: &Board) -> Result<Applied> {
        let mut next = board.clone();
        let mut count = 0;

        for id in board.column_order.clone() {
            let missing = next
                .columns
                .get(&id)
                .is_some_and(|column| column.external_hash.is_none());
            if missing {
                let hash = self.registry.issue(&next, Namespace::Column)?;
                if let Some(column) = next.columns.get_mut(&id) {
                    column.external_hash = Some(hash);
                    count += 1;
                }
            }
        }

        let unhashed: Vec<CardId> = board
            .ordered_columns()
            .flat_map(|column| board.cards_in_column(column.id))
            .filter(|card| card.external_hash.is_none())
            .map(|card| card.id)
            .collect();
        for id in unhashed {
            let hash = self.registry.issue(&next, Namespace::Card)?;
            if let Some(card) = next.cards.get_mut(&id) {
                card.external_hash = Some(hash);
                count += 1;
            }
        }

        if count == 0 {
            return Ok(Applied::unchanged(board));
        }
        Ok(Applied::changed(next, Effect::HashesAssigned { count }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::BoardConfig;
    use crate::domain::ids::BoardId;
    use std::str::FromStr;

    fn two_column_board(store: &mut BoardStore) -> Board {
        let config = BoardConfig {
            name: "Test".to_string(),
            columns: vec![],
        };
        let mut board = config
            .instantiate(BoardId::from_str("test").unwrap())
            .unwrap();
        for title in ["A", "B"] {
            board = store.add_column(&board, title, None).unwrap().board;
        }
        board
    }

    fn column(board: &Board, index: usize) -> ColumnId {
        board.column_order[index]
    }

    fn add(store: &mut BoardStore, board: Board, column: ColumnId, title: &str) -> (Board, CardId) {
        let applied = store.add_card(&board, column, title, None).unwrap();
        match applied.effect {
            Effect::CardAdded { id, .. } => (applied.board, id),
            other => panic!("unexpected effect {:?}", other),
        }
    }

    fn titles(board: &Board, column: ColumnId) -> Vec<(String, usize)> {
        board
            .cards_in_column(column)
            .into_iter()
            .map(|card| (card.title.clone(), card.order))
            .collect()
    }

    #[test]
    fn test_add_card_lands_at_order_zero_with_hash() {
        let mut store = BoardStore::seeded(1);
        let board = two_column_board(&mut store);
        let col_a = column(&board, 0);

        let applied = store.add_card(&board, col_a, "Write docs", None).unwrap();
        let Effect::CardAdded { id, hash } = applied.effect else {
            panic!("expected CardAdded");
        };

        let card = &applied.board.cards[&id];
        assert_eq!(card.order, 0);
        assert_eq!(card.column_id, col_a);
        assert_eq!(card.external_hash.as_ref(), Some(&hash));
        assert_eq!(hash.as_str().len(), 4);
        assert!(hash
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn test_add_card_appends() {
        let mut store = BoardStore::seeded(2);
        let board = two_column_board(&mut store);
        let col_a = column(&board, 0);
        let (board, _) = add(&mut store, board, col_a, "One");
        let (board, _) = add(&mut store, board, col_a, "Two");

        assert_eq!(
            titles(&board, col_a),
            vec![("One".to_string(), 0), ("Two".to_string(), 1)]
        );
    }

    #[test]
    fn test_add_card_validation() {
        let mut store = BoardStore::seeded(3);
        let board = two_column_board(&mut store);
        let col_a = column(&board, 0);

        assert!(matches!(
            store.add_card(&board, col_a, "", None),
            Err(BoardError::Validation { .. })
        ));
        assert!(matches!(
            store.add_card(&board, col_a, &"x".repeat(501), None),
            Err(BoardError::Validation { .. })
        ));
        assert!(matches!(
            store.add_card(&board, ColumnId::new(), "Card", None),
            Err(BoardError::NotFound {
                entity: EntityKind::Column,
                ..
            })
        ));
    }

    #[test]
    fn test_move_within_column() {
        let mut store = BoardStore::seeded(4);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);
        let (board, _) = add(&mut store, board, col, "X");
        let (board, y) = add(&mut store, board, col, "Y");
        let (board, _) = add(&mut store, board, col, "Z");

        let moved = store.move_card(&board, y, col, 0).unwrap().board;
        assert_eq!(
            titles(&moved, col),
            vec![
                ("Y".to_string(), 0),
                ("X".to_string(), 1),
                ("Z".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_move_across_columns() {
        let mut store = BoardStore::seeded(5);
        let board = two_column_board(&mut store);
        let (col_a, col_b) = (column(&board, 0), column(&board, 1));
        let (board, p) = add(&mut store, board, col_a, "P");
        let (board, _) = add(&mut store, board, col_a, "Q");

        let moved = store.move_card(&board, p, col_b, 0).unwrap().board;
        assert_eq!(titles(&moved, col_a), vec![("Q".to_string(), 0)]);
        assert_eq!(titles(&moved, col_b), vec![("P".to_string(), 0)]);
    }

    #[test]
    fn test_move_to_same_position_is_noop() {
        let mut store = BoardStore::seeded(6);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);
        let (board, x) = add(&mut store, board, col, "X");
        let (board, _) = add(&mut store, board, col, "Y");

        let applied = store.move_card(&board, x, col, 0).unwrap();
        assert!(applied.is_unchanged());
        assert_eq!(applied.board, board);
        assert_eq!(
            serde_json::to_string(&applied.board).unwrap(),
            serde_json::to_string(&board).unwrap()
        );
    }

    #[test]
    fn test_move_clamps_to_end() {
        let mut store = BoardStore::seeded(7);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);
        let (board, x) = add(&mut store, board, col, "X");
        let (board, _) = add(&mut store, board, col, "Y");

        let moved = store.move_card(&board, x, col, 100).unwrap();
        assert!(!moved.is_unchanged());
        assert_eq!(
            titles(&moved.board, col),
            vec![("Y".to_string(), 0), ("X".to_string(), 1)]
        );

        // Already last: clamping lands on the current rank
        let last = store
            .move_card(&moved.board, x, col, usize::MAX)
            .unwrap();
        assert!(last.is_unchanged());
    }

    #[test]
    fn test_move_not_found() {
        let mut store = BoardStore::seeded(8);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);
        let (board, x) = add(&mut store, board, col, "X");

        assert!(matches!(
            store.move_card(&board, CardId::new(), col, 0),
            Err(BoardError::NotFound {
                entity: EntityKind::Card,
                ..
            })
        ));
        assert!(matches!(
            store.move_card(&board, x, ColumnId::new(), 0),
            Err(BoardError::NotFound {
                entity: EntityKind::Column,
                ..
            })
        ));
    }

    #[test]
    fn test_update_card_merges_fields() {
        let mut store = BoardStore::seeded(9);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);
        let (board, _) = add(&mut store, board, col, "X");
        let (board, y) = add(&mut store, board, col, "Y");

        let patch = CardPatch::default().description("Details");
        let updated = store.update_card(&board, y, patch).unwrap().board;
        let card = &updated.cards[&y];
        assert_eq!(card.title, "Y");
        assert_eq!(card.description.as_deref(), Some("Details"));
        assert_eq!(card.order, 1);
        assert_eq!(card.column_id, col);

        let patch = CardPatch::default().title("  Y2 ");
        let updated = store.update_card(&updated, y, patch).unwrap().board;
        assert_eq!(updated.cards[&y].title, "Y2");
        assert_eq!(updated.cards[&y].description.as_deref(), Some("Details"));
    }

    #[test]
    fn test_update_card_errors() {
        let mut store = BoardStore::seeded(10);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);
        let (board, x) = add(&mut store, board, col, "X");

        assert!(matches!(
            store.update_card(&board, CardId::new(), CardPatch::default().title("T")),
            Err(BoardError::NotFound { .. })
        ));
        assert!(matches!(
            store.update_card(&board, x, CardPatch::default().title("")),
            Err(BoardError::Validation { .. })
        ));
        assert!(store
            .update_card(&board, x, CardPatch::default())
            .unwrap()
            .is_unchanged());
    }

    #[test]
    fn test_delete_card_compacts_column() {
        let mut store = BoardStore::seeded(11);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);
        let (board, _) = add(&mut store, board, col, "X");
        let (board, y) = add(&mut store, board, col, "Y");
        let (board, _) = add(&mut store, board, col, "Z");

        let applied = store.delete_card(&board, y).unwrap();
        assert_eq!(
            titles(&applied.board, col),
            vec![("X".to_string(), 0), ("Z".to_string(), 1)]
        );

        let Effect::CardDeleted { hash: Some(hash), .. } = applied.effect else {
            panic!("expected CardDeleted with hash");
        };
        assert!(applied.board.retired_hashes.cards.contains(&hash));

        // Deleting again is a caller error
        assert!(matches!(
            store.delete_card(&applied.board, y),
            Err(BoardError::NotFound { .. })
        ));
    }

    #[test]
    fn test_add_column_after_reference() {
        let mut store = BoardStore::seeded(12);
        let board = two_column_board(&mut store);
        let col_a = column(&board, 0);

        let applied = store.add_column(&board, "Middle", Some(col_a)).unwrap();
        let Effect::ColumnAdded { id, .. } = applied.effect else {
            panic!("expected ColumnAdded");
        };

        let order: Vec<&str> = applied
            .board
            .ordered_columns()
            .map(|c| c.title.as_str())
            .collect();
        assert_eq!(order, vec!["A", "Middle", "B"]);
        assert_eq!(applied.board.columns[&id].order, 1);

        assert!(matches!(
            store.add_column(&board, "Lost", Some(ColumnId::new())),
            Err(BoardError::NotFound { .. })
        ));
        assert!(matches!(
            store.add_column(&board, "", None),
            Err(BoardError::Validation { .. })
        ));
    }

    #[test]
    fn test_rename_and_move_column() {
        let mut store = BoardStore::seeded(13);
        let board = two_column_board(&mut store);
        let col_b = column(&board, 1);

        let renamed = store.rename_column(&board, col_b, "Done").unwrap().board;
        assert_eq!(renamed.columns[&col_b].title, "Done");
        assert!(store
            .rename_column(&renamed, col_b, "Done")
            .unwrap()
            .is_unchanged());

        let moved = store.move_column(&renamed, col_b, 0).unwrap().board;
        assert_eq!(moved.column_order[0], col_b);
        assert_eq!(moved.columns[&col_b].order, 0);
        assert!(store.move_column(&moved, col_b, 0).unwrap().is_unchanged());
    }

    #[test]
    fn test_delete_non_empty_column_rejected() {
        let mut store = BoardStore::seeded(14);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);
        let (board, card) = add(&mut store, board, col, "Only");

        let err = store
            .delete_column(&board, col, DeleteStrategy::RejectIfNonEmpty)
            .unwrap_err();
        assert!(matches!(err, BoardError::ColumnNotEmpty { count: 1, .. }));
        assert!(board.columns.contains_key(&col));
        assert!(board.cards.contains_key(&card));
    }

    #[test]
    fn test_delete_empty_column() {
        let mut store = BoardStore::seeded(15);
        let board = two_column_board(&mut store);
        let col_a = column(&board, 0);

        let applied = store
            .delete_column(&board, col_a, DeleteStrategy::RejectIfNonEmpty)
            .unwrap();
        assert!(!applied.board.column_order.contains(&col_a));
        assert_eq!(applied.board.columns.len(), 1);

        let Effect::ColumnDeleted { hash: Some(hash), .. } = applied.effect else {
            panic!("expected ColumnDeleted with hash");
        };
        assert!(applied.board.retired_hashes.columns.contains(&hash));
    }

    #[test]
    fn test_delete_column_moving_cards() {
        let mut store = BoardStore::seeded(16);
        let board = two_column_board(&mut store);
        let (col_a, col_b) = (column(&board, 0), column(&board, 1));
        let (board, _) = add(&mut store, board, col_a, "A1");
        let (board, _) = add(&mut store, board, col_a, "A2");
        let (board, _) = add(&mut store, board, col_b, "B1");

        let applied = store
            .delete_column(&board, col_a, DeleteStrategy::MoveCardsTo(col_b))
            .unwrap();
        assert_eq!(
            titles(&applied.board, col_b),
            vec![
                ("B1".to_string(), 0),
                ("A1".to_string(), 1),
                ("A2".to_string(), 2)
            ]
        );
        assert!(matches!(
            applied.effect,
            Effect::ColumnDeleted {
                moved: 2,
                removed: 0,
                ..
            }
        ));

        assert!(matches!(
            store.delete_column(&board, col_a, DeleteStrategy::MoveCardsTo(col_a)),
            Err(BoardError::Validation { .. })
        ));
        assert!(matches!(
            store.delete_column(&board, col_a, DeleteStrategy::MoveCardsTo(ColumnId::new())),
            Err(BoardError::Validation { .. })
        ));
    }

    #[test]
    fn test_delete_column_with_cards() {
        let mut store = BoardStore::seeded(17);
        let board = two_column_board(&mut store);
        let col_a = column(&board, 0);
        let (board, card) = add(&mut store, board, col_a, "A1");
        let hash = board.cards[&card].external_hash.clone().unwrap();

        let applied = store
            .delete_column(&board, col_a, DeleteStrategy::DeleteCardsToo)
            .unwrap();
        assert!(applied.board.cards.is_empty());
        assert!(applied.board.retired_hashes.cards.contains(&hash));
    }

    #[test]
    fn test_assign_missing_hashes() {
        let mut store = BoardStore::seeded(18);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);
        let (mut board, card) = add(&mut store, board, col, "Legacy");
        let existing = board.columns[&column(&board, 1)].external_hash.clone();

        if let Some(c) = board.cards.get_mut(&card) {
            c.external_hash = None;
        }
        if let Some(c) = board.columns.get_mut(&col) {
            c.external_hash = None;
        }

        let applied = store.assign_missing_hashes(&board).unwrap();
        assert_eq!(applied.effect, Effect::HashesAssigned { count: 2 });
        assert!(applied.board.cards[&card].external_hash.is_some());
        assert!(applied.board.columns[&col].external_hash.is_some());
        assert_eq!(
            applied.board.columns[&column(&board, 1)].external_hash,
            existing
        );

        assert!(store
            .assign_missing_hashes(&applied.board)
            .unwrap()
            .is_unchanged());
    }

    #[test]
    fn test_apply_dispatches_commands() {
        let mut store = BoardStore::seeded(19);
        let board = two_column_board(&mut store);
        let col = column(&board, 0);

        let applied = store
            .apply(
                &board,
                Command::AddCard {
                    column: col,
                    title: "Via apply".to_string(),
                    description: Some("desc".to_string()),
                },
            )
            .unwrap();
        let Effect::CardAdded { id, .. } = applied.effect else {
            panic!("expected CardAdded");
        };
        assert_eq!(
            applied.board.cards[&id].description.as_deref(),
            Some("desc")
        );
        assert!(applied.board.updated_at >= board.updated_at);
    }
}
