//! Dense rank bookkeeping.
//!
//! Card orders within a column and column orders within the board are always the
//! sequence `0..n`. Every mutation rewrites the affected sequence in full rather
//! than keeping sparse or fractional keys.

use crate::domain::board::Board;
use crate::domain::ids::{CardId, ColumnId};

/// Ids of the cards in `column`, in rank order
pub(crate) fn ranked_cards(board: &Board, column: ColumnId) -> Vec<CardId> {
    board
        .cards_in_column(column)
        .into_iter()
        .map(|card| card.id)
        .collect()
}

/// Assigns `order = position` to every card in `sequence`
pub(crate) fn renumber_cards(board: &mut Board, sequence: &[CardId]) {
    for (position, id) in sequence.iter().enumerate() {
        if let Some(card) = board.cards.get_mut(id) {
            card.order = position;
        }
    }
}

/// Re-derives every column's `order` from the board's column order
pub(crate) fn renumber_columns(board: &mut Board) {
    for (position, id) in board.column_order.iter().enumerate() {
        if let Some(column) = board.columns.get_mut(id) {
            column.order = position;
        }
    }
}

/// Moves `card` into `to` at `index` (clamped), renumbering both affected columns.
///
/// Callers validate that the card and column exist.
pub(crate) fn relocate(board: &mut Board, card: CardId, to: ColumnId, index: usize) {
    let Some(from) = board.cards.get(&card).map(|c| c.column_id) else {
        return;
    };

    let mut destination = ranked_cards(board, to);
    destination.retain(|id| *id != card);
    let index = index.min(destination.len());

    if from != to {
        let mut source = ranked_cards(board, from);
        source.retain(|id| *id != card);
        renumber_cards(board, &source);
    }

    destination.insert(index, card);
    if let Some(moving) = board.cards.get_mut(&card) {
        moving.column_id = to;
        moving.touch();
    }
    renumber_cards(board, &destination);
}
