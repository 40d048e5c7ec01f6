use crate::domain::board::Board;
use crate::domain::card::Card;
use std::collections::HashMap;
use std::str::FromStr;

/// Fields available for sorting card listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    /// Column display order, then rank within the column
    #[default]
    Position,
    Title,
    Created,
    Updated,
}

/// Sort order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "position" => Ok(SortField::Position),
            "title" => Ok(SortField::Title),
            "created" => Ok(SortField::Created),
            "updated" => Ok(SortField::Updated),
            _ => Err(format!(
                "Invalid sort field '{}'. Valid fields: position, title, created, updated",
                s
            )),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Ascending),
            "desc" => Ok(SortOrder::Descending),
            _ => Err(format!(
                "Invalid sort order '{}'. Valid orders: asc, desc",
                s
            )),
        }
    }
}

/// Returns every card on the board sorted by `field` and `order`
///
/// # Examples
/// ```
/// use taskboard_core::domain::sorting::{sorted_cards, SortField, SortOrder};
/// use taskboard_core::{BoardConfig, BoardStore};
///
/// let mut store = BoardStore::seeded(1);
/// let board = BoardConfig::default().instantiate("demo".parse().unwrap()).unwrap();
/// let todo = board.column_order[0];
/// let board = store.add_card(&board, todo, "B", None).unwrap().board;
/// let board = store.add_card(&board, todo, "A", None).unwrap().board;
///
/// let cards = sorted_cards(&board, SortField::Title, SortOrder::Ascending);
/// assert_eq!(cards[0].title, "A");
/// ```
pub fn sorted_cards(board: &Board, field: SortField, order: SortOrder) -> Vec<&Card> {
    let column_rank: HashMap<_, _> = board
        .column_order
        .iter()
        .enumerate()
        .map(|(rank, id)| (*id, rank))
        .collect();
    let position = |card: &Card| {
        (
            column_rank.get(&card.column_id).copied().unwrap_or(usize::MAX),
            card.order,
        )
    };

    let mut cards: Vec<&Card> = board.cards.values().collect();
    cards.sort_by(|a, b| {
        let cmp = match field {
            SortField::Position => position(a).cmp(&position(b)),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Created => a.created_at.cmp(&b.created_at),
            SortField::Updated => a.updated_at.cmp(&b.updated_at),
        }
        .then_with(|| position(a).cmp(&position(b)));

        match order {
            SortOrder::Ascending => cmp,
            SortOrder::Descending => cmp.reverse(),
        }
    });
    cards
}
