pub mod board;
pub mod card;
pub mod column;
pub mod identity;
pub mod ids;
mod ordering;
pub mod sorting;
pub mod store;

pub use board::{Board, BoardConfig, InvariantViolation, RetiredHashes};
pub use card::{Card, CardPatch};
pub use column::{slugify, Column};
pub use identity::{resolve, resolve_card, resolve_column, IdentityRegistry};
pub use ids::{BoardId, CardId, ColumnId, EntityId, ExternalHash, Namespace};
pub use sorting::{sorted_cards, SortField, SortOrder};
pub use store::{Applied, BoardStore, Command, DeleteStrategy, Effect};
