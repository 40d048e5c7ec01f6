//! Issuing and resolving external hashes.
//!
//! Hashes are drawn at random from a 36-symbol alphabet and checked against every
//! hash the namespace has ever held on the board, including retired ones, so a
//! hash refers forever to its original entity or to nothing.

use crate::domain::board::Board;
use crate::domain::ids::{CardId, ColumnId, EntityId, ExternalHash, Namespace};
use crate::error::{BoardError, EntityKind, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Upper bound on redraws before a namespace is considered full
const MAX_DRAWS: usize = 10_000;

/// Issues collision-checked external hashes
#[derive(Debug)]
pub struct IdentityRegistry<R = StdRng> {
    rng: R,
}

impl IdentityRegistry<StdRng> {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Deterministic registry, for reproducible boards in tests and fixtures
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl Default for IdentityRegistry<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> IdentityRegistry<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Draws a hash not yet used in `namespace` on `board`
    pub fn issue(&mut self, board: &Board, namespace: Namespace) -> Result<ExternalHash> {
        for attempt in 0..MAX_DRAWS {
            let hash = self.draw();
            if !board.hash_in_use(namespace, &hash) {
                return Ok(hash);
            }
            debug!(
                board = %board.id,
                %namespace,
                %hash,
                attempt,
                "external hash collision, redrawing"
            );
        }

        Err(BoardError::HashSpaceExhausted {
            namespace: namespace.to_string(),
            attempts: MAX_DRAWS,
        })
    }

    fn draw(&mut self) -> ExternalHash {
        let mut indices = [0usize; ExternalHash::LEN];
        for index in indices.iter_mut() {
            *index = self.rng.random_range(0..ExternalHash::ALPHABET.len());
        }
        ExternalHash::from_indices(indices)
    }
}

/// Resolves a hash to the live entity holding it in `namespace`
pub fn resolve(board: &Board, namespace: Namespace, hash: &ExternalHash) -> Result<EntityId> {
    match namespace {
        Namespace::Card => resolve_card(board, hash).map(EntityId::Card),
        Namespace::Column => resolve_column(board, hash).map(EntityId::Column),
    }
}

pub fn resolve_card(board: &Board, hash: &ExternalHash) -> Result<CardId> {
    board
        .card_by_hash(hash)
        .map(|card| card.id)
        .ok_or_else(|| BoardError::not_found(EntityKind::Card, hash))
}

pub fn resolve_column(board: &Board, hash: &ExternalHash) -> Result<ColumnId> {
    board
        .column_by_hash(hash)
        .map(|column| column.id)
        .ok_or_else(|| BoardError::not_found(EntityKind::Column, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::board::BoardConfig;
    use crate::domain::card::Card;
    use crate::domain::ids::BoardId;
    use rand::RngCore;
    use std::str::FromStr;

    /// Always yields zero, so every draw produces the same token
    struct ConstantRng;

    impl RngCore for ConstantRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    fn board() -> Board {
        BoardConfig::default()
            .instantiate(BoardId::from_str("ids").unwrap())
            .unwrap()
    }

    #[test]
    fn test_issued_hash_format() {
        let mut registry = IdentityRegistry::seeded(7);
        let hash = registry.issue(&board(), Namespace::Card).unwrap();

        assert_eq!(hash.as_str().len(), 4);
        assert!(hash
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn test_redraws_on_collision() {
        let mut board = board();
        let mut fixed = IdentityRegistry::with_rng(ConstantRng);
        let first = fixed.issue(&board, Namespace::Card).unwrap();

        let column = board.column_order[0];
        let mut card = Card::new(column, 0, "Holder".to_string());
        card.external_hash = Some(first.clone());
        board.cards.insert(card.id, card);

        let err = fixed.issue(&board, Namespace::Card).unwrap_err();
        assert!(matches!(err, BoardError::HashSpaceExhausted { .. }));

        let mut seeded = IdentityRegistry::seeded(1);
        let second = seeded.issue(&board, Namespace::Card).unwrap();
        assert_ne!(second, first);
    }

    #[test]
    fn test_retired_hashes_are_never_reissued() {
        let mut board = board();
        let mut fixed = IdentityRegistry::with_rng(ConstantRng);
        let hash = fixed.issue(&board, Namespace::Card).unwrap();

        board.retired_hashes.retire(Namespace::Card, hash);
        assert!(fixed.issue(&board, Namespace::Card).is_err());
    }

    #[test]
    fn test_namespaces_are_independent() {
        let mut board = board();
        let mut fixed = IdentityRegistry::with_rng(ConstantRng);
        let token = fixed.issue(&board, Namespace::Card).unwrap();

        let column = board.column_order[0];
        if let Some(c) = board.columns.get_mut(&column) {
            c.external_hash = Some(token.clone());
        }

        // The token is taken among columns but still free among cards
        assert_eq!(fixed.issue(&board, Namespace::Card).unwrap(), token);
        assert!(fixed.issue(&board, Namespace::Column).is_err());
    }

    #[test]
    fn test_resolve() {
        let board = board();
        let column = board.ordered_columns().next().unwrap();
        let hash = column.external_hash.clone().unwrap();

        assert_eq!(
            resolve(&board, Namespace::Column, &hash).unwrap(),
            EntityId::Column(column.id)
        );
        assert!(matches!(
            resolve(&board, Namespace::Card, &hash),
            Err(BoardError::NotFound { .. })
        ));
    }
}
