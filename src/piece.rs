//! Piece bookkeeping
//!
//! Each peer owns a `PieceStore`: per-piece block-completion counts for the
//! shared file. No real data is stored; the simulation only tracks how many
//! blocks of each piece a peer holds. Counts are monotonically non-decreasing
//! and bounded by `blocks_per_piece`; only whole pieces are advertised to
//! other peers.

use bitvec::prelude::*;

use crate::error::{Result, SimError};

/// Per-peer block-completion counts, one entry per piece index.
///
/// Mutated only by the engine while applying resolved transfers; strategies
/// see it read-only through their own `PeerHandle`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PieceStore {
    counts: Vec<u16>,
    blocks_per_piece: u16,
}

impl PieceStore {
    /// Create an empty store (no blocks held) for `num_pieces` pieces.
    pub fn new(num_pieces: u32, blocks_per_piece: u16) -> Self {
        Self {
            counts: vec![0; num_pieces as usize],
            blocks_per_piece,
        }
    }

    /// Create a store holding every piece complete (a seed's store).
    pub fn full(num_pieces: u32, blocks_per_piece: u16) -> Self {
        Self {
            counts: vec![blocks_per_piece; num_pieces as usize],
            blocks_per_piece,
        }
    }

    /// Number of pieces tracked by this store.
    pub fn num_pieces(&self) -> u32 {
        self.counts.len() as u32
    }

    /// Blocks per piece for this store.
    pub fn blocks_per_piece(&self) -> u16 {
        self.blocks_per_piece
    }

    /// Blocks held for piece `piece`, or `None` if out of range.
    pub fn block_count(&self, piece: u32) -> Option<u16> {
        self.counts.get(piece as usize).copied()
    }

    /// Check whether piece `piece` is complete.
    pub fn has_piece(&self, piece: u32) -> bool {
        self.block_count(piece) == Some(self.blocks_per_piece)
    }

    /// Indices of pieces still missing at least one block, ascending.
    pub fn needed_pieces(&self) -> Vec<u32> {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c < self.blocks_per_piece)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Indices of complete pieces, ascending. Only whole pieces are
    /// advertised to other peers.
    pub fn available_pieces(&self) -> Vec<u32> {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == self.blocks_per_piece)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Advertised pieces as a bitfield (one bit per piece, MSB-first).
    pub fn bitfield(&self) -> BitVec<u8, Msb0> {
        let mut bits = bitvec![u8, Msb0; 0; self.counts.len()];
        for (i, &c) in self.counts.iter().enumerate() {
            if c == self.blocks_per_piece {
                bits.set(i, true);
            }
        }
        bits
    }

    /// Add `n` blocks to piece `piece`.
    ///
    /// Fails with `InvalidTransfer` if the index is out of range or the
    /// addition would exceed `blocks_per_piece`. The engine computes exact
    /// transfer amounts before applying them, so a failure here means a
    /// broken engine invariant, not bad strategy input.
    pub fn apply_blocks(&mut self, piece: u32, n: u16) -> Result<()> {
        let cap = self.blocks_per_piece;
        let have = match self.counts.get_mut(piece as usize) {
            Some(c) => c,
            None => {
                return Err(SimError::InvalidTransfer {
                    piece,
                    have: 0,
                    add: n,
                    cap,
                })
            }
        };
        if n > cap - *have {
            return Err(SimError::InvalidTransfer {
                piece,
                have: *have,
                add: n,
                cap,
            });
        }
        *have += n;
        Ok(())
    }

    /// Number of complete pieces.
    pub fn complete_pieces(&self) -> usize {
        self.counts
            .iter()
            .filter(|&&c| c == self.blocks_per_piece)
            .count()
    }

    /// Total blocks held across all pieces.
    pub fn total_blocks(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// Check whether every piece is complete.
    pub fn is_complete(&self) -> bool {
        self.counts.iter().all(|&c| c == self.blocks_per_piece)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_store() {
        let store = PieceStore::new(3, 4);
        assert_eq!(store.num_pieces(), 3);
        assert!(!store.is_complete());
        assert_eq!(store.needed_pieces(), vec![0, 1, 2]);
        assert!(store.available_pieces().is_empty());
        assert_eq!(store.block_count(1), Some(0));
        assert_eq!(store.block_count(3), None);
    }

    #[test]
    fn test_full_store_is_seed() {
        let store = PieceStore::full(2, 4);
        assert!(store.is_complete());
        assert!(store.needed_pieces().is_empty());
        assert_eq!(store.available_pieces(), vec![0, 1]);
        assert_eq!(store.total_blocks(), 8);
    }

    #[test]
    fn test_partial_piece_not_advertised() {
        let mut store = PieceStore::new(2, 4);
        store.apply_blocks(0, 3).unwrap();
        assert!(!store.has_piece(0));
        assert!(store.available_pieces().is_empty());
        assert_eq!(store.needed_pieces(), vec![0, 1]);

        store.apply_blocks(0, 1).unwrap();
        assert!(store.has_piece(0));
        assert_eq!(store.available_pieces(), vec![0]);
        assert_eq!(store.needed_pieces(), vec![1]);
    }

    #[test]
    fn test_apply_blocks_overflow_rejected() {
        let mut store = PieceStore::new(1, 4);
        store.apply_blocks(0, 3).unwrap();

        let err = store.apply_blocks(0, 2).unwrap_err();
        assert_eq!(
            err,
            SimError::InvalidTransfer {
                piece: 0,
                have: 3,
                add: 2,
                cap: 4,
            }
        );
        // Count untouched after the failed transfer
        assert_eq!(store.block_count(0), Some(3));
    }

    #[test]
    fn test_apply_blocks_out_of_range() {
        let mut store = PieceStore::new(2, 4);
        assert!(store.apply_blocks(2, 1).is_err());
    }

    #[test]
    fn test_bitfield_matches_available() {
        let mut store = PieceStore::new(4, 2);
        store.apply_blocks(1, 2).unwrap();
        store.apply_blocks(3, 2).unwrap();

        let bits = store.bitfield();
        assert!(!bits[0]);
        assert!(bits[1]);
        assert!(!bits[2]);
        assert!(bits[3]);
        assert_eq!(bits.count_ones(), store.complete_pieces());
    }
}
