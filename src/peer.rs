//! Peer identity and per-peer simulation state
//!
//! A `Peer` is a simulation participant: an identity, a `PieceStore`,
//! bandwidth caps, a per-round request cap, and a seed flag. Peers are
//! created once at simulation start and mutated only by the engine while it
//! applies resolved transfers.
//!
//! Strategies never see `Peer` directly. They get a `PeerHandle` for their
//! own state and a list of `PeerSnapshot`s for everyone else. The snapshot
//! carries only what a real peer would advertise: its identity and which
//! pieces it has.

use std::fmt;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{PeerConfig, SimConfig};
use crate::piece::PieceStore;

/// Unique identifier for a peer.
///
/// Assigned densely by the engine in creation order, so ascending id is
/// also discovery order, the tie-break order used by strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(u32);

impl PeerId {
    /// Create a peer id from its dense index.
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    /// The dense index backing this id.
    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer{}", self.0)
    }
}

/// A simulation participant.
#[derive(Debug)]
pub struct Peer {
    id: PeerId,
    name: String,
    pieces: PieceStore,
    up_bw: u32,
    down_bw: u32,
    max_requests: usize,
    is_seed: bool,
}

impl Peer {
    /// Build a peer from its config, filling unset caps from the simulation
    /// defaults. Seeds start with every piece complete.
    pub(crate) fn from_config(id: PeerId, cfg: &PeerConfig, sim: &SimConfig) -> Self {
        let pieces = if cfg.is_seed {
            PieceStore::full(sim.num_pieces, sim.blocks_per_piece)
        } else {
            PieceStore::new(sim.num_pieces, sim.blocks_per_piece)
        };
        Self {
            id,
            name: cfg.name.clone(),
            pieces,
            up_bw: cfg.up_bw.unwrap_or(sim.default_up_bw),
            down_bw: cfg.down_bw.unwrap_or(sim.default_down_bw),
            max_requests: cfg.max_requests.unwrap_or(sim.default_max_requests),
            is_seed: cfg.is_seed,
        }
    }

    /// This peer's id.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Display name (for logs and reports).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The peer's piece inventory.
    pub fn pieces(&self) -> &PieceStore {
        &self.pieces
    }

    pub(crate) fn pieces_mut(&mut self) -> &mut PieceStore {
        &mut self.pieces
    }

    /// Upload bandwidth in blocks per round.
    pub fn up_bw(&self) -> u32 {
        self.up_bw
    }

    /// Download bandwidth in blocks per round.
    pub fn down_bw(&self) -> u32 {
        self.down_bw
    }

    /// Cap on requests honored per round.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Whether this peer started with the complete file.
    pub fn is_seed(&self) -> bool {
        self.is_seed
    }

    /// Whether this peer holds every block of every piece.
    pub fn is_complete(&self) -> bool {
        self.pieces.is_complete()
    }

    /// Read-only view of this peer's own state, handed to its strategy.
    pub fn handle(&self) -> PeerHandle<'_> {
        PeerHandle {
            id: self.id,
            pieces: &self.pieces,
            up_bw: self.up_bw,
            down_bw: self.down_bw,
            max_requests: self.max_requests,
        }
    }

    /// What other peers see of this one: id plus advertised pieces.
    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot {
            id: self.id,
            have: self.pieces.bitfield(),
        }
    }
}

/// Read-only view of a strategy's own peer.
///
/// This is the exact surface the decision functions operate on: identity,
/// piece inventory, bandwidth caps, and the request cap.
#[derive(Debug, Clone, Copy)]
pub struct PeerHandle<'a> {
    id: PeerId,
    pieces: &'a PieceStore,
    up_bw: u32,
    down_bw: u32,
    max_requests: usize,
}

impl<'a> PeerHandle<'a> {
    /// This peer's id.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Own piece inventory, including partial pieces.
    pub fn pieces(&self) -> &'a PieceStore {
        self.pieces
    }

    /// Upload bandwidth in blocks per round.
    pub fn up_bw(&self) -> u32 {
        self.up_bw
    }

    /// Download bandwidth in blocks per round.
    pub fn down_bw(&self) -> u32 {
        self.down_bw
    }

    /// Cap on requests honored per round.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }
}

/// What a peer advertises to the rest of the swarm: its identity and a
/// bitfield of complete pieces. Partial pieces are not visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    id: PeerId,
    have: BitVec<u8, Msb0>,
}

impl PeerSnapshot {
    /// Build a snapshot directly from an id and a bitfield. Mostly useful
    /// for exercising strategies without an engine.
    pub fn from_bitfield(id: PeerId, have: BitVec<u8, Msb0>) -> Self {
        Self { id, have }
    }

    /// The advertising peer's id.
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Whether this peer advertises piece `piece`.
    pub fn has_piece(&self, piece: u32) -> bool {
        self.have.get(piece as usize).map(|b| *b).unwrap_or(false)
    }

    /// Indices of advertised pieces, ascending.
    pub fn available_pieces(&self) -> Vec<u32> {
        self.have.iter_ones().map(|i| i as u32).collect()
    }

    /// Number of advertised pieces.
    pub fn piece_count(&self) -> usize {
        self.have.count_ones()
    }
}
