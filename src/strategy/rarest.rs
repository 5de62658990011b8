//! Rarest-first request selection
//!
//! Pieces held by the fewest visible peers are requested first, which keeps
//! rare pieces circulating instead of letting the swarm converge on the
//! common ones. The selection is deterministic except for one uniform
//! shuffle that breaks ties among equally-rare pieces.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::history::{Request, RoundHistory, Upload};
use crate::peer::{PeerHandle, PeerSnapshot};
use crate::strategy::{random_even_split_uploads, Strategy};

/// Per-target unchoke slots used by the baseline upload side.
const UPLOAD_SLOTS: usize = 4;

/// Compute this round's rarest-first requests.
///
/// For every visible peer: intersect its advertised pieces with the
/// requester's needed set. If the intersection fits within `max_requests`,
/// request all of it (ascending piece order). Otherwise rank by ascending
/// availability, keep the entire set tied at the minimum availability in
/// uniformly-shuffled order, append the remaining pieces in
/// ascending-availability order, and truncate to `max_requests`.
///
/// `start_block` on each request is the requester's current block count for
/// that piece.
pub fn select_rarest_first(
    me: &PeerHandle<'_>,
    peers: &[PeerSnapshot],
    rng: &mut StdRng,
) -> Vec<Request> {
    let needed = me.pieces().needed_pieces();
    if needed.is_empty() {
        return Vec::new();
    }

    // Availability count per piece over all visible peers
    let mut availability = vec![0u32; me.pieces().num_pieces() as usize];
    for peer in peers {
        for piece in peer.available_pieces() {
            availability[piece as usize] += 1;
        }
    }

    let mut requests = Vec::new();
    for peer in peers {
        let isect: Vec<u32> = needed
            .iter()
            .copied()
            .filter(|&p| peer.has_piece(p))
            .collect();

        let chosen = if isect.len() <= me.max_requests() {
            isect
        } else {
            // (availability, piece) sorts by rarity first, index second
            let mut ranked: Vec<(u32, u32)> = isect
                .into_iter()
                .map(|p| (availability[p as usize], p))
                .collect();
            ranked.sort_unstable();

            let min_count = ranked[0].0;
            let tied = ranked.iter().take_while(|&&(c, _)| c == min_count).count();

            let mut pieces: Vec<u32> = ranked[..tied].iter().map(|&(_, p)| p).collect();
            pieces.shuffle(rng);
            pieces.extend(ranked[tied..].iter().map(|&(_, p)| p));
            pieces.truncate(me.max_requests());
            pieces
        };

        for piece in chosen {
            let start_block = me.pieces().block_count(piece).unwrap_or(0);
            requests.push(Request::new(me.id(), peer.id(), piece, start_block));
        }
    }

    requests
}

/// Rarest-first client: rarest-first requests plus a baseline upload side
/// that splits bandwidth evenly across up to four random requesters.
#[derive(Debug, Default)]
pub struct RarestFirst;

impl RarestFirst {
    /// Create a rarest-first strategy.
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for RarestFirst {
    fn requests(
        &mut self,
        me: &PeerHandle<'_>,
        peers: &[PeerSnapshot],
        _history: &RoundHistory,
        rng: &mut StdRng,
    ) -> Vec<Request> {
        select_rarest_first(me, peers, rng)
    }

    fn uploads(
        &mut self,
        me: &PeerHandle<'_>,
        incoming: &[Request],
        _peers: &[PeerSnapshot],
        _history: &RoundHistory,
        rng: &mut StdRng,
    ) -> Vec<Upload> {
        random_even_split_uploads(me, incoming, UPLOAD_SLOTS, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitvec::prelude::*;
    use rand::SeedableRng;

    use crate::config::{PeerConfig, SimConfig};
    use crate::peer::{Peer, PeerId};

    fn snapshot(id: u32, pieces: &[u32], num_pieces: usize) -> PeerSnapshot {
        let mut have = bitvec![u8, Msb0; 0; num_pieces];
        for &p in pieces {
            have.set(p as usize, true);
        }
        PeerSnapshot::from_bitfield(PeerId::new(id), have)
    }

    fn leech(num_pieces: u32, max_requests: usize) -> Peer {
        let sim = SimConfig::new(num_pieces, 4).default_max_requests(max_requests);
        Peer::from_config(PeerId::new(0), &PeerConfig::new("leech"), &sim)
    }

    #[test]
    fn test_requests_everything_when_under_cap() {
        let peer = leech(4, 4);
        let peers = vec![snapshot(1, &[0, 2], 4)];
        let mut rng = StdRng::seed_from_u64(0);

        let requests = select_rarest_first(&peer.handle(), &peers, &mut rng);

        let mut pieces: Vec<u32> = requests.iter().map(|r| r.piece).collect();
        pieces.sort_unstable();
        assert_eq!(pieces, vec![0, 2]);
        assert!(requests.iter().all(|r| r.target == PeerId::new(1)));
    }

    #[test]
    fn test_rarest_tied_set_always_chosen() {
        // Availability: piece 0 -> 1 peer, piece 1 -> 1 peer, piece 2 -> 3
        // peers. With a cap of 2, the tied-rarest {0, 1} must be chosen and
        // piece 2 never, whatever the shuffle seed.
        for seed in 0..32 {
            let peer = leech(3, 2);
            let peers = vec![
                snapshot(1, &[0, 1, 2], 3),
                snapshot(2, &[2], 3),
                snapshot(3, &[2], 3),
            ];
            let mut rng = StdRng::seed_from_u64(seed);

            let requests = select_rarest_first(&peer.handle(), &peers, &mut rng);

            // Peer 1 advertises all three; its two slots must be the rare pair
            let mut to_one: Vec<u32> = requests
                .iter()
                .filter(|r| r.target == PeerId::new(1))
                .map(|r| r.piece)
                .collect();
            to_one.sort_unstable();
            assert_eq!(to_one, vec![0, 1], "seed {}", seed);
        }
    }

    #[test]
    fn test_cap_applies_per_target() {
        let peer = leech(6, 2);
        let peers = vec![snapshot(1, &[0, 1, 2, 3, 4, 5], 6)];
        let mut rng = StdRng::seed_from_u64(3);

        let requests = select_rarest_first(&peer.handle(), &peers, &mut rng);
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn test_no_requests_when_complete() {
        let sim = SimConfig::new(3, 4);
        let seed_peer = Peer::from_config(PeerId::new(0), &PeerConfig::new("s").seed(true), &sim);
        let peers = vec![snapshot(1, &[0, 1, 2], 3)];
        let mut rng = StdRng::seed_from_u64(0);

        assert!(select_rarest_first(&seed_peer.handle(), &peers, &mut rng).is_empty());
    }

    #[test]
    fn test_start_block_reflects_partial_progress() {
        let sim = SimConfig::new(2, 4);
        let mut peer = Peer::from_config(PeerId::new(0), &PeerConfig::new("p"), &sim);
        peer.pieces_mut().apply_blocks(1, 2).unwrap();

        let peers = vec![snapshot(1, &[1], 2)];
        let mut rng = StdRng::seed_from_u64(0);
        let requests = select_rarest_first(&peer.handle(), &peers, &mut rng);

        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].piece, 1);
        assert_eq!(requests[0].start_block, 2);
    }
}
