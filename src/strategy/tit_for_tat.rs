//! Reciprocal unchoking
//!
//! The standard-client upload policy: reward the requesters that sent the
//! most blocks over the previous two rounds, keep one optimistic slot open
//! to discover new trading partners, and smooth the optimistic slot every
//! third round so it doesn't oscillate away from a partner that was just
//! discovered.

use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;

use crate::history::{Request, RoundHistory, Upload};
use crate::peer::{PeerHandle, PeerId, PeerSnapshot};
use crate::strategy::{distinct_requesters, even_split, select_rarest_first, Strategy};

/// Total unchoke slots per round.
const UNCHOKE_SLOTS: usize = 4;

/// Slots reserved for reciprocity (the rest is the optimistic slot).
const RECIPROCAL_SLOTS: usize = 3;

/// Rounds of download history consulted for reciprocity ranking.
const RANKING_WINDOW: u32 = 2;

/// Reciprocal ("tit-for-tat") client: rarest-first requests, reciprocity-
/// ranked uploads with an optimistic slot.
#[derive(Debug, Default)]
pub struct TitForTat {
    /// Peer granted the optimistic slot last round, if any.
    last_optimistic: Option<PeerId>,
}

impl TitForTat {
    /// Create a tit-for-tat strategy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rank requesters by blocks received from them over the ranking
    /// window, descending; ties keep ascending-id order.
    fn rank_requesters(
        me: &PeerHandle<'_>,
        requesters: &[PeerId],
        history: &RoundHistory,
    ) -> Vec<PeerId> {
        let mut ranked: Vec<(u32, PeerId)> = requesters
            .iter()
            .map(|&p| (history.blocks_received_from(me.id(), p, RANKING_WINDOW), p))
            .collect();
        ranked.sort_by_key(|&(_, p)| p);
        ranked.sort_by(|a, b| b.0.cmp(&a.0));
        ranked.into_iter().map(|(_, p)| p).collect()
    }
}

impl Strategy for TitForTat {
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
        history: &RoundHistory,
        rng: &mut StdRng,
    ) -> Vec<Upload> {
        let round = history.current_round();
        let mut requesters = distinct_requesters(incoming);
        requesters.sort_unstable();

        if requesters.is_empty() {
            self.last_optimistic = None;
            return Vec::new();
        }

        let mut chosen: Vec<PeerId>;
        let mut optimistic = None;

        if round < RANKING_WINDOW {
            // Warm-up: no usable history yet, unchoke at random
            requesters.shuffle(rng);
            requesters.truncate(UNCHOKE_SLOTS);
            chosen = requesters;
        } else {
            let ranked = Self::rank_requesters(me, &requesters, history);
            chosen = ranked.iter().copied().take(RECIPROCAL_SLOTS).collect();
            let mut rest: Vec<PeerId> = ranked.into_iter().skip(RECIPROCAL_SLOTS).collect();

            // Optimistic slot. Every third round the previous round's
            // optimistic peer is carried over if it isn't already a
            // reciprocal pick; otherwise a fresh random choice.
            if chosen.len() < UNCHOKE_SLOTS && !rest.is_empty() {
                if round % 3 == 0 {
                    optimistic = self
                        .last_optimistic
                        .filter(|p| rest.contains(p));
                }
                if optimistic.is_none() {
                    optimistic = rest.choose(rng).copied();
                }
                if let Some(p) = optimistic {
                    chosen.push(p);
                    rest.retain(|&r| r != p);
                }
            }

            // Fill remaining slots randomly when the reciprocal ranks
            // couldn't (fewer than three requesters with any standing)
            while chosen.len() < UNCHOKE_SLOTS && !rest.is_empty() {
                let idx = rng.random_range(0..rest.len());
                chosen.push(rest.swap_remove(idx));
            }
        }

        self.last_optimistic = optimistic;

        let shares = even_split(me.up_bw(), chosen.len());
        chosen
            .into_iter()
            .zip(shares)
            .map(|(to, bandwidth)| Upload::new(me.id(), to, bandwidth))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    use crate::config::{PeerConfig, SimConfig};
    use crate::history::Download;
    use crate::peer::Peer;

    fn pid(n: u32) -> PeerId {
        PeerId::new(n)
    }

    fn uploader(up_bw: u32) -> Peer {
        let sim = SimConfig::new(4, 4);
        let cfg = PeerConfig::new("me").up_bw(up_bw).seed(true);
        Peer::from_config(pid(0), &cfg, &sim)
    }

    fn request_from(n: u32) -> Request {
        Request::new(pid(n), pid(0), 0, 0)
    }

    /// History where peer `from` sent `blocks` to peer 0 in each of the
    /// last `rounds` rounds.
    fn history_with(downloads_per_round: &[Vec<(u32, u16)>]) -> RoundHistory {
        let mut history = RoundHistory::new();
        for round in downloads_per_round {
            let downloads = round
                .iter()
                .map(|&(from, blocks)| Download {
                    from: pid(from),
                    to: pid(0),
                    piece: 0,
                    blocks,
                })
                .collect();
            history.push_round(Vec::new(), Vec::new(), downloads);
        }
        history
    }

    #[test]
    fn test_no_requesters_no_uploads() {
        let peer = uploader(8);
        let mut strat = TitForTat::new();
        let mut rng = StdRng::seed_from_u64(0);
        let uploads = strat.uploads(&peer.handle(), &[], &[], &RoundHistory::new(), &mut rng);
        assert!(uploads.is_empty());
    }

    #[test]
    fn test_warmup_rounds_pick_up_to_four_random() {
        let peer = uploader(8);
        let mut strat = TitForTat::new();
        let mut rng = StdRng::seed_from_u64(1);
        let incoming: Vec<Request> = (1..=6).map(request_from).collect();

        let uploads = strat.uploads(
            &peer.handle(),
            &incoming,
            &[],
            &RoundHistory::new(),
            &mut rng,
        );

        assert_eq!(uploads.len(), 4);
        assert_eq!(uploads.iter().map(|u| u.bandwidth).sum::<u32>(), 8);
        let mut tos: Vec<_> = uploads.iter().map(|u| u.to).collect();
        tos.sort();
        tos.dedup();
        assert_eq!(tos.len(), 4);
    }

    #[test]
    fn test_reciprocity_ranks_top_three() {
        let peer = uploader(9);
        let mut strat = TitForTat::new();
        let mut rng = StdRng::seed_from_u64(2);

        // Two completed rounds: peer3 sent most, then peer1, then peer2;
        // peers 4 and 5 sent nothing.
        let history = history_with(&[
            vec![(3, 4), (1, 2)],
            vec![(3, 3), (1, 2), (2, 1)],
        ]);
        let incoming: Vec<Request> = (1..=5).map(request_from).collect();

        let uploads = strat.uploads(&peer.handle(), &incoming, &[], &history, &mut rng);

        let tos: Vec<_> = uploads.iter().map(|u| u.to).collect();
        // Top three by blocks received: 3 (7), 1 (4), 2 (1)
        assert!(tos.contains(&pid(3)));
        assert!(tos.contains(&pid(1)));
        assert!(tos.contains(&pid(2)));
        // Plus exactly one optimistic pick among the rest
        assert_eq!(uploads.len(), 4);
        assert!(tos.contains(&pid(4)) || tos.contains(&pid(5)));
    }

    #[test]
    fn test_reciprocity_ties_break_by_ascending_id() {
        let peer = uploader(6);
        let mut strat = TitForTat::new();
        let mut rng = StdRng::seed_from_u64(7);

        // Four requesters, all with identical history; only three
        // reciprocal slots. The tie must resolve to the three lowest ids.
        let history = history_with(&[
            vec![(1, 2), (2, 2), (3, 2), (4, 2)],
            vec![(1, 2), (2, 2), (3, 2), (4, 2)],
        ]);
        let incoming: Vec<Request> = (1..=4).map(request_from).collect();

        let uploads = strat.uploads(&peer.handle(), &incoming, &[], &history, &mut rng);
        let reciprocal: Vec<_> = uploads.iter().take(3).map(|u| u.to).collect();
        assert_eq!(reciprocal, vec![pid(1), pid(2), pid(3)]);
    }

    #[test]
    fn test_optimistic_carry_over_on_third_rounds() {
        let peer = uploader(8);
        let mut strat = TitForTat::new();
        let mut rng = StdRng::seed_from_u64(3);

        // Rounds 0..5 of history so current_round() == 5; peers 1-3 have
        // standing, 4 and 5 do not.
        let per_round: Vec<Vec<(u32, u16)>> = (0..5)
            .map(|_| vec![(1, 3), (2, 2), (3, 1)])
            .collect();
        let mut history = history_with(&per_round);
        let incoming: Vec<Request> = (1..=5).map(request_from).collect();

        // Round 5: fresh optimistic pick among {4, 5}
        let uploads = strat.uploads(&peer.handle(), &incoming, &[], &history, &mut rng);
        let optimistic = uploads[3].to;
        assert!(optimistic == pid(4) || optimistic == pid(5));

        // Round 6 (divisible by 3): the previous optimistic is carried
        history.push_round(Vec::new(), Vec::new(), Vec::new());
        let uploads = strat.uploads(&peer.handle(), &incoming, &[], &history, &mut rng);
        assert_eq!(uploads[3].to, optimistic);
    }

    #[test]
    fn test_bandwidth_split_evenly() {
        let peer = uploader(10);
        let mut strat = TitForTat::new();
        let mut rng = StdRng::seed_from_u64(4);
        let incoming: Vec<Request> = (1..=3).map(request_from).collect();

        let uploads = strat.uploads(
            &peer.handle(),
            &incoming,
            &[],
            &RoundHistory::new(),
            &mut rng,
        );

        assert_eq!(uploads.len(), 3);
        let mut shares: Vec<u32> = uploads.iter().map(|u| u.bandwidth).collect();
        assert_eq!(shares.iter().sum::<u32>(), 10);
        shares.sort_unstable();
        assert!(shares[2] - shares[0] <= 1);
    }
}
