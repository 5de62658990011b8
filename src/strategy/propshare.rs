//! Proportional-share uploading
//!
//! Bandwidth is split among requesters in proportion to the blocks each of
//! them sent in the previous round, with a tenth of the budget reserved for
//! one random optimistic unchoke among the requesters that sent nothing.

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;

use crate::history::{Request, RoundHistory, Upload};
use crate::peer::{PeerHandle, PeerSnapshot};
use crate::strategy::{distinct_requesters, select_rarest_first, Strategy};

/// Fraction of upload bandwidth reserved for the optimistic unchoke.
const OPTIMISTIC_SHARE: f64 = 0.1;

/// Proportional-share client: rarest-first requests, uploads split
/// proportionally to last round's received blocks.
#[derive(Debug, Default)]
pub struct PropShare;

impl PropShare {
    /// Create a proportional-share strategy.
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for PropShare {
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
        let mut requesters = distinct_requesters(incoming);
        requesters.sort_unstable();
        if requesters.is_empty() {
            return Vec::new();
        }

        let round = history.current_round();
        // Blocks each requester sent us in the previous round
        let contributions: Vec<(crate::peer::PeerId, u32)> = requesters
            .iter()
            .filter_map(|&p| {
                if round == 0 {
                    return None;
                }
                let blocks = history.blocks_received_from(me.id(), p, 1);
                (blocks > 0).then_some((p, blocks))
            })
            .collect();

        // Nobody reciprocated yet: the whole budget goes to one random
        // optimistic pick.
        if contributions.is_empty() {
            return match requesters.choose(rng) {
                Some(&to) => vec![Upload::new(me.id(), to, me.up_bw())],
                None => Vec::new(),
            };
        }

        let total: u32 = contributions.iter().map(|&(_, b)| b).sum();
        let budget = me.up_bw() as f64 * (1.0 - OPTIMISTIC_SHARE);

        let mut uploads: Vec<Upload> = contributions
            .iter()
            .filter_map(|&(p, blocks)| {
                let bw = (blocks as f64 / total as f64 * budget) as u32;
                (bw > 0).then(|| Upload::new(me.id(), p, bw))
            })
            .collect();

        // Optimistic slot among requesters with no standing
        let newcomers: Vec<_> = requesters
            .iter()
            .copied()
            .filter(|p| !contributions.iter().any(|&(c, _)| c == *p))
            .collect();
        if let Some(&to) = newcomers.choose(rng) {
            let bw = (me.up_bw() as f64 * OPTIMISTIC_SHARE) as u32;
            if bw > 0 {
                uploads.push(Upload::new(me.id(), to, bw));
            }
        }

        uploads
    }
}
