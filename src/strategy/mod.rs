//! Strategy interface
//!
//! A strategy is a peer's decision logic: once per round it is asked which
//! pieces to request from which peers, then which requesting peers to upload
//! to and at what bandwidth. Strategies operate on read-only snapshots and a
//! seeded RNG owned by the engine, so identically-seeded runs replay
//! identically.
//!
//! Any type implementing [`Strategy`] is a valid plugin; the engine enforces
//! the request and bandwidth caps regardless of what a strategy returns.

mod propshare;
mod rarest;
mod seed;
mod tit_for_tat;

pub use propshare::PropShare;
pub use rarest::{select_rarest_first, RarestFirst};
pub use seed::Seed;
pub use tit_for_tat::TitForTat;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::history::{Request, RoundHistory, Upload};
use crate::peer::{PeerHandle, PeerId, PeerSnapshot};

/// A peer's per-round decision logic.
///
/// Both methods are invoked exactly once per round, requests first, with
/// read-only views: the peer's own state, a snapshot of every other peer,
/// and the history of all completed rounds. The engine validates and caps
/// whatever comes back (see the engine module for the exact policies).
pub trait Strategy {
    /// Decide which pieces to request from which peers this round.
    ///
    /// Only pieces the peer still needs, only from peers advertising them;
    /// at most `me.max_requests()` requests are honored (first in returned
    /// order).
    fn requests(
        &mut self,
        me: &PeerHandle<'_>,
        peers: &[PeerSnapshot],
        history: &RoundHistory,
        rng: &mut StdRng,
    ) -> Vec<Request>;

    /// Decide which requesting peers to upload to and at what bandwidth.
    ///
    /// `incoming` holds the requests addressed to this peer this round.
    /// Total declared bandwidth beyond `me.up_bw()` is truncated in returned
    /// order; uploads to peers absent from `incoming` are dropped as
    /// unsolicited.
    fn uploads(
        &mut self,
        me: &PeerHandle<'_>,
        incoming: &[Request],
        peers: &[PeerSnapshot],
        history: &RoundHistory,
        rng: &mut StdRng,
    ) -> Vec<Upload>;
}

/// Split `total_bw` evenly across `n` recipients.
///
/// Each share is `total_bw / n`, and the first `total_bw % n` recipients
/// (in the order they are given) get one extra unit, so the shares sum to
/// `total_bw` and differ by at most 1. Returns an empty vector for `n == 0`.
pub fn even_split(total_bw: u32, n: usize) -> Vec<u32> {
    if n == 0 {
        return Vec::new();
    }
    let n32 = n as u32;
    let base = total_bw / n32;
    let remainder = (total_bw % n32) as usize;
    (0..n)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Distinct requester ids from an incoming request list, in first-seen
/// order. First-seen order is the tie-break order several policies use.
pub fn distinct_requesters(incoming: &[Request]) -> Vec<PeerId> {
    let mut seen = Vec::new();
    for request in incoming {
        if !seen.contains(&request.requester) {
            seen.push(request.requester);
        }
    }
    seen
}

/// The baseline upload policy: unchoke up to `slots` distinct requesters
/// chosen uniformly at random and split the bandwidth evenly among them.
pub(crate) fn random_even_split_uploads(
    me: &PeerHandle<'_>,
    incoming: &[Request],
    slots: usize,
    rng: &mut StdRng,
) -> Vec<Upload> {
    let mut requesters = distinct_requesters(incoming);
    requesters.shuffle(rng);
    requesters.truncate(slots);

    let shares = even_split(me.up_bw(), requesters.len());
    requesters
        .into_iter()
        .zip(shares)
        .map(|(to, bandwidth)| Upload::new(me.id(), to, bandwidth))
        .collect()
}
