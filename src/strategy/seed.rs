//! Seed upload policy
//!
//! A seed holds the complete file and never requests anything; each round it
//! splits its bandwidth evenly across up to four randomly chosen requesters.

use rand::rngs::StdRng;

use crate::history::{Request, RoundHistory, Upload};
use crate::peer::{PeerHandle, PeerSnapshot};
use crate::strategy::{random_even_split_uploads, Strategy};

/// Unchoke slots a seed serves per round.
const UPLOAD_SLOTS: usize = 4;

/// Upload-only strategy for peers that start with the complete file.
#[derive(Debug, Default)]
pub struct Seed;

impl Seed {
    /// Create a seed strategy.
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for Seed {
    fn requests(
        &mut self,
        _me: &PeerHandle<'_>,
        _peers: &[PeerSnapshot],
        _history: &RoundHistory,
        _rng: &mut StdRng,
    ) -> Vec<Request> {
        Vec::new()
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
