//! Round history
//!
//! The append-only log of everything that happened in the simulation, one
//! record per completed round. Strategies read it to base decisions on past
//! rounds; the engine appends to it once per round after transfers resolve.
//! A record never changes once appended, and strategies never see the
//! current round's own not-yet-resolved actions.
//!
//! Per-round vectors preserve engine processing order (ascending peer id,
//! then declared order), so every query here has a deterministic,
//! reproducible iteration order.

use serde::{Deserialize, Serialize};

use crate::peer::PeerId;

/// A declared intent to fetch a piece from a specific peer.
/// Valid only within the round it was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// The peer asking for data.
    pub requester: PeerId,
    /// The peer being asked.
    pub target: PeerId,
    /// Piece index being requested.
    pub piece: u32,
    /// First block the requester is missing on that piece.
    pub start_block: u16,
}

impl Request {
    /// Convenience constructor.
    pub fn new(requester: PeerId, target: PeerId, piece: u32, start_block: u16) -> Self {
        Self {
            requester,
            target,
            piece,
            start_block,
        }
    }
}

/// A declared bandwidth allocation from one peer to another.
/// Valid only within the round it was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// The uploading peer.
    pub from: PeerId,
    /// The requester receiving the bandwidth.
    pub to: PeerId,
    /// Bandwidth units (blocks) granted this round.
    pub bandwidth: u32,
}

impl Upload {
    /// Convenience constructor.
    pub fn new(from: PeerId, to: PeerId, bandwidth: u32) -> Self {
        Self { from, to, bandwidth }
    }
}

/// A resolved transfer: the outcome of matching an upload against the
/// requester's requests. Recorded permanently in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Download {
    /// The peer the blocks came from.
    pub from: PeerId,
    /// The peer that received them.
    pub to: PeerId,
    /// Piece the blocks belong to.
    pub piece: u32,
    /// Number of blocks transferred.
    pub blocks: u16,
}

/// Everything that happened in one round: the admitted requests and uploads
/// (after validation and cap enforcement) and the resolved downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Round index, starting at 0.
    pub round: u32,
    /// Requests that entered resolution this round.
    pub requests: Vec<Request>,
    /// Uploads that entered resolution this round.
    pub uploads: Vec<Upload>,
    /// Transfers that actually happened.
    pub downloads: Vec<Download>,
}

/// Append-only log of round records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundHistory {
    records: Vec<RoundRecord>,
}

impl RoundHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// The round currently being played: the index the next record will
    /// get. Strategies only ever see completed rounds below this.
    pub fn current_round(&self) -> u32 {
        self.records.len() as u32
    }

    /// Number of completed rounds.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether any round has completed yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The record for round `round`, if that round has completed.
    pub fn round(&self, round: u32) -> Option<&RoundRecord> {
        self.records.get(round as usize)
    }

    /// The most recently completed round, if any.
    pub fn latest(&self) -> Option<&RoundRecord> {
        self.records.last()
    }

    /// All completed rounds, oldest first.
    pub fn records(&self) -> &[RoundRecord] {
        &self.records
    }

    /// Transfers received by `peer` in round `round`.
    pub fn downloads_to(&self, peer: PeerId, round: u32) -> impl Iterator<Item = &Download> {
        self.round(round)
            .map(|r| r.downloads.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter(move |d| d.to == peer)
    }

    /// Upload decisions made by `peer` in round `round`.
    pub fn uploads_by(&self, peer: PeerId, round: u32) -> impl Iterator<Item = &Upload> {
        self.round(round)
            .map(|r| r.uploads.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter(move |u| u.from == peer)
    }

    /// Total blocks `peer` received from `from` over the last `window`
    /// completed rounds. This is the reciprocity query behind tit-for-tat
    /// unchoking.
    pub fn blocks_received_from(&self, peer: PeerId, from: PeerId, window: u32) -> u32 {
        let current = self.current_round();
        let first = current.saturating_sub(window);
        (first..current)
            .flat_map(|r| self.downloads_to(peer, r))
            .filter(|d| d.from == from)
            .map(|d| d.blocks as u32)
            .sum()
    }

    /// Append a completed round. The round number is assigned here, so
    /// out-of-sequence appends are unrepresentable.
    pub(crate) fn push_round(
        &mut self,
        requests: Vec<Request>,
        uploads: Vec<Upload>,
        downloads: Vec<Download>,
    ) -> u32 {
        let round = self.records.len() as u32;
        self.records.push(RoundRecord {
            round,
            requests,
            uploads,
            downloads,
        });
        round
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u32) -> PeerId {
        PeerId::new(n)
    }

    fn dl(from: u32, to: u32, piece: u32, blocks: u16) -> Download {
        Download {
            from: pid(from),
            to: pid(to),
            piece,
            blocks,
        }
    }

    #[test]
    fn test_round_numbers_are_sequential() {
        let mut history = RoundHistory::new();
        assert_eq!(history.current_round(), 0);

        assert_eq!(history.push_round(vec![], vec![], vec![]), 0);
        assert_eq!(history.push_round(vec![], vec![], vec![]), 1);
        assert_eq!(history.current_round(), 2);
        assert_eq!(history.round(1).unwrap().round, 1);
        assert!(history.round(2).is_none());
    }

    #[test]
    fn test_downloads_to_filters_recipient() {
        let mut history = RoundHistory::new();
        history.push_round(vec![], vec![], vec![dl(0, 1, 2, 3), dl(0, 2, 2, 1)]);

        let got: Vec<_> = history.downloads_to(pid(1), 0).collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].blocks, 3);
        assert_eq!(history.downloads_to(pid(1), 5).count(), 0);
    }

    #[test]
    fn test_uploads_by_filters_sender() {
        let mut history = RoundHistory::new();
        history.push_round(
            vec![],
            vec![Upload::new(pid(0), pid(1), 4), Upload::new(pid(2), pid(1), 2)],
            vec![],
        );

        let got: Vec<_> = history.uploads_by(pid(0), 0).collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].to, pid(1));
    }

    #[test]
    fn test_blocks_received_window() {
        let mut history = RoundHistory::new();
        // round 0: 5 blocks from peer0, round 1: 2 blocks, round 2: 1 block
        history.push_round(vec![], vec![], vec![dl(0, 1, 0, 5)]);
        history.push_round(vec![], vec![], vec![dl(0, 1, 0, 2)]);
        history.push_round(vec![], vec![], vec![dl(0, 1, 1, 1)]);

        // Window of 2 covers rounds 1 and 2 only
        assert_eq!(history.blocks_received_from(pid(1), pid(0), 2), 3);
        // Window larger than history covers everything
        assert_eq!(history.blocks_received_from(pid(1), pid(0), 10), 8);
        // Other senders contribute nothing
        assert_eq!(history.blocks_received_from(pid(1), pid(2), 10), 0);
    }

    #[test]
    fn test_records_serialize() {
        let mut history = RoundHistory::new();
        history.push_round(
            vec![Request::new(pid(1), pid(0), 3, 0)],
            vec![Upload::new(pid(0), pid(1), 4)],
            vec![dl(0, 1, 3, 4)],
        );

        let json = serde_json::to_string(&history).unwrap();
        let back: RoundHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
