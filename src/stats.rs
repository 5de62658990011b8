//! Progress and reporting
//!
//! Per-peer progress snapshots and the end-of-run report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::peer::PeerId;

/// Progress of one peer through the shared file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwarmProgress {
    /// Total number of pieces in the file
    pub total_pieces: u32,
    /// Complete pieces this peer holds
    pub have_pieces: usize,
    /// Blocks still missing across all pieces
    pub needed_blocks: u64,
}

impl SwarmProgress {
    /// Percentage of pieces complete
    pub fn percentage(&self) -> f64 {
        if self.total_pieces == 0 {
            return 0.0;
        }
        (self.have_pieces as f64 / self.total_pieces as f64) * 100.0
    }
}

/// Summary of a finished simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimReport {
    /// Rounds actually played
    pub rounds_run: u32,
    /// Whether every non-seed peer finished within the round budget
    pub all_complete: bool,
    /// Round in which each peer completed the file (seeds are recorded at
    /// round 0; peers that never finished are absent)
    pub completion_round: BTreeMap<PeerId, u32>,
    /// Total blocks transferred across the whole run
    pub blocks_moved: u64,
    /// Uploads dropped because no matching request existed
    pub unsolicited_dropped: u64,
    /// Strategy invocations that panicked or returned malformed data
    pub strategy_faults: u64,
}
