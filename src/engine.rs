//! Simulation engine
//!
//! `SwarmEngine` owns the peers, their strategies, the history, and the
//! seeded RNG, and drives the round state machine:
//!
//! COLLECT_REQUESTS -> COLLECT_UPLOADS -> RESOLVE_TRANSFERS ->
//! APPEND_HISTORY -> loop or TERMINATE
//!
//! Every phase processes peers in ascending id order, so a run is fully
//! determined by the config, the peer set, and the strategies. Strategy
//! output is validated and capped here; a faulty strategy costs its peer the
//! round, never the simulation.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{PeerConfig, SimConfig};
use crate::error::{Result, SimError};
use crate::history::{Download, Request, RoundHistory, Upload};
use crate::peer::{Peer, PeerId, PeerSnapshot};
use crate::stats::{SimReport, SwarmProgress};
use crate::strategy::Strategy;

/// The round-based piece-exchange simulation engine.
pub struct SwarmEngine {
    config: SimConfig,
    peers: Vec<Peer>,
    strategies: Vec<Box<dyn Strategy>>,
    history: RoundHistory,
    rng: StdRng,
    completion_round: BTreeMap<PeerId, u32>,
    blocks_moved: u64,
    unsolicited_dropped: u64,
    strategy_faults: u64,
}

impl SwarmEngine {
    /// Create an engine from a validated configuration.
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            config,
            peers: Vec::new(),
            strategies: Vec::new(),
            history: RoundHistory::new(),
            rng,
            completion_round: BTreeMap::new(),
            blocks_moved: 0,
            unsolicited_dropped: 0,
            strategy_faults: 0,
        })
    }

    /// Add a peer with its strategy. Ids are assigned densely in call
    /// order; all peers must be added before the first round runs.
    pub fn add_peer(&mut self, cfg: PeerConfig, strategy: Box<dyn Strategy>) -> PeerId {
        let id = PeerId::new(self.peers.len() as u32);
        let peer = Peer::from_config(id, &cfg, &self.config);
        if peer.is_seed() {
            self.completion_round.insert(id, 0);
        }
        tracing::debug!(
            "added {} ({}) up_bw={} down_bw={} max_requests={}{}",
            id,
            peer.name(),
            peer.up_bw(),
            peer.down_bw(),
            peer.max_requests(),
            if peer.is_seed() { " [seed]" } else { "" }
        );
        self.peers.push(peer);
        self.strategies.push(strategy);
        id
    }

    /// The engine's configuration.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// All peers, in id order.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// A peer by id.
    pub fn peer(&self, id: PeerId) -> Option<&Peer> {
        self.peers.get(id.index() as usize)
    }

    /// The history of completed rounds.
    pub fn history(&self) -> &RoundHistory {
        &self.history
    }

    /// Progress of one peer through the file.
    pub fn progress(&self, id: PeerId) -> Option<SwarmProgress> {
        let peer = self.peer(id)?;
        let store = peer.pieces();
        let total = store.num_pieces() as u64 * store.blocks_per_piece() as u64;
        Some(SwarmProgress {
            total_pieces: store.num_pieces(),
            have_pieces: store.complete_pieces(),
            needed_blocks: total - store.total_blocks(),
        })
    }

    /// Whether every non-seed peer holds the complete file. Vacuously true
    /// for a swarm with no leechers.
    pub fn is_finished(&self) -> bool {
        self.peers
            .iter()
            .filter(|p| !p.is_seed())
            .all(Peer::is_complete)
    }

    /// Play one round. Returns whether the simulation is finished after it.
    pub fn step(&mut self) -> Result<bool> {
        let round = self.history.current_round();
        tracing::debug!("round {} start ({} peers)", round, self.peers.len());

        // One availability snapshot per peer, taken before any decision
        // runs: every strategy this round sees the same swarm state.
        let snapshots: Vec<PeerSnapshot> = self.peers.iter().map(Peer::snapshot).collect();

        // COLLECT_REQUESTS
        let mut requests: Vec<Request> = Vec::new();
        for idx in 0..self.peers.len() {
            let raw = self.invoke_requests(idx, &snapshots, round);
            requests.extend(self.admit_requests(idx, raw, &snapshots, round));
        }

        // COLLECT_UPLOADS
        let mut uploads: Vec<Upload> = Vec::new();
        for idx in 0..self.peers.len() {
            let id = self.peers[idx].id();
            let incoming: Vec<Request> =
                requests.iter().filter(|r| r.target == id).copied().collect();
            let raw = self.invoke_uploads(idx, &incoming, &snapshots, round);
            uploads.extend(self.admit_uploads(idx, raw, round));
        }

        // RESOLVE_TRANSFERS
        let downloads = self.resolve_transfers(&requests, &uploads, round)?;
        tracing::debug!(
            "round {} resolved: {} requests, {} uploads, {} downloads",
            round,
            requests.len(),
            uploads.len(),
            downloads.len()
        );

        // APPEND_HISTORY
        self.history.push_round(requests, uploads, downloads);

        for peer in &self.peers {
            if !peer.is_seed() && peer.is_complete() {
                self.completion_round.entry(peer.id()).or_insert_with(|| {
                    tracing::info!("{} ({}) completed in round {}", peer.id(), peer.name(), round);
                    round
                });
            }
        }

        Ok(self.is_finished())
    }

    /// Play rounds until every leecher completes or the round budget runs
    /// out, then report.
    pub fn run(&mut self) -> Result<SimReport> {
        while !self.is_finished() && self.history.current_round() < self.config.max_rounds {
            self.step()?;
        }
        let report = self.report();
        tracing::info!(
            "simulation finished: {} rounds, all_complete={}, {} blocks moved",
            report.rounds_run,
            report.all_complete,
            report.blocks_moved
        );
        Ok(report)
    }

    /// Snapshot the run's outcome so far.
    pub fn report(&self) -> SimReport {
        SimReport {
            rounds_run: self.history.len() as u32,
            all_complete: self.is_finished(),
            completion_round: self.completion_round.clone(),
            blocks_moved: self.blocks_moved,
            unsolicited_dropped: self.unsolicited_dropped,
            strategy_faults: self.strategy_faults,
        }
    }

    /// Invoke a strategy's request phase, isolating panics.
    fn invoke_requests(
        &mut self,
        idx: usize,
        snapshots: &[PeerSnapshot],
        round: u32,
    ) -> Vec<Request> {
        let peer = &self.peers[idx];
        let handle = peer.handle();
        let visible: Vec<PeerSnapshot> = snapshots
            .iter()
            .filter(|s| s.id() != peer.id())
            .cloned()
            .collect();
        let strategy = &mut self.strategies[idx];
        let history = &self.history;
        let rng = &mut self.rng;

        match catch_unwind(AssertUnwindSafe(|| {
            strategy.requests(&handle, &visible, history, rng)
        })) {
            Ok(requests) => requests,
            Err(_) => {
                self.fault(self.peers[idx].id(), round, "requests", "strategy panicked");
                Vec::new()
            }
        }
    }

    /// Invoke a strategy's upload phase, isolating panics.
    fn invoke_uploads(
        &mut self,
        idx: usize,
        incoming: &[Request],
        snapshots: &[PeerSnapshot],
        round: u32,
    ) -> Vec<Upload> {
        let peer = &self.peers[idx];
        let handle = peer.handle();
        let visible: Vec<PeerSnapshot> = snapshots
            .iter()
            .filter(|s| s.id() != peer.id())
            .cloned()
            .collect();
        let strategy = &mut self.strategies[idx];
        let history = &self.history;
        let rng = &mut self.rng;

        match catch_unwind(AssertUnwindSafe(|| {
            strategy.uploads(&handle, incoming, &visible, history, rng)
        })) {
            Ok(uploads) => uploads,
            Err(_) => {
                self.fault(self.peers[idx].id(), round, "uploads", "strategy panicked");
                Vec::new()
            }
        }
    }

    /// Validate and cap one peer's requests.
    ///
    /// A structurally malformed entry (wrong requester, unknown or self
    /// target, out-of-range piece) voids the whole action. Well-formed
    /// requests for pieces the peer doesn't need or the target doesn't
    /// advertise are dropped individually, duplicates count once, and the
    /// first `max_requests` of what survives are honored.
    fn admit_requests(
        &mut self,
        idx: usize,
        raw: Vec<Request>,
        snapshots: &[PeerSnapshot],
        round: u32,
    ) -> Vec<Request> {
        let id = self.peers[idx].id();

        let malformed = raw.iter().any(|r| {
            r.requester != id
                || r.target == id
                || r.target.index() as usize >= self.peers.len()
                || r.piece >= self.config.num_pieces
        });
        if malformed {
            self.fault(id, round, "requests", "malformed request entry");
            return Vec::new();
        }

        let store = self.peers[idx].pieces();
        let mut admitted: Vec<Request> = Vec::new();
        for r in raw {
            if store.has_piece(r.piece) {
                tracing::debug!(
                    "{} requested piece {} it already has, dropped",
                    id,
                    r.piece
                );
                continue;
            }
            if !snapshots[r.target.index() as usize].has_piece(r.piece) {
                tracing::debug!(
                    "{} requested piece {} from {} which doesn't advertise it, dropped",
                    id,
                    r.piece,
                    r.target
                );
                continue;
            }
            if admitted
                .iter()
                .any(|a| a.target == r.target && a.piece == r.piece)
            {
                continue;
            }
            admitted.push(r);
        }

        let cap = self.peers[idx].max_requests();
        if admitted.len() > cap {
            let err = SimError::RequestCapExceeded {
                peer: id,
                submitted: admitted.len(),
                cap,
            };
            tracing::debug!("round {}: {}", round, err);
            admitted.truncate(cap);
        }
        admitted
    }

    /// Validate and cap one peer's uploads.
    ///
    /// A structurally malformed entry voids the whole action. Entries are
    /// admitted in declared order while the cumulative bandwidth stays
    /// within `up_bw`; the first entry that would exceed the cap and
    /// everything after it is dropped.
    fn admit_uploads(&mut self, idx: usize, raw: Vec<Upload>, round: u32) -> Vec<Upload> {
        let id = self.peers[idx].id();

        let malformed = raw.iter().any(|u| {
            u.from != id || u.to == id || u.to.index() as usize >= self.peers.len()
        });
        if malformed {
            self.fault(id, round, "uploads", "malformed upload entry");
            return Vec::new();
        }

        let cap = self.peers[idx].up_bw();
        let declared: u64 = raw.iter().map(|u| u.bandwidth as u64).sum();

        let mut admitted = Vec::new();
        let mut used: u64 = 0;
        for u in raw {
            if used + u.bandwidth as u64 > cap as u64 {
                let err = SimError::BandwidthCapExceeded {
                    peer: id,
                    declared,
                    cap,
                };
                tracing::debug!("round {}: {}", round, err);
                break;
            }
            used += u.bandwidth as u64;
            admitted.push(u);
        }
        admitted
    }

    /// Resolve admitted uploads against admitted requests into transfers.
    ///
    /// Uploads are processed in collection order. An upload with no
    /// matching request is unsolicited and dropped; otherwise its bandwidth
    /// is applied across the requester's requests to that uploader in
    /// declared order, each transfer bounded by the blocks left on the
    /// piece and the recipient's remaining download bandwidth this round.
    fn resolve_transfers(
        &mut self,
        requests: &[Request],
        uploads: &[Upload],
        round: u32,
    ) -> Result<Vec<Download>> {
        let blocks_per_piece = self.config.blocks_per_piece;
        let mut down_remaining: Vec<u32> = self.peers.iter().map(Peer::down_bw).collect();
        let mut downloads = Vec::new();

        for upload in uploads {
            let matching: Vec<Request> = requests
                .iter()
                .filter(|r| r.requester == upload.to && r.target == upload.from)
                .copied()
                .collect();

            if matching.is_empty() {
                let err = SimError::UnsolicitedUpload {
                    from: upload.from,
                    to: upload.to,
                    round,
                };
                tracing::warn!("{}", err);
                self.unsolicited_dropped += 1;
                continue;
            }

            let to_idx = upload.to.index() as usize;
            let mut bw_left = upload.bandwidth;
            for request in matching {
                if bw_left == 0 {
                    break;
                }
                let have = match self.peers[to_idx].pieces().block_count(request.piece) {
                    Some(h) => h,
                    None => continue,
                };
                let piece_left = (blocks_per_piece - have) as u32;
                let n = bw_left.min(piece_left).min(down_remaining[to_idx]);
                if n == 0 {
                    continue;
                }

                self.peers[to_idx]
                    .pieces_mut()
                    .apply_blocks(request.piece, n as u16)?;
                downloads.push(Download {
                    from: upload.from,
                    to: upload.to,
                    piece: request.piece,
                    blocks: n as u16,
                });
                bw_left -= n;
                down_remaining[to_idx] -= n;
                self.blocks_moved += n as u64;
            }
        }

        Ok(downloads)
    }

    /// Record a strategy fault: log it and count it; the peer contributes
    /// an empty action this round.
    fn fault(&mut self, peer: PeerId, round: u32, phase: &'static str, reason: &str) {
        let err = SimError::StrategyFault {
            peer,
            round,
            phase,
            reason: reason.to_string(),
        };
        tracing::warn!("{}", err);
        self.strategy_faults += 1;
    }
}
