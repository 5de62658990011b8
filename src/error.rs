//! Typed error hierarchy for swarmsim
//!
//! Errors are split into two classes: fatal errors that indicate a broken
//! core invariant (`InvalidTransfer`) or unusable configuration
//! (`InvalidConfig`), and recoverable policy violations the engine handles
//! in-round by truncating or dropping the offending action.

use thiserror::Error;

use crate::peer::PeerId;

/// Main error type for the simulation engine
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SimError {
    /// A block transfer would overflow a piece or hit an unknown index.
    /// This is an engine bug: transfer amounts are computed before they
    /// are applied, so the store must never be asked to overfill.
    #[error("invalid transfer: piece {piece} has {have}/{cap} blocks, cannot add {add}")]
    InvalidTransfer {
        piece: u32,
        have: u16,
        add: u16,
        cap: u16,
    },

    /// A strategy uploaded to a peer that never requested anything from it
    /// this round. The upload is dropped.
    #[error("unsolicited upload from {from} to {to} in round {round}")]
    UnsolicitedUpload {
        from: PeerId,
        to: PeerId,
        round: u32,
    },

    /// A strategy returned more requests than its per-round cap.
    /// The first `cap` requests are honored, the rest dropped.
    #[error("{peer} submitted {submitted} requests, cap is {cap}")]
    RequestCapExceeded {
        peer: PeerId,
        submitted: usize,
        cap: usize,
    },

    /// A strategy declared more total upload bandwidth than it has.
    /// Uploads are admitted in order until the cap is reached.
    #[error("{peer} declared {declared} upload bandwidth, cap is {cap}")]
    BandwidthCapExceeded {
        peer: PeerId,
        declared: u64,
        cap: u32,
    },

    /// A strategy call panicked or returned malformed data. The peer
    /// contributes an empty action for the round; the round continues.
    #[error("strategy fault for {peer} in round {round} ({phase}): {reason}")]
    StrategyFault {
        peer: PeerId,
        round: u32,
        phase: &'static str,
        reason: String,
    },

    /// Invalid configuration value
    #[error("invalid config for '{field}': {message}")]
    InvalidConfig {
        field: &'static str,
        message: String,
    },
}

impl SimError {
    /// Check whether this error may abort the simulation.
    ///
    /// Only a core invariant violation (`InvalidTransfer`) or a config
    /// rejected at construction time is fatal; every other kind is handled
    /// in-round by dropping or truncating the offending action.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransfer { .. } | Self::InvalidConfig { .. }
        )
    }

    /// Create an invalid-config error
    pub fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}

/// Result type alias for simulation operations
pub type Result<T> = std::result::Result<T, SimError>;
