//! Simulation configuration
//!
//! This module contains all configuration for a simulation run: the shared
//! file's shape, the round budget, the RNG seed, and per-peer defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Main configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of pieces in the shared file
    pub num_pieces: u32,

    /// Blocks per piece (engine-wide constant)
    pub blocks_per_piece: u16,

    /// Maximum number of rounds before the run is cut off
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Seed for the simulation RNG. Two runs with the same config, peers,
    /// and strategies produce identical histories.
    #[serde(default)]
    pub seed: u64,

    /// Default upload bandwidth (blocks/round) for peers that don't set one
    #[serde(default = "default_up_bw")]
    pub default_up_bw: u32,

    /// Default download bandwidth (blocks/round) for peers that don't set one
    #[serde(default = "default_down_bw")]
    pub default_down_bw: u32,

    /// Default cap on requests honored per peer per round
    #[serde(default = "default_max_requests")]
    pub default_max_requests: usize,
}

fn default_max_rounds() -> u32 {
    100
}

fn default_up_bw() -> u32 {
    4
}

fn default_down_bw() -> u32 {
    8
}

fn default_max_requests() -> usize {
    4
}

impl SimConfig {
    /// Create a config for a file of `num_pieces` pieces of
    /// `blocks_per_piece` blocks each, with default everything else.
    pub fn new(num_pieces: u32, blocks_per_piece: u16) -> Self {
        Self {
            num_pieces,
            blocks_per_piece,
            max_rounds: default_max_rounds(),
            seed: 0,
            default_up_bw: default_up_bw(),
            default_down_bw: default_down_bw(),
            default_max_requests: default_max_requests(),
        }
    }

    /// Set the round budget
    pub fn max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    /// Set the RNG seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the default upload bandwidth
    pub fn default_up_bw(mut self, bw: u32) -> Self {
        self.default_up_bw = bw;
        self
    }

    /// Set the default download bandwidth
    pub fn default_down_bw(mut self, bw: u32) -> Self {
        self.default_down_bw = bw;
        self
    }

    /// Set the default request cap
    pub fn default_max_requests(mut self, cap: usize) -> Self {
        self.default_max_requests = cap;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.num_pieces == 0 {
            return Err(SimError::invalid_config("num_pieces", "must be at least 1"));
        }
        if self.blocks_per_piece == 0 {
            return Err(SimError::invalid_config(
                "blocks_per_piece",
                "must be at least 1",
            ));
        }
        if self.max_rounds == 0 {
            return Err(SimError::invalid_config("max_rounds", "must be at least 1"));
        }
        Ok(())
    }
}

/// Per-peer configuration. Unset caps fall back to the simulation defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Display name, used in logs and reports
    pub name: String,

    /// Upload bandwidth override (blocks/round)
    #[serde(default)]
    pub up_bw: Option<u32>,

    /// Download bandwidth override (blocks/round)
    #[serde(default)]
    pub down_bw: Option<u32>,

    /// Request cap override
    #[serde(default)]
    pub max_requests: Option<usize>,

    /// Whether the peer starts with the complete file
    #[serde(default)]
    pub is_seed: bool,
}

impl PeerConfig {
    /// Create a peer config with simulation-default caps
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            up_bw: None,
            down_bw: None,
            max_requests: None,
            is_seed: false,
        }
    }

    /// Override the upload bandwidth
    pub fn up_bw(mut self, bw: u32) -> Self {
        self.up_bw = Some(bw);
        self
    }

    /// Override the download bandwidth
    pub fn down_bw(mut self, bw: u32) -> Self {
        self.down_bw = Some(bw);
        self
    }

    /// Override the request cap
    pub fn max_requests(mut self, cap: usize) -> Self {
        self.max_requests = Some(cap);
        self
    }

    /// Mark this peer as a seed
    pub fn seed(mut self, is_seed: bool) -> Self {
        self.is_seed = is_seed;
        self
    }
}
