//! # swarmsim
//!
//! A round-based peer-to-peer piece-exchange simulation engine.
//!
//! ## Features
//!
//! - **Deterministic rounds**: requests, uploads, and transfers resolve in
//!   a fixed order; identically-seeded runs replay bit-for-bit
//! - **Pluggable strategies**: any type implementing `Strategy` decides what
//!   a peer requests and who it uploads to each round
//! - **Enforced caps**: request counts and upload/download bandwidth are
//!   capped by the engine with documented truncation policies
//! - **Fault isolation**: a panicking or malformed strategy costs its peer
//!   the round, never the simulation
//! - **Append-only history**: every round's requests, uploads, and resolved
//!   downloads are queryable by all strategies
//!
//! ## Quick Start
//!
//! ```rust
//! use swarmsim::{PeerConfig, RarestFirst, Seed, SimConfig, SwarmEngine};
//!
//! fn main() -> Result<(), swarmsim::SimError> {
//!     let config = SimConfig::new(8, 4).seed(42).max_rounds(50);
//!     let mut engine = SwarmEngine::new(config)?;
//!
//!     engine.add_peer(PeerConfig::new("seed").seed(true).up_bw(8), Box::new(Seed::new()));
//!     engine.add_peer(PeerConfig::new("alice"), Box::new(RarestFirst::new()));
//!     engine.add_peer(PeerConfig::new("bob"), Box::new(RarestFirst::new()));
//!
//!     let report = engine.run()?;
//!     println!("finished in {} rounds", report.rounds_run);
//!     Ok(())
//! }
//! ```

// Modules
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod peer;
pub mod piece;
pub mod stats;
pub mod strategy;

// Re-exports for convenience
pub use config::{PeerConfig, SimConfig};
pub use engine::SwarmEngine;
pub use error::{Result, SimError};
pub use history::{Download, Request, RoundHistory, RoundRecord, Upload};
pub use peer::{Peer, PeerHandle, PeerId, PeerSnapshot};
pub use piece::PieceStore;
pub use stats::{SimReport, SwarmProgress};

// Strategy exports
pub use strategy::{even_split, PropShare, RarestFirst, Seed, Strategy, TitForTat};
