//! Ball Blast game core
//!
//! Entity simulation with pixel-mask collision, plus host-authoritative
//! replication between two peers over a TCP relay.
//!
//! # Features
//!
//! - `relay` - Two-peer tokio relay server (enabled by default)
//! - `metrics_extended` - Per-peer traffic lines in the relay's match summary (enabled by default)

pub mod config;
pub mod game;
pub mod metrics;
pub mod net;
pub mod util;
