//! Two-peer networking: wire protocol, framing, peer client and relay

pub mod client;
pub mod framing;
pub mod game_session;
pub mod mailbox;
pub mod protocol;

#[cfg(feature = "relay")]
pub mod connection;
#[cfg(feature = "relay")]
pub mod relay;
