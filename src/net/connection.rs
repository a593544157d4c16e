use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics::RelayMetrics;

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    /// Welcome sent, waiting for the second peer
    Waiting = 0,
    /// Both peers present
    Playing = 1,
    /// Reader finished (EOF, error or Leave)
    Closed = 2,
}

impl ConnectionState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ConnectionState::Waiting,
            1 => ConnectionState::Playing,
            _ => ConnectionState::Closed,
        }
    }
}

/// Traffic counters for one relay peer, shared by its reader and writer tasks.
/// Every record is mirrored into the relay-wide metrics.
#[derive(Debug)]
pub struct PeerStats {
    pub player_id: u8,
    pub remote_addr: SocketAddr,
    connected_at: Instant,
    state: AtomicU8,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    metrics: Arc<RelayMetrics>,
}

impl PeerStats {
    pub fn new(player_id: u8, remote_addr: SocketAddr, metrics: Arc<RelayMetrics>) -> Self {
        metrics.record_connect();
        Self {
            player_id,
            remote_addr,
            connected_at: Instant::now(),
            state: AtomicU8::new(ConnectionState::Waiting as u8),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            metrics,
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn mark_playing(&self) {
        // Never reopen a closed peer
        let _ = self.state.compare_exchange(
            ConnectionState::Waiting as u8,
            ConnectionState::Playing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Idempotent
    pub fn mark_closed(&self) {
        let previous = self.state.swap(ConnectionState::Closed as u8, Ordering::AcqRel);
        if previous != ConnectionState::Closed as u8 {
            self.metrics.record_disconnect();
        }
    }

    /// Record bytes sent
    pub fn record_sent(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_sent(bytes);
    }

    /// Record bytes received
    pub fn record_received(&self, bytes: usize) {
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_received(bytes);
    }

    pub fn record_decode_error(&self) {
        self.metrics.record_decode_error();
    }

    pub fn summary(&self) -> PeerSummary {
        PeerSummary {
            player_id: self.player_id,
            remote_addr: self.remote_addr,
            connected_for: self.connected_at.elapsed(),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
        }
    }
}

/// Final per-peer numbers reported when a match ends
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSummary {
    pub player_id: u8,
    pub remote_addr: SocketAddr,
    pub connected_for: Duration,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
}
