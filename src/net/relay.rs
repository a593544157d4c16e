//! Two-peer relay
//!
//! Accepts exactly two peers per match, welcomes them as player 0 (host) and
//! player 1, then answers every `ClientMessage::State` with a `WorldState`
//! built from the other peer's latest state. The per-peer table lives in a
//! single hub task; connection tasks reach it only through `HubCommand`s.
//! When either peer goes away the other one is disconnected too, which is
//! how a client learns it has to take over the match.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::Poll;
use std::time::{Duration, Instant};

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::game::constants::net::{HOST_ID, HUB_CHANNEL_SIZE, MAX_PEERS};
use crate::metrics::RelayMetrics;
use crate::net::connection::{PeerStats, PeerSummary};
use crate::net::framing::{read_message, send, FramingError};
use crate::net::protocol::{decode, ClientMessage, PlayerState, ServerMessage, WorldState};

/// Outbound queue depth per peer. Replies are request-response so this stays
/// nearly empty.
const OUTBOUND_QUEUE: usize = 16;

/// Requests handled by the hub task
#[derive(Debug)]
pub enum HubCommand {
    /// Store the sender's state and reply with the opponent's view
    Update {
        player_id: u8,
        state: PlayerState,
        reply: oneshot::Sender<WorldState>,
    },
    /// Forget the peer's state
    Disconnected { player_id: u8 },
}

/// Latest state per peer, owned by the hub task
#[derive(Debug, Default)]
pub struct Hub {
    latest: [Option<PlayerState>; MAX_PEERS],
    updates: u64,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `state` for `player_id` and build the reply
    pub fn update(&mut self, player_id: u8, state: PlayerState) -> WorldState {
        let idx = player_id as usize;
        if idx >= MAX_PEERS {
            warn!("Update from unknown player {}", player_id);
            return WorldState::default();
        }
        self.latest[idx] = Some(state);
        self.updates += 1;
        self.reply_for(player_id)
    }

    /// The other peer's latest state, or an empty update if it has not sent
    /// anything yet (or left)
    pub fn reply_for(&self, player_id: u8) -> WorldState {
        let other = (player_id as usize + 1) % MAX_PEERS;
        match &self.latest[other] {
            Some(state) => WorldState::from_opponent(state, other as u8 == HOST_ID),
            None => WorldState::default(),
        }
    }

    pub fn remove(&mut self, player_id: u8) {
        if let Some(slot) = self.latest.get_mut(player_id as usize) {
            *slot = None;
        }
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Update {
                player_id,
                state,
                reply,
            } => {
                let world = self.update(player_id, state);
                // Requester may have gone away, nothing to do
                let _ = reply.send(world);
            }
            HubCommand::Disconnected { player_id } => {
                debug!("Hub dropping state of player {}", player_id);
                self.remove(player_id);
            }
        }
    }
}

/// Hub actor loop; ends when every connection task has dropped its sender
async fn run_hub(mut commands: mpsc::Receiver<HubCommand>) -> u64 {
    let mut hub = Hub::new();
    while let Some(command) = commands.recv().await {
        hub.handle(command);
    }
    hub.updates()
}

/// What a finished match reports
#[derive(Debug, Clone)]
pub struct MatchSummary {
    pub session: Uuid,
    pub duration: Duration,
    pub updates: u64,
    pub peers: Vec<PeerSummary>,
}

struct PeerTasks {
    stats: Arc<PeerStats>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

/// A match whose two peers are connected and running
pub struct RunningMatch {
    session: Uuid,
    started: Instant,
    peers: Vec<PeerTasks>,
    hub: JoinHandle<u64>,
    metrics: Arc<RelayMetrics>,
}

impl RunningMatch {
    pub fn session(&self) -> Uuid {
        self.session
    }

    /// Wait for both peers to leave
    pub async fn finish(self) -> MatchSummary {
        let mut peers = Vec::with_capacity(self.peers.len());
        for peer in self.peers {
            if let Err(e) = peer.reader.await {
                warn!("Reader task for player {} failed: {}", peer.stats.player_id, e);
            }
            if let Err(e) = peer.writer.await {
                warn!("Writer task for player {} failed: {}", peer.stats.player_id, e);
            }
            peer.stats.mark_closed();
            peers.push(peer.stats.summary());
        }
        let updates = self.hub.await.unwrap_or_else(|e| {
            warn!("Hub task failed: {}", e);
            0
        });
        self.metrics.matches_finished.fetch_add(1, Ordering::Relaxed);

        let summary = MatchSummary {
            session: self.session,
            duration: self.started.elapsed(),
            updates,
            peers,
        };
        info!(
            "Match {} ended after {:.1}s, {} state updates",
            summary.session,
            summary.duration.as_secs_f32(),
            summary.updates
        );
        #[cfg(feature = "metrics_extended")]
        for peer in &summary.peers {
            info!(
                "  player {} ({}): in {} msgs / {} B, out {} msgs / {} B",
                peer.player_id,
                peer.remote_addr,
                peer.messages_received,
                peer.bytes_received,
                peer.messages_sent,
                peer.bytes_sent
            );
        }
        info!("Relay: {}", self.metrics.snapshot());
        summary
    }
}

/// TCP relay server
pub struct RelayServer {
    config: RelayConfig,
    listener: TcpListener,
    metrics: Arc<RelayMetrics>,
}

impl RelayServer {
    pub async fn bind(config: RelayConfig) -> anyhow::Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid relay config: {}", e))?;
        let listener = TcpListener::bind(config.socket_addr()).await?;
        Ok(Self {
            config,
            listener,
            metrics: Arc::new(RelayMetrics::new()),
        })
    }

    /// Serve on an already bound listener
    pub fn from_listener(config: RelayConfig, listener: TcpListener) -> Self {
        Self {
            config,
            listener,
            metrics: Arc::new(RelayMetrics::new()),
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn metrics(&self) -> Arc<RelayMetrics> {
        self.metrics.clone()
    }

    /// Serve matches until `max_matches` is reached (or forever)
    pub async fn run(self) -> anyhow::Result<()> {
        info!("Relay listening on {}", self.local_addr()?);
        let mut running = Vec::new();
        let mut started = 0usize;

        loop {
            let game = self.accept_match().await?;
            running.push(tokio::spawn(game.finish()));
            running.retain(|handle| !handle.is_finished());
            started += 1;

            if self.config.max_matches.is_some_and(|max| started >= max) {
                break;
            }
        }

        for handle in running {
            if let Err(e) = handle.await {
                warn!("Match task failed: {}", e);
            }
        }
        info!("Relay done: {}", self.metrics.snapshot());
        Ok(())
    }

    /// Accept a full match and run it to completion
    pub async fn serve_match(&self) -> anyhow::Result<MatchSummary> {
        Ok(self.accept_match().await?.finish().await)
    }

    /// Accept two peers, welcome them and signal GameReady. Each peer's
    /// connection tasks start right after its Welcome, so the first peer gets
    /// empty updates until the second one shows up. A peer that leaves before
    /// the match is full frees its seat for the next one.
    pub async fn accept_match(&self) -> anyhow::Result<RunningMatch> {
        let session = Uuid::new_v4();
        let (hub_tx, hub_rx) = mpsc::channel(HUB_CHANNEL_SIZE);
        let hub = tokio::spawn(run_hub(hub_rx));
        let closing = Arc::new(watch::Sender::new(false));
        info!("Session {} waiting for {} players", session, MAX_PEERS);

        let mut peers: Vec<PeerTasks> = Vec::with_capacity(MAX_PEERS);
        let mut outbound: Vec<mpsc::Sender<ServerMessage>> = Vec::with_capacity(MAX_PEERS);

        while peers.len() < MAX_PEERS {
            // A peer that leaves while waiting gives its seat back
            let event = tokio::select! {
                accepted = self.listener.accept() => Waiting::Joined(accepted),
                idx = seat_left(&mut peers) => Waiting::Left(idx),
            };
            let (stream, addr) = match event {
                Waiting::Joined(accepted) => accepted?,
                Waiting::Left(idx) => {
                    release_seat(&mut peers, &mut outbound, idx).await;
                    continue;
                }
            };
            // It may also have left while this accept was completing
            while let Some(idx) = peers.iter().position(|p| p.reader.is_finished()) {
                release_seat(&mut peers, &mut outbound, idx).await;
            }

            let Some(player_id) = free_seat(&peers) else {
                warn!("No free seat for {}", addr);
                continue;
            };
            let last = peers.len() + 1 == MAX_PEERS;

            match self
                .admit(stream, addr, player_id, last, session, hub_tx.clone(), closing.clone())
                .await
            {
                Ok((tasks, tx)) => {
                    info!("Player {} connected from {}", player_id, addr);
                    peers.push(tasks);
                    outbound.push(tx);
                }
                Err(e) => warn!("Handshake with {} failed: {}", addr, e),
            }
        }
        // Hub stops once the connection tasks drop their senders
        drop(hub_tx);

        for (peer, tx) in peers.iter().zip(&outbound) {
            peer.stats.mark_playing();
            if tx.send(ServerMessage::GameReady).await.is_err() {
                debug!("Player {} left before GameReady", peer.stats.player_id);
            }
        }
        // Writers exit once their reader is done
        drop(outbound);

        self.metrics.matches_started.fetch_add(1, Ordering::Relaxed);
        info!("Session {} started", session);

        Ok(RunningMatch {
            session,
            started: Instant::now(),
            peers,
            hub,
            metrics: self.metrics.clone(),
        })
    }

    async fn admit(
        &self,
        mut stream: TcpStream,
        addr: SocketAddr,
        player_id: u8,
        game_ready: bool,
        session: Uuid,
        hub: mpsc::Sender<HubCommand>,
        closing: Arc<watch::Sender<bool>>,
    ) -> Result<(PeerTasks, mpsc::Sender<ServerMessage>), FramingError> {
        stream.set_nodelay(true)?;
        let stats = Arc::new(PeerStats::new(player_id, addr, self.metrics.clone()));

        let welcome = ServerMessage::Welcome {
            player_id,
            game_ready,
            session,
        };
        match send(&mut stream, &welcome).await {
            Ok(sent) => stats.record_sent(sent),
            Err(e) => {
                stats.mark_closed();
                return Err(e);
            }
        }

        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);

        let reader = tokio::spawn(peer_reader(
            read_half,
            player_id,
            hub,
            tx.clone(),
            stats.clone(),
            closing,
        ));
        let writer = tokio::spawn(peer_writer(write_half, rx, stats.clone()));

        Ok((
            PeerTasks {
                stats,
                reader,
                writer,
            },
            tx,
        ))
    }
}

enum Waiting {
    Joined(std::io::Result<(TcpStream, SocketAddr)>),
    Left(usize),
}

/// Resolves with the index of a seated peer whose reader has finished.
/// Pending forever while nobody is seated.
async fn seat_left(peers: &mut [PeerTasks]) -> usize {
    std::future::poll_fn(|cx| {
        for (idx, peer) in peers.iter_mut().enumerate() {
            if Pin::new(&mut peer.reader).poll(cx).is_ready() {
                return Poll::Ready(idx);
            }
        }
        Poll::Pending
    })
    .await
}

/// Lowest player id nobody holds
fn free_seat(peers: &[PeerTasks]) -> Option<u8> {
    (0..MAX_PEERS as u8).find(|id| peers.iter().all(|p| p.stats.player_id != *id))
}

/// Drop a peer that left before the match started. Its reader is done; the
/// writer exits once the last outbound sender is gone.
async fn release_seat(
    peers: &mut Vec<PeerTasks>,
    outbound: &mut Vec<mpsc::Sender<ServerMessage>>,
    idx: usize,
) {
    let gone = peers.remove(idx);
    drop(outbound.remove(idx));
    gone.stats.mark_closed();
    if let Err(e) = gone.writer.await {
        warn!("Writer task for player {} failed: {}", gone.stats.player_id, e);
    }
    info!(
        "Player {} left before the match started, seat {} is free again",
        gone.stats.remote_addr, gone.stats.player_id
    );
}

async fn peer_reader(
    mut stream: OwnedReadHalf,
    player_id: u8,
    hub: mpsc::Sender<HubCommand>,
    outbound: mpsc::Sender<ServerMessage>,
    stats: Arc<PeerStats>,
    closing: Arc<watch::Sender<bool>>,
) {
    let mut opponent_gone = closing.subscribe();
    loop {
        let read = tokio::select! {
            read = read_message(&mut stream) => read,
            _ = opponent_gone.changed() => {
                info!("Closing player {}: opponent left", player_id);
                break;
            }
        };
        let data = match read {
            Ok(data) => data,
            Err(FramingError::ConnectionClosed) => {
                info!("Player {} disconnected", player_id);
                break;
            }
            Err(e) => {
                warn!("Player {} read error: {}", player_id, e);
                break;
            }
        };
        stats.record_received(data.len() + 4);

        let message: ClientMessage = match decode(&data) {
            Ok(message) => message,
            Err(e) => {
                warn!("Undecodable record from player {}: {}", player_id, e);
                stats.record_decode_error();
                continue;
            }
        };

        match message {
            ClientMessage::State(state) => {
                let (reply, response) = oneshot::channel();
                let command = HubCommand::Update {
                    player_id,
                    state,
                    reply,
                };
                if hub.send(command).await.is_err() {
                    break;
                }
                let Ok(world) = response.await else {
                    break;
                };
                if outbound.send(ServerMessage::World(world)).await.is_err() {
                    break;
                }
            }
            ClientMessage::Leave => {
                info!("Player {} left", player_id);
                break;
            }
        }
    }

    stats.mark_closed();
    closing.send_replace(true);
    let _ = hub.send(HubCommand::Disconnected { player_id }).await;
}

async fn peer_writer(
    mut stream: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<ServerMessage>,
    stats: Arc<PeerStats>,
) {
    while let Some(message) = outbound.recv().await {
        match send(&mut stream, &message).await {
            Ok(sent) => stats.record_sent(sent),
            Err(e) if !e.is_fatal() => {
                warn!("Skipping unencodable record for player {}: {}", stats.player_id, e);
            }
            Err(e) => {
                debug!("Player {} write error: {}", stats.player_id, e);
                break;
            }
        }
    }
    let _ = stream.shutdown().await;
}
