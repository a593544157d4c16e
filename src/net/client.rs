//! Peer side of the relay protocol
//!
//! One TCP stream, a blocking reader thread and a blocking writer thread. Both
//! threads meet the simulation thread through latest-wins mailboxes, so a tick
//! never waits on the socket.

use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::game::constants::net::LEAVE_GRACE_MS;
use crate::net::framing::{recv_blocking, send_blocking, FramingError};
use crate::net::mailbox::{mailbox, MailboxReceiver, MailboxSender};
use crate::net::protocol::{ClientMessage, PlayerState, ServerMessage, WorldState};

/// Errors surfaced while establishing a connection
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("Could not connect to {addr} after {attempts} attempts: {source}")]
    ConnectFailed {
        addr: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
    #[error("Handshake failed: {0}")]
    Handshake(String),
    #[error(transparent)]
    Framing(#[from] FramingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Connection to the relay
pub struct NetworkClient {
    player_id: u8,
    session: Uuid,
    stream: TcpStream,
    connected: Arc<AtomicBool>,
    game_ready: Arc<AtomicBool>,
    outbox: Option<MailboxSender<ClientMessage>>,
    inbox: MailboxReceiver<WorldState>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl NetworkClient {
    /// Connect with bounded retries, read the Welcome and start the I/O threads
    pub fn connect(config: &ClientConfig) -> Result<Self, NetError> {
        let stream = Self::connect_with_retry(config)?;
        stream.set_nodelay(true)?;
        Self::from_stream(stream)
    }

    fn connect_with_retry(config: &ClientConfig) -> Result<TcpStream, NetError> {
        let attempts = config.connect_attempts.max(1);
        let mut attempt = 1;
        loop {
            match TcpStream::connect(config.server_addr.as_str()) {
                Ok(stream) => {
                    info!("Connected to {} (attempt {})", config.server_addr, attempt);
                    return Ok(stream);
                }
                Err(e) if attempt < attempts => {
                    warn!(
                        "Connect to {} failed (attempt {}/{}): {}",
                        config.server_addr, attempt, attempts, e
                    );
                    attempt += 1;
                    thread::sleep(config.connect_retry);
                }
                Err(source) => {
                    return Err(NetError::ConnectFailed {
                        addr: config.server_addr.clone(),
                        attempts,
                        source,
                    })
                }
            }
        }
    }

    /// Run the handshake on an already connected stream
    pub fn from_stream(mut stream: TcpStream) -> Result<Self, NetError> {
        let (player_id, game_ready, session) = match recv_blocking(&mut stream)? {
            ServerMessage::Welcome {
                player_id,
                game_ready,
                session,
            } => (player_id, game_ready, session),
            other => {
                return Err(NetError::Handshake(format!(
                    "expected Welcome, got {:?}",
                    other
                )))
            }
        };
        info!(
            "Joined session {} as player {} (ready: {})",
            session, player_id, game_ready
        );

        let connected = Arc::new(AtomicBool::new(true));
        let game_ready = Arc::new(AtomicBool::new(game_ready));
        let (outbox, outgoing) = mailbox::<ClientMessage>();
        let (incoming, inbox) = mailbox::<WorldState>();

        let reader = {
            let stream = stream.try_clone()?;
            let connected = connected.clone();
            let game_ready = game_ready.clone();
            thread::Builder::new()
                .name(format!("net-reader-{}", player_id))
                .spawn(move || read_loop(stream, incoming, connected, game_ready))?
        };
        let writer = {
            let stream = stream.try_clone()?;
            let connected = connected.clone();
            thread::Builder::new()
                .name(format!("net-writer-{}", player_id))
                .spawn(move || write_loop(stream, outgoing, connected))?
        };

        Ok(Self {
            player_id,
            session,
            stream,
            connected,
            game_ready,
            outbox: Some(outbox),
            inbox,
            reader: Some(reader),
            writer: Some(writer),
        })
    }

    pub fn player_id(&self) -> u8 {
        self.player_id
    }

    pub fn session(&self) -> Uuid {
        self.session
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_game_ready(&self) -> bool {
        self.game_ready.load(Ordering::Acquire)
    }

    /// Block until the relay reports both peers present. False on timeout or
    /// disconnect.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while !self.is_game_ready() {
            if !self.is_connected() || Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    /// Queue this tick's state. A state the writer has not picked up yet is
    /// replaced.
    pub fn send_player_state(&self, state: PlayerState) {
        if !self.is_connected() {
            return;
        }
        if let Some(outbox) = &self.outbox {
            if outbox.post(ClientMessage::State(state)) {
                debug!("Dropped stale outgoing state");
            }
        }
    }

    /// Non-blocking pop of the latest world update
    #[inline]
    pub fn try_recv_world(&self) -> Option<WorldState> {
        self.inbox.try_take()
    }

    /// Say goodbye, stop both threads and close the socket. The writer gets a
    /// short grace period to flush Leave; after that the socket is shut down
    /// under it, so this never blocks on a relay that stopped reading.
    pub fn disconnect(&mut self) {
        if let Some(outbox) = self.outbox.take() {
            if self.is_connected() {
                outbox.post(ClientMessage::Leave);
            }
            // Dropping the sender lets the writer drain and exit
        }
        if let Some(writer) = &self.writer {
            let deadline = Instant::now() + Duration::from_millis(LEAVE_GRACE_MS);
            while !writer.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            if !writer.is_finished() {
                debug!("Writer still blocked, closing the socket under it");
            }
        }
        // Unblocks both the reader and a writer stuck in a full send buffer
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
        if self.connected.swap(false, Ordering::AcqRel) {
            info!("Disconnected from session {}", self.session);
        }
    }
}

impl Drop for NetworkClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn read_loop(
    mut stream: TcpStream,
    incoming: MailboxSender<WorldState>,
    connected: Arc<AtomicBool>,
    game_ready: Arc<AtomicBool>,
) {
    loop {
        match recv_blocking::<_, ServerMessage>(&mut stream) {
            Ok(ServerMessage::World(world)) => {
                incoming.post(world);
            }
            Ok(ServerMessage::GameReady) => {
                info!("Game ready");
                game_ready.store(true, Ordering::Release);
            }
            Ok(ServerMessage::Welcome { .. }) => {
                warn!("Ignoring repeated Welcome");
            }
            Err(e) if !e.is_fatal() => {
                warn!("Skipping undecodable record: {}", e);
            }
            Err(FramingError::ConnectionClosed) => {
                info!("Relay closed the connection");
                break;
            }
            Err(e) => {
                warn!("Read error: {}", e);
                break;
            }
        }
    }
    connected.store(false, Ordering::Release);
}

fn write_loop(
    mut stream: TcpStream,
    outgoing: MailboxReceiver<ClientMessage>,
    connected: Arc<AtomicBool>,
) {
    while let Some(message) = outgoing.take() {
        let leaving = matches!(message, ClientMessage::Leave);
        match send_blocking(&mut stream, &message) {
            Ok(()) => {}
            Err(e) if !e.is_fatal() => {
                warn!("Skipping unencodable record: {}", e);
            }
            Err(e) => {
                warn!("Write error: {}", e);
                connected.store(false, Ordering::Release);
                break;
            }
        }
        if leaving {
            break;
        }
    }
}
