//! One peer's side of a networked match
//!
//! Each tick: apply the newest opponent view (non-blocking pop), step the
//! simulation, hand a copy of this side's state to the writer thread. When the
//! link drops the match carries on locally and a client takes over ball
//! simulation from its last mirrored set.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::{ClientConfig, GameConfig};
use crate::game::assets::AssetHandle;
use crate::game::game_loop::{FixedTicker, GameLoop, GameLoopEvent, GameMode};
use crate::game::match_result::MatchResult;
use crate::game::state::{FrameView, MoveIntent};
use crate::net::client::{NetError, NetworkClient};

pub struct MultiplayerSession {
    game: GameLoop,
    link: Option<NetworkClient>,
    tick_rate: u32,
}

impl MultiplayerSession {
    /// Connect to the relay and build the simulation for the assigned seat
    pub fn connect(
        game_config: &GameConfig,
        client_config: &ClientConfig,
        assets: AssetHandle,
    ) -> Result<Self, NetError> {
        let link = NetworkClient::connect(client_config)?;
        let mode = GameMode::Multiplayer {
            player_id: link.player_id(),
        };
        let game = GameLoop::new(game_config.loop_config(mode), assets);
        Ok(Self {
            game,
            link: Some(link),
            tick_rate: game_config.tick_rate,
        })
    }

    /// Pair an existing simulation with an open link
    pub fn new(game: GameLoop, link: NetworkClient, tick_rate: u32) -> Self {
        Self {
            game,
            link: Some(link),
            tick_rate,
        }
    }

    pub fn game(&self) -> &GameLoop {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut GameLoop {
        &mut self.game
    }

    pub fn is_connected(&self) -> bool {
        self.link.as_ref().is_some_and(NetworkClient::is_connected)
    }

    /// Block until both peers are in. False if the relay never said so.
    pub fn wait_until_ready(&self, timeout: Duration) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.wait_until_ready(timeout))
    }

    /// One simulation step with network sync around it
    pub fn tick(&mut self, intent: MoveIntent) -> &[GameLoopEvent] {
        self.pull_world();
        self.game.tick(intent);
        self.push_state();
        self.game.events()
    }

    fn pull_world(&mut self) {
        let Some(link) = &self.link else {
            return;
        };
        // An update posted just before EOF is still applied
        if let Some(world) = link.try_recv_world() {
            self.game.apply_world_state(world);
        }
        if !link.is_connected() {
            self.drop_link();
        }
    }

    fn push_state(&self) {
        if let Some(link) = &self.link {
            link.send_player_state(self.game.capture_player_state());
        }
    }

    fn drop_link(&mut self) {
        if let Some(mut link) = self.link.take() {
            warn!(
                "Lost connection to relay at tick {}, continuing locally",
                self.game.state().tick
            );
            link.disconnect();
            self.game.promote_to_local_authority();
        }
    }

    /// Fixed-rate blocking loop. `input` is sampled once per tick with the
    /// previous frame; returning None quits.
    pub fn run<F>(&mut self, mut input: F) -> MatchResult
    where
        F: FnMut(&FrameView) -> Option<MoveIntent>,
    {
        let mut ticker = FixedTicker::new(self.tick_rate);
        while !self.game.is_over() {
            let Some(intent) = input(&self.game.frame_view()) else {
                break;
            };
            self.tick(intent);
            ticker.wait();
        }
        let result = match self.game.result() {
            Some(result) => result.clone(),
            None => self.game.quit().clone(),
        };
        info!(
            "Match over: score {} vs {:?}, {} ticks skipped",
            result.final_score,
            result.opponent_score,
            ticker.skipped()
        );
        self.leave();
        result
    }

    /// Say goodbye to the relay; the simulation stays usable
    pub fn leave(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.disconnect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::assets::AssetCache;
    use crate::game::game_loop::{Authority, GameLoopConfig};
    use crate::net::framing::{recv_blocking, send_blocking};
    use crate::net::protocol::{
        BallSnapshot, BallSnapshotKind, ClientMessage, ServerMessage, WorldState,
    };
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;
    use uuid::Uuid;

    fn host_ball() -> BallSnapshot {
        BallSnapshot {
            kind: BallSnapshotKind::Normal {
                hp: 30,
                max_splits: 3,
                splits_remaining: 3,
            },
            x: 600.0,
            y: 200.0,
            radius: 50,
            dx: 1.0,
            dy: 0.0,
            sprite: 2,
        }
    }

    /// Relay stand-in: seats the peer as player 1, answers `replies` states
    /// with host balls, then hangs up
    fn fake_relay(replies: usize) -> (String, thread::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            send_blocking(
                &mut stream,
                &ServerMessage::Welcome {
                    player_id: 1,
                    game_ready: true,
                    session: Uuid::nil(),
                },
            )
            .unwrap();
            send_blocking(&mut stream, &ServerMessage::GameReady).unwrap();
            for _ in 0..replies {
                let msg: ClientMessage = recv_blocking(&mut stream).unwrap();
                let ClientMessage::State(state) = msg else {
                    return;
                };
                // Client never ships balls
                assert!(state.balls.is_none());
                let world = WorldState {
                    cannon_x: Some(300.0),
                    bullets: Some(Vec::new()),
                    score: Some(40),
                    balls: Some(vec![host_ball()]),
                };
                send_blocking(&mut stream, &ServerMessage::World(world)).unwrap();
            }
        });
        (addr, handle)
    }

    fn connect(addr: String) -> MultiplayerSession {
        let client_config = ClientConfig {
            server_addr: addr,
            ..ClientConfig::default()
        };
        MultiplayerSession::connect(&GameConfig::default(), &client_config, AssetCache::shared())
            .unwrap()
    }

    #[test]
    fn test_client_mirrors_host_balls() {
        let (addr, relay) = fake_relay(1);
        let mut session = connect(addr);
        assert_eq!(session.game().mode(), GameMode::Multiplayer { player_id: 1 });
        assert_eq!(session.game().authority(), Authority::Mirror);
        assert!(session.wait_until_ready(Duration::from_secs(5)));

        let deadline = Instant::now() + Duration::from_secs(5);
        while session.game().state().balls.is_empty() {
            assert!(Instant::now() < deadline, "no mirrored balls");
            session.tick(MoveIntent::IDLE);
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(session.game().state().opponent_score(), Some(40));
        assert_eq!(session.game().state().balls[0].radius(), 50);

        session.leave();
        relay.join().unwrap();
    }

    #[test]
    fn test_disconnect_promotes_client() {
        let (addr, relay) = fake_relay(1);
        let mut session = connect(addr);
        relay.join().unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while session.game().authority() == Authority::Mirror {
            assert!(Instant::now() < deadline, "never promoted");
            session.tick(MoveIntent::IDLE);
            thread::sleep(Duration::from_millis(2));
        }
        assert!(!session.is_connected());
        assert_eq!(session.game().authority(), Authority::Local);

        // Keeps ticking offline
        let tick = session.game().state().tick;
        session.tick(MoveIntent::IDLE);
        assert_eq!(session.game().state().tick, tick + 1);
    }

    #[test]
    fn test_run_stops_on_quit() {
        let (addr, relay) = fake_relay(0);
        let listener_gone = {
            let mut session = connect(addr);
            let mut frames = 0;
            let result = session.run(|_| {
                frames += 1;
                (frames <= 3).then_some(MoveIntent::IDLE)
            });
            assert_eq!(result.ticks_survived, 3);
            !session.is_connected()
        };
        assert!(listener_gone);
        relay.join().unwrap();
    }

    #[test]
    fn test_new_with_prebuilt_loop() {
        let (addr, relay) = fake_relay(0);
        let link = NetworkClient::connect(&ClientConfig {
            server_addr: addr,
            ..ClientConfig::default()
        })
        .unwrap();
        let game = GameLoop::new(
            GameLoopConfig {
                mode: GameMode::Multiplayer {
                    player_id: link.player_id(),
                },
                seed: Some(3),
                ..GameLoopConfig::default()
            },
            AssetCache::shared(),
        );
        let mut session = MultiplayerSession::new(game, link, 60);
        assert!(session.is_connected());
        session.leave();
        assert!(!session.is_connected());
        relay.join().unwrap();
    }
}
