use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::assets::AssetCache;
use crate::game::state::{Ball, BallKind, Bullet};
use crate::util::vec2::Vec2;

/// Largest radius accepted from the wire
const MAX_SNAPSHOT_RADIUS: u32 = 1024;

/// Messages from peer to relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    /// This peer's state for the current tick
    State(PlayerState),
    /// Peer is leaving the match
    Leave,
}

/// Messages from relay to peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Sent once on accept with the assigned player id
    Welcome {
        player_id: u8,
        game_ready: bool,
        session: Uuid,
    },
    /// Both peers are connected
    GameReady,
    /// Reply to a `ClientMessage::State`, built from the other peer's latest state
    World(WorldState),
}

/// Type tag and variant data of a replicated ball
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallSnapshotKind {
    Normal {
        hp: i32,
        max_splits: u8,
        splits_remaining: u8,
    },
    Reward,
}

/// One ball as sent by the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallSnapshot {
    pub kind: BallSnapshotKind,
    pub x: f32,
    pub y: f32,
    pub radius: u32,
    pub dx: f32,
    pub dy: f32,
    /// Index into the ball sprite set (0 for reward balls)
    pub sprite: u8,
}

impl BallSnapshot {
    pub fn capture(ball: &Ball) -> Self {
        let kind = match ball.kind {
            BallKind::Normal {
                hp,
                max_splits,
                splits_remaining,
                ..
            } => BallSnapshotKind::Normal {
                hp,
                max_splits,
                splits_remaining,
            },
            BallKind::Reward { .. } => BallSnapshotKind::Reward,
        };
        Self {
            kind,
            x: ball.position.x,
            y: ball.position.y,
            radius: ball.radius(),
            dx: ball.velocity.x,
            dy: ball.velocity.y,
            sprite: ball.sprite().ball_index(),
        }
    }

    /// Rebuild a ball with a fresh mask. Returns None for entries that cannot
    /// describe a live ball (non-finite coordinates, zero radius, no hp left).
    pub fn to_ball(&self, assets: &AssetCache) -> Option<Ball> {
        let finite = [self.x, self.y, self.dx, self.dy].iter().all(|v| v.is_finite());
        if !finite || self.radius == 0 {
            return None;
        }
        if let BallSnapshotKind::Normal { hp, .. } = self.kind {
            if hp <= 0 {
                return None;
            }
        }
        let radius = self.radius.min(MAX_SNAPSHOT_RADIUS);
        let position = Vec2::new(self.x, self.y);
        let velocity = Vec2::new(self.dx, self.dy);
        let ball = match self.kind {
            BallSnapshotKind::Normal {
                hp,
                max_splits,
                splits_remaining,
            } => Ball::with_kind(
                assets,
                assets.ball_sprite(self.sprite),
                position,
                velocity,
                radius,
                BallKind::Normal {
                    hp,
                    original_hp: hp,
                    max_splits,
                    splits_remaining: splits_remaining.min(max_splits),
                },
            ),
            BallSnapshotKind::Reward => {
                let mut ball = Ball::reward(assets, position, velocity);
                // Replay growth so the mask matches the sender's radius
                while ball.radius() < radius && ball.grow_once(assets) {}
                ball
            }
        };
        Some(ball)
    }
}

/// Bullet position as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BulletSnapshot {
    pub x: f32,
    pub y: f32,
    pub double: bool,
}

impl BulletSnapshot {
    pub fn capture(bullet: &Bullet) -> Self {
        Self {
            x: bullet.position.x,
            y: bullet.position.y,
            double: bullet.double,
        }
    }

    pub fn to_bullet(&self, assets: &AssetCache) -> Option<Bullet> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return None;
        }
        Some(Bullet::new(assets, Vec2::new(self.x, self.y), self.double, 1.0))
    }
}

/// Per-tick state a peer sends to the relay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub cannon_x: f32,
    pub bullets: Vec<BulletSnapshot>,
    pub score: u32,
    /// Full ball list, only present when the sender is the host
    pub balls: Option<Vec<BallSnapshot>>,
}

/// Opponent view the relay returns; None means "no change this tick"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    pub cannon_x: Option<f32>,
    pub bullets: Option<Vec<BulletSnapshot>>,
    pub score: Option<u32>,
    /// Authoritative ball list, only when the opponent is the host
    pub balls: Option<Vec<BallSnapshot>>,
}

impl WorldState {
    /// Build the reply for one peer from the other peer's latest state
    pub fn from_opponent(opponent: &PlayerState, opponent_is_host: bool) -> Self {
        Self {
            cannon_x: Some(opponent.cannon_x),
            bullets: Some(opponent.bullets.clone()),
            score: Some(opponent.score),
            balls: if opponent_is_host {
                opponent.balls.clone()
            } else {
                None
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cannon_x.is_none()
            && self.bullets.is_none()
            && self.score.is_none()
            && self.balls.is_none()
    }
}

/// Encode a message using bincode
pub fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, EncodeError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| EncodeError(e.to_string()))
}

/// Decode a message using bincode
pub fn decode<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, DecodeError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| DecodeError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("Encode error: {0}")]
pub struct EncodeError(String);

#[derive(Debug, thiserror::Error)]
#[error("Decode error: {0}")]
pub struct DecodeError(String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::assets::SpriteId;
    use crate::game::constants::reward;

    fn mixed_balls(assets: &AssetCache) -> Vec<Ball> {
        let mut balls = Vec::new();
        for i in 0..6u8 {
            balls.push(Ball::normal(
                assets,
                SpriteId::Ball(i),
                Vec2::new(100.0 + i as f32 * 90.0, 50.0 + i as f32 * 10.0),
                Vec2::new(-1.5 + i as f32 * 0.5, 2.25),
                40 + i as u32 * 5,
                20 + i as i32,
                3,
            ));
        }
        let mut reward_ball = Ball::reward(assets, Vec2::new(640.0, 120.0), Vec2::new(0.5, 1.0));
        for _ in 0..4 {
            reward_ball.grow_once(assets);
        }
        balls.push(reward_ball);
        balls
    }

    #[test]
    fn test_player_state_round_trip_rebuilds_balls() {
        let assets = AssetCache::new();
        let balls = mixed_balls(&assets);
        let state = PlayerState {
            cannon_x: 412.5,
            bullets: vec![BulletSnapshot {
                x: 410.0,
                y: 500.0,
                double: true,
            }],
            score: 90,
            balls: Some(balls.iter().map(BallSnapshot::capture).collect()),
        };

        let encoded = encode(&ClientMessage::State(state.clone())).unwrap();
        let ClientMessage::State(decoded) = decode(&encoded).unwrap() else {
            panic!("Wrong message type");
        };
        assert_eq!(decoded, state);

        let rebuilt: Vec<Ball> = decoded
            .balls
            .unwrap()
            .iter()
            .filter_map(|s| s.to_ball(&assets))
            .collect();
        assert_eq!(rebuilt.len(), balls.len());
        for (original, copy) in balls.iter().zip(&rebuilt) {
            assert_eq!(copy.position, original.position);
            assert_eq!(copy.velocity, original.velocity);
            assert_eq!(copy.radius(), original.radius());
            assert_eq!(copy.sprite(), original.sprite());
            assert_eq!(copy.is_reward(), original.is_reward());
            assert_eq!(copy.hp(), original.hp());
            assert_eq!(copy.splits_remaining(), original.splits_remaining());
            assert_eq!(copy.mask().width(), copy.radius() * 2);
        }
        assert_eq!(rebuilt[6].radius(), reward::MIN_RADIUS + 4 * reward::GROWTH_FACTOR);
    }

    #[test]
    fn test_malformed_snapshot_skipped() {
        let assets = AssetCache::new();
        let bad = BallSnapshot {
            kind: BallSnapshotKind::Reward,
            x: f32::NAN,
            y: 0.0,
            radius: 40,
            dx: 0.0,
            dy: 0.0,
            sprite: 0,
        };
        assert!(bad.to_ball(&assets).is_none());
        let zero = BallSnapshot {
            x: 10.0,
            radius: 0,
            ..bad.clone()
        };
        assert!(zero.to_ball(&assets).is_none());

        let over_budget = BallSnapshot {
            kind: BallSnapshotKind::Normal {
                hp: 5,
                max_splits: 2,
                splits_remaining: 9,
            },
            x: 10.0,
            radius: 30,
            ..bad
        };
        let ball = over_budget.to_ball(&assets).unwrap();
        assert_eq!(ball.splits_remaining(), Some(2));

        // A dead or corrupt hp never reaches the simulation
        for hp in [0, -3, i32::MIN] {
            let dead = BallSnapshot {
                kind: BallSnapshotKind::Normal {
                    hp,
                    max_splits: 3,
                    splits_remaining: 3,
                },
                ..over_budget.clone()
            };
            assert!(dead.to_ball(&assets).is_none(), "hp {} accepted", hp);
        }
    }

    #[test]
    fn test_world_state_from_opponent() {
        let opponent = PlayerState {
            cannon_x: 900.0,
            bullets: vec![],
            score: 40,
            balls: Some(vec![]),
        };
        let from_host = WorldState::from_opponent(&opponent, true);
        assert_eq!(from_host.cannon_x, Some(900.0));
        assert_eq!(from_host.score, Some(40));
        assert_eq!(from_host.balls, Some(vec![]));

        let from_client = WorldState::from_opponent(&opponent, false);
        assert_eq!(from_client.balls, None);
        assert!(WorldState::default().is_empty());
        assert!(!from_client.is_empty());
    }

    #[test]
    fn test_server_message_welcome() {
        let session = Uuid::new_v4();
        let msg = ServerMessage::Welcome {
            player_id: 1,
            game_ready: false,
            session,
        };
        let encoded = encode(&msg).unwrap();
        // Legacy config: enum variant index is a little-endian u32
        assert_eq!(&encoded[..4], &[0, 0, 0, 0]);
        match decode(&encoded).unwrap() {
            ServerMessage::Welcome {
                player_id,
                game_ready,
                session: decoded_session,
            } => {
                assert_eq!(player_id, 1);
                assert!(!game_ready);
                assert_eq!(decoded_session, session);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_invalid_decode() {
        let garbage = vec![0xFF, 0xFE, 0xFD];
        let result: Result<ClientMessage, _> = decode(&garbage);
        assert!(result.is_err());
    }
}
