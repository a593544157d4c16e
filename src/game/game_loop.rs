//! Fixed-rate simulation step for one side of a match
//!
//! Tick order: cannon input, fire control, spawn, ball physics, bullet
//! movement, collisions, cannon contact, level check, end check. Spawning and
//! ball physics only run with local authority (single-player, the host, or a
//! client whose host went away).

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::game::assets::{AssetCache, AssetHandle};
use crate::game::constants::net::HOST_ID;
use crate::game::constants::{physics, reward};
use crate::game::match_result::{check_match_end, determine_result, MatchEndReason, MatchResult};
use crate::game::progression::{apply_effect, CannonStats, Effect, LevelConfig, LevelTable, StatKey};
use crate::game::state::{Bounds, FrameView, GameState, MoveIntent, OpponentState};
use crate::game::systems::collision::{resolve_bullets, resolve_cannon, HitTally, Resolution};
use crate::game::systems::projectile::{fire_volley, FireControl, FireMode};
use crate::game::systems::{physics as physics_system, spawn};
use crate::net::protocol::{BallSnapshot, BulletSnapshot, PlayerState, WorldState};

/// Single-player or one seat of a two-peer match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    SinglePlayer,
    Multiplayer { player_id: u8 },
}

impl GameMode {
    pub fn fire_mode(&self) -> FireMode {
        match self {
            GameMode::SinglePlayer => FireMode::Continuous,
            GameMode::Multiplayer { .. } => FireMode::Wave,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, GameMode::Multiplayer { player_id } if *player_id == HOST_ID)
    }

    /// Starting cannon x: centred alone, left quarter for the host, right
    /// quarter for the client
    pub fn cannon_start_x(&self, screen_width: u32) -> f32 {
        let w = screen_width as f32;
        match self {
            GameMode::SinglePlayer => w / 2.0,
            GameMode::Multiplayer { player_id } if *player_id == HOST_ID => w / 4.0,
            GameMode::Multiplayer { .. } => w * 3.0 / 4.0,
        }
    }
}

/// Who owns ball spawn and physics on this side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Local,
    Mirror,
}

impl Authority {
    fn resolution(&self) -> Resolution {
        match self {
            Authority::Local => Resolution::Authoritative,
            Authority::Mirror => Resolution::Mirror,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GameLoopConfig {
    pub bounds: Bounds,
    pub mode: GameMode,
    pub levels: LevelTable,
    /// Level id to start on; falls back to the first level if unknown
    pub start_level: u8,
    pub stats: CannonStats,
    /// Fixed RNG seed (tests, replays); entropy otherwise
    pub seed: Option<u64>,
    /// Ticks per second, drives the fire clock and reported durations
    pub tick_rate: u32,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds::default(),
            mode: GameMode::SinglePlayer,
            levels: LevelTable::default(),
            start_level: 1,
            stats: CannonStats::default(),
            seed: None,
            tick_rate: physics::TICK_RATE,
        }
    }
}

/// Things that happened during one tick, for audio/UI hooks
#[derive(Debug, Clone, PartialEq)]
pub enum GameLoopEvent {
    Fired { bullets: usize },
    BallSpawned,
    BallsHit(HitTally),
    RewardBonus,
    CannonHit { hp_left: u32 },
    LevelUp { level: u8 },
    MatchEnded(MatchResult),
}

pub struct GameLoop {
    assets: AssetHandle,
    state: GameState,
    stats: CannonStats,
    /// Stats applied to opponent bullets on this side
    opponent_stats: CannonStats,
    mode: GameMode,
    authority: Authority,
    fire: FireControl,
    levels: LevelTable,
    level: LevelConfig,
    rng: StdRng,
    tick_rate: u32,
    events: Vec<GameLoopEvent>,
    result: Option<MatchResult>,
}

impl GameLoop {
    pub fn new(config: GameLoopConfig, assets: AssetHandle) -> Self {
        let GameLoopConfig {
            bounds,
            mode,
            levels,
            start_level,
            stats,
            seed,
            tick_rate,
        } = config;
        let tick_rate = tick_rate.max(1);

        let level = levels
            .get(start_level)
            .unwrap_or_else(|| levels.first())
            .clone();
        let mut state = GameState::new(&assets, bounds, mode.cannon_start_x(bounds.width));
        state.cannon = state.cannon.with_hp(stats.cannon_hp);
        state.cannon.speed = stats.cannon_speed as f32;
        state.level = level.id;
        if let GameMode::Multiplayer { .. } = mode {
            state.opponent = Some(OpponentState::default());
        }

        let authority = match mode {
            GameMode::SinglePlayer => Authority::Local,
            m if m.is_host() => Authority::Local,
            GameMode::Multiplayer { .. } => Authority::Mirror,
        };
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        info!(
            "Game loop ready: mode={:?} authority={:?} level={} ({})",
            mode, authority, level.id, level.name
        );

        Self {
            assets,
            state,
            stats,
            opponent_stats: CannonStats::default(),
            mode,
            authority,
            fire: FireControl::new(mode.fire_mode(), tick_rate),
            tick_rate,
            levels,
            level,
            rng,
            events: Vec::new(),
            result: None,
        }
    }

    /// Single-player loop with default settings and the fallback asset set
    pub fn single_player(seed: Option<u64>) -> Self {
        Self::new(
            GameLoopConfig {
                seed,
                ..GameLoopConfig::default()
            },
            AssetCache::shared(),
        )
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut GameState {
        &mut self.state
    }

    pub fn stats(&self) -> &CannonStats {
        &self.stats
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn authority(&self) -> Authority {
        self.authority
    }

    pub fn level(&self) -> &LevelConfig {
        &self.level
    }

    pub fn assets(&self) -> &AssetHandle {
        &self.assets
    }

    pub fn is_over(&self) -> bool {
        self.result.is_some()
    }

    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    /// Events of the last tick
    pub fn events(&self) -> &[GameLoopEvent] {
        &self.events
    }

    pub fn frame_view(&self) -> FrameView {
        self.state.frame_view()
    }

    /// Replace the spawn parameters (match start or level change)
    pub fn set_level_config(&mut self, level: LevelConfig) {
        debug!("Level config set to {} ({})", level.id, level.name);
        self.state.level = level.id;
        self.level = level;
    }

    /// Apply a card effect to the stat bag and sync the cannon with it
    pub fn apply_effect(&mut self, effect: &Effect) {
        apply_effect(&mut self.stats, effect);
        for &(key, delta) in &effect.deltas {
            if key == StatKey::CannonHp {
                self.state.cannon.adjust_hp(delta);
            }
        }
        self.state.cannon.speed = self.stats.cannon_speed as f32;
        debug!("Applied effect {:?}, stats now {:?}", effect.deltas, self.stats);
    }

    /// Host went away: start spawning and simulating the mirrored ball set
    pub fn promote_to_local_authority(&mut self) {
        if self.authority == Authority::Local {
            return;
        }
        info!(
            "Promoting to local authority with {} mirrored balls",
            self.state.balls.len()
        );
        self.authority = Authority::Local;
        self.state.spawn_timer = 0;
    }

    /// End the match early
    pub fn quit(&mut self) -> &MatchResult {
        let state = &self.state;
        let tick_rate = self.tick_rate;
        self.result
            .get_or_insert_with(|| determine_result(state, MatchEndReason::Quit, tick_rate))
    }

    /// Advance one tick. Returns the events produced by it.
    pub fn tick(&mut self, intent: MoveIntent) -> &[GameLoopEvent] {
        self.events.clear();
        if self.result.is_some() {
            return &self.events;
        }
        self.state.tick += 1;
        let local = self.authority == Authority::Local;

        // 1. Input
        self.state.cannon.apply_intent(intent, self.state.bounds.width);
        self.state.cannon.tick();

        // 2. Fire control
        if self.fire.tick(self.state.tick, &self.stats) {
            let before = self.state.bullets.len();
            fire_volley(
                &self.assets,
                self.state.cannon.position(),
                &self.stats,
                &mut self.state.bullets,
            );
            self.events.push(GameLoopEvent::Fired {
                bullets: self.state.bullets.len() - before,
            });
        }

        // 3. Spawn
        if local && spawn::update(&mut self.state, &self.assets, &self.level, &mut self.rng) {
            self.events.push(GameLoopEvent::BallSpawned);
        }

        // 4-5. Ball physics and bullet movement
        physics_system::update(&mut self.state, local);

        // 6. Collisions
        self.resolve_collisions();

        // 7. Cannon contact
        let resolution = self.authority.resolution();
        if resolve_cannon(&mut self.state.cannon, &mut self.state.balls, resolution) {
            let hp_left = self.state.cannon.hp();
            info!("Cannon hit, {} hp left", hp_left);
            self.events.push(GameLoopEvent::CannonHit { hp_left });
        }

        self.check_level_up();

        if let Some(reason) = check_match_end(&self.state) {
            let result = determine_result(&self.state, reason, self.tick_rate);
            info!(
                "Match over after {} ticks: score={} reason={:?}",
                result.ticks_survived, result.final_score, reason
            );
            self.events.push(GameLoopEvent::MatchEnded(result.clone()));
            self.result = Some(result);
        }

        &self.events
    }

    fn resolve_collisions(&mut self) {
        let resolution = self.authority.resolution();
        let tally = resolve_bullets(
            &mut self.state.balls,
            &mut self.state.bullets,
            &self.stats,
            &self.assets,
            &mut self.rng,
            resolution,
        );
        if tally.hits > 0 {
            self.state.score += tally.score;
            self.state.kills += tally.kills;
            self.state.rewards_collected += tally.rewards_collected;
            for _ in 0..tally.rewards_collected {
                self.grant_reward_bonus();
            }
            self.events.push(GameLoopEvent::BallsHit(tally));
        }

        // Opponent bullets hit our balls too; their score arrives over the wire
        if let Some(opponent) = self.state.opponent.as_mut() {
            resolve_bullets(
                &mut self.state.balls,
                &mut opponent.bullets,
                &self.opponent_stats,
                &self.assets,
                &mut self.rng,
                resolution,
            );
        }
    }

    fn grant_reward_bonus(&mut self) {
        match self.fire.mode() {
            FireMode::Continuous => self
                .stats
                .apply(StatKey::BulletsPerSecond, reward::FIRE_RATE_BONUS as i32),
            FireMode::Wave => self
                .stats
                .apply(StatKey::BulletsPerWave, reward::WAVE_BONUS as i32),
        }
        self.events.push(GameLoopEvent::RewardBonus);
    }

    fn check_level_up(&mut self) {
        let reached = self.levels.level_for_score(self.state.score);
        if reached.id > self.level.id {
            let level = reached.clone();
            info!("Level up: {} ({})", level.id, level.name);
            self.events.push(GameLoopEvent::LevelUp { level: level.id });
            self.set_level_config(level);
        }
    }

    /// Snapshot of this side for the relay. Balls are included only while
    /// this side is the authoritative host.
    pub fn capture_player_state(&self) -> PlayerState {
        let send_balls = self.mode.is_host() && self.authority == Authority::Local;
        PlayerState {
            cannon_x: self.state.cannon.x,
            bullets: self.state.bullets.iter().map(BulletSnapshot::capture).collect(),
            score: self.state.score,
            balls: send_balls.then(|| self.state.balls.iter().map(BallSnapshot::capture).collect()),
        }
    }

    /// Apply the opponent's view. Absent fields leave the current state as is;
    /// a present ball list replaces the local balls on a mirror.
    pub fn apply_world_state(&mut self, world: WorldState) {
        let assets = &self.assets;
        let opponent = self.state.opponent.get_or_insert_with(OpponentState::default);
        if let Some(x) = world.cannon_x.filter(|x| x.is_finite()) {
            opponent.cannon_x = Some(x.clamp(0.0, self.state.bounds.width as f32));
        }
        if let Some(bullets) = world.bullets {
            opponent.bullets = bullets.iter().filter_map(|b| b.to_bullet(assets)).collect();
        }
        if let Some(score) = world.score {
            opponent.score = score;
        }
        if let Some(balls) = world.balls {
            if self.authority == Authority::Mirror {
                self.state.balls = balls.iter().filter_map(|b| b.to_ball(assets)).collect();
            } else {
                debug!("Ignoring {} replicated balls with local authority", balls.len());
            }
        }
    }
}

/// Fixed-rate pacing for a blocking simulation thread. Ticks that were missed
/// are skipped rather than run back to back.
#[derive(Debug)]
pub struct FixedTicker {
    period: Duration,
    next: Instant,
    skipped: u64,
}

impl FixedTicker {
    pub fn new(tick_rate: u32) -> Self {
        let period = Duration::from_nanos(1_000_000_000 / tick_rate.max(1) as u64);
        Self {
            period,
            next: Instant::now() + period,
            skipped: 0,
        }
    }

    pub fn with_default_rate() -> Self {
        Self::new(physics::TICK_RATE)
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Total ticks dropped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Sleep until the next tick is due. Returns how many ticks were skipped
    /// because the caller fell behind.
    pub fn wait(&mut self) -> u64 {
        let now = Instant::now();
        if now < self.next {
            std::thread::sleep(self.next - now);
            self.next += self.period;
            return 0;
        }
        let behind = now - self.next;
        let missed = (behind.as_nanos() / self.period.as_nanos().max(1)) as u64;
        self.skipped += missed;
        self.next = now + self.period;
        if missed > 0 {
            debug!("Ticker fell behind, skipped {} ticks", missed);
        }
        missed
    }
}
