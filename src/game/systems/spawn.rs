//! Ball spawner for the authoritative side

use rand::Rng;

use crate::game::assets::AssetCache;
use crate::game::constants::ball;
use crate::game::progression::LevelConfig;
use crate::game::state::{Ball, GameState};
use crate::util::vec2::Vec2;

/// Create one ball along the top edge using the level's parameters
pub fn spawn_ball<R: Rng + ?Sized>(
    assets: &AssetCache,
    level: &LevelConfig,
    screen_width: u32,
    rng: &mut R,
) -> Ball {
    let margin = ball::SPAWN_MARGIN.min(screen_width / 2);
    let x = rng.gen_range(margin..=screen_width - margin) as f32;
    let dx = rng.gen_range(-ball::SPAWN_DX..=ball::SPAWN_DX);
    let dy = if level.ball_speed_min < level.ball_speed_max {
        rng.gen_range(level.ball_speed_min..=level.ball_speed_max)
    } else {
        level.ball_speed_min
    };
    let position = Vec2::new(x, 0.0);
    let velocity = Vec2::new(dx, dy);

    if rng.gen_bool(level.reward_ball_chance.clamp(0.0, 1.0)) {
        return Ball::reward(assets, position, velocity);
    }

    let radius = rng.gen_range(ball::SPAWN_RADIUS_MIN..=ball::SPAWN_RADIUS_MAX);
    let hp = rng.gen_range(level.ball_hp_min..=level.ball_hp_max.max(level.ball_hp_min));
    Ball::normal(
        assets,
        assets.random_ball_sprite(rng),
        position,
        velocity,
        radius,
        hp,
        ball::MAX_SPLITS,
    )
}

/// Advance the spawn timer; once it exceeds the level interval a ball is
/// added and the timer restarts from zero (missed spawns are not caught up)
pub fn update<R: Rng + ?Sized>(
    state: &mut GameState,
    assets: &AssetCache,
    level: &LevelConfig,
    rng: &mut R,
) -> bool {
    state.spawn_timer += 1;
    if state.spawn_timer <= level.spawn_interval {
        return false;
    }
    state.spawn_timer = 0;
    let ball = spawn_ball(assets, level, state.bounds.width, rng);
    state.balls.push(ball);
    true
}
