use rayon::prelude::*;

use crate::game::constants::physics::BOUNCE_IMPULSE;
use crate::game::state::{Ball, Bounds, Bullet, GameState};

/// Integrate every ball one tick and resolve floor/wall bounces
/// Uses rayon for parallel iteration; balls never interact with each other
pub fn update_balls(balls: &mut [Ball], bounds: Bounds) {
    balls.par_iter_mut().for_each(|ball| integrate_ball(ball, bounds));
}

/// Semi-implicit step: gravity into velocity, velocity into position
pub fn integrate_ball(ball: &mut Ball, bounds: Bounds) {
    ball.velocity.y += ball.gravity;
    ball.position += ball.velocity;

    let radius = ball.radius() as f32;
    let floor = bounds.floor();
    // Fixed impulse, so every bounce reaches the same height
    if ball.position.y + radius >= floor {
        ball.position.y = floor - radius;
        ball.velocity.y = -BOUNCE_IMPULSE;
    }

    let width = bounds.width as f32;
    if ball.position.x - radius <= 0.0 {
        ball.position.x = radius;
        ball.velocity.x = -ball.velocity.x * ball.elasticity;
    } else if ball.position.x + radius >= width {
        ball.position.x = width - radius;
        ball.velocity.x = -ball.velocity.x * ball.elasticity;
    }
}

/// Move bullets up and cull the ones past the top edge
pub fn update_bullets(bullets: &mut Vec<Bullet>) {
    for bullet in bullets.iter_mut() {
        bullet.position.y -= bullet.speed;
    }
    bullets.retain(|b| !b.is_offscreen());
}

/// Ball physics for the authoritative side, bullets for both own and
/// opponent volleys
pub fn update(state: &mut GameState, simulate_balls: bool) {
    if simulate_balls {
        update_balls(&mut state.balls, state.bounds);
    }
    update_bullets(&mut state.bullets);
    if let Some(opponent) = state.opponent.as_mut() {
        update_bullets(&mut opponent.bullets);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::assets::{AssetCache, SpriteId};
    use crate::game::constants::ball::{ELASTICITY, GRAVITY};
    use crate::game::state::OpponentState;
    use crate::util::vec2::Vec2;

    fn ball_at(assets: &AssetCache, position: Vec2, velocity: Vec2) -> Ball {
        Ball::normal(assets, SpriteId::Ball(0), position, velocity, 40, 10, 3)
    }

    #[test]
    fn test_gravity_integration() {
        let assets = AssetCache::new();
        let mut ball = ball_at(&assets, Vec2::new(500.0, 200.0), Vec2::new(2.0, 1.0));
        integrate_ball(&mut ball, Bounds::default());
        assert!((ball.velocity.y - (1.0 + GRAVITY)).abs() < 1e-6);
        assert!((ball.position.y - (201.0 + GRAVITY)).abs() < 1e-4);
        assert_eq!(ball.position.x, 502.0);
    }

    #[test]
    fn test_floor_bounce_fixed_impulse() {
        let assets = AssetCache::new();
        let bounds = Bounds::new(1200, 900);
        let mut ball = ball_at(&assets, Vec2::new(500.0, 755.0), Vec2::new(0.0, 7.0));
        integrate_ball(&mut ball, bounds);
        assert_eq!(ball.position.y, 800.0 - 40.0);
        assert_eq!(ball.velocity.y, -BOUNCE_IMPULSE);

        // A slow ball bounces just as high
        let mut slow = ball_at(&assets, Vec2::new(500.0, 759.5), Vec2::new(0.0, 0.5));
        integrate_ball(&mut slow, bounds);
        assert_eq!(slow.velocity.y, -BOUNCE_IMPULSE);
    }

    #[test]
    fn test_wall_bounce_damped() {
        let assets = AssetCache::new();
        let bounds = Bounds::new(1200, 900);

        let mut left = ball_at(&assets, Vec2::new(42.0, 300.0), Vec2::new(-4.0, 0.0));
        integrate_ball(&mut left, bounds);
        assert_eq!(left.position.x, 40.0);
        assert!((left.velocity.x - 4.0 * ELASTICITY).abs() < 1e-6);

        let mut right = ball_at(&assets, Vec2::new(1158.0, 300.0), Vec2::new(4.0, 0.0));
        integrate_ball(&mut right, bounds);
        assert_eq!(right.position.x, 1160.0);
        assert!((right.velocity.x + 4.0 * ELASTICITY).abs() < 1e-6);
    }

    #[test]
    fn test_ball_stays_in_bounds() {
        let assets = AssetCache::new();
        let bounds = Bounds::default();
        let mut balls: Vec<Ball> = (0..20)
            .map(|i| {
                ball_at(
                    &assets,
                    Vec2::new(100.0 + i as f32 * 50.0, 100.0),
                    Vec2::new(if i % 2 == 0 { 4.0 } else { -4.0 }, 2.0),
                )
            })
            .collect();
        for _ in 0..2000 {
            update_balls(&mut balls, bounds);
        }
        for ball in &balls {
            let r = ball.radius() as f32;
            assert!(ball.position.x >= r && ball.position.x <= bounds.width as f32 - r);
            assert!(ball.position.y + r <= bounds.floor());
        }
    }

    #[test]
    fn test_bullets_culled_above_top() {
        let assets = AssetCache::new();
        let mut bullets = vec![
            Bullet::new(&assets, Vec2::new(100.0, 5.0), false, 1.0),
            Bullet::new(&assets, Vec2::new(100.0, 500.0), false, 1.0),
        ];
        update_bullets(&mut bullets);
        assert_eq!(bullets.len(), 1);
        assert_eq!(bullets[0].position.y, 490.0);
    }

    #[test]
    fn test_mirror_skips_ball_physics() {
        let assets = AssetCache::new();
        let mut state = GameState::new(&assets, Bounds::default(), 600.0);
        state
            .balls
            .push(ball_at(&assets, Vec2::new(500.0, 200.0), Vec2::new(2.0, 1.0)));
        state.opponent = Some(OpponentState {
            cannon_x: Some(300.0),
            bullets: vec![Bullet::new(&assets, Vec2::new(300.0, 400.0), false, 1.0)],
            score: 0,
        });

        update(&mut state, false);
        assert_eq!(state.balls[0].position, Vec2::new(500.0, 200.0));
        let opponent = state.opponent.as_ref().unwrap();
        assert_eq!(opponent.bullets[0].position.y, 390.0);

        update(&mut state, true);
        assert_ne!(state.balls[0].position, Vec2::new(500.0, 200.0));
    }
}
