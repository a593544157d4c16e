//! Bullet-vs-ball and ball-vs-cannon resolution
//!
//! Every pair is tested with the pixel-mask kernel. Each ball consumes at
//! most one bullet per tick. The mirror side (non-authoritative client) never
//! mutates its ball list; it consumes bullets and credits score from the hit
//! it predicts the host will resolve.

use rand::Rng;

use crate::game::assets::AssetCache;
use crate::game::mask::overlaps;
use crate::game::progression::CannonStats;
use crate::game::state::{Ball, Bullet, Cannon, HitOutcome};
use crate::game::systems::projectile::roll_damage;

/// Whether a side may change the ball list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Authoritative,
    Mirror,
}

/// What one resolution pass produced for the shooter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitTally {
    pub hits: u32,
    pub kills: u32,
    pub rewards_collected: u32,
    pub score: u32,
}

impl HitTally {
    fn record(&mut self, outcome: &HitOutcome) {
        self.hits += 1;
        self.score += outcome.score();
        match outcome {
            HitOutcome::Killed { .. } => self.kills += 1,
            HitOutcome::Collected => self.rewards_collected += 1,
            HitOutcome::Survived => {}
        }
    }
}

#[inline]
fn first_hit(ball: &Ball, bullets: &[Bullet]) -> Option<usize> {
    bullets
        .iter()
        .position(|b| overlaps(ball.mask(), ball.position, b.mask(), b.position))
}

/// Resolve `bullets` against `balls`. Hit bullets are removed in both modes;
/// only `Resolution::Authoritative` damages, splits or removes balls.
pub fn resolve_bullets<R: Rng + ?Sized>(
    balls: &mut Vec<Ball>,
    bullets: &mut Vec<Bullet>,
    stats: &CannonStats,
    assets: &AssetCache,
    rng: &mut R,
    resolution: Resolution,
) -> HitTally {
    let mut tally = HitTally::default();
    if bullets.is_empty() || balls.is_empty() {
        return tally;
    }

    match resolution {
        Resolution::Mirror => {
            for ball in balls.iter() {
                if let Some(idx) = first_hit(ball, bullets) {
                    let bullet = bullets.remove(idx);
                    let damage = roll_damage(stats, &bullet, rng);
                    tally.record(&ball.predict_hit(damage));
                }
            }
        }
        Resolution::Authoritative => {
            let mut survivors = Vec::with_capacity(balls.len());
            let mut children = Vec::new();
            for mut ball in balls.drain(..) {
                let Some(idx) = first_hit(&ball, bullets) else {
                    survivors.push(ball);
                    continue;
                };
                let bullet = bullets.remove(idx);
                let damage = roll_damage(stats, &bullet, rng);
                let outcome = ball.take_hit(damage, assets, rng);
                tally.record(&outcome);
                match outcome {
                    HitOutcome::Survived => survivors.push(ball),
                    HitOutcome::Killed { children: split } => children.extend(split),
                    HitOutcome::Collected => {}
                }
            }
            // Children join after every parent was resolved, so they cannot
            // be hit in the tick they were created
            survivors.extend(children);
            *balls = survivors;
        }
    }
    tally
}

/// Test the cannon against every ball. On a damaging contact the
/// authoritative side also removes the ball. Returns true if the cannon lost
/// a hit point.
pub fn resolve_cannon(cannon: &mut Cannon, balls: &mut Vec<Ball>, resolution: Resolution) -> bool {
    if cannon.is_invulnerable() || cannon.is_destroyed() {
        return false;
    }
    let Some(idx) = balls.iter().position(|ball| cannon.touches(ball)) else {
        return false;
    };
    if !cannon.take_contact() {
        return false;
    }
    if resolution == Resolution::Authoritative {
        balls.remove(idx);
    }
    true
}
