//! Bullet firing: timers for the two firing policies, volley layout and the
//! damage roll
//!
//! Single-player fires continuously against a millisecond shot delay derived
//! from the simulation clock; multiplayer fires fixed-size waves counted in
//! ticks. A side only ever runs one of the two. Bigger waves tighten the gap
//! between their bullets so the whole burst fits in one wave interval; one
//! bullet per tick is the ceiling.

use rand::Rng;
use smallvec::{smallvec, SmallVec};

use crate::game::assets::AssetCache;
use crate::game::constants::{bullet, fire};
use crate::game::progression::CannonStats;
use crate::game::state::Bullet;
use crate::util::vec2::Vec2;

/// Firing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireMode {
    /// Time-based: one volley every `shot_delay_ms`
    Continuous,
    /// Tick-based: bursts of `bullets_per_wave`
    Wave,
}

/// Per-side firing timers
#[derive(Debug, Clone)]
pub struct FireControl {
    mode: FireMode,
    tick_rate: u32,
    last_shot_ms: Option<u64>,
    wave_timer: u32,
    bullet_cooldown: u32,
    fired_in_wave: u32,
}

impl FireControl {
    /// `tick_rate` converts ticks to milliseconds for the continuous clock
    pub fn new(mode: FireMode, tick_rate: u32) -> Self {
        Self {
            mode,
            tick_rate: tick_rate.max(1),
            last_shot_ms: None,
            wave_timer: 0,
            bullet_cooldown: 0,
            fired_in_wave: 0,
        }
    }

    pub fn mode(&self) -> FireMode {
        self.mode
    }

    /// Advance the timers by one tick. Returns true when a volley is due.
    pub fn tick(&mut self, tick: u64, stats: &CannonStats) -> bool {
        match self.mode {
            FireMode::Continuous => {
                let now_ms = tick * 1000 / self.tick_rate as u64;
                let due = match self.last_shot_ms {
                    None => true,
                    Some(last) => now_ms.saturating_sub(last) >= stats.shot_delay_ms(),
                };
                if due {
                    self.last_shot_ms = Some(now_ms);
                }
                due
            }
            FireMode::Wave => {
                self.wave_timer += 1;
                if self.wave_timer >= fire::WAVE_INTERVAL {
                    self.wave_timer = 0;
                    self.fired_in_wave = 0;
                }
                if self.fired_in_wave >= stats.bullets_per_wave {
                    return false;
                }
                self.bullet_cooldown += 1;
                if self.bullet_cooldown >= bullet_delay(stats.bullets_per_wave) {
                    self.bullet_cooldown = 0;
                    self.fired_in_wave += 1;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Ticks between two bullets of a wave: the default delay, shortened when
/// the wave would not fit in one wave interval
#[inline]
pub fn bullet_delay(bullets_per_wave: u32) -> u32 {
    (fire::WAVE_INTERVAL / bullets_per_wave.max(1)).clamp(1, fire::BULLET_DELAY)
}

/// Horizontal offsets of each bullet row relative to the cannon
pub fn row_offsets(rows: u32) -> SmallVec<[f32; 3]> {
    match rows.clamp(1, bullet::MAX_ROWS) {
        1 => smallvec![0.0],
        2 => smallvec![-bullet::ROW_OFFSET, bullet::ROW_OFFSET],
        _ => smallvec![-bullet::ROW_OFFSET, 0.0, bullet::ROW_OFFSET],
    }
}

/// Push one volley at `origin` into `bullets`
pub fn fire_volley(assets: &AssetCache, origin: Vec2, stats: &CannonStats, bullets: &mut Vec<Bullet>) {
    let offsets = row_offsets(stats.bullet_rows);
    let double = offsets.len() > 1;
    let multiplier = stats.damage_multiplier();
    for dx in offsets {
        bullets.push(Bullet::new(assets, origin.offset_x(dx), double, multiplier));
    }
}

/// Damage dealt by one bullet: base damage times the bullet multiplier,
/// scaled by crit damage when a 1..=100 roll lands within the crit rate
pub fn roll_damage<R: Rng + ?Sized>(stats: &CannonStats, bullet: &Bullet, rng: &mut R) -> i32 {
    let base = stats.damage_per_bullet as f32 * bullet.damage_multiplier;
    let roll: u32 = rng.gen_range(1..=100);
    let damage = if roll <= stats.crit_rate {
        base * stats.crit_damage as f32 / 100.0
    } else {
        base
    };
    (damage as i32).max(1)
}
