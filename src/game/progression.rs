//! Level thresholds, saved progress and the cannon stat bag that card effects
//! modify
//!
//! Everything here is plain data plus pure functions; persistence and card
//! draws belong to the caller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::constants::{bullet, cannon, damage, fire, shot_delay_ms};

/// Spawn and difficulty parameters for one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    pub id: u8,
    pub name: String,
    /// Ticks between spawns
    pub spawn_interval: u32,
    pub ball_hp_min: i32,
    pub ball_hp_max: i32,
    /// Range of the initial downward speed
    pub ball_speed_min: f32,
    pub ball_speed_max: f32,
    /// Probability in [0, 1] that a spawn is a reward ball
    pub reward_ball_chance: f64,
    /// Score needed to unlock this level
    pub unlock_score: u32,
}

impl LevelConfig {
    #[allow(clippy::too_many_arguments)]
    fn preset(
        id: u8,
        name: &str,
        spawn_interval: u32,
        hp: (i32, i32),
        speed: (f32, f32),
        reward_ball_chance: f64,
        unlock_score: u32,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            spawn_interval,
            ball_hp_min: hp.0,
            ball_hp_max: hp.1,
            ball_speed_min: speed.0,
            ball_speed_max: speed.1,
            reward_ball_chance,
            unlock_score,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.spawn_interval == 0 {
            return Err(format!("level {}: spawn_interval must be > 0", self.id));
        }
        if self.ball_hp_min < 1 || self.ball_hp_min > self.ball_hp_max {
            return Err(format!(
                "level {}: ball hp range {}..={} is invalid",
                self.id, self.ball_hp_min, self.ball_hp_max
            ));
        }
        if !(self.ball_speed_min <= self.ball_speed_max) {
            return Err(format!(
                "level {}: ball speed range {}..={} is invalid",
                self.id, self.ball_speed_min, self.ball_speed_max
            ));
        }
        if !(0.0..=1.0).contains(&self.reward_ball_chance) {
            return Err(format!(
                "level {}: reward_ball_chance must be within [0, 1]",
                self.id
            ));
        }
        Ok(())
    }
}

impl Default for LevelConfig {
    fn default() -> Self {
        LevelTable::default().levels.remove(0)
    }
}

/// Ordered set of levels, lowest unlock score first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTable {
    levels: Vec<LevelConfig>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self {
            levels: vec![
                LevelConfig::preset(1, "Beginner", 300, (20, 30), (1.0, 2.5), 0.2, 0),
                LevelConfig::preset(2, "Rookie", 250, (25, 35), (1.2, 2.8), 0.18, 500),
                LevelConfig::preset(3, "Veteran", 200, (30, 45), (1.5, 3.2), 0.15, 1500),
                LevelConfig::preset(4, "Expert", 150, (40, 55), (1.8, 3.5), 0.12, 3000),
                LevelConfig::preset(5, "Master", 120, (50, 70), (2.0, 4.0), 0.1, 5000),
            ],
        }
    }
}

impl LevelTable {
    /// Build from a list of levels, sorting by unlock score
    pub fn new(mut levels: Vec<LevelConfig>) -> Result<Self, String> {
        if levels.is_empty() {
            return Err("level table is empty".to_string());
        }
        levels.sort_by_key(|l| l.unlock_score);
        if levels[0].unlock_score != 0 {
            return Err("first level must unlock at score 0".to_string());
        }
        for level in &levels {
            level.validate()?;
        }
        Ok(Self { levels })
    }

    /// Parse a JSON array of levels
    pub fn from_json(json: &str) -> Result<Self, String> {
        let levels: Vec<LevelConfig> =
            serde_json::from_str(json).map_err(|e| format!("invalid level table: {}", e))?;
        Self::new(levels)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.levels)
    }

    pub fn levels(&self) -> &[LevelConfig] {
        &self.levels
    }

    pub fn get(&self, id: u8) -> Option<&LevelConfig> {
        self.levels.iter().find(|l| l.id == id)
    }

    pub fn first(&self) -> &LevelConfig {
        &self.levels[0]
    }

    /// Highest level whose unlock score is reached
    pub fn level_for_score(&self, score: u32) -> &LevelConfig {
        self.levels
            .iter()
            .rev()
            .find(|l| score >= l.unlock_score)
            .unwrap_or(&self.levels[0])
    }

    /// Next locked level and the score still missing, if any
    pub fn next_unlock(&self, score: u32) -> Option<(&LevelConfig, u32)> {
        self.levels
            .iter()
            .find(|l| l.unlock_score > score)
            .map(|l| (l, l.unlock_score - score))
    }
}

/// Persistent player progress (file I/O is left to the caller)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub highest_score: u32,
    pub unlocked_levels: Vec<u8>,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            highest_score: 0,
            unlocked_levels: vec![1],
        }
    }
}

impl Progress {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_unlocked(&self, level: u8) -> bool {
        self.unlocked_levels.contains(&level)
    }

    /// Record a finished match. Returns the ids of newly unlocked levels.
    pub fn record_score(&mut self, score: u32, table: &LevelTable) -> Vec<u8> {
        self.highest_score = self.highest_score.max(score);
        let mut unlocked = Vec::new();
        for level in table.levels() {
            if self.highest_score >= level.unlock_score && !self.is_unlocked(level.id) {
                self.unlocked_levels.push(level.id);
                unlocked.push(level.id);
            }
        }
        self.unlocked_levels.sort_unstable();
        unlocked
    }
}

/// Stats a card effect can modify
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKey {
    Damage,
    /// Bullet damage multiplier in percent
    DamageMultiplier,
    CritRate,
    CritDamage,
    BulletsPerSecond,
    /// Additive adjustment to the continuous shot delay in ms
    FireInterval,
    BulletRows,
    BulletsPerWave,
    CannonSpeed,
    CannonHp,
    Coins,
}

impl StatKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatKey::Damage => "damage",
            StatKey::DamageMultiplier => "damage_multiplier",
            StatKey::CritRate => "crit_rate",
            StatKey::CritDamage => "crit_damage",
            StatKey::BulletsPerSecond => "bullets_per_second",
            StatKey::FireInterval => "shot_delay",
            StatKey::BulletRows => "bullet_rows",
            StatKey::BulletsPerWave => "bullets_per_wave",
            StatKey::CannonSpeed => "cannon_speed",
            StatKey::CannonHp => "cannon_hp",
            StatKey::Coins => "coins",
        }
    }
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatKey {
    type Err = EffectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = match s.trim().to_ascii_lowercase().as_str() {
            "damage" | "damage_bonus" | "damage_per_bullet" => StatKey::Damage,
            "damage_multiplier" => StatKey::DamageMultiplier,
            "crit_rate" => StatKey::CritRate,
            "crit_damage" => StatKey::CritDamage,
            "bullets_per_second" | "fire_rate" => StatKey::BulletsPerSecond,
            "shot_delay" | "fire_interval" => StatKey::FireInterval,
            "bullet_rows" | "rows" => StatKey::BulletRows,
            "bullets_per_wave" => StatKey::BulletsPerWave,
            "cannon_speed" => StatKey::CannonSpeed,
            "cannon_hp" | "hp" => StatKey::CannonHp,
            "coins" => StatKey::Coins,
            other => return Err(EffectParseError::UnknownStat(other.to_string())),
        };
        Ok(key)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EffectParseError {
    #[error("effect string is empty")]
    Empty,
    #[error("missing +/- delta in '{0}'")]
    MissingDelta(String),
    #[error("unknown stat '{0}'")]
    UnknownStat(String),
    #[error("invalid number in '{0}'")]
    InvalidNumber(String),
}

/// List of additive stat deltas. Card names never reach the simulation, only
/// the effect they resolve to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Effect {
    pub deltas: Vec<(StatKey, i32)>,
}

impl Effect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: StatKey, delta: i32) -> Self {
        self.deltas.push((key, delta));
        self
    }
}

impl FromStr for Effect {
    type Err = EffectParseError;

    /// Parses `"damage+1, fire_rate-5, crit_rate+15%"`. A trailing `%` is
    /// accepted; percentage stats are already stored in percent.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut deltas = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let sign_at = part
                .find(&['+', '-'][..])
                .ok_or_else(|| EffectParseError::MissingDelta(part.to_string()))?;
            let key: StatKey = part[..sign_at].parse()?;
            let number = part[sign_at..].trim_end_matches('%').replace(' ', "");
            let delta: i32 = number
                .parse()
                .map_err(|_| EffectParseError::InvalidNumber(part.to_string()))?;
            deltas.push((key, delta));
        }
        if deltas.is_empty() {
            return Err(EffectParseError::Empty);
        }
        Ok(Self { deltas })
    }
}

/// Mutable cannon stat bag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CannonStats {
    pub damage_per_bullet: u32,
    pub damage_multiplier_pct: u32,
    pub crit_rate: u32,
    pub crit_damage: u32,
    pub bullets_per_second: u32,
    pub fire_interval_ms: i32,
    pub bullet_rows: u32,
    pub bullets_per_wave: u32,
    pub cannon_speed: u32,
    pub cannon_hp: u32,
    pub coins: u32,
}

impl Default for CannonStats {
    fn default() -> Self {
        Self {
            damage_per_bullet: damage::PER_BULLET as u32,
            damage_multiplier_pct: 100,
            crit_rate: damage::CRIT_RATE,
            crit_damage: damage::CRIT_DAMAGE,
            bullets_per_second: fire::BULLETS_PER_SECOND,
            fire_interval_ms: 0,
            bullet_rows: 1,
            bullets_per_wave: fire::BULLETS_PER_WAVE,
            cannon_speed: cannon::SPEED as u32,
            cannon_hp: cannon::HP,
            coins: 0,
        }
    }
}

fn add_clamped(value: u32, delta: i32, min: u32, max: u32) -> u32 {
    (value as i64 + delta as i64).clamp(min as i64, max as i64) as u32
}

impl CannonStats {
    /// Apply one delta, clamping to the stat's legal range
    pub fn apply(&mut self, key: StatKey, delta: i32) {
        match key {
            StatKey::Damage => {
                self.damage_per_bullet = add_clamped(self.damage_per_bullet, delta, 1, u32::MAX)
            }
            StatKey::DamageMultiplier => {
                self.damage_multiplier_pct =
                    add_clamped(self.damage_multiplier_pct, delta, 10, u32::MAX)
            }
            StatKey::CritRate => self.crit_rate = add_clamped(self.crit_rate, delta, 0, 100),
            StatKey::CritDamage => {
                self.crit_damage = add_clamped(self.crit_damage, delta, 100, u32::MAX)
            }
            StatKey::BulletsPerSecond => {
                self.bullets_per_second = add_clamped(
                    self.bullets_per_second,
                    delta,
                    fire::MIN_BULLETS_PER_SECOND,
                    u32::MAX,
                )
            }
            StatKey::FireInterval => {
                self.fire_interval_ms = self.fire_interval_ms.saturating_add(delta);
                // Keep the adjustment from pushing the delay below the floor
                let base = 1000 / self.bullets_per_second.max(1) as i32;
                let floor = fire::MIN_SHOT_DELAY_MS as i32 - base;
                self.fire_interval_ms = self.fire_interval_ms.max(floor);
            }
            StatKey::BulletRows => {
                self.bullet_rows = add_clamped(self.bullet_rows, delta, 1, bullet::MAX_ROWS)
            }
            StatKey::BulletsPerWave => {
                self.bullets_per_wave = add_clamped(self.bullets_per_wave, delta, 1, u32::MAX)
            }
            StatKey::CannonSpeed => {
                self.cannon_speed = add_clamped(self.cannon_speed, delta, 1, u32::MAX)
            }
            StatKey::CannonHp => self.cannon_hp = add_clamped(self.cannon_hp, delta, 1, u32::MAX),
            StatKey::Coins => self.coins = add_clamped(self.coins, delta, 0, u32::MAX),
        }
    }

    /// Continuous-fire delay in milliseconds (never below the floor)
    pub fn shot_delay_ms(&self) -> u64 {
        shot_delay_ms(self.bullets_per_second, self.fire_interval_ms as i64)
    }

    pub fn damage_multiplier(&self) -> f32 {
        self.damage_multiplier_pct as f32 / 100.0
    }
}

/// Apply every delta of `effect` in order
pub fn apply_effect(stats: &mut CannonStats, effect: &Effect) {
    for &(key, delta) in &effect.deltas {
        stats.apply(key, delta);
    }
}
