//! Game state definitions and structures
//!
//! Contains all entities (balls, bullets, cannons) and the per-side world
//! owned by the simulation step.

use std::sync::Arc;

use rand::Rng;
use smallvec::SmallVec;

use crate::game::assets::{AssetCache, SpriteId};
use crate::game::constants::{ball, bullet, cannon, physics, reward, split_radius};
use crate::game::mask::{overlaps, Mask};
use crate::util::vec2::Vec2;

/// Split produces at most two children
pub type SplitChildren = SmallVec<[Ball; 2]>;

/// Variant-specific ball data
#[derive(Debug, Clone, PartialEq)]
pub enum BallKind {
    Normal {
        hp: i32,
        /// Hit points the ball was created with, halved for split children
        original_hp: i32,
        max_splits: u8,
        splits_remaining: u8,
    },
    Reward {
        min_radius: u32,
        max_radius: u32,
        growth_factor: u32,
    },
}

/// Descending ball, normal or reward
#[derive(Debug, Clone)]
pub struct Ball {
    pub position: Vec2,
    pub velocity: Vec2,
    /// Radius in pixels; the mask is always 2 * radius square
    radius: u32,
    pub gravity: f32,
    pub elasticity: f32,
    sprite: SpriteId,
    pub kind: BallKind,
    mask: Arc<Mask>,
}

/// Result of resolving a single bullet hit against a ball
#[derive(Debug)]
pub enum HitOutcome {
    /// Ball took damage (or grew) and stays in play
    Survived,
    /// Normal ball reached hp <= 0; children replace it
    Killed { children: SplitChildren },
    /// Reward ball reached its maximum radius
    Collected,
}

impl HitOutcome {
    #[inline]
    pub fn removes_ball(&self) -> bool {
        !matches!(self, HitOutcome::Survived)
    }

    /// Score credited to the shooter
    pub fn score(&self) -> u32 {
        match self {
            HitOutcome::Survived => 0,
            HitOutcome::Killed { .. } => ball::SCORE,
            HitOutcome::Collected => reward::SCORE,
        }
    }
}

impl Ball {
    pub fn normal(
        assets: &AssetCache,
        sprite: SpriteId,
        position: Vec2,
        velocity: Vec2,
        radius: u32,
        hp: i32,
        max_splits: u8,
    ) -> Self {
        Self::with_kind(
            assets,
            sprite,
            position,
            velocity,
            radius,
            BallKind::Normal {
                hp,
                original_hp: hp,
                max_splits,
                splits_remaining: max_splits,
            },
        )
    }

    /// Reward ball at its starting radius with the default growth rules
    pub fn reward(assets: &AssetCache, position: Vec2, velocity: Vec2) -> Self {
        Self::with_kind(
            assets,
            SpriteId::Reward,
            position,
            velocity,
            reward::MIN_RADIUS,
            BallKind::Reward {
                min_radius: reward::MIN_RADIUS,
                max_radius: reward::MAX_RADIUS,
                growth_factor: reward::GROWTH_FACTOR,
            },
        )
    }

    /// Build a ball of any kind; the mask is fetched from `assets` for the
    /// given radius
    pub fn with_kind(
        assets: &AssetCache,
        sprite: SpriteId,
        position: Vec2,
        velocity: Vec2,
        radius: u32,
        kind: BallKind,
    ) -> Self {
        let radius = match kind {
            BallKind::Reward {
                min_radius,
                max_radius,
                ..
            } => radius.clamp(min_radius, max_radius.max(min_radius)),
            BallKind::Normal { .. } => radius.max(1),
        };
        Self {
            position,
            velocity,
            radius,
            gravity: ball::GRAVITY,
            elasticity: ball::ELASTICITY,
            sprite,
            kind,
            mask: assets.ball_mask(sprite, radius),
        }
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    pub fn sprite(&self) -> SpriteId {
        self.sprite
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn is_reward(&self) -> bool {
        matches!(self.kind, BallKind::Reward { .. })
    }

    pub fn hp(&self) -> Option<i32> {
        match self.kind {
            BallKind::Normal { hp, .. } => Some(hp),
            BallKind::Reward { .. } => None,
        }
    }

    pub fn splits_remaining(&self) -> Option<u8> {
        match self.kind {
            BallKind::Normal {
                splits_remaining, ..
            } => Some(splits_remaining),
            BallKind::Reward { .. } => None,
        }
    }

    /// Number shown on the ball: hp for normal balls, hits left to collect
    /// for reward balls
    pub fn display_value(&self) -> i32 {
        match self.kind {
            BallKind::Normal { hp, .. } => hp,
            BallKind::Reward {
                max_radius,
                growth_factor,
                ..
            } => {
                let remaining = max_radius.saturating_sub(self.radius);
                remaining.div_ceil(growth_factor.max(1)) as i32
            }
        }
    }

    /// Whether this ball may still split (ignoring hp)
    pub fn can_split(&self) -> bool {
        match self.kind {
            BallKind::Normal {
                splits_remaining, ..
            } => {
                splits_remaining > 0
                    && self.radius > ball::MIN_RADIUS
                    && split_radius(self.radius) >= ball::MIN_RADIUS
            }
            BallKind::Reward { .. } => false,
        }
    }

    /// Two children at x -/+ new_radius carrying the decremented split budget,
    /// or nothing when the split guard fails
    pub fn split<R: Rng + ?Sized>(&self, assets: &AssetCache, rng: &mut R) -> SplitChildren {
        let mut children = SplitChildren::new();
        if !self.can_split() {
            return children;
        }
        let BallKind::Normal {
            original_hp,
            max_splits,
            splits_remaining,
            ..
        } = self.kind
        else {
            return children;
        };

        let new_radius = split_radius(self.radius);
        let new_hp = (original_hp / 2).max(1);
        let mask = assets.ball_mask(self.sprite, new_radius);

        for side in [-1.0f32, 1.0] {
            let velocity = Vec2::new(
                rng.gen_range(-ball::SPLIT_DX..=ball::SPLIT_DX),
                rng.gen_range(ball::SPLIT_DY_MIN..=ball::SPLIT_DY_MAX),
            );
            children.push(Ball {
                position: self.position.offset_x(side * new_radius as f32),
                velocity,
                radius: new_radius,
                gravity: self.gravity,
                elasticity: self.elasticity,
                sprite: self.sprite,
                kind: BallKind::Normal {
                    hp: new_hp,
                    original_hp: new_hp,
                    max_splits,
                    splits_remaining: splits_remaining - 1,
                },
                mask: mask.clone(),
            });
        }
        children
    }

    /// Apply a bullet hit. Normal balls lose hp and split on death; reward
    /// balls grow (regenerating their mask) and are collected at max radius.
    pub fn take_hit<R: Rng + ?Sized>(
        &mut self,
        damage: i32,
        assets: &AssetCache,
        rng: &mut R,
    ) -> HitOutcome {
        match &mut self.kind {
            BallKind::Normal { hp, .. } => {
                *hp = hp.saturating_sub(damage);
                if *hp <= 0 {
                    HitOutcome::Killed {
                        children: self.split(assets, rng),
                    }
                } else {
                    HitOutcome::Survived
                }
            }
            BallKind::Reward { max_radius, .. } => {
                let max_radius = *max_radius;
                self.grow_once(assets);
                if self.radius >= max_radius {
                    HitOutcome::Collected
                } else {
                    HitOutcome::Survived
                }
            }
        }
    }

    /// Grow a reward ball by one step and regenerate its mask. Returns false
    /// for normal balls and once the maximum radius is reached.
    pub fn grow_once(&mut self, assets: &AssetCache) -> bool {
        let BallKind::Reward {
            max_radius,
            growth_factor,
            ..
        } = self.kind
        else {
            return false;
        };
        let grown = (self.radius + growth_factor).min(max_radius);
        if grown == self.radius {
            return false;
        }
        self.radius = grown;
        self.mask = assets.ball_mask(self.sprite, grown);
        true
    }

    /// What `take_hit` would report, without touching the ball. Used by the
    /// mirror side, whose ball list is read-only.
    pub fn predict_hit(&self, damage: i32) -> HitOutcome {
        match self.kind {
            BallKind::Normal { hp, .. } if hp.saturating_sub(damage) <= 0 => HitOutcome::Killed {
                children: SplitChildren::new(),
            },
            BallKind::Normal { .. } => HitOutcome::Survived,
            BallKind::Reward {
                max_radius,
                growth_factor,
                ..
            } => {
                if self.radius + growth_factor >= max_radius {
                    HitOutcome::Collected
                } else {
                    HitOutcome::Survived
                }
            }
        }
    }
}

/// Upward-travelling bullet
#[derive(Debug, Clone)]
pub struct Bullet {
    pub position: Vec2,
    pub speed: f32,
    pub damage_multiplier: f32,
    /// Fired as part of a multi-row volley
    pub double: bool,
    mask: Arc<Mask>,
}

impl Bullet {
    pub fn new(assets: &AssetCache, position: Vec2, double: bool, damage_multiplier: f32) -> Self {
        Self {
            position,
            speed: bullet::SPEED,
            damage_multiplier,
            double,
            mask: assets.bullet_mask(double),
        }
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// Bullet has left the top of the playfield
    #[inline]
    pub fn is_offscreen(&self) -> bool {
        self.position.y < 0.0
    }
}

/// Per-tick movement input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveIntent {
    pub left: bool,
    pub right: bool,
}

impl MoveIntent {
    pub const IDLE: MoveIntent = MoveIntent {
        left: false,
        right: false,
    };

    /// -1, 0 or 1
    pub fn direction(&self) -> f32 {
        match (self.left, self.right) {
            (true, false) => -1.0,
            (false, true) => 1.0,
            _ => 0.0,
        }
    }
}

/// Player cannon
#[derive(Debug, Clone)]
pub struct Cannon {
    pub x: f32,
    pub y: f32,
    pub speed: f32,
    hp: u32,
    invulnerable_ticks: u32,
    mask: Arc<Mask>,
}

impl Cannon {
    pub fn new(assets: &AssetCache, x: f32, screen_height: u32) -> Self {
        Self {
            x,
            y: screen_height as f32 - cannon::BOTTOM_OFFSET,
            speed: cannon::SPEED,
            hp: cannon::HP,
            invulnerable_ticks: 0,
            mask: assets.cannon_mask(),
        }
    }

    pub fn with_hp(mut self, hp: u32) -> Self {
        self.hp = hp.max(1);
        self
    }

    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    /// Card effects add or remove hit points but never finish a live cannon
    pub fn adjust_hp(&mut self, delta: i32) {
        if self.is_destroyed() {
            return;
        }
        self.hp = (self.hp as i64 + delta as i64).clamp(1, u32::MAX as i64) as u32;
    }

    pub fn is_invulnerable(&self) -> bool {
        self.invulnerable_ticks > 0
    }

    pub fn is_destroyed(&self) -> bool {
        self.hp == 0
    }

    /// Move by one tick of input, x clamped to [0, screen_width]
    pub fn apply_intent(&mut self, intent: MoveIntent, screen_width: u32) {
        self.x = (self.x + intent.direction() * self.speed).clamp(0.0, screen_width as f32);
    }

    /// Count down the invulnerability window
    pub fn tick(&mut self) {
        self.invulnerable_ticks = self.invulnerable_ticks.saturating_sub(1);
    }

    /// Register a ball contact. Returns false while invulnerable or already
    /// destroyed.
    pub fn take_contact(&mut self) -> bool {
        if self.is_invulnerable() || self.is_destroyed() {
            return false;
        }
        self.hp -= 1;
        self.invulnerable_ticks = cannon::INVULNERABLE_TICKS;
        true
    }

    pub fn touches(&self, ball: &Ball) -> bool {
        overlaps(&self.mask, self.position(), ball.mask(), ball.position)
    }
}

/// Last known state of the other peer
#[derive(Debug, Clone, Default)]
pub struct OpponentState {
    pub cannon_x: Option<f32>,
    pub bullets: Vec<Bullet>,
    pub score: u32,
}

/// Playfield size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Y of the floor bounce line
    #[inline]
    pub fn floor(&self) -> f32 {
        self.height as f32 - physics::GROUND_MARGIN
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::new(physics::SCREEN_WIDTH, physics::SCREEN_HEIGHT)
    }
}

/// Everything one side of a match simulates
#[derive(Debug, Clone)]
pub struct GameState {
    pub tick: u64,
    pub bounds: Bounds,
    pub cannon: Cannon,
    pub balls: Vec<Ball>,
    pub bullets: Vec<Bullet>,
    pub opponent: Option<OpponentState>,
    pub score: u32,
    /// Balls destroyed and reward balls collected by this side's bullets
    pub kills: u32,
    pub rewards_collected: u32,
    pub level: u8,
    pub spawn_timer: u32,
}

impl GameState {
    pub fn new(assets: &AssetCache, bounds: Bounds, cannon_x: f32) -> Self {
        Self {
            tick: 0,
            bounds,
            cannon: Cannon::new(assets, cannon_x, bounds.height),
            balls: Vec::new(),
            bullets: Vec::new(),
            opponent: None,
            score: 0,
            kills: 0,
            rewards_collected: 0,
            level: 1,
            spawn_timer: 0,
        }
    }

    pub fn opponent_score(&self) -> Option<u32> {
        self.opponent.as_ref().map(|o| o.score)
    }

    /// Read-only snapshot for the renderer
    pub fn frame_view(&self) -> FrameView {
        let opponent_cannon = self
            .opponent
            .as_ref()
            .and_then(|o| o.cannon_x)
            .map(|x| Vec2::new(x, self.cannon.y));
        FrameView {
            tick: self.tick,
            cannon: self.cannon.position(),
            cannon_hp: self.cannon.hp(),
            cannon_invulnerable: self.cannon.is_invulnerable(),
            opponent_cannon,
            balls: self
                .balls
                .iter()
                .map(|b| BallView {
                    reward: b.is_reward(),
                    position: b.position,
                    radius: b.radius(),
                    display_value: b.display_value(),
                    sprite: b.sprite(),
                })
                .collect(),
            bullets: self.bullets.iter().map(|b| b.position).collect(),
            opponent_bullets: self
                .opponent
                .as_ref()
                .map(|o| o.bullets.iter().map(|b| b.position).collect())
                .unwrap_or_default(),
            score: self.score,
            opponent_score: self.opponent_score(),
            level: self.level,
        }
    }
}

/// Ball entry of a [`FrameView`]
#[derive(Debug, Clone, PartialEq)]
pub struct BallView {
    pub reward: bool,
    pub position: Vec2,
    pub radius: u32,
    pub display_value: i32,
    pub sprite: SpriteId,
}

/// Per-tick read-only view handed to the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct FrameView {
    pub tick: u64,
    pub cannon: Vec2,
    pub cannon_hp: u32,
    pub cannon_invulnerable: bool,
    pub opponent_cannon: Option<Vec2>,
    pub balls: Vec<BallView>,
    pub bullets: Vec<Vec2>,
    pub opponent_bullets: Vec<Vec2>,
    pub score: u32,
    pub opponent_score: Option<u32>,
    pub level: u8,
}
