//! Sprite and mask pool shared by every entity constructor
//!
//! The rendering side may register real sprites with [`AssetCache::insert_sprite`];
//! anything not registered falls back to a procedural shape so the simulation
//! can run headless (relay tests, benches, dedicated clients).

use std::sync::Arc;

use parking_lot::RwLock;
use rand::Rng;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::constants::{bullet, cannon, mask::FALLBACK_BALL_VARIANTS};
use crate::game::mask::{Mask, Sprite};

/// Base diameter of the procedural ball sprite before scaling
const FALLBACK_BALL_DIAMETER: u32 = 128;

/// Identifies a sprite independent of the size it is drawn at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpriteId {
    /// Normal ball art, indexed into the ball sprite set
    Ball(u8),
    Reward,
    Bullet,
    DoubleBullet,
    Cannon,
}

impl SpriteId {
    /// Index carried on the wire for ball snapshots
    pub fn ball_index(&self) -> u8 {
        match self {
            SpriteId::Ball(i) => *i,
            _ => 0,
        }
    }
}

/// Shared handle passed into entity constructors
pub type AssetHandle = Arc<AssetCache>;

type MaskKey = (SpriteId, u32, u32);

pub struct AssetCache {
    sprites: RwLock<FxHashMap<SpriteId, Arc<Sprite>>>,
    masks: RwLock<FxHashMap<MaskKey, Arc<Mask>>>,
    ball_variants: u8,
}

impl AssetCache {
    /// Cache with the procedural fallback set only
    pub fn new() -> Self {
        Self::with_ball_variants(FALLBACK_BALL_VARIANTS)
    }

    pub fn with_ball_variants(ball_variants: u8) -> Self {
        Self {
            sprites: RwLock::new(FxHashMap::default()),
            masks: RwLock::new(FxHashMap::default()),
            ball_variants: ball_variants.max(1),
        }
    }

    pub fn shared() -> AssetHandle {
        Arc::new(Self::new())
    }

    /// Register a sprite supplied by the renderer, dropping masks built from
    /// the previous image
    pub fn insert_sprite(&self, id: SpriteId, sprite: Sprite) {
        self.sprites.write().insert(id, Arc::new(sprite));
        self.masks.write().retain(|(key, _, _), _| *key != id);
        debug!("Registered sprite {:?}", id);
    }

    /// Sprite for `id`, generating the fallback shape on first use
    pub fn sprite(&self, id: SpriteId) -> Arc<Sprite> {
        if let Some(sprite) = self.sprites.read().get(&id) {
            return sprite.clone();
        }
        let generated = Arc::new(fallback_sprite(id));
        self.sprites.write().entry(id).or_insert(generated).clone()
    }

    /// Mask of `id` scaled to `width` x `height`, built once per combination
    pub fn mask_for(&self, id: SpriteId, width: u32, height: u32) -> Arc<Mask> {
        let key = (id, width.max(1), height.max(1));
        if let Some(mask) = self.masks.read().get(&key) {
            return mask.clone();
        }
        let sprite = self.sprite(id);
        let mask = Arc::new(Mask::from_sprite(&sprite.scaled(key.1, key.2)));
        self.masks.write().entry(key).or_insert(mask).clone()
    }

    /// Square mask sized to a ball diameter
    pub fn ball_mask(&self, id: SpriteId, radius: u32) -> Arc<Mask> {
        let diameter = radius.max(1) * 2;
        self.mask_for(id, diameter, diameter)
    }

    pub fn bullet_mask(&self, double: bool) -> Arc<Mask> {
        let id = if double {
            SpriteId::DoubleBullet
        } else {
            SpriteId::Bullet
        };
        self.mask_for(id, bullet::WIDTH, bullet::HEIGHT)
    }

    pub fn cannon_mask(&self) -> Arc<Mask> {
        self.mask_for(SpriteId::Cannon, cannon::SIZE, cannon::SIZE)
    }

    pub fn ball_variants(&self) -> u8 {
        self.ball_variants
    }

    pub fn random_ball_sprite<R: Rng + ?Sized>(&self, rng: &mut R) -> SpriteId {
        SpriteId::Ball(rng.gen_range(0..self.ball_variants))
    }

    /// Map a wire sprite index back into the known ball set
    pub fn ball_sprite(&self, index: u8) -> SpriteId {
        SpriteId::Ball(index % self.ball_variants)
    }

    pub fn cached_mask_count(&self) -> usize {
        self.masks.read().len()
    }
}

impl Default for AssetCache {
    fn default() -> Self {
        Self::new()
    }
}

fn fallback_sprite(id: SpriteId) -> Sprite {
    match id {
        SpriteId::Ball(_) | SpriteId::Reward => Sprite::disc(FALLBACK_BALL_DIAMETER),
        SpriteId::Bullet | SpriteId::DoubleBullet => Sprite::rect(bullet::WIDTH, bullet::HEIGHT),
        SpriteId::Cannon => Sprite::cannon(cannon::SIZE),
    }
}
