/// Playfield and tick constants
pub mod physics {
    /// Simulation tick rate in Hz
    pub const TICK_RATE: u32 = 60;
    /// Tick duration in milliseconds (truncated, the ticker uses nanoseconds)
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
    /// Default playfield width in pixels
    pub const SCREEN_WIDTH: u32 = 1200;
    /// Default playfield height in pixels
    pub const SCREEN_HEIGHT: u32 = 900;
    /// Distance between the floor bounce line and the bottom edge
    pub const GROUND_MARGIN: f32 = 100.0;
    /// Fixed upward impulse applied on every floor bounce
    pub const BOUNCE_IMPULSE: f32 = 10.0;
}

/// Normal ball constants
pub mod ball {
    /// Downward acceleration per tick
    pub const GRAVITY: f32 = 0.1;
    /// Horizontal speed retained after a wall bounce
    pub const ELASTICITY: f32 = 0.96;
    /// Radius at or below which a ball never splits
    pub const MIN_RADIUS: u32 = 10;
    /// Split budget given to spawned balls
    pub const MAX_SPLITS: u8 = 3;
    /// Spawn radius range (inclusive)
    pub const SPAWN_RADIUS_MIN: u32 = 40;
    pub const SPAWN_RADIUS_MAX: u32 = 70;
    /// Spawn horizontal speed range
    pub const SPAWN_DX: f32 = 4.0;
    /// Distance from the side walls a ball may spawn at
    pub const SPAWN_MARGIN: u32 = 50;
    /// Split children horizontal speed range
    pub const SPLIT_DX: f32 = 2.0;
    /// Split children vertical speed range (negative = upward)
    pub const SPLIT_DY_MIN: f32 = -3.0;
    pub const SPLIT_DY_MAX: f32 = -1.0;
    /// Score for destroying a normal ball
    pub const SCORE: u32 = 10;
}

/// Reward ball constants
pub mod reward {
    /// Radius a reward ball spawns with
    pub const MIN_RADIUS: u32 = 40;
    /// Radius at which a reward ball is collected
    pub const MAX_RADIUS: u32 = 100;
    /// Radius gained per hit
    pub const GROWTH_FACTOR: u32 = 2;
    /// Score for collecting a reward ball
    pub const SCORE: u32 = 50;
    /// Extra bullets per second granted in continuous firing mode
    pub const FIRE_RATE_BONUS: u32 = 3;
    /// Extra bullets per wave granted in wave firing mode
    pub const WAVE_BONUS: u32 = 1;
}

/// Bullet constants
pub mod bullet {
    /// Upward travel per tick
    pub const SPEED: f32 = 10.0;
    /// Bullet sprite size
    pub const WIDTH: u32 = 10;
    pub const HEIGHT: u32 = 30;
    /// Horizontal offset of the outer rows from the cannon centre
    pub const ROW_OFFSET: f32 = 20.0;
    /// Maximum number of parallel bullet rows
    pub const MAX_ROWS: u32 = 3;
}

/// Cannon constants
pub mod cannon {
    /// Cannon sprite size
    pub const SIZE: u32 = 200;
    /// Distance from the bottom edge to the cannon centre
    pub const BOTTOM_OFFSET: f32 = 130.0;
    /// Default horizontal speed per tick
    pub const SPEED: f32 = 5.0;
    /// Default hit-point pool (1 = first contact ends the match)
    pub const HP: u32 = 1;
    /// Ticks of invulnerability after taking a hit
    pub const INVULNERABLE_TICKS: u32 = 60;
}

/// Firing policy constants
pub mod fire {
    /// Default continuous fire rate
    pub const BULLETS_PER_SECOND: u32 = 20;
    /// Lower bound for bullets per second after effects
    pub const MIN_BULLETS_PER_SECOND: u32 = 5;
    /// Lower bound for the continuous shot delay
    pub const MIN_SHOT_DELAY_MS: u64 = 10;
    /// Ticks between the start of two waves
    pub const WAVE_INTERVAL: u32 = 15;
    /// Ticks between two bullets of the same wave
    pub const BULLET_DELAY: u32 = 3;
    /// Bullets in each wave
    pub const BULLETS_PER_WAVE: u32 = 5;
}

/// Damage model constants
pub mod damage {
    /// Base damage per bullet
    pub const PER_BULLET: i32 = 1;
    /// Crit chance in percent
    pub const CRIT_RATE: u32 = 5;
    /// Crit damage in percent of base damage
    pub const CRIT_DAMAGE: u32 = 150;
}

/// Mask generation constants
pub mod mask {
    /// Alpha above which a sprite pixel counts as opaque
    pub const ALPHA_THRESHOLD: u8 = 127;
    /// Number of procedural ball sprite variants in the fallback set
    pub const FALLBACK_BALL_VARIANTS: u8 = 15;
}

/// Networking constants
pub mod net {
    /// Maximum framed message size
    pub const MAX_MESSAGE_SIZE: usize = 65536;
    /// Default relay port
    pub const DEFAULT_PORT: u16 = 5555;
    /// Peers per match
    pub const MAX_PEERS: usize = 2;
    /// Player id that owns ball simulation
    pub const HOST_ID: u8 = 0;
    /// Connection attempts before giving up
    pub const CONNECT_ATTEMPTS: u32 = 5;
    /// Delay between connection attempts
    pub const CONNECT_RETRY_MS: u64 = 1000;
    /// Capacity of the relay hub command channel
    pub const HUB_CHANNEL_SIZE: usize = 64;
    /// How long a disconnect waits for the writer to flush Leave
    pub const LEAVE_GRACE_MS: u64 = 200;
}

/// Exact floor(radius / 1.4) in integer arithmetic
#[inline]
pub fn split_radius(radius: u32) -> u32 {
    radius * 5 / 7
}

/// Continuous shot delay for a fire rate plus an additive adjustment
#[inline]
pub fn shot_delay_ms(bullets_per_second: u32, adjust_ms: i64) -> u64 {
    let base = 1000 / bullets_per_second.max(1) as i64;
    (base + adjust_ms).max(fire::MIN_SHOT_DELAY_MS as i64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_radius() {
        assert_eq!(split_radius(70), 50);
        assert_eq!(split_radius(50), 35);
        assert_eq!(split_radius(14), 10);
        assert_eq!(split_radius(13), 9);
    }

    #[test]
    fn test_shot_delay() {
        assert_eq!(shot_delay_ms(20, 0), 50);
        assert_eq!(shot_delay_ms(20, -30), 20);
        assert_eq!(shot_delay_ms(20, -1000), fire::MIN_SHOT_DELAY_MS);
        assert_eq!(shot_delay_ms(0, 0), 1000);
    }

    #[test]
    fn test_reward_radius_ordering() {
        assert!(reward::MIN_RADIUS < reward::MAX_RADIUS);
        assert!(reward::GROWTH_FACTOR > 0);
    }

    #[test]
    fn test_spawn_radius_can_split() {
        assert!(ball::SPAWN_RADIUS_MIN > ball::MIN_RADIUS);
        assert!(split_radius(ball::SPAWN_RADIUS_MIN) >= ball::MIN_RADIUS);
    }

    #[test]
    fn test_tick_rate() {
        assert_eq!(physics::TICK_RATE, 60);
        assert_eq!(physics::TICK_DURATION_MS, 16);
    }
}
