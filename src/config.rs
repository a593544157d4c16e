use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::game::constants::{net, physics};
use crate::game::game_loop::{GameLoopConfig, GameMode};
use crate::game::progression::LevelTable;
use crate::game::state::Bounds;

/// Read `name` from the environment, keeping the default (with a warning) when
/// the value does not parse or fails `valid`
fn env_value<T: FromStr>(name: &str, valid: impl Fn(&T) -> bool, rule: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse::<T>() {
        Ok(parsed) if valid(&parsed) => Some(parsed),
        Ok(_) => {
            tracing::warn!("{} {}, using default", name, rule);
            None
        }
        Err(_) => {
            tracing::warn!("Invalid {} '{}', using default", name, raw);
            None
        }
    }
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Address to bind the relay to
    pub bind_address: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Stop after this many matches (None = serve forever)
    pub max_matches: Option<usize>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: net::DEFAULT_PORT,
            max_matches: None,
        }
    }
}

impl RelayConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(addr) = env_value("BIND_ADDRESS", |_: &IpAddr| true, "") {
            config.bind_address = addr;
        }
        if let Some(port) = env_value("PORT", |p: &u16| *p > 0, "must be > 0") {
            config.port = port;
        }
        if let Some(max) = env_value("MAX_MATCHES", |m: &usize| *m > 0, "must be > 0") {
            config.max_matches = Some(max);
        }

        config
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port cannot be 0".to_string());
        }
        if self.max_matches == Some(0) {
            return Err("max_matches must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Peer-side connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay address, host:port
    pub server_addr: String,
    /// Connection attempts before giving up
    pub connect_attempts: u32,
    /// Delay between attempts
    pub connect_retry: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: format!("127.0.0.1:{}", net::DEFAULT_PORT),
            connect_attempts: net::CONNECT_ATTEMPTS,
            connect_retry: Duration::from_millis(net::CONNECT_RETRY_MS),
        }
    }
}

impl ClientConfig {
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SERVER_ADDR") {
            if addr.trim().is_empty() {
                tracing::warn!("SERVER_ADDR is empty, using default");
            } else {
                config.server_addr = addr;
            }
        }
        if let Some(attempts) = env_value(
            "CONNECT_ATTEMPTS",
            |a: &u32| (1..=100).contains(a),
            "must be 1-100",
        ) {
            config.connect_attempts = attempts;
        }
        if let Some(ms) = env_value(
            "CONNECT_RETRY_MS",
            |ms: &u64| *ms <= 60_000,
            "must be at most 60000",
        ) {
            config.connect_retry = Duration::from_millis(ms);
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.connect_attempts == 0 {
            return Err("connect_attempts must be at least 1".to_string());
        }
        if self.server_addr.is_empty() {
            return Err("server_addr cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Simulation settings
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub tick_rate: u32,
    /// Optional JSON file overriding the built-in level table
    pub level_table_path: Option<String>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            screen_width: physics::SCREEN_WIDTH,
            screen_height: physics::SCREEN_HEIGHT,
            tick_rate: physics::TICK_RATE,
            level_table_path: None,
        }
    }
}

impl GameConfig {
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Some(w) = env_value("SCREEN_WIDTH", |w: &u32| (200..=8192).contains(w), "must be 200-8192") {
            config.screen_width = w;
        }
        if let Some(h) = env_value("SCREEN_HEIGHT", |h: &u32| (300..=8192).contains(h), "must be 300-8192") {
            config.screen_height = h;
        }
        if let Some(rate) = env_value("TICK_RATE", |r: &u32| (1..=240).contains(r), "must be 1-240") {
            config.tick_rate = rate;
        }
        if let Ok(path) = std::env::var("LEVEL_TABLE") {
            config.level_table_path = Some(path);
        }

        config
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err("Screen size cannot be 0".to_string());
        }
        if self.screen_height as f32 <= physics::GROUND_MARGIN {
            return Err("screen_height must exceed the ground margin".to_string());
        }
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        Ok(())
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::new(self.screen_width, self.screen_height)
    }

    /// Level table from `level_table_path`, or the built-in one if unset or
    /// unreadable
    pub fn level_table(&self) -> LevelTable {
        let Some(path) = &self.level_table_path else {
            return LevelTable::default();
        };
        let loaded = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|json| LevelTable::from_json(&json));
        match loaded {
            Ok(table) => {
                tracing::info!("Loaded {} levels from {}", table.levels().len(), path);
                table
            }
            Err(e) => {
                tracing::warn!("Could not load level table {}: {}, using default", path, e);
                LevelTable::default()
            }
        }
    }

    /// Simulation settings for one side of a match
    pub fn loop_config(&self, mode: GameMode) -> GameLoopConfig {
        GameLoopConfig {
            bounds: self.bounds(),
            mode,
            levels: self.level_table(),
            tick_rate: self.tick_rate,
            ..GameLoopConfig::default()
        }
    }
}
