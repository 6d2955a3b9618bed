//! Configuration: compiled defaults, optional `config.json`, and
//! `CARD_DUEL__`-prefixed environment overrides.

pub mod loader;

pub use loader::load;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TCP listener port.
    pub port: u16,
    pub server: ServerConfig,
    pub game: GameConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9060,
            server: ServerConfig::default(),
            game: GameConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Connection and timer behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Seconds of inactivity before a session is idle-evicted.
    pub heartbeat_timeout: u64,
    /// Seconds between idle-sweep passes.
    pub sweep_interval: u64,
    /// Seconds a player may hold the turn before it is forced over.
    pub turn_duration: u64,
    /// Upper bound for one newline-terminated frame, in bytes.
    pub max_line_length: usize,
    /// Depth of each session's outbound write queue.
    pub send_queue_depth: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout: 30,
            sweep_interval: 60,
            turn_duration: 30,
            max_line_length: 4096,
            send_queue_depth: 64,
        }
    }
}

impl ServerConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }

    pub fn turn_duration(&self) -> Duration {
        Duration::from_secs(self.turn_duration)
    }
}

/// Room-creation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub initial_health: f64,
    pub max_hand_cards: usize,
    /// Cards dealt to each player at game start.
    pub initial_hand_size: usize,
    /// Cards drawn back after a play, clamped by the hand cap.
    pub draw_per_turn: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            initial_health: 10.0,
            max_hand_cards: 10,
            initial_hand_size: 6,
            draw_per_turn: 3,
        }
    }
}

/// External store addresses. The binary never opens these itself (the
/// shipped repository is in-memory); the selected address is surfaced in
/// logs and `--print-config` for deployments wiring a real backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub local_addr: String,
    pub container_addr: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            local_addr: "127.0.0.1:13306".to_owned(),
            container_addr: "store:3306".to_owned(),
        }
    }
}

impl StoreConfig {
    /// `DOCKER_BUILD=1` selects the container-time address.
    pub fn effective_addr(&self) -> &str {
        if std::env::var("DOCKER_BUILD").as_deref() == Ok("1") {
            &self.container_addr
        } else {
            &self.local_addr
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level directive; `None` falls back to `RUST_LOG`, then `info`.
    pub level: Option<String>,
    pub format: LogFormat,
    pub enable_file_logging: bool,
    pub dir: String,
    pub filename: String,
    pub rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::Text,
            enable_file_logging: false,
            dir: "logs".to_owned(),
            filename: "card-duel.log".to_owned(),
            rotation: "daily".to_owned(),
        }
    }
}
