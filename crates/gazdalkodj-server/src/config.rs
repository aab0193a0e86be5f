//! Server configuration

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use gazdalkodj_protocol::{Player, PlayerIndex};
use serde::{Deserialize, Serialize};

/// A configured seat for a new match.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeatConfig {
    pub id: String,
    pub name: String,
    #[serde(default = "default_image")]
    pub image: String,
}

fn default_image() -> String {
    "puppets/red-1.png".to_string()
}

impl SeatConfig {
    pub fn to_player(&self, index: usize) -> Player {
        Player::new(
            self.id.clone(),
            PlayerIndex(index as u8),
            self.name.clone(),
            self.image.clone(),
        )
    }
}

/// Server configuration, loadable from YAML. Missing keys take their defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server
    pub bind_address: SocketAddr,
    /// Maximum simultaneous connections
    pub max_clients: usize,
    /// Number of default seats when a new match is created
    pub players: usize,
    /// Explicit seats for a new match; overrides `players` when non-empty
    pub seats: Vec<SeatConfig>,
    /// Display name of a newly created match
    pub game_name: Option<String>,
    /// Directory for saved matches; matches are not persisted when unset
    pub save_dir: Option<PathBuf>,
    /// Saved match to resume instead of creating a new one
    pub resume_game: Option<String>,
    /// Seconds a disconnected seat stays reserved for its reconnect token
    pub disconnect_grace_secs: u64,
    /// Dice and fine RNG seed; random when unset
    pub seed: Option<u64>,
    /// Chance that a free train ride gets fined
    pub fine_probability: f64,
    /// Messages allowed per client per rate window
    pub rate_limit_messages: u32,
    pub rate_limit_window_ms: u64,
    /// Server tick interval
    pub tick_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 7878)),
            max_clients: 16,
            players: 2,
            seats: Vec::new(),
            game_name: None,
            save_dir: None,
            resume_game: None,
            disconnect_grace_secs: 120,
            seed: None,
            fine_probability: 0.5,
            rate_limit_messages: 60,
            rate_limit_window_ms: 1_000,
            tick_ms: 16,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&yaml).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=8).contains(&self.players),
            "players must be between 1 and 8, got {}",
            self.players
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.fine_probability),
            "fine_probability must be within 0..=1, got {}",
            self.fine_probability
        );
        anyhow::ensure!(
            self.seats.len() <= 8,
            "at most 8 seats, got {}",
            self.seats.len()
        );
        let mut ids: Vec<&str> = self.seats.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        anyhow::ensure!(ids.len() == self.seats.len(), "seat ids must be unique");
        anyhow::ensure!(self.max_clients > 0, "max_clients must be positive");
        anyhow::ensure!(self.tick_ms > 0, "tick_ms must be positive");
        Ok(())
    }

    /// Players of a new match: the configured seats, else `players` defaults.
    pub fn initial_players(&self) -> Option<Vec<Player>> {
        if self.seats.is_empty() {
            return None;
        }
        Some(
            self.seats
                .iter()
                .enumerate()
                .map(|(i, seat)| seat.to_player(i))
                .collect(),
        )
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_secs(self.disconnect_grace_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}
