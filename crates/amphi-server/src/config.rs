use std::fmt;

use serde::Deserialize;

use amphi_final_duel::config::FinalDuelConfig;
use amphi_glass_bridge::config::GlassBridgeConfig;
use amphi_odd_even::config::OddOrEvenConfig;
use amphi_partition::config::PartitionConfig;
use amphi_reaction_gate::config::ReactionGateConfig;
use amphi_rhythm_tap::config::RhythmTapConfig;
use amphi_tug_of_war::config::TugOfWarConfig;

use amphi_core::time::DEFAULT_TICK_RATE_HZ;

const CONFIG_FILE: &str = "amphi.toml";

/// Top-level server configuration, loaded from `amphi.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    pub session: SessionConfig,
    pub limits: LimitsConfig,
    pub minigames: MinigamesConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            web_root: "public".to_string(),
            session: SessionConfig::default(),
            limits: LimitsConfig::default(),
            minigames: MinigamesConfig::default(),
        }
    }
}

/// Phase timers and start guard for the game session.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Ticks per second driven by the game loop.
    pub tick_rate: u32,
    pub countdown_secs: f32,
    pub elimination_pause_secs: f32,
    /// Participants required before a game may start.
    pub min_participants: usize,
    /// Fixed seed for every random choice. Random when unset.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE_HZ,
            countdown_secs: 5.0,
            elimination_pause_secs: 3.0,
            min_participants: 2,
            seed: None,
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes, rate limits).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    pub ws_rate_limit_per_sec: f64,
    /// Outbound messages buffered per connection before new ones are dropped.
    pub player_message_buffer: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            ws_rate_limit_per_sec: 50.0,
            player_message_buffer: 256,
        }
    }
}

/// Tuning for every minigame in the lineup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MinigamesConfig {
    pub reaction_gate: ReactionGateConfig,
    pub rhythm_tap: RhythmTapConfig,
    pub tug_of_war: TugOfWarConfig,
    pub odd_or_even: OddOrEvenConfig,
    pub partition: PartitionConfig,
    pub glass_bridge: GlassBridgeConfig,
    pub final_duel: FinalDuelConfig,
}

/// A configuration value that cannot be used.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    InvalidListenAddr(String),
    MustBePositive(&'static str),
    NotFinite(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidListenAddr(addr) => {
                write!(f, "listen_addr {addr:?} is not a valid socket address")
            },
            Self::MustBePositive(field) => write!(f, "{field} must be > 0"),
            Self::NotFinite(field) => write!(f, "{field} must be a finite number"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl MinigamesConfig {
    /// Every float setting, named by its TOML path.
    fn float_fields(&self) -> [(&'static str, f32); 25] {
        let rg = &self.reaction_gate;
        let rt = &self.rhythm_tap;
        let tw = &self.tug_of_war;
        let oe = &self.odd_or_even;
        let pa = &self.partition;
        let gb = &self.glass_bridge;
        let fd = &self.final_duel;
        [
            ("minigames.reaction_gate.start_line", rg.start_line),
            ("minigames.reaction_gate.finish_line", rg.finish_line),
            ("minigames.reaction_gate.step", rg.step),
            ("minigames.reaction_gate.go_min_secs", rg.go_min_secs),
            ("minigames.reaction_gate.go_max_secs", rg.go_max_secs),
            ("minigames.reaction_gate.stop_min_secs", rg.stop_min_secs),
            ("minigames.reaction_gate.stop_max_secs", rg.stop_max_secs),
            ("minigames.reaction_gate.grace_secs", rg.grace_secs),
            ("minigames.reaction_gate.time_limit_secs", rg.time_limit_secs),
            ("minigames.rhythm_tap.time_limit_secs", rt.time_limit_secs),
            ("minigames.rhythm_tap.beat_interval_secs", rt.beat_interval_secs),
            ("minigames.rhythm_tap.tolerance_secs", rt.tolerance_secs),
            ("minigames.tug_of_war.time_limit_secs", tw.time_limit_secs),
            ("minigames.tug_of_war.tap_force", tw.tap_force),
            ("minigames.tug_of_war.win_threshold", tw.win_threshold),
            ("minigames.tug_of_war.friction", tw.friction),
            ("minigames.odd_or_even.choice_secs", oe.choice_secs),
            ("minigames.odd_or_even.reveal_secs", oe.reveal_secs),
            ("minigames.odd_or_even.pause_secs", oe.pause_secs),
            ("minigames.partition.choice_secs", pa.choice_secs),
            ("minigames.partition.pause_secs", pa.pause_secs),
            ("minigames.glass_bridge.choice_secs", gb.choice_secs),
            ("minigames.glass_bridge.pause_secs", gb.pause_secs),
            ("minigames.final_duel.duel_secs", fd.duel_secs),
            ("minigames.final_duel.pause_secs", fd.pause_secs),
        ]
    }
}

impl ServerConfig {
    /// Check every value the server depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidListenAddr(self.listen_addr.clone()));
        }
        if self.session.tick_rate == 0 {
            return Err(ConfigError::MustBePositive("session.tick_rate"));
        }
        if self.session.min_participants == 0 {
            return Err(ConfigError::MustBePositive("session.min_participants"));
        }
        if self.limits.max_ws_connections == 0 {
            return Err(ConfigError::MustBePositive("limits.max_ws_connections"));
        }
        if !self.limits.ws_rate_limit_per_sec.is_finite() {
            return Err(ConfigError::NotFinite("limits.ws_rate_limit_per_sec"));
        }
        if self.limits.ws_rate_limit_per_sec <= 0.0 {
            return Err(ConfigError::MustBePositive("limits.ws_rate_limit_per_sec"));
        }
        if self.limits.player_message_buffer == 0 {
            return Err(ConfigError::MustBePositive("limits.player_message_buffer"));
        }
        if !self.session.countdown_secs.is_finite() {
            return Err(ConfigError::NotFinite("session.countdown_secs"));
        }
        if !self.session.elimination_pause_secs.is_finite() {
            return Err(ConfigError::NotFinite("session.elimination_pause_secs"));
        }
        if let Some((field, _)) = self
            .minigames
            .float_fields()
            .into_iter()
            .find(|(_, v)| !v.is_finite())
        {
            return Err(ConfigError::NotFinite(field));
        }
        if self.session.countdown_secs < 0.0 || self.session.elimination_pause_secs < 0.0 {
            tracing::warn!("Negative phase timers are treated as a single tick");
        }
        Ok(())
    }

    /// Load config from `amphi.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string(CONFIG_FILE) {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!(file = CONFIG_FILE, "Loaded configuration");
                    cfg
                },
                Err(e) => {
                    tracing::warn!(file = CONFIG_FILE, error = %e, "Failed to parse config, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!(file = CONFIG_FILE, "No config file found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("AMPHI_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(root) = std::env::var("AMPHI_WEB_ROOT")
            && !root.is_empty()
        {
            config.web_root = root;
        }
        if let Ok(val) = std::env::var("AMPHI_TICK_RATE")
            && let Ok(n) = val.parse::<u32>()
        {
            config.session.tick_rate = n;
        }
        if let Ok(val) = std::env::var("AMPHI_SEED")
            && let Ok(n) = val.parse::<u64>()
        {
            config.session.seed = Some(n);
        }
        if let Ok(val) = std::env::var("AMPHI_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }

        config
    }
}
