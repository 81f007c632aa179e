use serde::{Deserialize, Serialize};

/// Data-driven configuration for Tug of War.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TugOfWarConfig {
    /// Round length (seconds). The team behind at the whistle loses.
    pub time_limit_secs: f32,
    /// Rope displacement per tap.
    pub tap_force: f32,
    /// Absolute rope value that ends the round immediately.
    pub win_threshold: f32,
    /// Fraction of rope displacement lost per second.
    pub friction: f32,
}

impl Default for TugOfWarConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 20.0,
            tap_force: 1.0,
            win_threshold: 100.0,
            friction: 0.2,
        }
    }
}
