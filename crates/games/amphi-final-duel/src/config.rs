use serde::{Deserialize, Serialize};

/// Data-driven configuration for the Final Duel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalDuelConfig {
    /// Length of one tap-off (seconds).
    pub duel_secs: f32,
    pub pause_secs: f32,
    pub winner_bonus: u32,
    /// Ticks between live score broadcasts during a duel.
    pub score_every_ticks: u32,
}

impl Default for FinalDuelConfig {
    fn default() -> Self {
        Self {
            duel_secs: 10.0,
            pause_secs: 3.0,
            winner_bonus: 50,
            score_every_ticks: 5,
        }
    }
}
