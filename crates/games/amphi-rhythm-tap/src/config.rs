use serde::{Deserialize, Serialize};

/// Data-driven configuration for Rhythm Tap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RhythmTapConfig {
    /// Round length (seconds). Anyone short of the target is eliminated.
    pub time_limit_secs: f32,
    /// Seconds between beats.
    pub beat_interval_secs: f32,
    /// How far from a beat boundary a tap may land and still count.
    pub tolerance_secs: f32,
    /// On-beat taps needed to be safe.
    pub target_hits: u32,
    /// Off-beat taps that eliminate.
    pub max_cracks: u32,
}

impl Default for RhythmTapConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 25.0,
            beat_interval_secs: 1.2,
            tolerance_secs: 0.35,
            target_hits: 12,
            max_cracks: 3,
        }
    }
}
