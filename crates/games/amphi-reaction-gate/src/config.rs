use serde::{Deserialize, Serialize};

/// Data-driven configuration for the Reaction Gate race.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionGateConfig {
    /// X coordinate everyone starts from.
    pub start_line: f32,
    /// X coordinate that counts as finished.
    pub finish_line: f32,
    /// Distance covered per movement input during "go".
    pub step: f32,
    /// Bounds for a randomized "go" window (seconds).
    pub go_min_secs: f32,
    pub go_max_secs: f32,
    /// Bounds for a randomized "stop" window (seconds).
    pub stop_min_secs: f32,
    pub stop_max_secs: f32,
    /// Input is ignored for this long after every light change.
    pub grace_secs: f32,
    /// Unfinished participants are eliminated when this runs out.
    pub time_limit_secs: f32,
    /// Score awarded on crossing the finish line.
    pub finish_bonus: u32,
}

impl Default for ReactionGateConfig {
    fn default() -> Self {
        Self {
            start_line: 50.0,
            finish_line: 950.0,
            step: 8.0,
            go_min_secs: 3.0,
            go_max_secs: 7.0,
            stop_min_secs: 2.0,
            stop_max_secs: 5.0,
            grace_secs: 0.5,
            time_limit_secs: 60.0,
            finish_bonus: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: ReactionGateConfig = toml::from_str("step = 12.5\ntime_limit_secs = 30.0").unwrap();
        assert_eq!(cfg.step, 12.5);
        assert_eq!(cfg.time_limit_secs, 30.0);
        assert_eq!(cfg.finish_line, 950.0);
        assert_eq!(cfg.finish_bonus, 100);
    }
}
