use serde::{Deserialize, Serialize};

/// Data-driven configuration for Glass Bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlassBridgeConfig {
    /// Number of panel pairs to cross.
    pub steps: usize,
    /// Seconds the active participant has to pick a side before one is forced.
    pub choice_secs: f32,
    pub pause_secs: f32,
    /// Points for each safe panel.
    pub safe_bonus: u32,
}

impl Default for GlassBridgeConfig {
    fn default() -> Self {
        Self {
            steps: 5,
            choice_secs: 8.0,
            pause_secs: 2.0,
            safe_bonus: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: GlassBridgeConfig = toml::from_str("steps = 8").unwrap();
        assert_eq!(cfg.steps, 8);
        assert_eq!(cfg.safe_bonus, 20);
        assert_eq!(cfg.choice_secs, 8.0);
    }
}
