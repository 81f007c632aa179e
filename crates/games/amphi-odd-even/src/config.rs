use serde::{Deserialize, Serialize};

/// Data-driven configuration for Odd or Even.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OddOrEvenConfig {
    /// Seconds both members of a pairing get to pick a parity.
    pub choice_secs: f32,
    /// Seconds the drawn number stays on screen.
    pub reveal_secs: f32,
    /// Seconds between one pairing and the next.
    pub pause_secs: f32,
    /// Inclusive range the number is drawn from.
    pub draw_min: u32,
    pub draw_max: u32,
}

impl Default for OddOrEvenConfig {
    fn default() -> Self {
        Self {
            choice_secs: 8.0,
            reveal_secs: 3.0,
            pause_secs: 2.0,
            draw_min: 1,
            draw_max: 10,
        }
    }
}

impl OddOrEvenConfig {
    /// Draw range with its bounds in order.
    pub fn draw_range(&self) -> std::ops::RangeInclusive<u32> {
        self.draw_min.min(self.draw_max)..=self.draw_min.max(self.draw_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_draw_bounds_are_ordered() {
        let cfg: OddOrEvenConfig = toml::from_str("draw_min = 20\ndraw_max = 3").unwrap();
        assert_eq!(cfg.draw_range(), 3..=20);
        assert_eq!(cfg.choice_secs, 8.0);
    }
}
