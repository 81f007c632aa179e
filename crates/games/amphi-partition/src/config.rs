use serde::{Deserialize, Serialize};

/// Data-driven configuration for Partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    /// Grouping rounds played before the minigame ends.
    pub rounds: u32,
    pub choice_secs: f32,
    /// Upper bound on how many groups are offered.
    pub max_groups: usize,
    /// Seconds between one round's result and the next target.
    pub pause_secs: f32,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            rounds: 3,
            choice_secs: 10.0,
            max_groups: 6,
            pause_secs: 3.0,
        }
    }
}
