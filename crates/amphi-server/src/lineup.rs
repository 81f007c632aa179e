use std::collections::HashMap;

use rand::rngs::StdRng;

use amphi_core::game_trait::{Minigame, MinigameKind};

use amphi_final_duel::FinalDuel;
use amphi_glass_bridge::GlassBridge;
use amphi_odd_even::OddOrEven;
use amphi_partition::Partition;
use amphi_reaction_gate::ReactionGate;
use amphi_rhythm_tap::RhythmTap;
use amphi_tug_of_war::TugOfWar;

use crate::config::MinigamesConfig;

/// The fixed order minigames are played in.
pub const DEFAULT_LINEUP: [MinigameKind; 7] = MinigameKind::ALL;

/// Factory function type for building a fresh minigame for one round.
type MinigameFactory = fn(&MinigamesConfig, StdRng) -> Box<dyn Minigame>;

/// Registry mapping minigame kinds to factory functions.
pub struct MinigameRegistry {
    factories: HashMap<MinigameKind, MinigameFactory>,
}

impl Default for MinigameRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MinigameRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };
        registry.register_defaults();
        registry
    }

    fn register_defaults(&mut self) {
        self.factories.insert(MinigameKind::ReactionGate, |cfg, rng| {
            Box::new(ReactionGate::new(cfg.reaction_gate.clone(), rng))
        });
        self.factories.insert(MinigameKind::RhythmTap, |cfg, _rng| {
            Box::new(RhythmTap::new(cfg.rhythm_tap.clone()))
        });
        self.factories.insert(MinigameKind::TugOfWar, |cfg, rng| {
            Box::new(TugOfWar::new(cfg.tug_of_war.clone(), rng))
        });
        self.factories.insert(MinigameKind::OddOrEven, |cfg, rng| {
            Box::new(OddOrEven::new(cfg.odd_or_even.clone(), rng))
        });
        self.factories.insert(MinigameKind::Partition, |cfg, rng| {
            Box::new(Partition::new(cfg.partition.clone(), rng))
        });
        self.factories.insert(MinigameKind::GlassBridge, |cfg, rng| {
            Box::new(GlassBridge::new(cfg.glass_bridge.clone(), rng))
        });
        self.factories.insert(MinigameKind::FinalDuel, |cfg, rng| {
            Box::new(FinalDuel::new(cfg.final_duel.clone(), rng))
        });
    }

    pub fn create(
        &self,
        kind: MinigameKind,
        config: &MinigamesConfig,
        rng: StdRng,
    ) -> Option<Box<dyn Minigame>> {
        self.factories.get(&kind).map(|f| f(config, rng))
    }

    /// Return the number of registered minigame kinds.
    pub fn available(&self) -> usize {
        self.factories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amphi_core::test_helpers::seeded_rng;

    #[test]
    fn every_kind_is_registered() {
        let registry = MinigameRegistry::new();
        let config = MinigamesConfig::default();
        assert_eq!(registry.available(), DEFAULT_LINEUP.len());
        for kind in DEFAULT_LINEUP {
            let game = registry
                .create(kind, &config, seeded_rng(1))
                .unwrap_or_else(|| panic!("{kind} should be registered"));
            assert_eq!(game.kind(), kind);
            assert!(!game.is_finished());
        }
    }

    #[test]
    fn lineup_starts_with_reaction_gate_and_ends_with_duel() {
        assert_eq!(DEFAULT_LINEUP[0], MinigameKind::ReactionGate);
        assert_eq!(DEFAULT_LINEUP[4], MinigameKind::GlassBridge);
        assert_eq!(DEFAULT_LINEUP[5], MinigameKind::Partition);
        assert_eq!(DEFAULT_LINEUP[6], MinigameKind::FinalDuel);
    }
}
