pub mod config;

use std::collections::HashMap;

use rand::Rng;
use rand::rngs::StdRng;

use amphi_core::events::ServerEvent;
use amphi_core::game_trait::{
    Action, Minigame, MinigameKind, ParticipantId, RoundComplete, RoundContext, RoundLatch,
};
use amphi_core::roster::Roster;
use amphi_core::time::ticks_to_secs_ceil;

use config::PartitionConfig;

const LARGEST_TARGET: usize = 5;
const FALLBACK_TARGET: usize = 2;

/// Pick a group size that does not divide `alive` evenly.
pub fn pick_target(alive: usize, rng: &mut impl Rng) -> usize {
    let upper = alive.saturating_sub(1).min(LARGEST_TARGET);
    let candidates: Vec<usize> = (2..=upper).filter(|t| alive % t != 0).collect();
    if candidates.is_empty() {
        FALLBACK_TARGET
    } else {
        candidates[rng.random_range(0..candidates.len())]
    }
}

/// Enough groups to hold everyone at the target size, plus one spare.
pub fn group_count(alive: usize, target: usize, max_groups: usize) -> usize {
    (alive.div_ceil(target.max(1)) + 1).min(max_groups).max(1)
}

/// Participants who did not pick a group, or whose group missed the target size.
pub fn doomed(
    alive: &[ParticipantId],
    choices: &HashMap<ParticipantId, u8>,
    target: usize,
    groups: usize,
) -> Vec<ParticipantId> {
    let sizes = group_sizes(alive, choices, groups);
    alive
        .iter()
        .copied()
        .filter(|id| match choices.get(id) {
            Some(&g) => sizes.get(usize::from(g)).copied() != Some(target),
            None => true,
        })
        .collect()
}

fn group_sizes(
    alive: &[ParticipantId],
    choices: &HashMap<ParticipantId, u8>,
    groups: usize,
) -> Vec<usize> {
    let mut sizes = vec![0; groups];
    for id in alive {
        if let Some(size) = choices.get(id).and_then(|&g| sizes.get_mut(usize::from(g))) {
            *size += 1;
        }
    }
    sizes
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Choosing(u32),
    Pause(u32),
}

/// Form groups of exactly the announced size or be eliminated.
pub struct Partition {
    config: PartitionConfig,
    rng: StdRng,
    participants: Vec<ParticipantId>,
    choices: HashMap<ParticipantId, u8>,
    round: u32,
    target: usize,
    groups: usize,
    last_eliminated: usize,
    stage: Stage,
    choice_ticks: u32,
    pause_ticks: u32,
    tick_rate: u32,
    latch: RoundLatch,
}

impl Partition {
    pub fn new(config: PartitionConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            participants: Vec::new(),
            choices: HashMap::new(),
            round: 0,
            target: FALLBACK_TARGET,
            groups: 0,
            last_eliminated: 0,
            stage: Stage::Idle,
            choice_ticks: 1,
            pause_ticks: 1,
            tick_rate: 1,
            latch: RoundLatch::default(),
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn target_size(&self) -> usize {
        self.target
    }

    pub fn group_count(&self) -> usize {
        self.groups
    }

    pub fn is_choosing(&self) -> bool {
        matches!(self.stage, Stage::Choosing(_))
    }

    fn alive(&self, ctx: &RoundContext<'_>) -> Vec<ParticipantId> {
        self.participants
            .iter()
            .copied()
            .filter(|&id| ctx.is_alive(id))
            .collect()
    }

    fn begin_round(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        let alive = ctx.alive_among(&self.participants);
        if alive <= 1 || self.round >= self.config.rounds {
            self.stage = Stage::Idle;
            return self.latch.complete();
        }
        self.round += 1;
        self.target = pick_target(alive, &mut self.rng);
        self.groups = group_count(alive, self.target, self.config.max_groups);
        self.choices.clear();
        self.stage = Stage::Choosing(self.choice_ticks);

        tracing::debug!(
            round = self.round,
            alive,
            target = self.target,
            groups = self.groups,
            "Partition round started"
        );
        ctx.broadcast(ServerEvent::GroupTarget {
            round: self.round,
            target_size: self.target,
            group_count: self.groups,
            seconds: ticks_to_secs_ceil(self.choice_ticks, self.tick_rate),
        });
        None
    }

    fn resolve(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        let alive = self.alive(ctx);
        let sizes = group_sizes(&alive, &self.choices, self.groups);
        let eliminated = doomed(&alive, &self.choices, self.target, self.groups);
        for &id in &eliminated {
            ctx.eliminate(id);
        }
        tracing::info!(
            round = self.round,
            target = self.target,
            eliminated = eliminated.len(),
            "Partition round resolved"
        );
        self.last_eliminated = eliminated.len();
        ctx.broadcast(ServerEvent::GroupResult {
            target_size: self.target,
            sizes,
            eliminated,
        });
        if ctx.alive_among(&self.participants) <= 1 {
            self.stage = Stage::Idle;
            return self.latch.complete();
        }
        self.stage = Stage::Pause(self.pause_ticks);
        None
    }
}

impl Minigame for Partition {
    fn kind(&self) -> MinigameKind {
        MinigameKind::Partition
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.tick_rate = ctx.tick_rate.max(1);
        self.participants = ctx.roster.alive_ids();
        self.choice_ticks = ctx.ticks(self.config.choice_secs);
        self.pause_ticks = ctx.ticks(self.config.pause_secs);
        self.begin_round(ctx)
    }

    fn handle_input(
        &mut self,
        participant: ParticipantId,
        action: &Action,
        ctx: &mut RoundContext<'_>,
    ) -> Option<RoundComplete> {
        let Action::ChooseGroup { group } = *action else {
            return None;
        };
        if self.latch.is_finished()
            || !self.is_choosing()
            || usize::from(group) >= self.groups
            || !self.participants.contains(&participant)
            || !ctx.is_alive(participant)
        {
            return None;
        }
        self.choices.insert(participant, group);
        ctx.send_to(participant, ServerEvent::GroupJoined { group });
        let sizes = group_sizes(&self.alive(ctx), &self.choices, self.groups);
        ctx.broadcast(ServerEvent::GroupsUpdated { sizes });
        None
    }

    fn update(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        if self.latch.is_finished() {
            return None;
        }
        match self.stage {
            Stage::Idle => None,
            Stage::Choosing(remaining) if remaining > 1 => {
                self.stage = Stage::Choosing(remaining - 1);
                None
            }
            Stage::Choosing(_) => self.resolve(ctx),
            Stage::Pause(remaining) if remaining > 1 => {
                self.stage = Stage::Pause(remaining - 1);
                None
            }
            Stage::Pause(_) => self.begin_round(ctx),
        }
    }

    fn public_state(&self, roster: &Roster) -> serde_json::Value {
        let alive: Vec<_> = self
            .participants
            .iter()
            .copied()
            .filter(|&id| roster.get(id).is_some_and(|p| p.alive))
            .collect();
        let (stage, remaining) = match self.stage {
            Stage::Idle => ("idle", 0),
            Stage::Choosing(t) => ("choosing", t),
            Stage::Pause(t) => ("pause", t),
        };
        serde_json::json!({
            "stage": stage,
            "round": self.round,
            "rounds": self.config.rounds,
            "target_size": self.target,
            "group_count": self.groups,
            "sizes": group_sizes(&alive, &self.choices, self.groups),
            "time_remaining": ticks_to_secs_ceil(remaining, self.tick_rate),
            "last_eliminated": self.last_eliminated,
        })
    }

    fn is_finished(&self) -> bool {
        self.latch.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amphi_core::test_helpers::{self, TestTable, count_events, seeded_rng};

    fn game() -> Partition {
        Partition::new(PartitionConfig::default(), seeded_rng(12))
    }

    fn join(group: u8) -> Action {
        Action::ChooseGroup { group }
    }

    #[test]
    fn contract_start_eliminates_nobody() {
        test_helpers::contract_start_eliminates_nobody(&mut game(), 7);
    }

    #[test]
    fn contract_completes_exactly_once() {
        test_helpers::contract_completes_exactly_once(&mut game(), 7, 2000);
    }

    #[test]
    fn contract_alive_count_never_increases() {
        test_helpers::contract_alive_count_never_increases(&mut game(), 8, 2000);
    }

    #[test]
    fn contract_ignores_late_joiners() {
        test_helpers::contract_ignores_late_joiners(&mut game(), 5);
    }

    #[test]
    fn contract_public_state_is_object() {
        test_helpers::contract_public_state_is_object(&mut game(), 5);
    }

    #[test]
    fn target_fallbacks() {
        let mut rng = seeded_rng(1);
        assert_eq!(pick_target(2, &mut rng), 2);
        assert_eq!(pick_target(3, &mut rng), 2);
        assert_eq!(pick_target(4, &mut rng), 3);
        assert_eq!(pick_target(60, &mut rng), 2);
    }

    #[test]
    fn group_count_has_a_spare_and_a_cap() {
        assert_eq!(group_count(5, 2, 6), 4);
        assert_eq!(group_count(7, 3, 6), 4);
        assert_eq!(group_count(40, 2, 6), 6);
    }

    #[test]
    fn short_group_and_non_selectors_are_doomed() {
        let choices = HashMap::from([(1, 0), (2, 0), (3, 1), (4, 1), (5, 2)]);
        let doomed = doomed(&[1, 2, 3, 4, 5, 6], &choices, 2, 3);
        assert_eq!(doomed, vec![5, 6]);
    }

    #[test]
    fn exact_group_survives_the_deadline() {
        let mut table = TestTable::with_participants(5);
        let mut g = game();
        table.start(&mut g);
        let target = g.target_size();
        for id in 1..=5u64 {
            let group = if id as usize <= target { 0 } else { 1 };
            table.input(&mut g, id, join(group));
        }
        for _ in 0..200 {
            table.tick(&mut g);
        }
        assert!(!g.is_choosing());
        assert_eq!(table.alive_count(), target);
        for id in 1..=target as u64 {
            assert!(table.is_alive(id));
        }
        let events = table.events();
        assert_eq!(
            count_events(&events, |e| matches!(e, ServerEvent::GroupResult { .. })),
            1
        );
    }

    #[test]
    fn switching_groups_moves_membership() {
        let mut table = TestTable::with_participants(5);
        let mut g = game();
        table.start(&mut g);
        table.events();
        table.input(&mut g, 1, join(0));
        table.input(&mut g, 1, join(1));

        let events = table.events();
        let last_sizes = events
            .iter()
            .rev()
            .find_map(|e| match &e.event {
                ServerEvent::GroupsUpdated { sizes } => Some(sizes.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(last_sizes[0], 0);
        assert_eq!(last_sizes[1], 1);
        assert_eq!(last_sizes.len(), g.group_count());
    }

    #[test]
    fn out_of_range_group_is_ignored() {
        let mut table = TestTable::with_participants(5);
        let mut g = game();
        table.start(&mut g);
        table.events();
        let beyond = g.group_count() as u8;
        table.input(&mut g, 1, join(beyond));
        assert!(table.events().is_empty());
    }

    #[test]
    fn nobody_choosing_eliminates_everyone_then_completes() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        table.start(&mut g);
        // Nobody left, so no pause after the 200-tick choice window.
        assert_eq!(table.run_until_complete(&mut g, 1000), Some(200));
        assert_eq!(table.alive_count(), 0);
    }

    #[test]
    fn survivors_still_get_the_pause() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        assert_eq!(g.target_size(), 2);
        table.input(&mut g, 1, join(0));
        table.input(&mut g, 2, join(0));
        for _ in 0..200 {
            assert!(table.tick(&mut g).is_none());
        }
        assert_eq!(table.alive_count(), 2);
        assert!(!g.is_choosing());
        for _ in 0..60 {
            assert!(table.tick(&mut g).is_none());
        }
        assert!(g.is_choosing());
        assert_eq!(g.round(), 2);
    }

    #[test]
    fn rounds_are_capped() {
        let config = PartitionConfig {
            rounds: 2,
            ..PartitionConfig::default()
        };
        let mut table = TestTable::with_participants(9);
        let mut g = Partition::new(config, seeded_rng(4));
        table.start(&mut g);
        for tick in 0..2000 {
            if g.is_choosing() {
                let target = g.target_size();
                let alive = table.roster.alive_ids();
                // Fill group 0 to size, and give the rest group 1 at the same size.
                for (i, &id) in alive.iter().enumerate() {
                    let group = if i < target { 0 } else if i < 2 * target { 1 } else { 2 };
                    table.input(&mut g, id, join(group));
                }
            }
            if table.tick(&mut g).is_some() {
                assert!(tick > 0);
                break;
            }
        }
        assert!(g.is_finished());
        assert_eq!(g.round(), 2);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn target_avoids_divisors_when_possible(alive in 2usize..200, seed in any::<u64>()) {
                let mut rng = seeded_rng(seed);
                let target = pick_target(alive, &mut rng);
                let upper = (alive - 1).min(LARGEST_TARGET);
                let possible = (2..=upper).any(|t| alive % t != 0);
                if possible {
                    prop_assert!(alive % target != 0);
                    prop_assert!((2..=upper).contains(&target));
                } else {
                    prop_assert_eq!(target, FALLBACK_TARGET);
                }
            }
        }
    }
}
