pub mod config;

use std::collections::VecDeque;

use rand::Rng;
use rand::rngs::StdRng;

use amphi_core::events::{Contender, ServerEvent};
use amphi_core::game_trait::{
    Action, Minigame, MinigameKind, Parity, ParticipantId, RoundComplete, RoundContext, RoundLatch,
    random_pairs,
};
use amphi_core::roster::Roster;
use amphi_core::time::ticks_to_secs_ceil;

use config::OddOrEvenConfig;

/// The loser of a pairing given both picks, the drawn number and a coin flip
/// used when both or neither guessed right.
pub fn parity_loser(
    first: (ParticipantId, Parity),
    second: (ParticipantId, Parity),
    number: u32,
    coin_first: bool,
) -> ParticipantId {
    let drawn = Parity::of(number);
    match (first.1 == drawn, second.1 == drawn) {
        (true, false) => second.0,
        (false, true) => first.0,
        _ if coin_first => first.0,
        _ => second.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Choosing(u32),
    Reveal(u32),
    Pause(u32),
}

#[derive(Debug, Clone)]
struct Pairing {
    first: ParticipantId,
    second: ParticipantId,
    picks: [Option<Parity>; 2],
}

impl Pairing {
    fn slot(&self, id: ParticipantId) -> Option<usize> {
        if id == self.first {
            Some(0)
        } else if id == self.second {
            Some(1)
        } else {
            None
        }
    }
}

/// Pairs take turns guessing the parity of a drawn number. One of each pair is eliminated.
pub struct OddOrEven {
    config: OddOrEvenConfig,
    rng: StdRng,
    participants: Vec<ParticipantId>,
    queue: VecDeque<(ParticipantId, ParticipantId)>,
    current: Option<Pairing>,
    stage: Stage,
    cycle: u32,
    last_draw: Option<u32>,
    choice_ticks: u32,
    reveal_ticks: u32,
    pause_ticks: u32,
    tick_rate: u32,
    latch: RoundLatch,
}

impl OddOrEven {
    pub fn new(config: OddOrEvenConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            participants: Vec::new(),
            queue: VecDeque::new(),
            current: None,
            stage: Stage::Idle,
            cycle: 0,
            last_draw: None,
            choice_ticks: 1,
            reveal_ticks: 1,
            pause_ticks: 1,
            tick_rate: 1,
            latch: RoundLatch::default(),
        }
    }

    /// The pairing currently on stage.
    pub fn current_pair(&self) -> Option<(ParticipantId, ParticipantId)> {
        self.current.as_ref().map(|p| (p.first, p.second))
    }

    pub fn is_choosing(&self) -> bool {
        matches!(self.stage, Stage::Choosing(_))
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    fn begin_cycle(&mut self, ctx: &RoundContext<'_>) {
        let alive: Vec<_> = self
            .participants
            .iter()
            .copied()
            .filter(|&id| ctx.is_alive(id))
            .collect();
        self.queue = random_pairs(alive, &mut self.rng).into();
        self.cycle += 1;
        tracing::debug!(cycle = self.cycle, pairs = self.queue.len(), "Parity cycle drawn");
    }

    /// Put the next playable pairing on stage, drawing new cycles as needed.
    fn next_pairing(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.current = None;
        loop {
            if ctx.alive_among(&self.participants) <= 1 {
                self.stage = Stage::Idle;
                return self.latch.complete();
            }
            let Some((first, second)) = self.queue.pop_front() else {
                self.begin_cycle(ctx);
                if self.queue.is_empty() {
                    self.stage = Stage::Idle;
                    return self.latch.complete();
                }
                continue;
            };
            if !ctx.is_alive(first) || !ctx.is_alive(second) {
                tracing::debug!(first, second, "Skipping parity pairing with a missing member");
                continue;
            }
            self.announce(first, second, ctx);
            return None;
        }
    }

    fn announce(&mut self, first: ParticipantId, second: ParticipantId, ctx: &mut RoundContext<'_>) {
        let a = Contender::lookup(ctx.roster, first);
        let b = Contender::lookup(ctx.roster, second);
        let seconds = ticks_to_secs_ceil(self.choice_ticks, self.tick_rate);
        ctx.send_to(
            first,
            ServerEvent::ParityPrompt {
                opponent: b.display_name.clone(),
                seconds,
            },
        );
        ctx.send_to(
            second,
            ServerEvent::ParityPrompt {
                opponent: a.display_name.clone(),
                seconds,
            },
        );
        ctx.broadcast(ServerEvent::ParityMatch {
            first: a,
            second: b,
        });
        self.current = Some(Pairing {
            first,
            second,
            picks: [None, None],
        });
        self.stage = Stage::Choosing(self.choice_ticks);
    }

    /// Draw the number and eliminate the loser. Missing picks are randomized.
    fn resolve(&mut self, ctx: &mut RoundContext<'_>) {
        let Some(pairing) = self.current.as_ref() else {
            return;
        };
        let (first, second) = (pairing.first, pairing.second);
        let first_pick = pairing.picks[0].unwrap_or_else(|| Parity::random(&mut self.rng));
        let second_pick = pairing.picks[1].unwrap_or_else(|| Parity::random(&mut self.rng));

        let number = self.rng.random_range(self.config.draw_range());
        let coin_first = self.rng.random_bool(0.5);
        let loser = parity_loser((first, first_pick), (second, second_pick), number, coin_first);
        let winner = if loser == first { second } else { first };

        tracing::info!(number, winner, loser, "Parity pairing resolved");
        ctx.broadcast(ServerEvent::ParityResult {
            number,
            winner: Contender::lookup(ctx.roster, winner),
            loser: Contender::lookup(ctx.roster, loser),
        });
        ctx.eliminate(loser);
        self.last_draw = Some(number);
        self.stage = Stage::Reveal(self.reveal_ticks);
    }
}

impl Minigame for OddOrEven {
    fn kind(&self) -> MinigameKind {
        MinigameKind::OddOrEven
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.tick_rate = ctx.tick_rate.max(1);
        self.participants = ctx.roster.alive_ids();
        self.choice_ticks = ctx.ticks(self.config.choice_secs);
        self.reveal_ticks = ctx.ticks(self.config.reveal_secs);
        self.pause_ticks = ctx.ticks(self.config.pause_secs);
        self.next_pairing(ctx)
    }

    fn handle_input(
        &mut self,
        participant: ParticipantId,
        action: &Action,
        ctx: &mut RoundContext<'_>,
    ) -> Option<RoundComplete> {
        let Action::ChooseParity { parity } = *action else {
            return None;
        };
        if self.latch.is_finished() || !self.is_choosing() || !ctx.is_alive(participant) {
            return None;
        }
        let pairing = self.current.as_mut()?;
        let slot = pairing.slot(participant)?;
        pairing.picks[slot] = Some(parity);
        let both_picked = pairing.picks.iter().all(Option::is_some);
        ctx.send_to(participant, ServerEvent::ChoiceRecorded { parity });

        if both_picked {
            self.resolve(ctx);
        }
        None
    }

    fn update(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        if self.latch.is_finished() {
            return None;
        }
        match self.stage {
            Stage::Idle => None,
            Stage::Choosing(remaining) => {
                let gone = self
                    .current_pair()
                    .is_none_or(|(a, b)| !ctx.is_alive(a) || !ctx.is_alive(b));
                if gone {
                    return self.next_pairing(ctx);
                }
                if remaining <= 1 {
                    self.resolve(ctx);
                } else {
                    self.stage = Stage::Choosing(remaining - 1);
                }
                None
            }
            Stage::Reveal(remaining) => {
                if remaining > 1 {
                    self.stage = Stage::Reveal(remaining - 1);
                    None
                } else if ctx.alive_among(&self.participants) <= 1 {
                    self.stage = Stage::Idle;
                    self.latch.complete()
                } else {
                    self.stage = Stage::Pause(self.pause_ticks);
                    None
                }
            }
            Stage::Pause(remaining) => {
                if remaining > 1 {
                    self.stage = Stage::Pause(remaining - 1);
                    None
                } else {
                    self.next_pairing(ctx)
                }
            }
        }
    }

    fn public_state(&self, roster: &Roster) -> serde_json::Value {
        let (stage, remaining) = match self.stage {
            Stage::Idle => ("idle", 0),
            Stage::Choosing(t) => ("choosing", t),
            Stage::Reveal(t) => ("reveal", t),
            Stage::Pause(t) => ("pause", t),
        };
        let pairing = self.current.as_ref().map(|p| {
            serde_json::json!({
                "first": Contender::lookup(roster, p.first),
                "second": Contender::lookup(roster, p.second),
                "first_picked": p.picks[0].is_some(),
                "second_picked": p.picks[1].is_some(),
            })
        });
        serde_json::json!({
            "stage": stage,
            "time_remaining": ticks_to_secs_ceil(remaining, self.tick_rate),
            "cycle": self.cycle,
            "pairs_waiting": self.queue.len(),
            "pairing": pairing,
            "last_draw": self.last_draw,
        })
    }

    fn is_finished(&self) -> bool {
        self.latch.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amphi_core::events::Audience;
    use amphi_core::test_helpers::{self, TestTable, count_events, seeded_rng};

    fn game() -> OddOrEven {
        OddOrEven::new(OddOrEvenConfig::default(), seeded_rng(77))
    }

    fn even() -> Action {
        Action::ChooseParity {
            parity: Parity::Even,
        }
    }

    fn odd() -> Action {
        Action::ChooseParity { parity: Parity::Odd }
    }

    #[test]
    fn contract_start_eliminates_nobody() {
        test_helpers::contract_start_eliminates_nobody(&mut game(), 6);
    }

    #[test]
    fn contract_completes_exactly_once() {
        test_helpers::contract_completes_exactly_once(&mut game(), 6, 5000);
    }

    #[test]
    fn contract_alive_count_never_increases() {
        test_helpers::contract_alive_count_never_increases(&mut game(), 5, 5000);
    }

    #[test]
    fn contract_ignores_late_joiners() {
        test_helpers::contract_ignores_late_joiners(&mut game(), 4);
    }

    #[test]
    fn contract_public_state_is_object() {
        test_helpers::contract_public_state_is_object(&mut game(), 4);
    }

    #[test]
    fn loser_is_the_wrong_guesser() {
        assert_eq!(parity_loser((1, Parity::Even), (2, Parity::Odd), 4, true), 2);
        assert_eq!(parity_loser((1, Parity::Even), (2, Parity::Odd), 7, true), 1);
        assert_eq!(parity_loser((1, Parity::Odd), (2, Parity::Odd), 3, true), 1);
        assert_eq!(parity_loser((1, Parity::Even), (2, Parity::Even), 3, false), 2);
    }

    #[test]
    fn start_announces_one_pairing() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        assert!(table.start(&mut g).is_none());
        let (a, b) = g.current_pair().unwrap();
        assert_ne!(a, b);

        let events = table.events();
        assert_eq!(
            count_events(&events, |e| matches!(e, ServerEvent::ParityMatch { .. })),
            1
        );
        let prompted: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.event, ServerEvent::ParityPrompt { seconds: 8, .. }))
            .map(|e| e.audience)
            .collect();
        assert_eq!(prompted, vec![Audience::Participant(a), Audience::Participant(b)]);
    }

    #[test]
    fn both_picks_resolve_immediately() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        table.start(&mut g);
        let (a, b) = g.current_pair().unwrap();
        table.events();

        table.input(&mut g, a, even());
        assert!(g.is_choosing());
        table.input(&mut g, b, odd());
        assert!(!g.is_choosing());
        assert_eq!(table.alive_count(), 3);

        let events = table.events();
        let number = events
            .iter()
            .find_map(|e| match &e.event {
                ServerEvent::ParityResult { number, winner, .. } => Some((*number, winner.id)),
                _ => None,
            })
            .unwrap();
        assert!((1..=10).contains(&number.0));
        let expected_winner = if Parity::of(number.0) == Parity::Even { a } else { b };
        assert_eq!(number.1, expected_winner);
        assert!(table.is_alive(expected_winner));
        assert_eq!(
            count_events(&events, |e| matches!(e, ServerEvent::ChoiceRecorded { .. })),
            2
        );
    }

    #[test]
    fn outsiders_cannot_pick() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        table.start(&mut g);
        let (a, b) = g.current_pair().unwrap();
        let outsider = (1..=4).find(|&id| id != a && id != b).unwrap();
        table.events();

        table.input(&mut g, outsider, even());
        assert!(g.is_choosing());
        assert!(table.events().is_empty());
    }

    #[test]
    fn timeout_randomizes_and_eliminates_one() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        table.start(&mut g);
        for _ in 0..159 {
            table.tick(&mut g);
        }
        assert!(g.is_choosing());
        assert_eq!(table.alive_count(), 4);
        table.tick(&mut g);
        assert!(!g.is_choosing());
        assert_eq!(table.alive_count(), 3);
    }

    #[test]
    fn next_pairing_follows_reveal_and_pause() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        table.start(&mut g);
        let (a, b) = g.current_pair().unwrap();
        table.input(&mut g, a, even());
        table.input(&mut g, b, even());
        // Reveal is 60 ticks, the pause another 40.
        for _ in 0..99 {
            table.tick(&mut g);
            assert!(!g.is_choosing());
        }
        table.tick(&mut g);
        assert!(g.is_choosing());
        assert_ne!(g.current_pair(), Some((a, b)));
    }

    #[test]
    fn odd_one_out_sits_out_first_cycle() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        let (a, b) = g.current_pair().unwrap();
        let sitter = (1..=3).find(|&id| id != a && id != b).unwrap();
        let events = table.events();
        assert!(
            !events
                .iter()
                .any(|e| e.audience == Audience::Participant(sitter))
        );
        assert_eq!(g.cycle(), 1);
    }

    #[test]
    fn departed_member_skips_the_pairing() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        table.start(&mut g);
        let (a, _) = g.current_pair().unwrap();
        table.roster.leave(a, &mut table.outbox);

        assert!(table.tick(&mut g).is_none());
        let (c, d) = g.current_pair().unwrap();
        assert!(c != a && d != a);
        assert_eq!(table.alive_count(), 3);
    }

    #[test]
    fn runs_down_to_one_survivor() {
        let mut table = TestTable::with_participants(5);
        let mut g = game();
        table.start(&mut g);
        assert!(table.run_until_complete(&mut g, 5000).is_some());
        assert_eq!(table.alive_count(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn exactly_one_correct_guesser_always_wins(number in 1u32..100, coin in any::<bool>()) {
                let right = Parity::of(number);
                let wrong = if right == Parity::Even { Parity::Odd } else { Parity::Even };
                prop_assert_eq!(parity_loser((1, right), (2, wrong), number, coin), 2);
                prop_assert_eq!(parity_loser((1, wrong), (2, right), number, coin), 1);
            }
        }
    }
}
