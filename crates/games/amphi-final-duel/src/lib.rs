pub mod config;

use std::collections::VecDeque;

use rand::rngs::StdRng;

use amphi_core::events::{Contender, ServerEvent};
use amphi_core::game_trait::{
    Action, Minigame, MinigameKind, ParticipantId, RoundComplete, RoundContext, RoundLatch,
    random_pairs,
};
use amphi_core::roster::Roster;
use amphi_core::time::ticks_to_secs_ceil;

use config::FinalDuelConfig;

/// Loser of a finished duel. Ties go against the second duelist.
pub fn duel_loser(first: ParticipantId, second: ParticipantId, taps: [u32; 2]) -> ParticipantId {
    if taps[0] >= taps[1] { second } else { first }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Dueling(u32),
    Pause(u32),
}

#[derive(Debug, Clone)]
struct Duel {
    first: ParticipantId,
    second: ParticipantId,
    taps: [u32; 2],
    elapsed: u32,
}

/// Head-to-head tap-offs until one participant remains.
pub struct FinalDuel {
    config: FinalDuelConfig,
    rng: StdRng,
    participants: Vec<ParticipantId>,
    queue: VecDeque<(ParticipantId, ParticipantId)>,
    current: Option<Duel>,
    stage: Stage,
    cycle: u32,
    duel_ticks: u32,
    pause_ticks: u32,
    tick_rate: u32,
    latch: RoundLatch,
}

impl FinalDuel {
    pub fn new(config: FinalDuelConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            participants: Vec::new(),
            queue: VecDeque::new(),
            current: None,
            stage: Stage::Idle,
            cycle: 0,
            duel_ticks: 1,
            pause_ticks: 1,
            tick_rate: 1,
            latch: RoundLatch::default(),
        }
    }

    pub fn current_duel(&self) -> Option<(ParticipantId, ParticipantId)> {
        self.current.as_ref().map(|d| (d.first, d.second))
    }

    pub fn taps(&self) -> Option<[u32; 2]> {
        self.current.as_ref().map(|d| d.taps)
    }

    pub fn is_dueling(&self) -> bool {
        matches!(self.stage, Stage::Dueling(_))
    }

    fn next_duel(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.current = None;
        loop {
            if ctx.alive_among(&self.participants) <= 1 {
                self.stage = Stage::Idle;
                return self.latch.complete();
            }
            let Some((first, second)) = self.queue.pop_front() else {
                let alive: Vec<_> = self
                    .participants
                    .iter()
                    .copied()
                    .filter(|&id| ctx.is_alive(id))
                    .collect();
                self.queue = random_pairs(alive, &mut self.rng).into();
                self.cycle += 1;
                tracing::debug!(cycle = self.cycle, duels = self.queue.len(), "Duel bracket drawn");
                continue;
            };
            if ctx.is_alive(first) && ctx.is_alive(second) {
                self.announce(first, second, ctx);
                return None;
            }
        }
    }

    fn announce(&mut self, first: ParticipantId, second: ParticipantId, ctx: &mut RoundContext<'_>) {
        let a = Contender::lookup(ctx.roster, first);
        let b = Contender::lookup(ctx.roster, second);
        let seconds = ticks_to_secs_ceil(self.duel_ticks, self.tick_rate);
        for (id, opponent) in [(first, &b), (second, &a)] {
            ctx.send_to(
                id,
                ServerEvent::DuelStarted {
                    opponent: opponent.display_name.clone(),
                    seconds,
                },
            );
        }
        ctx.broadcast(ServerEvent::DuelMatch {
            first: a,
            second: b,
        });
        self.current = Some(Duel {
            first,
            second,
            taps: [0, 0],
            elapsed: 0,
        });
        self.stage = Stage::Dueling(self.duel_ticks);
    }

    fn resolve(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        let Some(duel) = self.current.as_ref() else {
            return None;
        };
        let loser = duel_loser(duel.first, duel.second, duel.taps);
        let winner = if loser == duel.first { duel.second } else { duel.first };
        let [first_taps, second_taps] = duel.taps;

        if let Some(p) = ctx.roster.get_mut(winner) {
            p.award(self.config.winner_bonus);
        }
        tracing::info!(winner, loser, first_taps, second_taps, "Duel decided");
        ctx.broadcast(ServerEvent::DuelResult {
            winner: Contender::lookup(ctx.roster, winner),
            loser: Contender::lookup(ctx.roster, loser),
            first_taps,
            second_taps,
        });
        ctx.eliminate(loser);
        if ctx.alive_among(&self.participants) <= 1 {
            self.stage = Stage::Idle;
            return self.latch.complete();
        }
        self.stage = Stage::Pause(self.pause_ticks);
        None
    }
}

impl Minigame for FinalDuel {
    fn kind(&self) -> MinigameKind {
        MinigameKind::FinalDuel
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.tick_rate = ctx.tick_rate.max(1);
        self.participants = ctx.roster.alive_ids();
        self.duel_ticks = ctx.ticks(self.config.duel_secs);
        self.pause_ticks = ctx.ticks(self.config.pause_secs);
        self.next_duel(ctx)
    }

    fn handle_input(
        &mut self,
        participant: ParticipantId,
        action: &Action,
        ctx: &mut RoundContext<'_>,
    ) -> Option<RoundComplete> {
        if self.latch.is_finished()
            || *action != Action::Tap
            || !self.is_dueling()
            || !ctx.is_alive(participant)
        {
            return None;
        }
        let duel = self.current.as_mut()?;
        if participant == duel.first {
            duel.taps[0] += 1;
        } else if participant == duel.second {
            duel.taps[1] += 1;
        }
        None
    }

    fn update(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        if self.latch.is_finished() {
            return None;
        }
        match self.stage {
            Stage::Idle => None,
            Stage::Dueling(remaining) => {
                let Some(duel) = self.current.as_mut() else {
                    return self.next_duel(ctx);
                };
                if !ctx.is_alive(duel.first) || !ctx.is_alive(duel.second) {
                    tracing::debug!(
                        first = duel.first,
                        second = duel.second,
                        "Duel abandoned"
                    );
                    return self.next_duel(ctx);
                }
                duel.elapsed += 1;
                let every = self.config.score_every_ticks.max(1);
                if duel.elapsed % every == 0 {
                    ctx.broadcast(ServerEvent::DuelScore {
                        first_taps: duel.taps[0],
                        second_taps: duel.taps[1],
                    });
                }
                if remaining > 1 {
                    self.stage = Stage::Dueling(remaining - 1);
                    None
                } else {
                    self.resolve(ctx)
                }
            }
            Stage::Pause(remaining) if remaining > 1 => {
                self.stage = Stage::Pause(remaining - 1);
                None
            }
            Stage::Pause(_) => self.next_duel(ctx),
        }
    }

    fn public_state(&self, roster: &Roster) -> serde_json::Value {
        let (stage, remaining) = match self.stage {
            Stage::Idle => ("idle", 0),
            Stage::Dueling(t) => ("dueling", t),
            Stage::Pause(t) => ("pause", t),
        };
        let duel = self.current.as_ref().map(|d| {
            serde_json::json!({
                "first": Contender::lookup(roster, d.first),
                "second": Contender::lookup(roster, d.second),
                "first_taps": d.taps[0],
                "second_taps": d.taps[1],
            })
        });
        serde_json::json!({
            "stage": stage,
            "time_remaining": ticks_to_secs_ceil(remaining, self.tick_rate),
            "cycle": self.cycle,
            "duels_waiting": self.queue.len(),
            "duel": duel,
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

    fn game() -> FinalDuel {
        FinalDuel::new(FinalDuelConfig::default(), seeded_rng(404))
    }

    #[test]
    fn contract_start_eliminates_nobody() {
        test_helpers::contract_start_eliminates_nobody(&mut game(), 4);
    }

    #[test]
    fn contract_completes_exactly_once() {
        test_helpers::contract_completes_exactly_once(&mut game(), 5, 4000);
    }

    #[test]
    fn contract_alive_count_never_increases() {
        test_helpers::contract_alive_count_never_increases(&mut game(), 6, 4000);
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
    fn ties_go_against_the_second_duelist() {
        assert_eq!(duel_loser(1, 2, [0, 0]), 2);
        assert_eq!(duel_loser(1, 2, [7, 7]), 2);
        assert_eq!(duel_loser(1, 2, [3, 4]), 1);
        assert_eq!(duel_loser(1, 2, [9, 4]), 2);
    }

    #[test]
    fn more_taps_wins_the_bonus() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        table.start(&mut g);
        let (a, b) = g.current_duel().unwrap();
        for _ in 0..3 {
            table.input(&mut g, a, Action::Tap);
        }
        for _ in 0..5 {
            table.input(&mut g, b, Action::Tap);
        }
        assert_eq!(g.taps(), Some([3, 5]));
        for _ in 0..200 {
            table.tick(&mut g);
        }
        assert!(!g.is_dueling());
        assert!(!table.is_alive(a));
        assert!(table.is_alive(b));
        assert_eq!(table.score(b), 50);

        let events = table.events();
        assert!(events.iter().any(|e| matches!(
            e.event,
            ServerEvent::DuelResult {
                first_taps: 3,
                second_taps: 5,
                ..
            }
        )));
    }

    #[test]
    fn outsiders_and_other_actions_do_not_count() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        let (a, b) = g.current_duel().unwrap();
        let outsider = (1..=3).find(|&id| id != a && id != b).unwrap();
        table.input(&mut g, outsider, Action::Tap);
        table.input(&mut g, a, Action::Move);
        assert_eq!(g.taps(), Some([0, 0]));
    }

    #[test]
    fn score_broadcast_every_five_ticks() {
        let mut table = TestTable::with_participants(2);
        let mut g = game();
        table.start(&mut g);
        table.events();
        for _ in 0..20 {
            table.tick(&mut g);
        }
        let events = table.events();
        assert_eq!(
            count_events(&events, |e| matches!(e, ServerEvent::DuelScore { .. })),
            4
        );
    }

    #[test]
    fn duel_with_departed_member_is_abandoned() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        table.start(&mut g);
        let (a, _) = g.current_duel().unwrap();
        table.roster.leave(a, &mut table.outbox);
        table.events();

        assert!(table.tick(&mut g).is_none());
        assert_eq!(table.alive_count(), 3);
        let events = table.events();
        assert_eq!(
            count_events(&events, |e| matches!(e, ServerEvent::DuelResult { .. })),
            0
        );
        let (c, d) = g.current_duel().unwrap();
        assert!(c != a && d != a);
    }

    #[test]
    fn last_duel_completes_without_a_pause() {
        let mut table = TestTable::with_participants(2);
        let mut g = game();
        table.start(&mut g);
        let (a, _) = g.current_duel().unwrap();
        table.input(&mut g, a, Action::Tap);
        assert_eq!(table.run_until_complete(&mut g, 1000), Some(200));
        assert_eq!(table.alive_count(), 1);
        assert!(table.is_alive(a));
    }

    #[test]
    fn bracket_runs_down_to_one() {
        let mut table = TestTable::with_participants(7);
        let mut g = game();
        table.start(&mut g);
        assert!(table.run_until_complete(&mut g, 10_000).is_some());
        assert_eq!(table.alive_count(), 1);
    }
}
