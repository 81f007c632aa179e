pub mod config;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use amphi_core::events::{Contender, ServerEvent};
use amphi_core::game_trait::{
    Action, Minigame, MinigameKind, ParticipantId, RoundComplete, RoundContext, RoundLatch, Side,
};
use amphi_core::player::Position;
use amphi_core::roster::Roster;
use amphi_core::time::ticks_to_secs_ceil;

use config::GlassBridgeConfig;

const BRIDGE_START_X: f32 = 100.0;
const PANEL_WIDTH: f32 = 160.0;
const LANE_TOP: f32 = 250.0;
const LANE_SPACING: f32 = 50.0;
const LANES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Choosing(u32),
    Pause(u32),
}

/// Cross a bridge of hidden safe panels one participant at a time.
///
/// Each step is offered to every alive participant in passage order before
/// the next step begins. A wrong side, or a forced pick on timeout, eliminates.
pub struct GlassBridge {
    config: GlassBridgeConfig,
    rng: StdRng,
    order: Vec<ParticipantId>,
    safe: Vec<Side>,
    revealed: Vec<Option<Side>>,
    step: usize,
    cursor: usize,
    active: Option<ParticipantId>,
    stage: Stage,
    choice_ticks: u32,
    pause_ticks: u32,
    tick_rate: u32,
    latch: RoundLatch,
}

impl GlassBridge {
    pub fn new(config: GlassBridgeConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            order: Vec::new(),
            safe: Vec::new(),
            revealed: Vec::new(),
            step: 0,
            cursor: 0,
            active: None,
            stage: Stage::Idle,
            choice_ticks: 1,
            pause_ticks: 1,
            tick_rate: 1,
            latch: RoundLatch::default(),
        }
    }

    /// Participant whose turn it is.
    pub fn active(&self) -> Option<ParticipantId> {
        self.active
    }

    /// Zero-based step currently being crossed.
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn passage_order(&self) -> &[ParticipantId] {
        &self.order
    }

    pub fn safe_side(&self, step: usize) -> Option<Side> {
        self.safe.get(step).copied()
    }

    /// Hand the turn to the next alive participant, moving to the next step
    /// once everyone has crossed the current one.
    fn advance_turn(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.active = None;
        loop {
            if ctx.alive_among(&self.order) <= 1 {
                self.stage = Stage::Idle;
                return self.latch.complete();
            }
            if self.cursor >= self.order.len() {
                self.step += 1;
                self.cursor = 0;
                if self.step >= self.safe.len() {
                    self.stage = Stage::Idle;
                    return self.latch.complete();
                }
            }
            let id = self.order[self.cursor];
            self.cursor += 1;
            if ctx.is_alive(id) {
                self.prompt(id, ctx);
                return None;
            }
        }
    }

    fn prompt(&mut self, id: ParticipantId, ctx: &mut RoundContext<'_>) {
        self.active = Some(id);
        self.stage = Stage::Choosing(self.choice_ticks);
        let step = self.step + 1;
        ctx.broadcast(ServerEvent::BridgeTurn {
            participant: Contender::lookup(ctx.roster, id),
            step,
        });
        ctx.send_to(
            id,
            ServerEvent::BridgePrompt {
                step,
                seconds: ticks_to_secs_ceil(self.choice_ticks, self.tick_rate),
            },
        );
    }

    fn resolve_choice(&mut self, chosen: Side, ctx: &mut RoundContext<'_>) {
        let Some(id) = self.active.take() else {
            return;
        };
        let Some(&safe_side) = self.safe.get(self.step) else {
            return;
        };
        let safe = chosen == safe_side;
        if let Some(slot) = self.revealed.get_mut(self.step) {
            *slot = Some(safe_side);
        }

        ctx.send_to(id, ServerEvent::BridgeResult { safe });
        ctx.broadcast(ServerEvent::BridgeStep {
            participant: Contender::lookup(ctx.roster, id),
            step: self.step + 1,
            chosen,
            safe,
        });
        if safe {
            if let Some(p) = ctx.roster.get_mut(id) {
                p.award(self.config.safe_bonus);
                p.position.x = BRIDGE_START_X + (self.step + 1) as f32 * PANEL_WIDTH;
            }
        } else {
            ctx.eliminate(id);
        }
        tracing::debug!(participant = id, step = self.step + 1, safe, "Bridge panel chosen");
        self.stage = Stage::Pause(self.pause_ticks);
    }
}

impl Minigame for GlassBridge {
    fn kind(&self) -> MinigameKind {
        MinigameKind::GlassBridge
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.tick_rate = ctx.tick_rate.max(1);
        self.choice_ticks = ctx.ticks(self.config.choice_secs);
        self.pause_ticks = ctx.ticks(self.config.pause_secs);
        self.safe = (0..self.config.steps)
            .map(|_| Side::random(&mut self.rng))
            .collect();
        self.revealed = vec![None; self.safe.len()];

        self.order = ctx.roster.alive_ids();
        self.order.shuffle(&mut self.rng);
        for (lane, &id) in self.order.iter().enumerate() {
            if let Some(p) = ctx.roster.get_mut(id) {
                p.position = Position::new(
                    BRIDGE_START_X,
                    LANE_TOP + (lane % LANES) as f32 * LANE_SPACING,
                );
            }
        }
        tracing::debug!(
            participants = self.order.len(),
            steps = self.safe.len(),
            "Glass bridge started"
        );

        self.step = 0;
        self.cursor = 0;
        if self.safe.is_empty() {
            self.stage = Stage::Idle;
            return self.latch.complete();
        }
        self.advance_turn(ctx)
    }

    fn handle_input(
        &mut self,
        participant: ParticipantId,
        action: &Action,
        ctx: &mut RoundContext<'_>,
    ) -> Option<RoundComplete> {
        let Action::Choose { side } = *action else {
            return None;
        };
        if self.latch.is_finished()
            || !matches!(self.stage, Stage::Choosing(_))
            || self.active != Some(participant)
            || !ctx.is_alive(participant)
        {
            return None;
        }
        self.resolve_choice(side, ctx);
        None
    }

    fn update(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        if self.latch.is_finished() {
            return None;
        }
        match self.stage {
            Stage::Idle => None,
            Stage::Choosing(_) if !self.active.is_some_and(|id| ctx.is_alive(id)) => {
                self.advance_turn(ctx)
            }
            Stage::Choosing(remaining) if remaining > 1 => {
                self.stage = Stage::Choosing(remaining - 1);
                None
            }
            Stage::Choosing(_) => {
                let forced = Side::random(&mut self.rng);
                self.resolve_choice(forced, ctx);
                None
            }
            Stage::Pause(remaining) if remaining > 1 => {
                self.stage = Stage::Pause(remaining - 1);
                None
            }
            Stage::Pause(_) => self.advance_turn(ctx),
        }
    }

    fn public_state(&self, roster: &Roster) -> serde_json::Value {
        let (stage, remaining) = match self.stage {
            Stage::Idle => ("idle", 0),
            Stage::Choosing(t) => ("choosing", t),
            Stage::Pause(t) => ("pause", t),
        };
        serde_json::json!({
            "stage": stage,
            "steps": self.safe.len(),
            "step": self.step + 1,
            "active": self.active.map(|id| Contender::lookup(roster, id)),
            "revealed": self.revealed,
            "time_remaining": ticks_to_secs_ceil(remaining, self.tick_rate),
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

    fn game() -> GlassBridge {
        GlassBridge::new(GlassBridgeConfig::default(), seeded_rng(88))
    }

    fn other(side: Side) -> Side {
        match side {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    fn choose_safe(table: &mut TestTable, g: &mut GlassBridge) {
        let id = g.active().unwrap();
        let side = g.safe_side(g.step()).unwrap();
        table.input(g, id, Action::Choose { side });
    }

    #[test]
    fn contract_start_eliminates_nobody() {
        test_helpers::contract_start_eliminates_nobody(&mut game(), 4);
    }

    #[test]
    fn contract_completes_exactly_once() {
        test_helpers::contract_completes_exactly_once(&mut game(), 4, 8000);
    }

    #[test]
    fn contract_alive_count_never_increases() {
        test_helpers::contract_alive_count_never_increases(&mut game(), 4, 8000);
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
    fn first_turn_goes_to_head_of_order() {
        let mut table = TestTable::with_participants(4);
        let mut g = game();
        table.start(&mut g);
        let first = g.passage_order()[0];
        assert_eq!(g.active(), Some(first));

        let events = table.events();
        assert_eq!(
            count_events(&events, |e| matches!(e, ServerEvent::BridgeTurn { step: 1, .. })),
            1
        );
        let prompts: Vec<_> = events
            .iter()
            .filter(|e| matches!(e.event, ServerEvent::BridgePrompt { .. }))
            .collect();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].audience, Audience::Participant(first));
    }

    #[test]
    fn safe_panel_scores_and_advances() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        let id = g.active().unwrap();
        table.events();
        choose_safe(&mut table, &mut g);

        assert!(table.is_alive(id));
        assert_eq!(table.score(id), 20);
        assert_eq!(
            table.roster.get(id).unwrap().position.x,
            BRIDGE_START_X + PANEL_WIDTH
        );
        assert_eq!(g.active(), None);
        let events = table.events();
        assert!(events.iter().any(|e| e.audience == Audience::Participant(id)
            && e.event == ServerEvent::BridgeResult { safe: true }));
    }

    #[test]
    fn wrong_panel_eliminates() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        let id = g.active().unwrap();
        let wrong = other(g.safe_side(0).unwrap());
        table.input(&mut g, id, Action::Choose { side: wrong });
        assert!(!table.is_alive(id));
        assert_eq!(table.score(id), 0);
    }

    #[test]
    fn only_active_participant_may_choose() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        let waiting = g.passage_order()[1];
        let side = g.safe_side(0).unwrap();
        table.events();
        table.input(&mut g, waiting, Action::Choose { side });
        assert!(table.events().is_empty());
        assert_eq!(g.active(), Some(g.passage_order()[0]));
    }

    #[test]
    fn timeout_forces_a_pick() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        let id = g.active().unwrap();
        for _ in 0..160 {
            table.tick(&mut g);
        }
        assert_eq!(g.active(), None);
        assert!(!table.is_alive(id) || table.score(id) == 20);
    }

    #[test]
    fn each_step_finishes_for_everyone_first() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        for _ in 0..2000 {
            if g.active().is_some() {
                choose_safe(&mut table, &mut g);
            }
            if table.tick(&mut g).is_some() {
                break;
            }
        }
        assert!(g.is_finished());
        assert_eq!(table.alive_count(), 3);
        for id in 1..=3 {
            assert_eq!(table.score(id), 100);
        }

        let turns: Vec<usize> = table
            .events()
            .iter()
            .filter_map(|e| match e.event {
                ServerEvent::BridgeTurn { step, .. } => Some(step),
                _ => None,
            })
            .collect();
        assert_eq!(turns.len(), 15);
        assert!(turns.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(turns.iter().filter(|&&s| s == 1).count(), 3);
    }

    #[test]
    fn departed_participant_loses_their_turn() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        let first = g.active().unwrap();
        table.roster.leave(first, &mut table.outbox);
        table.tick(&mut g);
        assert_eq!(g.active(), Some(g.passage_order()[1]));
        assert_eq!(table.alive_count(), 2);
    }

    #[test]
    fn two_falls_leave_a_survivor() {
        let mut table = TestTable::with_participants(3);
        let mut g = game();
        table.start(&mut g);
        let mut done = None;
        for _ in 0..2 {
            let id = g.active().unwrap();
            let wrong = other(g.safe_side(g.step()).unwrap());
            table.input(&mut g, id, Action::Choose { side: wrong });
            done = table.run_until_complete(&mut g, 40);
        }
        assert!(done.is_some());
        assert_eq!(table.alive_count(), 1);
    }
}
