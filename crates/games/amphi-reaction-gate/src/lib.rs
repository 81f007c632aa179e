pub mod config;

use std::collections::HashSet;

use rand::Rng;
use rand::rngs::StdRng;

use amphi_core::events::ServerEvent;
use amphi_core::game_trait::{
    Action, Light, Minigame, MinigameKind, ParticipantId, RoundComplete, RoundContext, RoundLatch,
};
use amphi_core::player::Position;
use amphi_core::roster::Roster;
use amphi_core::time::{secs_to_ticks, ticks_to_secs_ceil};

use config::ReactionGateConfig;

/// Go/stop movement race. Moving while the light is "stop" is fatal.
pub struct ReactionGate {
    config: ReactionGateConfig,
    rng: StdRng,
    participants: Vec<ParticipantId>,
    finished: HashSet<ParticipantId>,
    light: Light,
    light_ticks: u32,
    grace_ticks: u32,
    elapsed: u32,
    time_limit: u32,
    tick_rate: u32,
    latch: RoundLatch,
}

impl ReactionGate {
    pub fn new(config: ReactionGateConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            participants: Vec::new(),
            finished: HashSet::new(),
            light: Light::Go,
            light_ticks: 0,
            grace_ticks: 0,
            elapsed: 0,
            time_limit: 0,
            tick_rate: 1,
            latch: RoundLatch::default(),
        }
    }

    pub fn in_grace(&self) -> bool {
        self.grace_ticks > 0
    }

    pub fn has_finished(&self, id: ParticipantId) -> bool {
        self.finished.contains(&id)
    }

    /// Random duration for the window that just began.
    fn roll_window(&mut self) -> u32 {
        let (lo, hi) = match self.light {
            Light::Go => (self.config.go_min_secs, self.config.go_max_secs),
            Light::Stop => (self.config.stop_min_secs, self.config.stop_max_secs),
        };
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        let secs = self.rng.random_range(lo..=hi);
        secs_to_ticks(secs, self.tick_rate).max(1)
    }

    fn set_light(&mut self, light: Light, ctx: &mut RoundContext<'_>) {
        self.light = light;
        self.light_ticks = self.roll_window();
        self.grace_ticks = secs_to_ticks(self.config.grace_secs, ctx.tick_rate);
        ctx.broadcast(ServerEvent::LightChanged { light });
    }
}

impl Minigame for ReactionGate {
    fn kind(&self) -> MinigameKind {
        MinigameKind::ReactionGate
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.tick_rate = ctx.tick_rate.max(1);
        self.participants = ctx.roster.alive_ids();
        self.time_limit = ctx.ticks(self.config.time_limit_secs);
        for &id in &self.participants {
            if let Some(p) = ctx.roster.get_mut(id) {
                p.position = Position::new(
                    self.config.start_line,
                    self.rng.random_range(300.0..500.0),
                );
            }
        }
        // Opening green light has no grace window.
        self.light = Light::Go;
        self.light_ticks = self.roll_window();
        self.grace_ticks = 0;
        ctx.broadcast(ServerEvent::LightChanged { light: Light::Go });
        tracing::debug!(
            participants = self.participants.len(),
            time_limit = self.time_limit,
            "Reaction gate started"
        );
        None
    }

    fn handle_input(
        &mut self,
        participant: ParticipantId,
        action: &Action,
        ctx: &mut RoundContext<'_>,
    ) -> Option<RoundComplete> {
        if self.latch.is_finished() || !action.is_movement() || self.in_grace() {
            return None;
        }
        if !self.participants.contains(&participant)
            || !ctx.is_alive(participant)
            || self.finished.contains(&participant)
        {
            return None;
        }

        match self.light {
            Light::Stop => {
                tracing::debug!(participant, "Moved on stop");
                ctx.eliminate(participant);
            },
            Light::Go => {
                let finish = self.config.finish_line;
                let bonus = self.config.finish_bonus;
                let crossed = match ctx.roster.get_mut(participant) {
                    Some(p) => {
                        p.position.x = (p.position.x + self.config.step).min(finish);
                        let crossed = p.position.x >= finish;
                        if crossed {
                            p.award(bonus);
                        }
                        crossed
                    },
                    None => false,
                };
                if crossed {
                    self.finished.insert(participant);
                    ctx.send_to(participant, ServerEvent::YouFinished { bonus });
                    tracing::debug!(participant, "Crossed the finish line");
                }
            },
        }
        None
    }

    fn update(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        if self.latch.is_finished() {
            return None;
        }
        self.elapsed += 1;
        self.grace_ticks = self.grace_ticks.saturating_sub(1);
        self.light_ticks = self.light_ticks.saturating_sub(1);
        if self.light_ticks == 0 {
            let next = match self.light {
                Light::Go => Light::Stop,
                Light::Stop => Light::Go,
            };
            self.set_light(next, ctx);
        }

        let racing: Vec<ParticipantId> = self
            .participants
            .iter()
            .copied()
            .filter(|&id| ctx.is_alive(id))
            .collect();

        if racing.iter().all(|id| self.finished.contains(id)) {
            return self.latch.complete();
        }

        if self.elapsed >= self.time_limit {
            for id in racing {
                if !self.finished.contains(&id) {
                    ctx.eliminate(id);
                }
            }
            return self.latch.complete();
        }

        if ctx.alive_count() <= 1 {
            return self.latch.complete();
        }
        None
    }

    fn public_state(&self, _roster: &Roster) -> serde_json::Value {
        serde_json::json!({
            "light": self.light,
            "time_remaining": ticks_to_secs_ceil(
                self.time_limit.saturating_sub(self.elapsed),
                self.tick_rate,
            ),
            "start_line": self.config.start_line,
            "finish_line": self.config.finish_line,
            "finished_count": self.finished.len(),
        })
    }

    fn light(&self) -> Option<Light> {
        Some(self.light)
    }

    fn is_finished(&self) -> bool {
        self.latch.is_finished()
    }
}
