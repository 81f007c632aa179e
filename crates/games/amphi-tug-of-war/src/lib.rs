pub mod config;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use amphi_core::events::ServerEvent;
use amphi_core::game_trait::{
    Action, Minigame, MinigameKind, ParticipantId, RoundComplete, RoundContext, RoundLatch, Team,
};
use amphi_core::roster::Roster;
use amphi_core::time::ticks_to_secs_ceil;

use config::TugOfWarConfig;

/// Rope values this close to center are left alone by friction.
const REST_ZONE: f32 = 0.5;

/// Decay the rope toward center by one tick of friction.
pub fn apply_friction(rope: f32, friction: f32, tick_rate: u32) -> f32 {
    if rope.abs() <= REST_ZONE {
        return rope;
    }
    let keep = (1.0 - friction / tick_rate.max(1) as f32).clamp(0.0, 1.0);
    rope * keep
}

/// Team on the losing side of center when time runs out. Center counts against team B.
pub fn losing_team_at_whistle(rope: f32) -> Team {
    if rope <= 0.0 { Team::B } else { Team::A }
}

/// Two random teams pull one rope. Team A taps pull negative, team B positive.
pub struct TugOfWar {
    config: TugOfWarConfig,
    rng: StdRng,
    team_a: Vec<ParticipantId>,
    team_b: Vec<ParticipantId>,
    rope: f32,
    elapsed: u32,
    time_limit: u32,
    tick_rate: u32,
    latch: RoundLatch,
}

impl TugOfWar {
    pub fn new(config: TugOfWarConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng,
            team_a: Vec::new(),
            team_b: Vec::new(),
            rope: 0.0,
            elapsed: 0,
            time_limit: 0,
            tick_rate: 1,
            latch: RoundLatch::default(),
        }
    }

    pub fn rope(&self) -> f32 {
        self.rope
    }

    pub fn team(&self, team: Team) -> &[ParticipantId] {
        match team {
            Team::A => &self.team_a,
            Team::B => &self.team_b,
        }
    }

    pub fn team_of(&self, id: ParticipantId) -> Option<Team> {
        if self.team_a.contains(&id) {
            Some(Team::A)
        } else if self.team_b.contains(&id) {
            Some(Team::B)
        } else {
            None
        }
    }

    /// Eliminate every member of the losing team at once.
    fn decide(&mut self, loser: Team, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        tracing::info!(?loser, rope = self.rope, "Tug of war decided");
        for &id in self.team(loser) {
            ctx.eliminate(id);
        }
        self.latch.complete()
    }
}

impl Minigame for TugOfWar {
    fn kind(&self) -> MinigameKind {
        MinigameKind::TugOfWar
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.tick_rate = ctx.tick_rate.max(1);
        self.time_limit = ctx.ticks(self.config.time_limit_secs);
        if ctx.alive_count() <= 1 {
            return self.latch.complete();
        }

        let mut ids = ctx.roster.alive_ids();
        ids.shuffle(&mut self.rng);
        let split = ids.len().div_ceil(2);
        self.team_b = ids.split_off(split);
        self.team_a = ids;

        for (team, members, opponents) in [
            (Team::A, &self.team_a, self.team_b.len()),
            (Team::B, &self.team_b, self.team_a.len()),
        ] {
            for &id in members {
                ctx.send_to(
                    id,
                    ServerEvent::TeamAssigned {
                        team,
                        teammates: members.len(),
                        opponents,
                    },
                );
            }
        }
        tracing::debug!(
            team_a = self.team_a.len(),
            team_b = self.team_b.len(),
            "Tug of war teams assigned"
        );
        None
    }

    fn handle_input(
        &mut self,
        participant: ParticipantId,
        action: &Action,
        ctx: &mut RoundContext<'_>,
    ) -> Option<RoundComplete> {
        if self.latch.is_finished() || *action != Action::Tap || !ctx.is_alive(participant) {
            return None;
        }
        match self.team_of(participant)? {
            Team::A => self.rope -= self.config.tap_force,
            Team::B => self.rope += self.config.tap_force,
        }
        if self.rope.abs() >= self.config.win_threshold {
            let loser = if self.rope < 0.0 { Team::B } else { Team::A };
            return self.decide(loser, ctx);
        }
        None
    }

    fn update(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        if self.latch.is_finished() {
            return None;
        }
        self.elapsed += 1;
        self.rope = apply_friction(self.rope, self.config.friction, self.tick_rate);
        if self.elapsed >= self.time_limit {
            return self.decide(losing_team_at_whistle(self.rope), ctx);
        }
        None
    }

    fn public_state(&self, roster: &Roster) -> serde_json::Value {
        let alive_in = |members: &[ParticipantId]| {
            members
                .iter()
                .filter(|&&id| roster.get(id).is_some_and(|p| p.alive))
                .count()
        };
        serde_json::json!({
            "rope": self.rope,
            "win_threshold": self.config.win_threshold,
            "time_remaining": ticks_to_secs_ceil(
                self.time_limit.saturating_sub(self.elapsed),
                self.tick_rate,
            ),
            "team_a": self.team_a,
            "team_b": self.team_b,
            "team_a_alive": alive_in(&self.team_a),
            "team_b_alive": alive_in(&self.team_b),
        })
    }

    fn is_finished(&self) -> bool {
        self.latch.is_finished()
    }
}
