//! Top-level round orchestration: the phase state machine that walks the
//! lineup, owns the active minigame and decides the winner.

use rand::SeedableRng;
use rand::rngs::StdRng;

use amphi_core::error::{JoinRejection, StartRejection};
use amphi_core::events::{Contender, Envelope, Outbox, ServerEvent};
use amphi_core::game_trait::{
    Action, Minigame, MinigameKind, ParticipantId, RoundComplete, RoundContext,
};
use amphi_core::phase::Phase;
use amphi_core::player::Participant;
use amphi_core::roster::Roster;
use amphi_core::snapshot::{self, DisplaySnapshot, ParticipantSnapshot};
use amphi_core::time::{secs_to_ticks, ticks_to_secs_ceil};

use crate::config::{MinigamesConfig, SessionConfig};
use crate::lineup::{DEFAULT_LINEUP, MinigameRegistry};

/// Highest-scoring alive participant, lowest id on ties. `None` if nobody is alive.
pub fn pick_winner(roster: &Roster) -> Option<ParticipantId> {
    roster
        .alive()
        .max_by(|a, b| a.score.cmp(&b.score).then(b.id.cmp(&a.id)))
        .map(|p| p.id)
}

/// One game from lobby to victory. Owned by the tick loop.
pub struct GameSession {
    phase: Phase,
    round_index: usize,
    round_number: u32,
    active: Option<Box<dyn Minigame>>,
    phase_ticks: u32,
    winner: Option<ParticipantId>,
    roster: Roster,
    outbox: Outbox,
    rng: StdRng,
    config: SessionConfig,
    minigames: MinigamesConfig,
    registry: MinigameRegistry,
    lineup: Vec<MinigameKind>,
}

impl GameSession {
    pub fn new(config: SessionConfig, minigames: MinigamesConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let roster = Roster::new(StdRng::from_rng(&mut rng));
        Self {
            phase: Phase::Lobby,
            round_index: 0,
            round_number: 0,
            active: None,
            phase_ticks: 0,
            winner: None,
            roster,
            outbox: Outbox::new(),
            rng,
            config,
            minigames,
            registry: MinigameRegistry::new(),
            lineup: DEFAULT_LINEUP.to_vec(),
        }
    }

    /// Replace the minigame order.
    pub fn with_lineup(mut self, lineup: Vec<MinigameKind>) -> Self {
        self.lineup = lineup;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round_number(&self) -> u32 {
        self.round_number
    }

    pub fn winner(&self) -> Option<ParticipantId> {
        self.winner
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn active_kind(&self) -> Option<MinigameKind> {
        self.active.as_ref().map(|g| g.kind())
    }

    pub fn tick_rate(&self) -> u32 {
        self.config.tick_rate.max(1)
    }

    fn ticks(&self, secs: f32) -> u32 {
        secs_to_ticks(secs, self.tick_rate()).max(1)
    }

    /// Add a participant. Only accepted in the lobby.
    pub fn join(&mut self, id: ParticipantId, name: &str) -> Result<Participant, JoinRejection> {
        if !self.phase.is_open() {
            return Err(JoinRejection::NotInLobby);
        }
        self.roster.join(id, name, &mut self.outbox)
    }

    /// Remove a participant in any phase. Running minigames skip them from now on.
    pub fn leave(&mut self, id: ParticipantId) -> Option<Participant> {
        self.roster.leave(id, &mut self.outbox)
    }

    pub fn start_game(&mut self) -> Result<(), StartRejection> {
        if self.phase != Phase::Lobby {
            return Err(StartRejection::NotInLobby);
        }
        let joined = self.roster.len();
        let required = self.config.min_participants;
        if joined < required {
            return Err(StartRejection::NotEnoughParticipants { joined, required });
        }
        tracing::info!(participants = joined, "Game starting");
        self.round_index = 0;
        self.round_number = 0;
        self.winner = None;
        self.begin_countdown();
        Ok(())
    }

    /// Back to the lobby with everyone revived. Any running minigame is dropped.
    pub fn reset(&mut self) {
        self.roster.reset_all(&mut self.outbox);
        self.phase = Phase::Lobby;
        self.round_index = 0;
        self.round_number = 0;
        self.active = None;
        self.phase_ticks = 0;
        self.winner = None;
        self.outbox.broadcast(ServerEvent::GameReset);
        tracing::info!("Game reset");
    }

    /// Forward a participant action to the running minigame.
    pub fn route_input(&mut self, id: ParticipantId, action: &Action) {
        if self.phase != Phase::Playing || !self.roster.get(id).is_some_and(|p| p.alive) {
            return;
        }
        let done = self.with_active(|game, ctx| game.handle_input(id, action, ctx));
        if done.flatten().is_some() {
            self.enter_pause();
        }
    }

    /// Advance the session by exactly one tick.
    pub fn tick(&mut self) {
        match self.phase {
            Phase::Lobby | Phase::Victory => {},
            Phase::Countdown => {
                self.phase_ticks = self.phase_ticks.saturating_sub(1);
                if self.phase_ticks == 0 {
                    self.start_round();
                }
            },
            Phase::Playing => match self.with_active(|game, ctx| game.update(ctx)) {
                Some(None) => {},
                Some(Some(RoundComplete)) => self.enter_pause(),
                None => {
                    tracing::warn!("Playing without an active minigame");
                    self.enter_pause();
                },
            },
            Phase::EliminationPause => {
                self.phase_ticks = self.phase_ticks.saturating_sub(1);
                if self.phase_ticks == 0 {
                    self.advance();
                }
            },
        }
    }

    pub fn display_snapshot(&self) -> DisplaySnapshot {
        snapshot::display_snapshot(
            self.phase,
            self.round_number,
            self.active.as_deref(),
            &self.roster,
        )
    }

    pub fn participant_snapshot(&self, id: ParticipantId) -> Option<ParticipantSnapshot> {
        snapshot::participant_snapshot(id, self.phase, self.active.as_deref(), &self.roster)
    }

    /// Take every notification queued since the last drain.
    pub fn drain_outbox(&mut self) -> Vec<Envelope> {
        self.outbox.drain()
    }

    fn with_active<R>(
        &mut self,
        f: impl FnOnce(&mut dyn Minigame, &mut RoundContext<'_>) -> R,
    ) -> Option<R> {
        let tick_rate = self.tick_rate();
        let game = self.active.as_deref_mut()?;
        let mut ctx = RoundContext::new(&mut self.roster, &mut self.outbox, tick_rate);
        Some(f(game, &mut ctx))
    }

    fn begin_countdown(&mut self) {
        let Some(&kind) = self.lineup.get(self.round_index) else {
            self.declare_victory();
            return;
        };
        let rng = StdRng::from_rng(&mut self.rng);
        let Some(game) = self.registry.create(kind, &self.minigames, rng) else {
            tracing::error!(minigame = %kind, "Minigame not registered, ending game");
            self.declare_victory();
            return;
        };
        self.active = Some(game);
        self.round_number += 1;
        self.phase = Phase::Countdown;
        self.phase_ticks = self.ticks(self.config.countdown_secs);

        tracing::info!(round = self.round_number, minigame = %kind, "Countdown started");
        self.outbox.broadcast(ServerEvent::CountdownStarted {
            minigame: kind,
            round_number: self.round_number,
            duration_secs: ticks_to_secs_ceil(self.phase_ticks, self.tick_rate()),
        });
    }

    fn start_round(&mut self) {
        self.phase = Phase::Playing;
        tracing::info!(
            round = self.round_number,
            alive = self.roster.alive_count(),
            "Round playing"
        );
        let done = self.with_active(|game, ctx| game.start(ctx));
        if !matches!(done, Some(None)) {
            self.enter_pause();
        }
    }

    fn enter_pause(&mut self) {
        self.phase = Phase::EliminationPause;
        self.phase_ticks = self.ticks(self.config.elimination_pause_secs);
        let alive_count = self.roster.alive_count();
        tracing::info!(round = self.round_number, alive = alive_count, "Round ended");
        self.outbox.to_displays(ServerEvent::RoundEnded {
            alive_count,
            round_number: self.round_number,
        });
    }

    fn advance(&mut self) {
        self.round_index += 1;
        if self.roster.alive_count() <= 1 || self.round_index >= self.lineup.len() {
            self.declare_victory();
        } else {
            self.begin_countdown();
        }
    }

    fn declare_victory(&mut self) {
        self.phase = Phase::Victory;
        self.active = None;
        self.winner = pick_winner(&self.roster);
        let winner = self.winner.map(|id| Contender::lookup(&self.roster, id));
        match &winner {
            Some(w) => tracing::info!(winner = w.id, name = %w.display_name, "Game won"),
            None => tracing::info!("Game over with no survivors"),
        }
        self.outbox.broadcast(ServerEvent::GameWon { winner });
    }
}
