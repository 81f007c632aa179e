pub mod config;

use std::collections::HashMap;

use amphi_core::events::ServerEvent;
use amphi_core::game_trait::{
    Action, Minigame, MinigameKind, ParticipantId, RoundComplete, RoundContext, RoundLatch,
};
use amphi_core::roster::Roster;
use amphi_core::time::{secs_to_ticks, ticks_to_secs_ceil};

use config::RhythmTapConfig;

const TRACK_START_X: f32 = 100.0;
const TRACK_LENGTH: f32 = 800.0;

/// The beat a tap belongs to, or `None` if it is off-beat.
///
/// `since_last` is the number of ticks since beat `beat` fired. A tap within
/// `tolerance` ticks after that boundary belongs to `beat`; one within
/// `tolerance` ticks before the next boundary belongs to `beat + 1`.
pub fn classify_tap(beat: u32, since_last: u32, interval: u32, tolerance: u32) -> Option<u32> {
    if since_last <= tolerance {
        Some(beat)
    } else if interval.saturating_sub(since_last) <= tolerance {
        Some(beat + 1)
    } else {
        None
    }
}

/// Tick count as wall-clock milliseconds.
pub fn ticks_to_millis(ticks: u32, tick_rate: u32) -> u64 {
    u64::from(ticks) * 1000 / u64::from(tick_rate.max(1))
}

#[derive(Debug, Clone, Default)]
struct Progress {
    hits: u32,
    cracks: u32,
    last_credited: Option<u32>,
    met_target: bool,
}

/// Tap on the beat. Off-beat taps crack; too many cracks eliminate.
pub struct RhythmTap {
    config: RhythmTapConfig,
    participants: Vec<ParticipantId>,
    progress: HashMap<ParticipantId, Progress>,
    beat: u32,
    beat_timer: u32,
    interval: u32,
    tolerance: u32,
    elapsed: u32,
    time_limit: u32,
    tick_rate: u32,
    latch: RoundLatch,
}

impl RhythmTap {
    pub fn new(config: RhythmTapConfig) -> Self {
        Self {
            config,
            participants: Vec::new(),
            progress: HashMap::new(),
            beat: 0,
            beat_timer: 0,
            interval: 1,
            tolerance: 0,
            elapsed: 0,
            time_limit: 0,
            tick_rate: 1,
            latch: RoundLatch::default(),
        }
    }

    pub fn hits(&self, id: ParticipantId) -> u32 {
        self.progress.get(&id).map_or(0, |p| p.hits)
    }

    pub fn cracks(&self, id: ParticipantId) -> u32 {
        self.progress.get(&id).map_or(0, |p| p.cracks)
    }

    pub fn beat(&self) -> u32 {
        self.beat
    }

    fn target(&self) -> u32 {
        self.config.target_hits.max(1)
    }
}

impl Minigame for RhythmTap {
    fn kind(&self) -> MinigameKind {
        MinigameKind::RhythmTap
    }

    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete> {
        self.tick_rate = ctx.tick_rate.max(1);
        self.participants = ctx.roster.alive_ids();
        self.interval = ctx.ticks(self.config.beat_interval_secs);
        self.tolerance = secs_to_ticks(self.config.tolerance_secs, ctx.tick_rate);
        self.time_limit = ctx.ticks(self.config.time_limit_secs);
        self.beat = 0;
        self.beat_timer = self.interval;
        self.progress = self
            .participants
            .iter()
            .map(|&id| (id, Progress::default()))
            .collect();
        for &id in &self.participants {
            if let Some(p) = ctx.roster.get_mut(id) {
                p.position.x = TRACK_START_X;
            }
        }
        ctx.broadcast(ServerEvent::Beat { beat: 0 });
        tracing::debug!(
            participants = self.participants.len(),
            interval = self.interval,
            tolerance = self.tolerance,
            "Rhythm tap started"
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
        let target = self.target();
        let since_last = self.interval.saturating_sub(self.beat_timer);
        let nearest = classify_tap(self.beat, since_last, self.interval, self.tolerance);
        let progress = self.progress.get_mut(&participant)?;

        // A second tap for an already-credited beat is a crack.
        match nearest.filter(|&b| progress.last_credited != Some(b)) {
            Some(beat) => {
                progress.hits += 1;
                progress.last_credited = Some(beat);
                let hits = progress.hits;
                let reached = hits >= target && !progress.met_target;
                if reached {
                    progress.met_target = true;
                }
                let cracks = progress.cracks;
                if let Some(p) = ctx.roster.get_mut(participant) {
                    p.award(1);
                    p.position.x =
                        TRACK_START_X + hits.min(target) as f32 / target as f32 * TRACK_LENGTH;
                }
                ctx.send_to(
                    participant,
                    ServerEvent::RhythmFeedback {
                        on_beat: true,
                        hits,
                        cracks,
                    },
                );
                if reached {
                    ctx.send_to(participant, ServerEvent::YouFinished { bonus: 0 });
                }
            },
            None => {
                progress.cracks += 1;
                let (hits, cracks) = (progress.hits, progress.cracks);
                ctx.send_to(
                    participant,
                    ServerEvent::RhythmFeedback {
                        on_beat: false,
                        hits,
                        cracks,
                    },
                );
                if cracks >= self.config.max_cracks {
                    tracing::debug!(participant, cracks, "Cracked out");
                    ctx.eliminate(participant);
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
        self.beat_timer = self.beat_timer.saturating_sub(1);
        if self.beat_timer == 0 {
            self.beat += 1;
            self.beat_timer = self.interval;
            ctx.broadcast(ServerEvent::Beat { beat: self.beat });
        }

        if self.elapsed >= self.time_limit {
            let target = self.target();
            for &id in &self.participants {
                if ctx.is_alive(id) && self.hits(id) < target {
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
        let mut progress: Vec<_> = self
            .progress
            .iter()
            .map(|(id, p)| (*id, p.hits, p.cracks))
            .collect();
        progress.sort_unstable_by_key(|(id, _, _)| *id);
        serde_json::json!({
            "beat": self.beat,
            "ticks_to_next_beat": self.beat_timer,
            "beat_interval_ms": ticks_to_millis(self.interval, self.tick_rate),
            "time_remaining": ticks_to_secs_ceil(
                self.time_limit.saturating_sub(self.elapsed),
                self.tick_rate,
            ),
            "target": self.target(),
            "max_cracks": self.config.max_cracks,
            "progress": progress
                .into_iter()
                .map(|(id, hits, cracks)| serde_json::json!({
                    "id": id,
                    "hits": hits,
                    "cracks": cracks,
                }))
                .collect::<Vec<_>>(),
        })
    }

    fn is_finished(&self) -> bool {
        self.latch.is_finished()
    }
}
