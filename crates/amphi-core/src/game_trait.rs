use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::{Outbox, ServerEvent};
use crate::roster::Roster;
use crate::time::secs_to_ticks;

/// Unique identifier for a participant. Doubles as the connection handle.
pub type ParticipantId = u64;

/// Core trait that all Amphi minigames implement.
///
/// A minigame is built fresh for one round and discarded afterwards. The
/// session drives it through [`start`](Minigame::start), then one
/// [`update`](Minigame::update) per tick, routing participant actions to
/// [`handle_input`](Minigame::handle_input) in between. Completion is
/// reported by returning `Some(RoundComplete)` exactly once; every call
/// after that is a no-op.
pub trait Minigame: Send {
    fn kind(&self) -> MinigameKind;

    /// Snapshot the alive participants and arm the round timers.
    fn start(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete>;

    /// Apply one participant action. Actions the minigame does not use are ignored.
    fn handle_input(
        &mut self,
        participant: ParticipantId,
        action: &Action,
        ctx: &mut RoundContext<'_>,
    ) -> Option<RoundComplete>;

    /// Advance round-internal timers by one tick.
    fn update(&mut self, ctx: &mut RoundContext<'_>) -> Option<RoundComplete>;

    /// Public state for the display snapshot.
    fn public_state(&self, roster: &Roster) -> serde_json::Value;

    /// Shared go/stop signal, for minigames that have one.
    fn light(&self) -> Option<Light> {
        None
    }

    fn is_finished(&self) -> bool;
}

/// The fixed set of minigames, in lineup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinigameKind {
    ReactionGate,
    RhythmTap,
    TugOfWar,
    OddOrEven,
    GlassBridge,
    Partition,
    FinalDuel,
}

impl MinigameKind {
    pub const ALL: [MinigameKind; 7] = [
        MinigameKind::ReactionGate,
        MinigameKind::RhythmTap,
        MinigameKind::TugOfWar,
        MinigameKind::OddOrEven,
        MinigameKind::GlassBridge,
        MinigameKind::Partition,
        MinigameKind::FinalDuel,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ReactionGate => "Reaction Gate",
            Self::RhythmTap => "Rhythm Tap",
            Self::TugOfWar => "Tug of War",
            Self::OddOrEven => "Odd or Even",
            Self::Partition => "Partition",
            Self::GlassBridge => "Glass Bridge",
            Self::FinalDuel => "Final Duel",
        }
    }
}

impl fmt::Display for MinigameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A participant action routed to the active minigame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Tap,
    Move,
    Choose { side: Side },
    ChooseParity { parity: Parity },
    ChooseGroup { group: u8 },
}

impl Action {
    /// Tap and move both count as movement where a minigame cares.
    pub fn is_movement(&self) -> bool {
        matches!(self, Self::Tap | Self::Move)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn random(rng: &mut impl rand::Rng) -> Self {
        if rng.random_bool(0.5) {
            Self::Left
        } else {
            Self::Right
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Parity {
    Even,
    Odd,
}

impl Parity {
    pub fn of(n: u32) -> Self {
        if n % 2 == 0 { Self::Even } else { Self::Odd }
    }

    pub fn random(rng: &mut impl rand::Rng) -> Self {
        if rng.random_bool(0.5) {
            Self::Even
        } else {
            Self::Odd
        }
    }
}

/// Binary go/stop signal shown to every participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Light {
    Go,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Team {
    A,
    B,
}

/// Marker returned once when a round is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundComplete;

/// Guards the "complete exactly once" rule.
#[derive(Debug, Default)]
pub struct RoundLatch {
    finished: bool,
}

impl RoundLatch {
    /// Returns `Some` the first time, `None` afterwards.
    pub fn complete(&mut self) -> Option<RoundComplete> {
        if self.finished {
            None
        } else {
            self.finished = true;
            Some(RoundComplete)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Everything a minigame may touch while handling a call.
pub struct RoundContext<'a> {
    pub roster: &'a mut Roster,
    pub outbox: &'a mut Outbox,
    pub tick_rate: u32,
}

impl<'a> RoundContext<'a> {
    pub fn new(roster: &'a mut Roster, outbox: &'a mut Outbox, tick_rate: u32) -> Self {
        Self {
            roster,
            outbox,
            tick_rate,
        }
    }

    /// Convert a configured duration to ticks, never less than one.
    pub fn ticks(&self, secs: f32) -> u32 {
        secs_to_ticks(secs, self.tick_rate).max(1)
    }

    pub fn is_alive(&self, id: ParticipantId) -> bool {
        self.roster.get(id).is_some_and(|p| p.alive)
    }

    pub fn alive_count(&self) -> usize {
        self.roster.alive_count()
    }

    /// How many of `ids` are still in the roster and alive.
    pub fn alive_among(&self, ids: &[ParticipantId]) -> usize {
        ids.iter().filter(|&&id| self.is_alive(id)).count()
    }

    pub fn eliminate(&mut self, id: ParticipantId) -> bool {
        self.roster.eliminate(id, self.outbox)
    }

    pub fn broadcast(&mut self, event: ServerEvent) {
        self.outbox.broadcast(event);
    }

    pub fn send_to(&mut self, id: ParticipantId, event: ServerEvent) {
        self.outbox.send_to(id, event);
    }
}

/// Shuffle `ids` and pair them off. With an odd count the last one sits out.
pub fn random_pairs(
    mut ids: Vec<ParticipantId>,
    rng: &mut impl rand::Rng,
) -> Vec<(ParticipantId, ParticipantId)> {
    use rand::seq::SliceRandom;
    ids.shuffle(rng);
    ids.chunks_exact(2).map(|pair| (pair[0], pair[1])).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_completes_once() {
        let mut latch = RoundLatch::default();
        assert!(!latch.is_finished());
        assert_eq!(latch.complete(), Some(RoundComplete));
        assert_eq!(latch.complete(), None);
        assert!(latch.is_finished());
    }

    #[test]
    fn parity_of_numbers() {
        assert_eq!(Parity::of(4), Parity::Even);
        assert_eq!(Parity::of(7), Parity::Odd);
    }

    #[test]
    fn lineup_names_are_unique() {
        let mut names: Vec<_> = MinigameKind::ALL.iter().map(|k| k.display_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn random_pairs_leave_one_out() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let pairs = random_pairs(vec![1, 2, 3, 4, 5], &mut rng);
        assert_eq!(pairs.len(), 2);
        let mut seen: Vec<_> = pairs.iter().flat_map(|&(a, b)| [a, b]).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn movement_actions() {
        assert!(Action::Tap.is_movement());
        assert!(Action::Move.is_movement());
        assert!(!Action::ChooseGroup { group: 0 }.is_movement());
    }
}
