//! Read-only projections of session state for displays and participants.

use serde::{Deserialize, Serialize};

use crate::game_trait::{Light, Minigame, MinigameKind, ParticipantId};
use crate::phase::Phase;
use crate::player::{Participant, Position};
use crate::roster::Roster;

/// Full state for spectator displays, refreshed every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplaySnapshot {
    pub phase: Phase,
    pub round_number: u32,
    pub minigame: Option<MinigameKind>,
    pub player_count: usize,
    pub alive_count: usize,
    pub participants: Vec<Participant>,
    pub minigame_state: Option<serde_json::Value>,
}

/// Lightweight per-participant view sent every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub alive: bool,
    pub position: Position,
    pub score: u32,
    pub phase: Phase,
    pub minigame: Option<MinigameKind>,
    pub light: Option<Light>,
}

pub fn display_snapshot(
    phase: Phase,
    round_number: u32,
    active: Option<&dyn Minigame>,
    roster: &Roster,
) -> DisplaySnapshot {
    DisplaySnapshot {
        phase,
        round_number,
        minigame: active.map(|g| g.kind()),
        player_count: roster.len(),
        alive_count: roster.alive_count(),
        participants: roster.sorted().into_iter().cloned().collect(),
        minigame_state: active.map(|g| g.public_state(roster)),
    }
}

/// `None` if the participant is not in the roster.
pub fn participant_snapshot(
    id: ParticipantId,
    phase: Phase,
    active: Option<&dyn Minigame>,
    roster: &Roster,
) -> Option<ParticipantSnapshot> {
    let p = roster.get(id)?;
    Some(ParticipantSnapshot {
        alive: p.alive,
        position: p.position,
        score: p.score,
        phase,
        minigame: active.map(|g| g.kind()),
        light: active.and_then(|g| g.light()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Outbox;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn lobby_snapshot_lists_everyone() {
        let mut roster = Roster::new(StdRng::seed_from_u64(1));
        let mut out = Outbox::new();
        roster.join(2, "B", &mut out).unwrap();
        roster.join(1, "A", &mut out).unwrap();
        roster.eliminate(2, &mut out);

        let snap = display_snapshot(Phase::Lobby, 0, None, &roster);
        assert_eq!(snap.player_count, 2);
        assert_eq!(snap.alive_count, 1);
        assert_eq!(snap.participants[0].id, 1);
        assert!(snap.minigame.is_none());
        assert!(snap.minigame_state.is_none());
    }

    #[test]
    fn participant_snapshot_unknown_is_none() {
        let roster = Roster::new(StdRng::seed_from_u64(1));
        assert!(participant_snapshot(5, Phase::Lobby, None, &roster).is_none());
    }

    #[test]
    fn participant_snapshot_reflects_roster() {
        let mut roster = Roster::new(StdRng::seed_from_u64(1));
        let mut out = Outbox::new();
        roster.join(1, "A", &mut out).unwrap();
        roster.get_mut(1).unwrap().award(7);
        let snap = participant_snapshot(1, Phase::Countdown, None, &roster).unwrap();
        assert!(snap.alive);
        assert_eq!(snap.score, 7);
        assert_eq!(snap.phase, Phase::Countdown);
        assert!(snap.light.is_none());
    }
}
