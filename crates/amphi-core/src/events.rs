use serde::{Deserialize, Serialize};

use crate::game_trait::{Light, MinigameKind, Parity, ParticipantId, Side, Team};
use crate::player::{Participant, RosterEntry};
use crate::roster::Roster;

/// Identity + name pair used wherever an event names a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contender {
    pub id: ParticipantId,
    pub display_name: String,
}

impl Contender {
    /// Look up the display name; participants who already left get an empty name.
    pub fn lookup(roster: &Roster, id: ParticipantId) -> Self {
        Self {
            id,
            display_name: roster
                .get(id)
                .map(|p| p.display_name.clone())
                .unwrap_or_default(),
        }
    }
}

/// Outbound notification emitted by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerEvent {
    // Roster
    RosterUpdated {
        participants: Vec<RosterEntry>,
        count: usize,
    },
    ParticipantAdded {
        participant: Participant,
    },
    ParticipantRemoved {
        id: ParticipantId,
    },
    ParticipantEliminated {
        participant: Contender,
        alive_count: usize,
    },
    YouWereEliminated {
        message: String,
    },

    // Session
    CountdownStarted {
        minigame: MinigameKind,
        round_number: u32,
        duration_secs: u32,
    },
    RoundEnded {
        alive_count: usize,
        round_number: u32,
    },
    GameWon {
        winner: Option<Contender>,
    },
    GameReset,

    // Reaction gate / rhythm tap
    LightChanged {
        light: Light,
    },
    YouFinished {
        bonus: u32,
    },
    Beat {
        beat: u32,
    },
    RhythmFeedback {
        on_beat: bool,
        hits: u32,
        cracks: u32,
    },

    // Tug of war
    TeamAssigned {
        team: Team,
        teammates: usize,
        opponents: usize,
    },

    // Odd or even
    ParityMatch {
        first: Contender,
        second: Contender,
    },
    ParityPrompt {
        opponent: String,
        seconds: u32,
    },
    ChoiceRecorded {
        parity: Parity,
    },
    ParityResult {
        number: u32,
        winner: Contender,
        loser: Contender,
    },

    // Partition
    GroupTarget {
        round: u32,
        target_size: usize,
        group_count: usize,
        seconds: u32,
    },
    GroupJoined {
        group: u8,
    },
    GroupsUpdated {
        sizes: Vec<usize>,
    },
    GroupResult {
        target_size: usize,
        sizes: Vec<usize>,
        eliminated: Vec<ParticipantId>,
    },

    // Glass bridge
    BridgeTurn {
        participant: Contender,
        step: usize,
    },
    BridgePrompt {
        step: usize,
        seconds: u32,
    },
    BridgeResult {
        safe: bool,
    },
    BridgeStep {
        participant: Contender,
        step: usize,
        chosen: Side,
        safe: bool,
    },

    // Final duel
    DuelStarted {
        opponent: String,
        seconds: u32,
    },
    DuelMatch {
        first: Contender,
        second: Contender,
    },
    DuelScore {
        first_taps: u32,
        second_taps: u32,
    },
    DuelResult {
        winner: Contender,
        loser: Contender,
        first_taps: u32,
        second_taps: u32,
    },
}

/// Who an outbound notification is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    /// Every connection, participants and displays alike.
    All,
    Displays,
    Participant(ParticipantId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub audience: Audience,
    pub event: ServerEvent,
}

/// Ordered queue of notifications, drained by the transport after each operation.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<Envelope>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, audience: Audience, event: ServerEvent) {
        self.queue.push(Envelope { audience, event });
    }

    pub fn broadcast(&mut self, event: ServerEvent) {
        self.push(Audience::All, event);
    }

    pub fn to_displays(&mut self, event: ServerEvent) {
        self.push(Audience::Displays, event);
    }

    pub fn send_to(&mut self, id: ParticipantId, event: ServerEvent) {
        self.push(Audience::Participant(id), event);
    }

    pub fn drain(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.queue)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_order_and_empties() {
        let mut out = Outbox::new();
        out.broadcast(ServerEvent::GameReset);
        out.to_displays(ServerEvent::ParticipantRemoved { id: 4 });
        out.send_to(
            4,
            ServerEvent::YouWereEliminated {
                message: "bye".into(),
            },
        );
        assert_eq!(out.len(), 3);

        let drained = out.drain();
        assert!(out.is_empty());
        assert_eq!(drained[0].audience, Audience::All);
        assert_eq!(drained[1].audience, Audience::Displays);
        assert_eq!(drained[2].audience, Audience::Participant(4));
    }
}
