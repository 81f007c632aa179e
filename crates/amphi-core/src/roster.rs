use std::collections::HashMap;

use rand::Rng;
use rand::rngs::StdRng;

use crate::error::JoinRejection;
use crate::events::{Contender, Outbox, ServerEvent};
use crate::game_trait::ParticipantId;
use crate::player::{Participant, ParticipantColor, Position, RosterEntry, normalize_name};

const ELIMINATED_MESSAGE: &str = "You have been eliminated!";

/// All joined participants, keyed by connection identity.
pub struct Roster {
    participants: HashMap<ParticipantId, Participant>,
    rng: StdRng,
}

impl Roster {
    pub fn new(rng: StdRng) -> Self {
        Self {
            participants: HashMap::new(),
            rng,
        }
    }

    /// Add a participant. The caller checks the session phase.
    pub fn join(
        &mut self,
        id: ParticipantId,
        raw_name: &str,
        outbox: &mut Outbox,
    ) -> Result<Participant, JoinRejection> {
        if self.participants.contains_key(&id) {
            return Err(JoinRejection::AlreadyJoined);
        }
        let name = normalize_name(raw_name).ok_or(JoinRejection::InvalidName)?;
        let lowered = name.to_lowercase();
        if self
            .participants
            .values()
            .any(|p| p.display_name.to_lowercase() == lowered)
        {
            return Err(JoinRejection::NameTaken);
        }

        let participant = Participant {
            id,
            display_name: name,
            alive: true,
            score: 0,
            position: Position::new(self.rng.random_range(100.0..900.0), 500.0),
            color: ParticipantColor::random(&mut self.rng),
        };
        self.participants.insert(id, participant.clone());

        tracing::info!(
            participant = id,
            name = %participant.display_name,
            total = self.participants.len(),
            "Participant joined"
        );
        outbox.to_displays(ServerEvent::ParticipantAdded {
            participant: participant.clone(),
        });
        self.broadcast_summary(outbox);
        Ok(participant)
    }

    /// Remove a participant in any phase. Unknown ids are ignored.
    pub fn leave(&mut self, id: ParticipantId, outbox: &mut Outbox) -> Option<Participant> {
        let removed = self.participants.remove(&id)?;
        tracing::info!(
            participant = id,
            name = %removed.display_name,
            total = self.participants.len(),
            "Participant left"
        );
        outbox.to_displays(ServerEvent::ParticipantRemoved { id });
        self.broadcast_summary(outbox);
        Some(removed)
    }

    /// Mark a participant eliminated. Returns false if unknown or already out.
    pub fn eliminate(&mut self, id: ParticipantId, outbox: &mut Outbox) -> bool {
        let Some(p) = self.participants.get_mut(&id) else {
            return false;
        };
        if !p.alive {
            return false;
        }
        p.alive = false;
        let contender = Contender {
            id,
            display_name: p.display_name.clone(),
        };
        let alive_count = self.alive_count();
        tracing::info!(
            participant = id,
            name = %contender.display_name,
            alive_count,
            "Participant eliminated"
        );
        outbox.send_to(
            id,
            ServerEvent::YouWereEliminated {
                message: ELIMINATED_MESSAGE.to_string(),
            },
        );
        outbox.to_displays(ServerEvent::ParticipantEliminated {
            participant: contender,
            alive_count,
        });
        true
    }

    /// Revive everyone, clear scores, scatter positions.
    pub fn reset_all(&mut self, outbox: &mut Outbox) {
        for p in self.participants.values_mut() {
            p.alive = true;
            p.score = 0;
            p.position = Position::new(
                self.rng.random_range(100.0..500.0),
                self.rng.random_range(200.0..500.0),
            );
        }
        self.broadcast_summary(outbox);
    }

    pub fn get(&self, id: ParticipantId) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut Participant> {
        self.participants.get_mut(&id)
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn alive(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values().filter(|p| p.alive)
    }

    /// Alive ids in ascending order, so seeded shuffles are reproducible.
    pub fn alive_ids(&self) -> Vec<ParticipantId> {
        let mut ids: Vec<_> = self.alive().map(|p| p.id).collect();
        ids.sort_unstable();
        ids
    }

    pub fn alive_count(&self) -> usize {
        self.alive().count()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Participants sorted by id.
    pub fn sorted(&self) -> Vec<&Participant> {
        let mut all: Vec<_> = self.participants.values().collect();
        all.sort_unstable_by_key(|p| p.id);
        all
    }

    pub fn summary(&self) -> Vec<RosterEntry> {
        self.sorted().into_iter().map(RosterEntry::from).collect()
    }

    fn broadcast_summary(&self, outbox: &mut Outbox) {
        outbox.broadcast(ServerEvent::RosterUpdated {
            participants: self.summary(),
            count: self.participants.len(),
        });
    }
}
