use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level session phase. Moves forward only; reset returns to `Lobby`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Lobby,
    Countdown,
    Playing,
    EliminationPause,
    Victory,
}

impl Phase {
    /// Whether joins are accepted.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Lobby)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lobby => write!(f, "lobby"),
            Self::Countdown => write!(f, "countdown"),
            Self::Playing => write!(f, "playing"),
            Self::EliminationPause => write!(f, "elimination_pause"),
            Self::Victory => write!(f, "victory"),
        }
    }
}
