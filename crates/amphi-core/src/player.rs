use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::game_trait::ParticipantId;

/// Longest display name accepted on join, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// A participant tracked by the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub alive: bool,
    pub score: u32,
    pub position: Position,
    pub color: ParticipantColor,
}

impl Participant {
    /// Add to the cumulative score. Scores never decrease during a game.
    pub fn award(&mut self, points: u32) {
        self.score = self.score.saturating_add(points);
    }
}

/// Presentation-only 2D position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Hue-based display color, rendered as `hsl(h, 100%, 60%)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantColor {
    pub hue: u16,
}

impl ParticipantColor {
    pub fn random(rng: &mut impl Rng) -> Self {
        Self {
            hue: rng.random_range(0..360),
        }
    }

    pub fn to_css(&self) -> String {
        format!("hsl({}, 100%, 60%)", self.hue)
    }
}

/// Name + color pair broadcast in roster summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub display_name: String,
    pub color: String,
}

impl From<&Participant> for RosterEntry {
    fn from(p: &Participant) -> Self {
        Self {
            display_name: p.display_name.clone(),
            color: p.color.to_css(),
        }
    }
}

/// Trim and validate a requested display name.
///
/// Returns `None` for names that are empty after trimming, longer than
/// [`MAX_NAME_LEN`] characters, or contain control characters.
pub fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN || name.chars().any(char::is_control)
    {
        return None;
    }
    Some(name.to_string())
}
