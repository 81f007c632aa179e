use serde::{Deserialize, Serialize};

use crate::events::ServerEvent;
use crate::game_trait::Action;
use crate::player::Participant;
use crate::snapshot::{DisplaySnapshot, ParticipantSnapshot};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    JoinGame = 0x01,
    AttachDisplay = 0x02,
    PlayerAction = 0x03,
    AdminStart = 0x04,
    AdminReset = 0x05,

    // Server -> Client
    JoinAccepted = 0x10,
    Declined = 0x11,
    Event = 0x12,
    DisplayState = 0x13,
    PlayerState = 0x14,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::JoinGame),
            0x02 => Some(Self::AttachDisplay),
            0x03 => Some(Self::PlayerAction),
            0x04 => Some(Self::AdminStart),
            0x05 => Some(Self::AdminReset),
            0x10 => Some(Self::JoinAccepted),
            0x11 => Some(Self::Declined),
            0x12 => Some(Self::Event),
            0x13 => Some(Self::DisplayState),
            0x14 => Some(Self::PlayerState),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinGameMsg {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerActionMsg {
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinAcceptedMsg {
    pub participant: Participant,
}

/// A join or start request was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclinedMsg {
    pub reason: String,
}

/// Messages sent from a participant, display, or admin client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    JoinGame(JoinGameMsg),
    AttachDisplay,
    PlayerAction(PlayerActionMsg),
    AdminStart,
    AdminReset,
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::JoinGame(_) => MessageType::JoinGame,
            Self::AttachDisplay => MessageType::AttachDisplay,
            Self::PlayerAction(_) => MessageType::PlayerAction,
            Self::AdminStart => MessageType::AdminStart,
            Self::AdminReset => MessageType::AdminReset,
        }
    }
}

/// Messages sent from the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    JoinAccepted(JoinAcceptedMsg),
    Declined(DeclinedMsg),
    Event(ServerEvent),
    DisplayState(Box<DisplaySnapshot>),
    PlayerState(ParticipantSnapshot),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::JoinAccepted(_) => MessageType::JoinAccepted,
            Self::Declined(_) => MessageType::Declined,
            Self::Event(_) => MessageType::Event,
            Self::DisplayState(_) => MessageType::DisplayState,
            Self::PlayerState(_) => MessageType::PlayerState,
        }
    }
}
