use serde::{Deserialize, Serialize};

use crate::events::ServerEvent;
use crate::snapshot::{DisplaySnapshot, ParticipantSnapshot};

use super::messages::{
    ClientMessage, DeclinedMsg, JoinAcceptedMsg, JoinGameMsg, MessageType, PlayerActionMsg,
    ServerMessage,
};

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    let msg_type = msg.message_type();
    match msg {
        ClientMessage::JoinGame(m) => encode_message(msg_type, m),
        ClientMessage::PlayerAction(m) => encode_message(msg_type, m),
        ClientMessage::AttachDisplay | ClientMessage::AdminStart | ClientMessage::AdminReset => {
            encode_message(msg_type, &())
        },
    }
}

pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    let msg_type = msg.message_type();
    match msg {
        ServerMessage::JoinAccepted(m) => encode_message(msg_type, m),
        ServerMessage::Declined(m) => encode_message(msg_type, m),
        ServerMessage::Event(e) => encode_message(msg_type, e),
        ServerMessage::DisplayState(s) => encode_message(msg_type, &**s),
        ServerMessage::PlayerState(s) => encode_message(msg_type, s),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    let Some(&first) = data.first() else {
        return Err(ProtocolError::EmptyMessage);
    };
    MessageType::from_byte(first).ok_or(ProtocolError::UnknownMessageType(first))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::JoinGame => Ok(ClientMessage::JoinGame(decode_payload::<JoinGameMsg>(
            data,
        )?)),
        MessageType::AttachDisplay => Ok(ClientMessage::AttachDisplay),
        MessageType::PlayerAction => Ok(ClientMessage::PlayerAction(decode_payload::<
            PlayerActionMsg,
        >(data)?)),
        MessageType::AdminStart => Ok(ClientMessage::AdminStart),
        MessageType::AdminReset => Ok(ClientMessage::AdminReset),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    match decode_message_type(data)? {
        MessageType::JoinAccepted => Ok(ServerMessage::JoinAccepted(decode_payload::<
            JoinAcceptedMsg,
        >(data)?)),
        MessageType::Declined => Ok(ServerMessage::Declined(decode_payload::<DeclinedMsg>(
            data,
        )?)),
        MessageType::Event => Ok(ServerMessage::Event(decode_payload::<ServerEvent>(data)?)),
        MessageType::DisplayState => Ok(ServerMessage::DisplayState(Box::new(decode_payload::<
            DisplaySnapshot,
        >(data)?))),
        MessageType::PlayerState => Ok(ServerMessage::PlayerState(decode_payload::<
            ParticipantSnapshot,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
