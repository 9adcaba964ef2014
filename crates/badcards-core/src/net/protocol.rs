use serde::Serialize;

use super::messages::{
    AddressUpdateMsg, ClientMessage, MessageType, ServerMessage, SessionClosedMsg, SessionSnapshot,
    SubscribeErrorMsg, SubscribeMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

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
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
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

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::Subscribe(m) => encode_message(MessageType::Subscribe, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::Snapshot(m) => encode_message(MessageType::Snapshot, m),
        ServerMessage::AddressUpdate(m) => encode_message(MessageType::AddressUpdate, m),
        ServerMessage::SessionClosed(m) => encode_message(MessageType::SessionClosed, m),
        ServerMessage::SubscribeError(m) => encode_message(MessageType::SubscribeError, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    match data[0] {
        0x01 => Ok(MessageType::Subscribe),
        0x10 => Ok(MessageType::Snapshot),
        0x11 => Ok(MessageType::AddressUpdate),
        0x12 => Ok(MessageType::SessionClosed),
        0x13 => Ok(MessageType::SubscribeError),
        b => Err(ProtocolError::UnknownMessageType(b)),
    }
}

fn decode_payload<'a, T: serde::Deserialize<'a>>(data: &'a [u8]) -> Result<T, ProtocolError> {
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode a full `ClientMessage` from wire data.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }
    match decode_message_type(data)? {
        MessageType::Subscribe => {
            let m: SubscribeMsg = decode_payload(data)?;
            Ok(ClientMessage::Subscribe(m))
        },
        other => Err(ProtocolError::UnknownMessageType(other as u8)),
    }
}

/// Decode a full `ServerMessage` from wire data.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }
    match decode_message_type(data)? {
        MessageType::Snapshot => {
            let m: SessionSnapshot = decode_payload(data)?;
            Ok(ServerMessage::Snapshot(Box::new(m)))
        },
        MessageType::AddressUpdate => {
            let m: AddressUpdateMsg = decode_payload(data)?;
            Ok(ServerMessage::AddressUpdate(m))
        },
        MessageType::SessionClosed => {
            let m: SessionClosedMsg = decode_payload(data)?;
            Ok(ServerMessage::SessionClosed(m))
        },
        MessageType::SubscribeError => {
            let m: SubscribeErrorMsg = decode_payload(data)?;
            Ok(ServerMessage::SubscribeError(m))
        },
        other => Err(ProtocolError::UnknownMessageType(other as u8)),
    }
}
