use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerGuid, PlayerRole};
use crate::session::{GameSession, SessionPhase};

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    Subscribe = 0x01,

    // Server -> Client
    Snapshot = 0x10,
    AddressUpdate = 0x11,
    SessionClosed = 0x12,
    SubscribeError = 0x13,
}

/// Subscribe to a session's snapshot stream. The guid identifies the viewer
/// for targeted address-update signalling; it does not have to be a member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeMsg {
    pub session_id: String,
    pub guid: PlayerGuid,
    pub protocol_version: u8,
}

/// Full authoritative view of one session, pushed to every subscriber on
/// each committed mutation and to a new subscriber immediately on attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub state_version: u64,
    pub phase: SessionPhase,
    pub owner_guid: PlayerGuid,
    pub created_at_ms: i64,
    pub rounds_to_win: u32,
    pub winner_guid: Option<PlayerGuid>,
    pub players: Vec<Player>,
    pub spectators: Vec<Player>,
    pub pending: Vec<Player>,
}

impl SessionSnapshot {
    pub fn from_session(session: &GameSession) -> Self {
        Self {
            session_id: session.id().to_string(),
            state_version: session.state_version(),
            phase: session.phase(),
            owner_guid: session.owner_guid(),
            created_at_ms: session.created_at_ms(),
            rounds_to_win: session.rounds_to_win(),
            winner_guid: session.winner_guid(),
            players: session.players().to_vec(),
            spectators: session.spectators().to_vec(),
            pending: session.pending().to_vec(),
        }
    }
}

/// Targeted signal that the viewer's addressable reference to the session
/// changed (typically a role transition such as pending → player).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressUpdateMsg {
    pub session_id: String,
    pub guid: PlayerGuid,
    pub role: PlayerRole,
}

/// The session no longer exists; subscribers must resubscribe or recreate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClosedMsg {
    pub session_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeErrorMsg {
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Subscribe(SubscribeMsg),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Snapshot(Box<SessionSnapshot>),
    AddressUpdate(AddressUpdateMsg),
    SessionClosed(SessionClosedMsg),
    SubscribeError(SubscribeErrorMsg),
}
