use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;

use badcards_core::net::messages::{
    AddressUpdateMsg, ServerMessage, SessionClosedMsg, SessionSnapshot,
};
use badcards_core::player::{PlayerGuid, PlayerRole};
use badcards_core::session::{
    GameSession, SessionError, WinCurve, generate_session_code,
};
use badcards_core::time::now_ms;

use crate::config::ServerConfig;
use crate::sync::{ConnectionId, SessionSubscribers, encode_frame};

struct SessionEntry {
    session: GameSession,
    subscribers: SessionSubscribers,
    last_activity: Instant,
}

/// Authoritative owner of all live sessions. Every mutation flows through
/// one method here: the command is applied to the session state machine,
/// the state-version is bumped exactly once, and the resulting snapshot is
/// fanned out to subscribers before the store borrow ends, so each
/// subscriber channel observes commits in commit order.
pub struct SessionStore {
    sessions: HashMap<String, SessionEntry>,
    win_curve: WinCurve,
    chat_cutoff_ms: i64,
    subscriber_buffer: usize,
    max_sessions: usize,
}

impl SessionStore {
    pub fn new(
        win_curve: WinCurve,
        chat_cutoff_ms: i64,
        subscriber_buffer: usize,
        max_sessions: usize,
    ) -> Self {
        Self {
            sessions: HashMap::new(),
            win_curve,
            chat_cutoff_ms,
            subscriber_buffer,
            max_sessions,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, SessionError> {
        Ok(Self::new(
            config.game.build_win_curve()?,
            config.game.chat_cutoff_ms,
            config.limits.subscriber_buffer,
            config.limits.max_sessions,
        ))
    }

    /// Create a session with the owner as its first player.
    pub fn create(
        &mut self,
        owner_guid: PlayerGuid,
        nickname: String,
        rounds_override: Option<u32>,
    ) -> Result<SessionSnapshot, SessionError> {
        if self.sessions.len() >= self.max_sessions {
            return Err(SessionError::CommandRejected(
                "session limit reached".to_string(),
            ));
        }
        let id = self.generate_unique_id();
        let session = GameSession::new(
            id.clone(),
            owner_guid,
            nickname,
            now_ms(),
            &self.win_curve,
            rounds_override,
        )?;
        let snapshot = SessionSnapshot::from_session(&session);
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                session,
                subscribers: SessionSubscribers::new(),
                last_activity: Instant::now(),
            },
        );
        tracing::info!(session_id = %id, owner = %owner_guid, "Session created");
        Ok(snapshot)
    }

    /// Current snapshot of a session.
    pub fn snapshot(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        self.sessions
            .get(id)
            .map(|e| SessionSnapshot::from_session(&e.session))
            .ok_or_else(|| SessionError::NotFound(format!("session {id}")))
    }

    /// Add a join request to the session's pending set.
    pub fn request_join(
        &mut self,
        id: &str,
        guid: PlayerGuid,
        nickname: String,
    ) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self.mutate(id, |s, _| {
            s.request_join(guid, nickname, now_ms())?;
            Ok(None)
        })?;
        tracing::info!(session_id = id, %guid, "Join requested");
        Ok(snapshot)
    }

    /// Owner approves a pending entrant, promoting them to player.
    pub fn approve_join(
        &mut self,
        id: &str,
        approver: PlayerGuid,
        target: PlayerGuid,
    ) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self.mutate(id, |s, curve| {
            s.approve_join(approver, target, curve)?;
            Ok(Some((target, PlayerRole::Player)))
        })?;
        tracing::info!(session_id = id, %target, "Join approved");
        Ok(snapshot)
    }

    /// Owner denies a pending entrant.
    pub fn deny_join(
        &mut self,
        id: &str,
        approver: PlayerGuid,
        target: PlayerGuid,
    ) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self.mutate(id, |s, _| {
            s.deny_join(approver, target)?;
            Ok(None)
        })?;
        tracing::info!(session_id = id, %target, "Join denied");
        Ok(snapshot)
    }

    /// Move a player or pending entrant to the spectator set.
    pub fn spectate(&mut self, id: &str, guid: PlayerGuid) -> Result<SessionSnapshot, SessionError> {
        self.mutate(id, |s, curve| {
            s.spectate(guid, curve)?;
            Ok(Some((guid, PlayerRole::Spectator)))
        })
    }

    /// Remove a participant. Owner departure closes the session for
    /// everyone (there is no ownership reassignment path); the returned
    /// `None` distinguishes that from an ordinary leave.
    pub fn leave(
        &mut self,
        id: &str,
        guid: PlayerGuid,
    ) -> Result<Option<SessionSnapshot>, SessionError> {
        let entry = self
            .sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(format!("session {id}")))?;
        if entry.session.owner_guid() == guid {
            self.tear_down(id, "owner left the session");
            return Ok(None);
        }
        let snapshot = self.mutate(id, |s, curve| {
            s.leave(guid, curve)?;
            Ok(None)
        })?;
        tracing::info!(session_id = id, %guid, "Participant left");
        Ok(Some(snapshot))
    }

    /// Record a round win and evaluate the win condition.
    pub fn record_round_win(
        &mut self,
        id: &str,
        chooser: PlayerGuid,
        target: PlayerGuid,
    ) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self.mutate(id, |s, _| {
            s.record_round_win(chooser, target)?;
            Ok(None)
        })?;
        if let Some(winner) = snapshot.winner_guid {
            tracing::info!(session_id = id, %winner, "Session finished");
        }
        Ok(snapshot)
    }

    /// Mark a restart as in flight. Owner-only, `Finished`-only; a second
    /// request while one is uncommitted gets `AlreadyRestarting`.
    pub fn begin_restart(&mut self, id: &str, requester: PlayerGuid) -> Result<(), SessionError> {
        let entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(format!("session {id}")))?;
        entry.session.begin_restart(requester)?;
        entry.last_activity = Instant::now();
        Ok(())
    }

    /// Apply an in-flight restart: fresh round state, one version bump,
    /// one snapshot push.
    pub fn commit_restart(&mut self, id: &str) -> Result<SessionSnapshot, SessionError> {
        let snapshot = self.mutate(id, |s, _| {
            s.commit_restart()?;
            Ok(None)
        })?;
        tracing::info!(session_id = id, "Session restarted");
        Ok(snapshot)
    }

    /// Release an in-flight restart without mutating game state.
    pub fn abort_restart(&mut self, id: &str) {
        if let Some(entry) = self.sessions.get_mut(id) {
            entry.session.abort_restart();
        }
    }

    /// Attach a subscriber. The first frame queued is always a full
    /// snapshot of the current state, so a late joiner or reconnecting
    /// client converges in one round trip.
    pub fn subscribe(
        &mut self,
        id: &str,
        guid: PlayerGuid,
    ) -> Result<(ConnectionId, mpsc::Receiver<Bytes>), SessionError> {
        let buffer = self.subscriber_buffer.max(1);
        let entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(format!("session {id}")))?;
        let (tx, rx) = mpsc::channel(buffer);
        let snapshot = SessionSnapshot::from_session(&entry.session);
        if let Some(frame) = encode_frame(&ServerMessage::Snapshot(Box::new(snapshot))) {
            // Channel is empty and capacity >= 1, so this cannot fail
            let _ = tx.try_send(frame);
        }
        let connection_id = entry.subscribers.attach(guid, tx);
        entry.last_activity = Instant::now();
        tracing::info!(session_id = id, connection_id, %guid, "Subscriber attached");
        Ok((connection_id, rx))
    }

    /// Detach a subscriber; in-flight frames to it are dropped.
    pub fn unsubscribe(&mut self, id: &str, connection_id: ConnectionId) -> bool {
        if let Some(entry) = self.sessions.get_mut(id) {
            let removed = entry.subscribers.detach(connection_id);
            if removed {
                tracing::info!(session_id = id, connection_id, "Subscriber detached");
            }
            removed
        } else {
            false
        }
    }

    /// Derived chat permission for a viewer of the session.
    pub fn chat_eligible(&self, id: &str, guid: PlayerGuid) -> Result<bool, SessionError> {
        self.sessions
            .get(id)
            .map(|e| e.session.chat_eligible(guid, self.chat_cutoff_ms))
            .ok_or_else(|| SessionError::NotFound(format!("session {id}")))
    }

    /// Remove a session, notifying its subscribers so they resubscribe or
    /// recreate. Used for owner departure and for sessions whose internal
    /// state fails validation.
    pub fn tear_down(&mut self, id: &str, reason: &str) -> bool {
        if let Some(mut entry) = self.sessions.remove(id) {
            let msg = ServerMessage::SessionClosed(SessionClosedMsg {
                session_id: id.to_string(),
                reason: reason.to_string(),
            });
            if let Some(frame) = encode_frame(&msg) {
                entry.subscribers.push(id, &frame);
            }
            tracing::info!(session_id = id, reason, "Session torn down");
            true
        } else {
            false
        }
    }

    /// Evict sessions with no subscribers and no recent mutation.
    /// Returns the number removed.
    pub fn cleanup_idle_sessions(&mut self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|id, entry| {
            let keep = !entry.subscribers.is_empty()
                || now.duration_since(entry.last_activity) < max_idle;
            if !keep {
                tracing::info!(session_id = %id, "Evicting idle session");
            }
            keep
        });
        before - self.sessions.len()
    }

    /// (live sessions, total players) for health reporting.
    pub fn stats(&self) -> (usize, usize) {
        let players = self
            .sessions
            .values()
            .map(|e| e.session.players().len())
            .sum();
        (self.sessions.len(), players)
    }

    /// Apply one command to one session. On success the version is bumped
    /// exactly once and the new snapshot is pushed to every subscriber
    /// (plus a targeted address-update when the command changed a guid's
    /// role). A session whose state fails validation after a command is
    /// torn down rather than published.
    fn mutate<F>(&mut self, id: &str, f: F) -> Result<SessionSnapshot, SessionError>
    where
        F: FnOnce(
            &mut GameSession,
            &WinCurve,
        ) -> Result<Option<(PlayerGuid, PlayerRole)>, SessionError>,
    {
        let entry = self
            .sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(format!("session {id}")))?;
        let role_change = f(&mut entry.session, &self.win_curve)?;

        if let Err(e) = entry.session.check_invariants() {
            tracing::error!(session_id = id, error = %e, "Session state corrupted");
            self.tear_down(id, "internal state corrupted");
            return Err(SessionError::CommandRejected(
                "session state corrupted; session closed".to_string(),
            ));
        }

        entry.session.bump_version();
        entry.last_activity = Instant::now();
        let snapshot = SessionSnapshot::from_session(&entry.session);

        if let Some(frame) = encode_frame(&ServerMessage::Snapshot(Box::new(snapshot.clone()))) {
            entry.subscribers.push(id, &frame);
        }
        if let Some((guid, role)) = role_change {
            let msg = ServerMessage::AddressUpdate(AddressUpdateMsg {
                session_id: id.to_string(),
                guid,
                role,
            });
            if let Some(frame) = encode_frame(&msg) {
                entry.subscribers.send_to_guid(id, guid, &frame);
            }
        }
        Ok(snapshot)
    }

    fn generate_unique_id(&self) -> String {
        loop {
            let id = generate_session_code();
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }
}
