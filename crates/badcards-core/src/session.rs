use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerGuid, PlayerRole};

/// Coarse session lifecycle stage. `Finished` is one-way until a restart
/// commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Active,
    Finished,
}

/// Recoverable command rejection reasons. All of these are reported
/// synchronously to the caller; none affect other sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    NotFound(String),
    Unauthorized(String),
    AlreadyMember,
    NotPending,
    CommandRejected(String),
    AlreadyRestarting,
    InvalidConfig(String),
}

impl SessionError {
    /// Stable machine-readable discriminator, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::AlreadyMember => "already_member",
            Self::NotPending => "not_pending",
            Self::CommandRejected(_) => "command_rejected",
            Self::AlreadyRestarting => "already_restarting",
            Self::InvalidConfig(_) => "invalid_config",
        }
    }
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "not found: {what}"),
            Self::Unauthorized(what) => write!(f, "unauthorized: {what}"),
            Self::AlreadyMember => write!(f, "already a member of this session"),
            Self::NotPending => write!(f, "no pending join request for that player"),
            Self::CommandRejected(why) => write!(f, "command rejected: {why}"),
            Self::AlreadyRestarting => write!(f, "a restart is already in progress"),
            Self::InvalidConfig(why) => write!(f, "invalid configuration: {why}"),
        }
    }
}

impl std::error::Error for SessionError {}

/// Player-count → rounds-to-win breakpoint table. Monotone: larger lobbies
/// require at least as many wins. The curve itself is configuration data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinCurve {
    points: Vec<(u32, u32)>,
}

impl WinCurve {
    /// Validate and build a curve from `(min_players, rounds)` breakpoints.
    pub fn new(points: Vec<(u32, u32)>) -> Result<Self, SessionError> {
        if points.is_empty() {
            return Err(SessionError::InvalidConfig(
                "win curve must have at least one breakpoint".to_string(),
            ));
        }
        let mut prev: Option<(u32, u32)> = None;
        for &(min_players, rounds) in &points {
            if min_players == 0 {
                return Err(SessionError::InvalidConfig(
                    "win curve min_players must be >= 1".to_string(),
                ));
            }
            if rounds == 0 {
                return Err(SessionError::InvalidConfig(
                    "win curve rounds must be positive".to_string(),
                ));
            }
            if let Some((prev_min, prev_rounds)) = prev {
                if min_players <= prev_min {
                    return Err(SessionError::InvalidConfig(
                        "win curve breakpoints must have increasing min_players".to_string(),
                    ));
                }
                if rounds < prev_rounds {
                    return Err(SessionError::InvalidConfig(
                        "win curve rounds must not decrease".to_string(),
                    ));
                }
            }
            prev = Some((min_players, rounds));
        }
        Ok(Self { points })
    }

    /// Rounds required to win at the given player count: the last breakpoint
    /// at or below the count (the first breakpoint for tiny lobbies).
    pub fn threshold(&self, player_count: usize) -> u32 {
        let count = player_count as u32;
        self.points
            .iter()
            .rev()
            .find(|(min_players, _)| *min_players <= count)
            .map(|(_, rounds)| *rounds)
            .unwrap_or(self.points[0].1)
    }
}

impl Default for WinCurve {
    fn default() -> Self {
        Self {
            points: vec![(1, 4), (5, 5), (9, 6), (13, 7)],
        }
    }
}

const SESSION_CODE_LETTERS: usize = 4;
const SESSION_CODE_DIGITS: usize = 4;

/// Generate a session code of the form `ABCD-1234`.
pub fn generate_session_code() -> String {
    let mut rng = rand::rng();
    let mut code = String::with_capacity(SESSION_CODE_LETTERS + 1 + SESSION_CODE_DIGITS);
    for _ in 0..SESSION_CODE_LETTERS {
        code.push(rng.random_range(b'A'..=b'Z') as char);
    }
    code.push('-');
    for _ in 0..SESSION_CODE_DIGITS {
        code.push(rng.random_range(b'0'..=b'9') as char);
    }
    code
}

/// Check the `ABCD-1234` session code format.
pub fn is_valid_session_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    if bytes.len() != SESSION_CODE_LETTERS + 1 + SESSION_CODE_DIGITS {
        return false;
    }
    bytes[..SESSION_CODE_LETTERS]
        .iter()
        .all(|b| b.is_ascii_uppercase())
        && bytes[SESSION_CODE_LETTERS] == b'-'
        && bytes[SESSION_CODE_LETTERS + 1..]
            .iter()
            .all(|b| b.is_ascii_digit())
}

/// One game session: membership role sets, round/win state, and the
/// monotonic state-version counter.
///
/// All fields are private; mutation happens only through the command
/// methods below, so role-set disjointness and the owner-membership
/// invariant cannot be bypassed from outside. Version bumps are owned by
/// the session store, which calls [`GameSession::bump_version`] exactly
/// once per committed command.
#[derive(Debug, Clone)]
pub struct GameSession {
    id: String,
    created_at_ms: i64,
    owner_guid: PlayerGuid,
    players: Vec<Player>,
    spectators: Vec<Player>,
    pending: Vec<Player>,
    /// Effective rounds-to-win: the fixed override when set, otherwise
    /// derived from the curve at the current player count.
    rounds_to_win: u32,
    rounds_override: Option<u32>,
    state_version: u64,
    phase: SessionPhase,
    winner_guid: Option<PlayerGuid>,
    restart_in_flight: bool,
}

impl GameSession {
    /// Create a session with the owner seeded as its first player.
    /// `rounds_override` of zero is the one malformed win-threshold
    /// configuration a caller can express, and is rejected here.
    pub fn new(
        id: String,
        owner_guid: PlayerGuid,
        owner_nickname: String,
        created_at_ms: i64,
        curve: &WinCurve,
        rounds_override: Option<u32>,
    ) -> Result<Self, SessionError> {
        if rounds_override == Some(0) {
            return Err(SessionError::InvalidConfig(
                "rounds to win must be positive".to_string(),
            ));
        }
        let owner = Player::new(owner_guid, owner_nickname, created_at_ms);
        let rounds_to_win = rounds_override.unwrap_or_else(|| curve.threshold(1));
        Ok(Self {
            id,
            created_at_ms,
            owner_guid,
            players: vec![owner],
            spectators: Vec::new(),
            pending: Vec::new(),
            rounds_to_win,
            rounds_override,
            state_version: 1,
            phase: SessionPhase::Active,
            winner_guid: None,
            restart_in_flight: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at_ms
    }

    pub fn owner_guid(&self) -> PlayerGuid {
        self.owner_guid
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn spectators(&self) -> &[Player] {
        &self.spectators
    }

    pub fn pending(&self) -> &[Player] {
        &self.pending
    }

    pub fn rounds_to_win(&self) -> u32 {
        self.rounds_to_win
    }

    pub fn state_version(&self) -> u64 {
        self.state_version
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn winner_guid(&self) -> Option<PlayerGuid> {
        self.winner_guid
    }

    pub fn restart_in_flight(&self) -> bool {
        self.restart_in_flight
    }

    /// Which role set currently holds the guid, if any.
    pub fn role_of(&self, guid: PlayerGuid) -> Option<PlayerRole> {
        if self.players.iter().any(|p| p.guid == guid) {
            Some(PlayerRole::Player)
        } else if self.spectators.iter().any(|p| p.guid == guid) {
            Some(PlayerRole::Spectator)
        } else if self.pending.iter().any(|p| p.guid == guid) {
            Some(PlayerRole::Pending)
        } else {
            None
        }
    }

    /// Derived permission: chat is open to current players and spectators
    /// of sessions created at or after the compatibility cutoff.
    pub fn chat_eligible(&self, guid: PlayerGuid, cutoff_ms: i64) -> bool {
        matches!(
            self.role_of(guid),
            Some(PlayerRole::Player | PlayerRole::Spectator)
        ) && self.created_at_ms >= cutoff_ms
    }

    /// Increment the state-version counter. Called by the store exactly
    /// once per committed mutation; returns the new version.
    pub fn bump_version(&mut self) -> u64 {
        self.state_version += 1;
        self.state_version
    }

    /// Add a join request to the pending set.
    pub fn request_join(
        &mut self,
        guid: PlayerGuid,
        nickname: String,
        now_ms: i64,
    ) -> Result<(), SessionError> {
        if self.role_of(guid).is_some() {
            return Err(SessionError::AlreadyMember);
        }
        self.pending.push(Player::new(guid, nickname, now_ms));
        Ok(())
    }

    /// Owner-gated promotion of a pending entrant to player.
    pub fn approve_join(
        &mut self,
        approver: PlayerGuid,
        target: PlayerGuid,
        curve: &WinCurve,
    ) -> Result<(), SessionError> {
        self.require_owner(approver, "only the owner may approve joins")?;
        let pos = self
            .pending
            .iter()
            .position(|p| p.guid == target)
            .ok_or(SessionError::NotPending)?;
        let player = self.pending.remove(pos);
        self.players.push(player);
        self.recompute_rounds_to_win(curve);
        Ok(())
    }

    /// Owner-gated removal of a pending join request.
    pub fn deny_join(
        &mut self,
        approver: PlayerGuid,
        target: PlayerGuid,
    ) -> Result<(), SessionError> {
        self.require_owner(approver, "only the owner may deny joins")?;
        let pos = self
            .pending
            .iter()
            .position(|p| p.guid == target)
            .ok_or(SessionError::NotPending)?;
        self.pending.remove(pos);
        Ok(())
    }

    /// Voluntarily move a player or pending entrant to the spectator set.
    /// The owner can never spectate: there is no ownership reassignment
    /// path, so the owner stops owning only by leaving.
    pub fn spectate(&mut self, guid: PlayerGuid, curve: &WinCurve) -> Result<(), SessionError> {
        if guid == self.owner_guid {
            return Err(SessionError::CommandRejected(
                "the owner cannot spectate their own session".to_string(),
            ));
        }
        if self.spectators.iter().any(|p| p.guid == guid) {
            return Err(SessionError::AlreadyMember);
        }
        if let Some(pos) = self.players.iter().position(|p| p.guid == guid) {
            let player = self.players.remove(pos);
            self.spectators.push(player);
            self.recompute_rounds_to_win(curve);
            Ok(())
        } else if let Some(pos) = self.pending.iter().position(|p| p.guid == guid) {
            let player = self.pending.remove(pos);
            self.spectators.push(player);
            Ok(())
        } else {
            Err(SessionError::NotFound(format!("player {guid}")))
        }
    }

    /// Remove the guid from whichever role set holds it. The caller is
    /// responsible for the owner case (owner departure tears the session
    /// down); this method rejects it.
    pub fn leave(&mut self, guid: PlayerGuid, curve: &WinCurve) -> Result<(), SessionError> {
        if guid == self.owner_guid {
            return Err(SessionError::CommandRejected(
                "owner departure closes the session".to_string(),
            ));
        }
        match self.role_of(guid) {
            Some(PlayerRole::Player) => {
                self.players.retain(|p| p.guid != guid);
                self.recompute_rounds_to_win(curve);
                Ok(())
            },
            Some(PlayerRole::Spectator) => {
                self.spectators.retain(|p| p.guid != guid);
                Ok(())
            },
            Some(PlayerRole::Pending) => {
                self.pending.retain(|p| p.guid != guid);
                Ok(())
            },
            None => Err(SessionError::NotFound(format!("player {guid}"))),
        }
    }

    /// Record a round win for `target`, then evaluate the win condition.
    /// The first player in insertion order at or past the threshold becomes
    /// the winner and flips the phase to `Finished` exactly once.
    pub fn record_round_win(
        &mut self,
        chooser: PlayerGuid,
        target: PlayerGuid,
    ) -> Result<(), SessionError> {
        if self.phase == SessionPhase::Finished {
            return Err(SessionError::CommandRejected(
                "session is finished; no further rounds may be scored".to_string(),
            ));
        }
        if !self.players.iter().any(|p| p.guid == chooser) {
            return Err(SessionError::Unauthorized(
                "only a current player may score a round".to_string(),
            ));
        }
        let target_player = self
            .players
            .iter_mut()
            .find(|p| p.guid == target)
            .ok_or_else(|| SessionError::NotFound(format!("player {target}")))?;
        target_player.wins += 1;

        if let Some(winner) = self.evaluate_winner() {
            self.winner_guid = Some(winner);
            self.phase = SessionPhase::Finished;
        }
        Ok(())
    }

    /// First player in insertion order whose win count meets the threshold.
    /// Deterministic and stable across repeated evaluation of the same state.
    pub fn evaluate_winner(&self) -> Option<PlayerGuid> {
        self.players
            .iter()
            .find(|p| p.wins >= self.rounds_to_win)
            .map(|p| p.guid)
    }

    /// Mark a restart as in flight. Owner-only, `Finished`-only, and
    /// at-most-one at a time: a second request while one is uncommitted is
    /// rejected rather than merged.
    pub fn begin_restart(&mut self, requester: PlayerGuid) -> Result<(), SessionError> {
        self.require_owner(requester, "only the owner may restart")?;
        if self.phase != SessionPhase::Finished {
            return Err(SessionError::CommandRejected(
                "restart is only available once the session is finished".to_string(),
            ));
        }
        if self.restart_in_flight {
            return Err(SessionError::AlreadyRestarting);
        }
        self.restart_in_flight = true;
        Ok(())
    }

    /// Apply the restart: zero win counts, clear the winner, return to
    /// `Active`, and release the in-flight marker.
    pub fn commit_restart(&mut self) -> Result<(), SessionError> {
        if !self.restart_in_flight {
            return Err(SessionError::CommandRejected(
                "no restart in flight".to_string(),
            ));
        }
        for p in &mut self.players {
            p.wins = 0;
        }
        self.winner_guid = None;
        self.phase = SessionPhase::Active;
        self.restart_in_flight = false;
        Ok(())
    }

    /// Release the in-flight marker without touching game state. Used when
    /// the caller fails between begin and commit.
    pub fn abort_restart(&mut self) {
        self.restart_in_flight = false;
    }

    /// Structural sanity check: each guid in exactly one role set, owner
    /// resolving to a player entry. A violation means the session state is
    /// corrupt and the session must be torn down.
    pub fn check_invariants(&self) -> Result<(), SessionError> {
        let mut seen = std::collections::HashSet::new();
        for p in self
            .players
            .iter()
            .chain(self.spectators.iter())
            .chain(self.pending.iter())
        {
            if !seen.insert(p.guid) {
                return Err(SessionError::CommandRejected(format!(
                    "guid {} appears in more than one role set",
                    p.guid
                )));
            }
        }
        if !self.players.iter().any(|p| p.guid == self.owner_guid) {
            return Err(SessionError::CommandRejected(
                "owner does not resolve to a player".to_string(),
            ));
        }
        Ok(())
    }

    fn require_owner(&self, guid: PlayerGuid, action: &str) -> Result<(), SessionError> {
        if guid != self.owner_guid {
            return Err(SessionError::Unauthorized(action.to_string()));
        }
        Ok(())
    }

    fn recompute_rounds_to_win(&mut self, curve: &WinCurve) {
        if self.rounds_override.is_none() {
            self.rounds_to_win = curve.threshold(self.players.len());
        }
    }
}
