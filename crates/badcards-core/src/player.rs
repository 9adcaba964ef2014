use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable per-user identity, issued by the external identity service.
/// The engine treats it as opaque and already validated.
pub type PlayerGuid = Uuid;

/// A participant in a game session. The same record type is used for
/// players, spectators, and pending entrants; the role is derived from
/// which session set holds the guid, never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub guid: PlayerGuid,
    pub nickname: String,
    pub wins: u32,
    pub joined_at_ms: i64,
}

impl Player {
    pub fn new(guid: PlayerGuid, nickname: String, joined_at_ms: i64) -> Self {
        Self {
            guid,
            nickname,
            wins: 0,
            joined_at_ms,
        }
    }

    /// Nickname with legacy percent-escapes (`%XX`, `%uXXXX`) decoded for
    /// display. Stored nicknames arrive escaped from the web client.
    pub fn display_nickname(&self) -> String {
        unescape(&self.nickname)
    }
}

/// Membership role within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerRole {
    Player,
    Spectator,
    Pending,
}

/// Decode `%XX` and `%uXXXX` escape sequences. Malformed sequences are
/// passed through verbatim.
fn unescape(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '%' {
            if i + 5 < chars.len() && chars[i + 1] == 'u' {
                let hex: String = chars[i + 2..i + 6].iter().collect();
                if let Ok(code) = u32::from_str_radix(&hex, 16)
                    && let Some(c) = char::from_u32(code)
                {
                    out.push(c);
                    i += 6;
                    continue;
                }
            } else if i + 2 < chars.len() {
                let hex: String = chars[i + 1..i + 3].iter().collect();
                if let Ok(code) = u32::from_str_radix(&hex, 16)
                    && let Some(c) = char::from_u32(code)
                {
                    out.push(c);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_player_has_zero_wins() {
        let p = Player::new(Uuid::new_v4(), "Alice".to_string(), 1_600_000_000_000);
        assert_eq!(p.wins, 0);
    }

    #[test]
    fn display_nickname_decodes_percent_escapes() {
        let p = Player::new(Uuid::new_v4(), "Bad%20Pun%21".to_string(), 0);
        assert_eq!(p.display_nickname(), "Bad Pun!");
    }

    #[test]
    fn display_nickname_decodes_unicode_escapes() {
        let p = Player::new(Uuid::new_v4(), "%u00C9mile".to_string(), 0);
        assert_eq!(p.display_nickname(), "Émile");
    }

    #[test]
    fn display_nickname_passes_through_malformed_escapes() {
        let p = Player::new(Uuid::new_v4(), "100%".to_string(), 0);
        assert_eq!(p.display_nickname(), "100%");
        let p = Player::new(Uuid::new_v4(), "%ZZoops".to_string(), 0);
        assert_eq!(p.display_nickname(), "%ZZoops");
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&PlayerRole::Pending).unwrap();
        assert_eq!(json, "\"pending\"");
    }
}
