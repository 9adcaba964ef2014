use serde::Deserialize;

use badcards_core::session::{SessionError, WinCurve};

/// Feature-compatibility cutoff for session chat: sessions created before
/// this Unix-ms timestamp predate the chat feature and must not expose it.
const DEFAULT_CHAT_CUTOFF_MS: i64 = 1_589_260_798_170;

/// Top-level server configuration, loaded from `badcards.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub limits: LimitsConfig,
    pub sessions: SessionsConfig,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            limits: LimitsConfig::default(),
            sessions: SessionsConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// Infrastructure limits (connection caps, buffer sizes).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_ws_connections: usize,
    /// Per-subscriber outbound channel capacity; a subscriber whose channel
    /// is full has snapshots skipped, not queued indefinitely.
    pub subscriber_buffer: usize,
    pub max_sessions: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_ws_connections: 200,
            subscriber_buffer: 64,
            max_sessions: 1000,
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    pub idle_timeout_secs: u64,
    pub idle_check_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 3600,
            idle_check_interval_secs: 60,
        }
    }
}

/// Game-rule configuration data consumed by the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// `(min_players, rounds)` breakpoints; larger lobbies require more wins.
    pub win_curve: Vec<(u32, u32)>,
    pub chat_cutoff_ms: i64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            win_curve: vec![(1, 4), (5, 5), (9, 6), (13, 7)],
            chat_cutoff_ms: DEFAULT_CHAT_CUTOFF_MS,
        }
    }
}

impl GameConfig {
    /// Build the validated win curve from the configured breakpoint table.
    pub fn build_win_curve(&self) -> Result<WinCurve, SessionError> {
        WinCurve::new(self.win_curve.clone())
    }
}

impl ServerConfig {
    /// Validate configuration, exiting on fatal issues.
    pub fn validate(&self) {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            tracing::error!(
                addr = %self.listen_addr,
                "listen_addr is not a valid socket address"
            );
            std::process::exit(1);
        }
        if let Err(e) = self.game.build_win_curve() {
            tracing::error!(error = %e, "game.win_curve is not usable");
            std::process::exit(1);
        }
        if self.limits.max_ws_connections == 0 {
            tracing::error!("limits.max_ws_connections must be > 0");
            std::process::exit(1);
        }
        if self.limits.subscriber_buffer == 0 {
            tracing::error!("limits.subscriber_buffer must be > 0");
            std::process::exit(1);
        }
        if self.limits.max_sessions == 0 {
            tracing::error!("limits.max_sessions must be > 0");
            std::process::exit(1);
        }
        if self.sessions.idle_timeout_secs == 0 {
            tracing::error!("sessions.idle_timeout_secs must be > 0");
            std::process::exit(1);
        }
        if self.sessions.idle_check_interval_secs == 0 {
            tracing::error!("sessions.idle_check_interval_secs must be > 0");
            std::process::exit(1);
        }
    }

    /// Load config from `badcards.toml` if it exists, then apply env var
    /// overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("badcards.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from badcards.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse badcards.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No badcards.toml found, using defaults");
                ServerConfig::default()
            },
        };

        if let Ok(addr) = std::env::var("BADCARDS_LISTEN_ADDR")
            && !addr.is_empty()
        {
            config.listen_addr = addr;
        }
        if let Ok(val) = std::env::var("BADCARDS_MAX_WS_CONNECTIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_ws_connections = n;
        }
        if let Ok(val) = std::env::var("BADCARDS_MAX_SESSIONS")
            && let Ok(n) = val.parse::<usize>()
        {
            config.limits.max_sessions = n;
        }
        if let Ok(val) = std::env::var("BADCARDS_IDLE_TIMEOUT_SECS")
            && let Ok(n) = val.parse::<u64>()
        {
            config.sessions.idle_timeout_secs = n;
        }
        if let Ok(val) = std::env::var("BADCARDS_CHAT_CUTOFF_MS")
            && let Ok(n) = val.parse::<i64>()
        {
            config.game.chat_cutoff_ms = n;
        }

        config
    }
}
