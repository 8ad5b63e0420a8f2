use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}")]
    Invalid { var: &'static str, value: String },
}

/// Knobs of one room session's lifecycle and buffering.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Grace period before an empty room session is destroyed.
    pub drain_grace: Duration,
    /// How stale the cached role map may get before a mutating action
    /// forces a re-fetch.
    pub role_refresh: Duration,
    /// Capacity of a room task's inbox.
    pub inbox_buffer: usize,
    /// Capacity of each participant's outbound buffer; overflow drops the
    /// participant rather than stalling the room.
    pub outbound_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            drain_grace: Duration::from_secs(30),
            role_refresh: Duration::from_secs(10),
            inbox_buffer: 64,
            outbound_buffer: 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub rooms_file: Option<PathBuf>,
    pub session: SessionConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = SessionConfig::default();
        Ok(Self {
            bind_addr: std::env::var("WHITEBOARD_BIND").unwrap_or_else(|_| "127.0.0.1:8080".into()),
            rooms_file: std::env::var("WHITEBOARD_ROOMS_FILE").ok().map(PathBuf::from),
            session: SessionConfig {
                drain_grace: Duration::from_secs(parse_env(
                    "WHITEBOARD_DRAIN_GRACE_SECS",
                    defaults.drain_grace.as_secs(),
                )?),
                role_refresh: Duration::from_secs(parse_env(
                    "WHITEBOARD_ROLE_REFRESH_SECS",
                    defaults.role_refresh.as_secs(),
                )?),
                inbox_buffer: parse_env("WHITEBOARD_INBOX_BUFFER", defaults.inbox_buffer)?,
                outbound_buffer: parse_env("WHITEBOARD_OUTBOUND_BUFFER", defaults.outbound_buffer)?,
            },
        })
    }
}

fn parse_env<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        Err(_) => Ok(default),
    }
}
