// Session configuration. Loaded from an optional JSON file, then overridden by CLI flags.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// ICE server entry
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub id: String,
    pub r#type: String, // 'stun' or 'turn'
    pub url: String,
    pub username: Option<String>,
    pub credential: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SessionConfig {
    pub ice_servers: Vec<ServerConfig>,
    /// `None` waits for gathering indefinitely
    pub gathering_timeout_secs: Option<u64>,
    /// `None` waits for the remote answer indefinitely
    pub answer_timeout_secs: Option<u64>,
    pub trickle: bool,
    /// Pause between one trickle iteration settling and the next offer; 0 re-offers at once
    pub trickle_interval_ms: u64,
    /// Label of the negotiated data channel. Without one (and without capture
    /// tracks) the offer has no media sections and nothing is gathered.
    pub data_channel_label: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            gathering_timeout_secs: Some(10),
            answer_timeout_secs: Some(120),
            trickle: true,
            trickle_interval_ms: 0,
            data_channel_label: Some("peerlink".into()),
        }
    }
}

pub fn default_ice_servers() -> Vec<ServerConfig> {
    vec![
        ServerConfig {
            id: "default-stun".into(),
            r#type: "stun".into(),
            url: "stun:stun.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
        ServerConfig {
            id: "default-stun-1".into(),
            r#type: "stun".into(),
            url: "stun:stun1.l.google.com:19302".into(),
            username: None,
            credential: None,
        },
    ]
}

impl SessionConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: SessionConfig =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for server in &self.ice_servers {
            if server.url.trim().is_empty() {
                return Err(ConfigError::EmptyUrl(server.id.clone()));
            }
            if server.r#type == "turn" && (server.username.is_none() || server.credential.is_none())
            {
                return Err(ConfigError::MissingTurnCredentials(server.id.clone()));
            }
        }
        Ok(())
    }

    pub fn gathering_timeout(&self) -> Option<Duration> {
        self.gathering_timeout_secs.map(Duration::from_secs)
    }

    pub fn answer_timeout(&self) -> Option<Duration> {
        self.answer_timeout_secs.map(Duration::from_secs)
    }

    pub fn trickle_interval(&self) -> Duration {
        Duration::from_millis(self.trickle_interval_ms)
    }
}
