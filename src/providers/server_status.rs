// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Live game server status (mcstatus.io Java edition API).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::ServerStatusSettings;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum StatusSourceError {
    #[error("status request failed: {0}")]
    Request(String),

    #[error("status response was invalid: {0}")]
    InvalidResponse(String),
}

/// A player currently connected to the server.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OnlinePlayer {
    pub uuid: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlayerCounts {
    pub online: u32,
    pub max: u32,
    /// Sample of connected players. Servers may hide it.
    pub list: Vec<OnlinePlayer>,
}

/// Status snapshot returned by `GET /v1/server/status`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ServerStatus {
    pub online: bool,
    pub players: PlayerCounts,
    pub version: String,
    /// Message of the day without formatting codes.
    pub motd: String,
    /// Base64 data URI of the server icon.
    pub icon: Option<String>,
}

impl ServerStatus {
    /// Reported when the server cannot be reached.
    pub fn offline() -> Self {
        Self {
            online: false,
            players: PlayerCounts {
                online: 0,
                max: 0,
                list: Vec::new(),
            },
            version: "Unknown".to_string(),
            motd: String::new(),
            icon: None,
        }
    }
}

#[async_trait]
pub trait ServerStatusSource: Send + Sync {
    async fn fetch_status(&self) -> Result<ServerStatus, StatusSourceError>;
}

// =============================================================================
// mcstatus.io
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct StatusBody {
    #[serde(default)]
    online: bool,
    #[serde(default)]
    players: Option<PlayersBody>,
    #[serde(default)]
    version: Option<VersionBody>,
    #[serde(default)]
    motd: Option<MotdBody>,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayersBody {
    #[serde(default)]
    online: u32,
    #[serde(default)]
    max: u32,
    #[serde(default)]
    list: Vec<PlayerBody>,
}

#[derive(Debug, Deserialize)]
struct PlayerBody {
    #[serde(default)]
    uuid: String,
    #[serde(default)]
    name_clean: Option<String>,
    #[serde(default)]
    name_raw: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionBody {
    #[serde(default)]
    name_clean: Option<String>,
    #[serde(default)]
    name_raw: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MotdBody {
    #[serde(default)]
    clean: Option<String>,
    #[serde(default)]
    raw: Option<String>,
}

/// First non-empty candidate.
fn first_filled(candidates: [Option<String>; 2]) -> Option<String> {
    candidates.into_iter().flatten().find(|s| !s.is_empty())
}

impl From<StatusBody> for ServerStatus {
    fn from(body: StatusBody) -> Self {
        let players = body.players.unwrap_or_default();
        let version = body.version.unwrap_or_default();
        let motd = body.motd.unwrap_or_default();

        Self {
            online: body.online,
            players: PlayerCounts {
                online: players.online,
                max: players.max,
                list: players
                    .list
                    .into_iter()
                    .map(|p| OnlinePlayer {
                        uuid: p.uuid,
                        name: first_filled([p.name_clean, p.name_raw]).unwrap_or_default(),
                    })
                    .collect(),
            },
            version: first_filled([version.name_clean, version.name_raw])
                .unwrap_or_else(|| "Unknown".to_string()),
            motd: first_filled([motd.clean, motd.raw]).unwrap_or_default(),
            icon: body.icon.filter(|s| !s.is_empty()),
        }
    }
}

/// Client for `GET {base}/v2/status/java/{address}`.
#[derive(Debug, Clone)]
pub struct McStatusClient {
    http: Client,
    url: String,
}

impl McStatusClient {
    pub fn new(settings: &ServerStatusSettings) -> Result<Self, StatusSourceError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StatusSourceError::Request(format!("failed to build HTTP client: {e}")))?;
        let url = format!(
            "{}/v2/status/java/{}",
            settings.api_base_url.trim_end_matches('/'),
            settings.server_address
        );
        Ok(Self { http, url })
    }
}

#[async_trait]
impl ServerStatusSource for McStatusClient {
    async fn fetch_status(&self) -> Result<ServerStatus, StatusSourceError> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| StatusSourceError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StatusSourceError::Request(format!(
                "status API returned {}",
                response.status()
            )));
        }

        let body: StatusBody = response
            .json()
            .await
            .map_err(|e| StatusSourceError::InvalidResponse(e.to_string()))?;
        Ok(body.into())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Returns a fixed status, or fails when `status` is `None`.
    #[derive(Default, Clone)]
    pub(crate) struct FakeStatusSource {
        pub status: Option<ServerStatus>,
        pub calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ServerStatusSource for FakeStatusSource {
        async fn fetch_status(&self) -> Result<ServerStatus, StatusSourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.status
                .clone()
                .ok_or_else(|| StatusSourceError::Request("connection refused".to_string()))
        }
    }

    pub(crate) fn online_status() -> ServerStatus {
        ServerStatus {
            online: true,
            players: PlayerCounts {
                online: 2,
                max: 20,
                list: vec![OnlinePlayer {
                    uuid: "069a79f4-44e9-4726-a5be-fca90e38aaf5".to_string(),
                    name: "builder_bob".to_string(),
                }],
            },
            version: "Paper 1.21.4".to_string(),
            motd: "Welcome builders".to_string(),
            icon: None,
        }
    }
}
