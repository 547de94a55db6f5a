// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup by [`AppConfig::from_env`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Root directory for the database and objects | `./data` |
//! | `AUTH_JWKS_URL` | Identity provider JWKS endpoint | Required unless built with `dev` |
//! | `AUTH_ISSUER` | Expected JWT issuer claim | Optional |
//! | `AUTH_AUDIENCE` | Expected JWT audience claim | Optional |
//! | `ADMIN_SUBJECTS` | Comma-separated subjects always treated as admin | Empty |
//! | `STRIPE_SECRET_KEY` | Gateway API key | Unset = checkout answers 503 |
//! | `STRIPE_WEBHOOK_SECRET` | Notification signing secret | Unset = webhook answers 503 |
//! | `STRIPE_API_BASE_URL` | Gateway API base | `https://api.stripe.com` |
//! | `STRIPE_PRICE_ID_SERVER_ACCESS` | Price of the access line item | Inline price |
//! | `ACCESS_PRICE_AMOUNT` | Inline price in minor units | `1500` |
//! | `ACCESS_PRICE_CURRENCY` | Inline price currency | `usd` |
//! | `PUBLIC_ORIGIN` | Fallback origin for checkout redirects | `http://localhost:3000` |
//! | `OBJECT_PUBLIC_BASE_URL` | Public URL prefix for stored objects | `http://localhost:8080/objects` |
//! | `DISCORD_BOT_TOKEN` | Chat import bot token | Unset = import answers 503 |
//! | `DISCORD_SCREENSHOTS_CHANNEL_ID` | Channel to import from | Required with the token |
//! | `GAME_SERVER_ADDRESS` | `host:port` of the game server shown on the status page | `37.10.123.182:54783` |
//! | `SERVER_STATUS_API_BASE_URL` | Status lookup API base | `https://api.mcstatus.io` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Environment variable name for the data directory.
///
/// Holds `access.redb` and the `objects/` tree.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const AUTH_JWKS_URL_ENV: &str = "AUTH_JWKS_URL";
pub const AUTH_ISSUER_ENV: &str = "AUTH_ISSUER";
pub const AUTH_AUDIENCE_ENV: &str = "AUTH_AUDIENCE";
pub const ADMIN_SUBJECTS_ENV: &str = "ADMIN_SUBJECTS";

pub const STRIPE_SECRET_KEY_ENV: &str = "STRIPE_SECRET_KEY";
pub const STRIPE_WEBHOOK_SECRET_ENV: &str = "STRIPE_WEBHOOK_SECRET";
pub const STRIPE_API_BASE_URL_ENV: &str = "STRIPE_API_BASE_URL";
pub const STRIPE_PRICE_ID_ENV: &str = "STRIPE_PRICE_ID_SERVER_ACCESS";
pub const ACCESS_PRICE_AMOUNT_ENV: &str = "ACCESS_PRICE_AMOUNT";
pub const ACCESS_PRICE_CURRENCY_ENV: &str = "ACCESS_PRICE_CURRENCY";
pub const PUBLIC_ORIGIN_ENV: &str = "PUBLIC_ORIGIN";

pub const OBJECT_PUBLIC_BASE_URL_ENV: &str = "OBJECT_PUBLIC_BASE_URL";

pub const DISCORD_BOT_TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";
pub const DISCORD_CHANNEL_ID_ENV: &str = "DISCORD_SCREENSHOTS_CHANNEL_ID";
pub const DISCORD_API_BASE_URL_ENV: &str = "DISCORD_API_BASE_URL";

pub const GAME_SERVER_ADDRESS_ENV: &str = "GAME_SERVER_ADDRESS";
pub const SERVER_STATUS_API_BASE_URL_ENV: &str = "SERVER_STATUS_API_BASE_URL";

pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_STRIPE_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_PRICE_AMOUNT: u64 = 1500;
const DEFAULT_PRICE_CURRENCY: &str = "usd";
const DEFAULT_PUBLIC_ORIGIN: &str = "http://localhost:3000";
const DEFAULT_OBJECT_PUBLIC_BASE_URL: &str = "http://localhost:8080/objects";
const DEFAULT_DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";
const DEFAULT_GAME_SERVER_ADDRESS: &str = "37.10.123.182:54783";
const DEFAULT_SERVER_STATUS_API_BASE_URL: &str = "https://api.mcstatus.io";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} is required when {1} is set")]
    MissingCompanion(&'static str, &'static str),
}

/// Gateway settings, present only when `STRIPE_SECRET_KEY` is set.
#[derive(Debug, Clone)]
pub struct StripeSettings {
    pub secret_key: String,
    pub api_base_url: String,
    pub price_id: Option<String>,
    pub amount_minor: u64,
    pub currency: String,
}

/// Chat import settings, present only when `DISCORD_BOT_TOKEN` is set.
#[derive(Debug, Clone)]
pub struct DiscordSettings {
    pub bot_token: String,
    pub channel_id: String,
    pub api_base_url: String,
}

/// Game server status lookup settings.
#[derive(Debug, Clone)]
pub struct ServerStatusSettings {
    pub server_address: String,
    pub api_base_url: String,
}

/// Typed runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub jwks_url: Option<String>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub admin_subjects: Vec<String>,
    pub stripe: Option<StripeSettings>,
    pub webhook_secret: Option<String>,
    pub public_origin: String,
    pub object_public_base_url: String,
    pub discord: Option<DiscordSettings>,
    pub server_status: ServerStatusSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let or_default = |name: &str, default: &str| get(name).unwrap_or_else(|| default.to_string());

        let host = or_default(HOST_ENV, DEFAULT_HOST);
        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: PORT_ENV,
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr: SocketAddr =
            format!("{host}:{port}")
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                    name: HOST_ENV,
                    reason: e.to_string(),
                })?;

        let stripe = match get(STRIPE_SECRET_KEY_ENV) {
            Some(secret_key) => {
                let amount_minor = match get(ACCESS_PRICE_AMOUNT_ENV) {
                    Some(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                        name: ACCESS_PRICE_AMOUNT_ENV,
                        reason: e.to_string(),
                    })?,
                    None => DEFAULT_PRICE_AMOUNT,
                };
                Some(StripeSettings {
                    secret_key,
                    api_base_url: or_default(STRIPE_API_BASE_URL_ENV, DEFAULT_STRIPE_API_BASE_URL),
                    price_id: get(STRIPE_PRICE_ID_ENV),
                    amount_minor,
                    currency: or_default(ACCESS_PRICE_CURRENCY_ENV, DEFAULT_PRICE_CURRENCY)
                        .to_ascii_lowercase(),
                })
            }
            None => None,
        };

        let discord = match get(DISCORD_BOT_TOKEN_ENV) {
            Some(bot_token) => Some(DiscordSettings {
                bot_token,
                channel_id: get(DISCORD_CHANNEL_ID_ENV).ok_or(ConfigError::MissingCompanion(
                    DISCORD_CHANNEL_ID_ENV,
                    DISCORD_BOT_TOKEN_ENV,
                ))?,
                api_base_url: or_default(DISCORD_API_BASE_URL_ENV, DEFAULT_DISCORD_API_BASE_URL),
            }),
            None => None,
        };

        let admin_subjects = get(ADMIN_SUBJECTS_ENV)
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(or_default(DATA_DIR_ENV, DEFAULT_DATA_DIR)),
            jwks_url: get(AUTH_JWKS_URL_ENV),
            issuer: get(AUTH_ISSUER_ENV),
            audience: get(AUTH_AUDIENCE_ENV),
            admin_subjects,
            stripe,
            webhook_secret: get(STRIPE_WEBHOOK_SECRET_ENV),
            public_origin: or_default(PUBLIC_ORIGIN_ENV, DEFAULT_PUBLIC_ORIGIN),
            object_public_base_url: or_default(
                OBJECT_PUBLIC_BASE_URL_ENV,
                DEFAULT_OBJECT_PUBLIC_BASE_URL,
            ),
            discord,
            server_status: ServerStatusSettings {
                server_address: or_default(GAME_SERVER_ADDRESS_ENV, DEFAULT_GAME_SERVER_ADDRESS),
                api_base_url: or_default(
                    SERVER_STATUS_API_BASE_URL_ENV,
                    DEFAULT_SERVER_STATUS_API_BASE_URL,
                ),
            },
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("access.redb")
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.data_dir.join("objects")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_leave_integrations_unconfigured() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.database_path(), PathBuf::from("./data/access.redb"));
        assert_eq!(config.public_origin, "http://localhost:3000");
        assert!(config.jwks_url.is_none());
        assert!(config.stripe.is_none());
        assert!(config.webhook_secret.is_none());
        assert!(config.discord.is_none());
        assert!(config.admin_subjects.is_empty());
        assert_eq!(config.server_status.server_address, "37.10.123.182:54783");
        assert_eq!(config.server_status.api_base_url, "https://api.mcstatus.io");
    }

    #[test]
    fn game_server_address_is_overridable() {
        let config = config_from(&[(GAME_SERVER_ADDRESS_ENV, " play.example.net ")]).unwrap();
        assert_eq!(config.server_status.server_address, "play.example.net");
    }

    #[test]
    fn stripe_settings_pick_up_price_defaults() {
        let config = config_from(&[
            (STRIPE_SECRET_KEY_ENV, "sk_test_1"),
            (ACCESS_PRICE_CURRENCY_ENV, "EUR"),
        ])
        .unwrap();
        let stripe = config.stripe.unwrap();
        assert_eq!(stripe.amount_minor, 1500);
        assert_eq!(stripe.currency, "eur");
        assert_eq!(stripe.api_base_url, "https://api.stripe.com");
        assert!(stripe.price_id.is_none());
    }

    #[test]
    fn admin_subjects_are_split_and_trimmed() {
        let config = config_from(&[(ADMIN_SUBJECTS_ENV, " user_a, ,user_b ")]).unwrap();
        assert_eq!(config.admin_subjects, vec!["user_a", "user_b"]);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[(STRIPE_WEBHOOK_SECRET_ENV, "   ")]).unwrap();
        assert!(config.webhook_secret.is_none());
    }

    #[test]
    fn invalid_port_and_missing_channel_are_errors() {
        assert!(matches!(
            config_from(&[(PORT_ENV, "http")]),
            Err(ConfigError::Invalid { name: PORT_ENV, .. })
        ));
        assert!(matches!(
            config_from(&[(DISCORD_BOT_TOKEN_ENV, "token")]),
            Err(ConfigError::MissingCompanion(DISCORD_CHANNEL_ID_ENV, _))
        ));
    }
}
