// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::JwksManager;
use crate::providers::{ChatImageSource, ObjectStore, PaymentGateway, ServerStatusSource};
use crate::storage::AccessDatabase;
use crate::webhook::WebhookVerifier;

/// Identity provider verification settings.
#[derive(Clone, Default)]
pub struct AuthConfig {
    /// JWKS manager. Without one, bearer tokens are refused unless
    /// `allow_unsigned` is set.
    pub jwks: Option<Arc<JwksManager>>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    /// Subjects always resolved as admin.
    pub admin_subjects: Vec<String>,
    /// Accept tokens without signature verification when no JWKS is set.
    /// Only honored in builds with the `dev` feature.
    pub allow_unsigned: bool,
}

impl AuthConfig {
    pub fn is_admin_subject(&self, subject: &str) -> bool {
        self.admin_subjects.iter().any(|s| s == subject)
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<AccessDatabase>,
    pub auth_config: AuthConfig,
    pub gateway: Arc<dyn PaymentGateway>,
    /// `None` when no webhook secret is configured.
    pub webhook: Option<WebhookVerifier>,
    pub objects: Arc<dyn ObjectStore>,
    /// `None` when chat import is not configured.
    pub chat_source: Option<Arc<dyn ChatImageSource>>,
    /// `None` reports the game server as offline.
    pub server_status: Option<Arc<dyn ServerStatusSource>>,
    /// Origin used for checkout redirects when the request carries none.
    pub public_origin: String,
}

impl AppState {
    pub fn new(
        db: AccessDatabase,
        gateway: Arc<dyn PaymentGateway>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            db: Arc::new(db),
            auth_config: AuthConfig::default(),
            gateway,
            webhook: None,
            objects,
            chat_source: None,
            server_status: None,
            public_origin: "http://localhost:3000".to_string(),
        }
    }

    pub fn with_auth_config(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }

    pub fn with_webhook(mut self, verifier: WebhookVerifier) -> Self {
        self.webhook = Some(verifier);
        self
    }

    pub fn with_chat_source(mut self, source: Arc<dyn ChatImageSource>) -> Self {
        self.chat_source = Some(source);
        self
    }

    pub fn with_server_status(mut self, source: Arc<dyn ServerStatusSource>) -> Self {
        self.server_status = Some(source);
        self
    }

    pub fn with_public_origin(mut self, origin: impl Into<String>) -> Self {
        self.public_origin = origin.into();
        self
    }
}

/// Webhook secret used by [`test_state`].
#[cfg(test)]
pub(crate) const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

/// State over a temp database, a fake gateway and a temp object store.
/// Authentication accepts unsigned tokens.
#[cfg(test)]
pub(crate) fn test_state() -> (AppState, tempfile::TempDir) {
    test_state_with_gateway(crate::providers::gateway::fake::FakeGateway::default())
}

#[cfg(test)]
pub(crate) fn test_state_with_gateway(
    gateway: crate::providers::gateway::fake::FakeGateway,
) -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = AccessDatabase::open(&dir.path().join("access.redb")).unwrap();
    let objects = crate::providers::FsObjectStore::new(
        dir.path().join("objects"),
        "https://cdn.example.com",
    );
    let state = AppState::new(db, Arc::new(gateway), Arc::new(objects))
        .with_auth_config(AuthConfig {
            allow_unsigned: true,
            ..AuthConfig::default()
        })
        .with_webhook(WebhookVerifier::new(TEST_WEBHOOK_SECRET));
    (state, dir)
}
