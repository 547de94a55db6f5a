// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use access_grant_server::{
    api::router,
    auth::JwksManager,
    config::{AppConfig, LOG_FORMAT_ENV},
    providers::{
        ChatImageSource, DiscordSource, FsObjectStore, McStatusClient, PaymentGateway,
        ServerStatusSource, StripeClient, UnconfiguredGateway,
    },
    state::{AppState, AuthConfig},
    storage::AccessDatabase,
    webhook::WebhookVerifier,
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let result = if json {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing init failed: {e}");
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        std::io::Error::other(e)
    })?;

    std::fs::create_dir_all(&config.data_dir)?;
    let db = AccessDatabase::open(&config.database_path()).map_err(|e| {
        error!(error = %e, path = %config.database_path().display(), "Failed to open database");
        std::io::Error::other(e)
    })?;
    info!(path = %config.database_path().display(), "Database ready");

    let jwks = match &config.jwks_url {
        Some(url) => {
            let manager = JwksManager::new(url.clone()).map_err(std::io::Error::other)?;
            info!(jwks_url = %url, "JWT verification enabled");
            Some(Arc::new(manager))
        }
        None if cfg!(feature = "dev") => {
            warn!("AUTH_JWKS_URL not set: authentication runs in development mode without signature checks");
            None
        }
        None => {
            error!("AUTH_JWKS_URL not set and this build has no `dev` feature: refusing to start");
            return Err(std::io::Error::other(
                "AUTH_JWKS_URL is required outside development builds",
            ));
        }
    };
    let auth_config = AuthConfig {
        allow_unsigned: jwks.is_none(),
        jwks,
        issuer: config.issuer.clone(),
        audience: config.audience.clone(),
        admin_subjects: config.admin_subjects.clone(),
    };

    let gateway: Arc<dyn PaymentGateway> = match config.stripe.clone() {
        Some(settings) => Arc::new(StripeClient::new(settings).map_err(std::io::Error::other)?),
        None => {
            warn!("STRIPE_SECRET_KEY not set: checkout is unavailable");
            Arc::new(UnconfiguredGateway)
        }
    };

    let objects = Arc::new(FsObjectStore::new(
        config.objects_dir(),
        config.object_public_base_url.clone(),
    ));

    let mut state = AppState::new(db, gateway, objects)
        .with_auth_config(auth_config)
        .with_public_origin(config.public_origin.clone());

    match &config.webhook_secret {
        Some(secret) => state = state.with_webhook(WebhookVerifier::new(secret.clone())),
        None => warn!("STRIPE_WEBHOOK_SECRET not set: payment notifications will be refused"),
    }
    let status_source: Arc<dyn ServerStatusSource> =
        Arc::new(McStatusClient::new(&config.server_status).map_err(std::io::Error::other)?);
    state = state.with_server_status(status_source);
    info!(server = %config.server_status.server_address, "Server status lookup enabled");

    if let Some(settings) = config.discord.clone() {
        let source: Arc<dyn ChatImageSource> = Arc::new(DiscordSource::new(settings));
        state = state.with_chat_source(source);
    }

    let app = router(state);

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_signal(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Access grant server listening (docs at /docs)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}
