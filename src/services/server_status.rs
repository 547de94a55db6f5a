// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public game server status.

use tracing::warn;

use crate::providers::{ServerStatus, ServerStatusSource};

/// Current server status. Lookup failures report the server as offline.
pub async fn current(source: Option<&dyn ServerStatusSource>) -> ServerStatus {
    let Some(source) = source else {
        return ServerStatus::offline();
    };
    match source.fetch_status().await {
        Ok(status) => status,
        Err(err) => {
            warn!(error = %err, "Server status lookup failed");
            ServerStatus::offline()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::providers::server_status::fake::{online_status, FakeStatusSource};

    #[tokio::test]
    async fn live_status_is_passed_through() {
        let source = FakeStatusSource {
            status: Some(online_status()),
            ..Default::default()
        };
        let dyn_source: &dyn ServerStatusSource = &source;
        assert_eq!(current(Some(dyn_source)).await, online_status());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_lookup_reports_offline() {
        let source = FakeStatusSource::default();
        let dyn_source: &dyn ServerStatusSource = &source;
        let status = current(Some(dyn_source)).await;
        assert_eq!(status, ServerStatus::offline());
        assert_eq!(status.version, "Unknown");
        assert!(status.players.list.is_empty());
    }

    #[tokio::test]
    async fn missing_source_reports_offline() {
        assert_eq!(current(None).await, ServerStatus::offline());
    }
}
