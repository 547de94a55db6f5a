// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Community chat image source (Discord REST API).
//!
//! Each import opens its own [`ChatSession`]: connect (token check), page
//! through the channel, download attachments, close. Nothing is kept in
//! process-wide state between imports.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::DiscordSettings;
use crate::storage::ImageReaction;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);
const PAGE_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ChatSourceError {
    #[error("chat import is not configured")]
    NotConfigured,

    #[error("chat platform request failed: {0}")]
    Request(String),

    #[error("chat platform response was invalid: {0}")]
    InvalidResponse(String),
}

/// An image attachment found in the channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatImage {
    pub channel_id: String,
    pub message_id: String,
    pub attachment_id: String,
    pub url: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub author: String,
    pub posted_at: DateTime<Utc>,
    pub caption: String,
    pub reactions: Vec<ImageReaction>,
}

impl ChatImage {
    /// Stable key identifying this attachment across imports.
    pub fn source_key(&self) -> String {
        format!("{}/{}/{}", self.channel_id, self.message_id, self.attachment_id)
    }

    /// File extension from the attachment name, defaulting to `png`.
    pub fn extension(&self) -> String {
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5)
            .unwrap_or_else(|| "png".to_string())
    }
}

/// Downloaded attachment bytes.
#[derive(Debug, Clone)]
pub struct DownloadedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Factory for scoped chat sessions.
#[async_trait]
pub trait ChatImageSource: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn ChatSession>, ChatSourceError>;
}

/// A connected chat session. Callers must `close` it when done.
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Image attachments from up to `limit` most recent messages, newest first.
    async fn fetch_images(&mut self, limit: usize) -> Result<Vec<ChatImage>, ChatSourceError>;

    async fn download(&self, image: &ChatImage) -> Result<DownloadedImage, ChatSourceError>;

    async fn close(self: Box<Self>);
}

// =============================================================================
// Discord
// =============================================================================

#[derive(Debug, Clone)]
pub struct DiscordSource {
    settings: DiscordSettings,
}

impl DiscordSource {
    pub fn new(settings: DiscordSettings) -> Self {
        Self { settings }
    }
}

struct DiscordSession {
    http: Client,
    settings: DiscordSettings,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: String,
    #[serde(default)]
    content: String,
    timestamp: DateTime<Utc>,
    author: Author,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    reactions: Vec<Reaction>,
}

#[derive(Debug, Deserialize)]
struct Author {
    username: String,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    id: String,
    url: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Reaction {
    count: u32,
    emoji: Emoji,
}

#[derive(Debug, Deserialize)]
struct Emoji {
    #[serde(default)]
    name: Option<String>,
}

impl DiscordSession {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.api_base_url.trim_end_matches('/'), path)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ChatSourceError> {
        let response = self
            .http
            .get(self.url(path))
            .header("Authorization", format!("Bot {}", self.settings.bot_token))
            .query(query)
            .send()
            .await
            .map_err(|e| ChatSourceError::Request(format!("GET {path} failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ChatSourceError::Request(format!(
                "GET {path} returned {status}: {body}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| ChatSourceError::InvalidResponse(format!("GET {path} invalid JSON: {e}")))
    }
}

/// Image attachments of one message.
fn images_in(channel_id: &str, message: Message) -> Vec<ChatImage> {
    let reactions: Vec<ImageReaction> = message
        .reactions
        .iter()
        .filter_map(|r| {
            r.emoji.name.as_ref().map(|emoji| ImageReaction {
                emoji: emoji.clone(),
                count: r.count,
            })
        })
        .collect();

    message
        .attachments
        .into_iter()
        .filter(|a| {
            a.content_type
                .as_deref()
                .is_some_and(|ct| ct.starts_with("image/"))
        })
        .map(|a| ChatImage {
            channel_id: channel_id.to_string(),
            message_id: message.id.clone(),
            attachment_id: a.id,
            url: a.url,
            filename: a.filename.unwrap_or_else(|| "unknown.png".to_string()),
            content_type: a.content_type,
            author: message.author.username.clone(),
            posted_at: message.timestamp,
            caption: message.content.clone(),
            reactions: reactions.clone(),
        })
        .collect()
}

#[async_trait]
impl ChatImageSource for DiscordSource {
    async fn connect(&self) -> Result<Box<dyn ChatSession>, ChatSourceError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChatSourceError::Request(format!("failed to build HTTP client: {e}")))?;
        let session = DiscordSession {
            http,
            settings: self.settings.clone(),
        };

        // Ready check: the token must resolve to a bot user
        let me: BotUser = session.get("/users/@me", &[]).await?;
        info!(bot = %me.username, channel_id = %session.settings.channel_id, "Chat session connected");
        Ok(Box::new(session))
    }
}

#[async_trait]
impl ChatSession for DiscordSession {
    async fn fetch_images(&mut self, limit: usize) -> Result<Vec<ChatImage>, ChatSourceError> {
        let path = format!("/channels/{}/messages", self.settings.channel_id);
        let mut images = Vec::new();
        let mut before: Option<String> = None;
        let mut fetched = 0;

        while fetched < limit {
            let mut query = vec![("limit", PAGE_SIZE.min(limit - fetched).to_string())];
            if let Some(id) = &before {
                query.push(("before", id.clone()));
            }

            let page: Vec<Message> = self.get(&path, &query).await?;
            if page.is_empty() {
                break;
            }
            fetched += page.len();
            before = page.last().map(|m| m.id.clone());
            debug!(count = page.len(), fetched, "Fetched chat messages");

            for message in page {
                images.extend(images_in(&self.settings.channel_id, message));
            }
        }

        Ok(images)
    }

    async fn download(&self, image: &ChatImage) -> Result<DownloadedImage, ChatSourceError> {
        let response = self
            .http
            .get(&image.url)
            .send()
            .await
            .map_err(|e| ChatSourceError::Request(format!("download failed: {e}")))?;

        if !response.status().is_success() {
            return Err(ChatSourceError::Request(format!(
                "download returned {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| image.content_type.clone())
            .unwrap_or_else(|| "image/png".to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatSourceError::Request(format!("download body failed: {e}")))?;

        Ok(DownloadedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }

    async fn close(self: Box<Self>) {
        info!(channel_id = %self.settings.channel_id, "Chat session closed");
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Scripted chat source counting session opens and closes.
    #[derive(Default, Clone)]
    pub(crate) struct FakeChatSource {
        pub images: Vec<ChatImage>,
        /// url → bytes. Missing urls fail to download.
        pub files: HashMap<String, Vec<u8>>,
        pub connects: Arc<AtomicUsize>,
        pub closes: Arc<AtomicUsize>,
    }

    struct FakeSession(FakeChatSource);

    #[async_trait]
    impl ChatImageSource for FakeChatSource {
        async fn connect(&self) -> Result<Box<dyn ChatSession>, ChatSourceError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession(self.clone())))
        }
    }

    #[async_trait]
    impl ChatSession for FakeSession {
        async fn fetch_images(&mut self, limit: usize) -> Result<Vec<ChatImage>, ChatSourceError> {
            Ok(self.0.images.iter().take(limit).cloned().collect())
        }

        async fn download(&self, image: &ChatImage) -> Result<DownloadedImage, ChatSourceError> {
            self.0
                .files
                .get(&image.url)
                .map(|bytes| DownloadedImage {
                    bytes: bytes.clone(),
                    content_type: "image/png".to_string(),
                })
                .ok_or_else(|| ChatSourceError::Request("404".to_string()))
        }

        async fn close(self: Box<Self>) {
            self.0.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn chat_image(message_id: &str, caption: &str) -> ChatImage {
        ChatImage {
            channel_id: "chan".to_string(),
            message_id: message_id.to_string(),
            attachment_id: format!("att{message_id}"),
            url: format!("https://cdn.discordapp.test/{message_id}.png"),
            filename: format!("{message_id}.png"),
            content_type: Some("image/png".to_string()),
            author: "builder_bob".to_string(),
            posted_at: "2026-03-14T12:00:00Z".parse().unwrap(),
            caption: caption.to_string(),
            reactions: vec![ImageReaction {
                emoji: "🔥".to_string(),
                count: 3,
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_image_attachments_are_collected() {
        let message: Message = serde_json::from_value(json!({
            "id": "m1",
            "content": "my base",
            "timestamp": "2026-03-14T12:00:00+00:00",
            "author": { "id": "u1", "username": "builder_bob" },
            "attachments": [
                { "id": "a1", "url": "https://cdn/a1.PNG", "filename": "a1.PNG", "content_type": "image/png" },
                { "id": "a2", "url": "https://cdn/a2.txt", "filename": "a2.txt", "content_type": "text/plain" },
                { "id": "a3", "url": "https://cdn/a3", "filename": "a3" }
            ],
            "reactions": [
                { "count": 4, "emoji": { "id": null, "name": "👍" } },
                { "count": 1, "emoji": { "id": "123", "name": null } }
            ]
        }))
        .unwrap();

        let images = images_in("chan", message);
        assert_eq!(images.len(), 1);
        let image = &images[0];
        assert_eq!(image.source_key(), "chan/m1/a1");
        assert_eq!(image.extension(), "png");
        assert_eq!(image.author, "builder_bob");
        assert_eq!(image.caption, "my base");
        assert_eq!(
            image.reactions,
            vec![ImageReaction {
                emoji: "👍".to_string(),
                count: 4
            }]
        );
    }

    #[test]
    fn extension_defaults_to_png() {
        let mut image = fake::chat_image("m1", "");
        image.filename = "noext".to_string();
        assert_eq!(image.extension(), "png");
        image.filename = "shot.webp".to_string();
        assert_eq!(image.extension(), "webp");
    }
}
