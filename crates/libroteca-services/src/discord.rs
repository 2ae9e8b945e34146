//! Discord channel adapter behind the [`DocumentSource`] capability.
//!
//! Books arrive as PDF attachments in a single channel. Attachment URLs are
//! signed and expire, so the stored `origin_ref` is the message id and a
//! fresh link is re-derived from the message right before download.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libroteca_core::models::{Book, SourceCandidate, UploaderSource};
use libroteca_core::{AppError, Config, DocumentSource, UploaderProfile};
use serde::Deserialize;

const API_BASE: &str = "https://discord.com/api/v10";
const MESSAGES_PAGE_SIZE: usize = 100;
const HTTP_TIMEOUT_SECS: u64 = 30;

pub struct DiscordSource {
    http_client: reqwest::Client,
    token: String,
    channel_id: String,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    timestamp: DateTime<Utc>,
    author: DiscordUser,
    #[serde(default)]
    attachments: Vec<DiscordAttachment>,
}

#[derive(Debug, Deserialize)]
struct DiscordUser {
    id: String,
    username: String,
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordAttachment {
    filename: String,
    url: String,
}

impl DiscordSource {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build Discord client: {e}")))?;
        Ok(Self {
            http_client,
            token: config.discord_token.clone(),
            channel_id: config.discord_book_channel_id.clone(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        what: &str,
    ) -> Result<Option<T>, AppError> {
        let response = self
            .http_client
            .get(url)
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| AppError::SourceAdapter(format!("failed to fetch {what}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::SourceAdapter(format!(
                "{what} request failed: {status} - {error_text}"
            )));
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| AppError::SourceAdapter(format!("failed to decode {what}: {e}")))?;
        Ok(Some(parsed))
    }

    /// One page of channel messages, newest first. `before` pages backwards
    /// through history.
    async fn fetch_messages_page(
        &self,
        before: Option<&str>,
    ) -> Result<Vec<DiscordMessage>, AppError> {
        let mut url = format!(
            "{API_BASE}/channels/{}/messages?limit={MESSAGES_PAGE_SIZE}",
            self.channel_id
        );
        if let Some(before) = before {
            url.push_str(&format!("&before={before}"));
        }
        Ok(self
            .get_json::<Vec<DiscordMessage>>(url, "channel messages")
            .await?
            .unwrap_or_default())
    }
}

#[async_trait]
impl DocumentSource for DiscordSource {
    fn kind(&self) -> UploaderSource {
        UploaderSource::Discord
    }

    async fn fetch_candidates(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SourceCandidate>, AppError> {
        let mut candidates = Vec::new();
        let mut before: Option<String> = None;

        loop {
            let page = self.fetch_messages_page(before.as_deref()).await?;
            if page.is_empty() {
                break;
            }
            // Newest first, so the last entry is the page's oldest message.
            let oldest_id = page.last().map(|message| message.id.clone());

            let mut reached_known = false;
            for message in &page {
                if since.is_some_and(|since| message.timestamp <= since) {
                    reached_known = true;
                    break;
                }
                candidates.extend(candidates_from_message(message, self.kind()));
            }

            if reached_known || page.len() < MESSAGES_PAGE_SIZE {
                break;
            }
            before = oldest_id;
        }

        tracing::info!(
            channel_id = %self.channel_id,
            count = candidates.len(),
            "Collected PDF attachments from channel"
        );
        Ok(candidates)
    }

    async fn resolve_download_url(&self, book: &Book) -> Result<Option<String>, AppError> {
        let Some(message_id) = book.origin_ref.as_deref() else {
            tracing::warn!(book_id = book.id, "Record has no origin reference");
            return Ok(None);
        };

        let message = self
            .get_json::<DiscordMessage>(
                format!(
                    "{API_BASE}/channels/{}/messages/{message_id}",
                    self.channel_id
                ),
                "origin message",
            )
            .await?;
        let Some(message) = message else {
            tracing::warn!(book_id = book.id, message_id, "Origin message is gone");
            return Ok(None);
        };

        Ok(message
            .attachments
            .into_iter()
            .find(|attachment| attachment.filename == book.file)
            .map(|attachment| attachment.url))
    }

    async fn fetch_profile(&self, uploader_id: &str) -> Result<Option<UploaderProfile>, AppError> {
        let user = self
            .get_json::<DiscordUser>(format!("{API_BASE}/users/{uploader_id}"), "user profile")
            .await?;
        Ok(user.map(|user| UploaderProfile {
            uploader_id: user.id.clone(),
            name: user.username.clone(),
            avatar: avatar_url(&user),
        }))
    }
}

fn candidates_from_message(
    message: &DiscordMessage,
    source: UploaderSource,
) -> Vec<SourceCandidate> {
    message
        .attachments
        .iter()
        .filter(|attachment| is_pdf_filename(&attachment.filename))
        .map(|attachment| SourceCandidate {
            uploader_id: message.author.id.clone(),
            file: attachment.filename.clone(),
            origin_ref: Some(message.id.clone()),
            date: message.timestamp,
            source,
        })
        .collect()
}

fn is_pdf_filename(name: &str) -> bool {
    Path::new(name)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn avatar_url(user: &DiscordUser) -> String {
    match &user.avatar {
        Some(hash) => format!("https://cdn.discordapp.com/avatars/{}/{hash}.png", user.id),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message_json() -> &'static str {
        r#"{
            "id": "1111",
            "timestamp": "2024-03-01T12:00:00.000000+00:00",
            "author": {"id": "42", "username": "reader", "avatar": "abcd"},
            "attachments": [
                {"id": "1", "filename": "rayuela.pdf", "url": "https://cdn.example/rayuela.pdf"},
                {"id": "2", "filename": "cover.png", "url": "https://cdn.example/cover.png"}
            ]
        }"#
    }

    #[test]
    fn test_is_pdf_filename() {
        assert!(is_pdf_filename("book.pdf"));
        assert!(is_pdf_filename("BOOK.PDF"));
        assert!(is_pdf_filename("dir.v2/book.Pdf"));
        assert!(!is_pdf_filename("book.epub"));
        assert!(!is_pdf_filename("pdf"));
        assert!(!is_pdf_filename(""));
    }

    #[test]
    fn test_candidates_keep_only_pdf_attachments() {
        let message: DiscordMessage = serde_json::from_str(message_json()).unwrap();
        let candidates = candidates_from_message(&message, UploaderSource::Discord);
        assert_eq!(candidates.len(), 1);
        let candidate = &candidates[0];
        assert_eq!(candidate.file, "rayuela.pdf");
        assert_eq!(candidate.uploader_id, "42");
        assert_eq!(candidate.origin_ref.as_deref(), Some("1111"));
        assert_eq!(candidate.source, UploaderSource::Discord);
    }

    #[test]
    fn test_message_timestamp_parses_to_utc() {
        let message: DiscordMessage = serde_json::from_str(message_json()).unwrap();
        assert_eq!(message.timestamp.to_rfc3339(), "2024-03-01T12:00:00+00:00");
    }

    #[test]
    fn test_avatar_url() {
        let user = DiscordUser {
            id: "42".to_string(),
            username: "reader".to_string(),
            avatar: Some("abcd".to_string()),
        };
        assert_eq!(
            avatar_url(&user),
            "https://cdn.discordapp.com/avatars/42/abcd.png"
        );

        let bald = DiscordUser {
            avatar: None,
            ..user
        };
        assert_eq!(avatar_url(&bald), "");
    }
}
