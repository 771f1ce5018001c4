//! Fan-out of messages to subscribed chat channels

use crate::constants::{REQUEST_TIMEOUT_SECS, TELEGRAM_API_URL, USER_AGENT};
use crate::error::BroadcastError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Destination identifier: numeric chat id or `@channel` name
pub type ChatId = String;

/// Builds the text for one destination
pub type MessageGenerator = Arc<dyn Fn(&ChatId) -> String + Send + Sync>;

/// How the payload is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    /// Payload is a sticker file id
    Sticker,
}

#[derive(Clone)]
pub enum MessageBody {
    Literal(String),
    PerChat(MessageGenerator),
}

impl fmt::Debug for MessageBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageBody::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            MessageBody::PerChat(_) => f.write_str("PerChat(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub body: MessageBody,
    pub kind: MessageKind,
}

impl Message {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            body: MessageBody::Literal(text.into()),
            kind: MessageKind::Text,
        }
    }

    pub fn per_chat<F>(generator: F) -> Self
    where
        F: Fn(&ChatId) -> String + Send + Sync + 'static,
    {
        Self {
            body: MessageBody::PerChat(Arc::new(generator)),
            kind: MessageKind::Text,
        }
    }

    pub fn sticker(file_id: impl Into<String>) -> Self {
        Self {
            body: MessageBody::Literal(file_id.into()),
            kind: MessageKind::Sticker,
        }
    }

    /// Payload for one destination
    pub fn render(&self, chat: &ChatId) -> String {
        match &self.body {
            MessageBody::Literal(text) => text.clone(),
            MessageBody::PerChat(generator) => generator(chat),
        }
    }
}

/// Delivery counts of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Sends one message to a set of destinations
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(
        &self,
        chats: &[ChatId],
        message: Message,
    ) -> Result<BroadcastReport, BroadcastError>;
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Broadcaster backed by the Telegram Bot API
pub struct TelegramBroadcaster {
    client: Client,
    base_url: String,
}

impl TelegramBroadcaster {
    pub fn new(bot_token: &str) -> Result<Self, BroadcastError> {
        Self::with_base_url(TELEGRAM_API_URL, bot_token)
    }

    pub fn with_base_url(api_url: &str, bot_token: &str) -> Result<Self, BroadcastError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: format!("{}/bot{}", api_url.trim_end_matches('/'), bot_token),
        })
    }

    async fn send_one(
        &self,
        chat: &ChatId,
        kind: MessageKind,
        payload: String,
    ) -> Result<(), BroadcastError> {
        let (method, body) = match kind {
            MessageKind::Text => (
                "sendMessage",
                json!({
                    "chat_id": chat,
                    "text": payload,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
            ),
            MessageKind::Sticker => (
                "sendSticker",
                json!({
                    "chat_id": chat,
                    "sticker": payload,
                }),
            ),
        };

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let reply: TelegramResponse = response.json().await?;
        if !reply.ok {
            return Err(BroadcastError::ApiError(format!(
                "HTTP {}: {}",
                status,
                reply.description.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Broadcaster for TelegramBroadcaster {
    async fn broadcast(
        &self,
        chats: &[ChatId],
        message: Message,
    ) -> Result<BroadcastReport, BroadcastError> {
        let mut report = BroadcastReport::default();

        for chat in chats {
            let payload = message.render(chat);
            match self.send_one(chat, message.kind, payload).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!(chat = %chat, error = %e, "Failed to deliver message");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            delivered = report.delivered,
            failed = report.failed,
            kind = ?message.kind,
            "Broadcast finished"
        );
        Ok(report)
    }
}
