//! Telegram channel — long-polls the Bot API for updates.
//!
//! Inbound text, photo and other messages become `IncomingMessage`s; replies
//! go out through `sendMessage` / `sendPhoto` with a reply keyboard attached.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::channels::{
    Channel, IncomingMessage, Keyboard, MessageStream, OutgoingResponse, PhotoSize, ResponseBody,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Maximum caption length for Telegram's sendPhoto API.
const TELEGRAM_MAX_CAPTION_LENGTH: usize = 1024;

/// Message fields that identify a non-text, non-photo content type.
const OTHER_CONTENT_KINDS: &[&str] = &[
    "sticker",
    "document",
    "video",
    "video_note",
    "voice",
    "audio",
    "animation",
    "contact",
    "location",
    "poll",
];

/// Telegram channel — connects to the Bot API via long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        api_url(&self.bot_token, method)
    }

    /// Send a text message, split to fit Telegram's 4096 char limit. The
    /// keyboard is attached to the last chunk.
    async fn send_message(
        &self,
        chat_id: &str,
        text: &str,
        keyboard: &Keyboard,
    ) -> Result<(), ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        for (i, chunk) in chunks.iter().enumerate() {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if i == last {
                if let Some(markup) = reply_markup(keyboard) {
                    body["reply_markup"] = markup;
                }
            }
            self.post("sendMessage", &body).await?;
        }
        Ok(())
    }

    /// Re-send a photo by file id. Captions over Telegram's limit go out as
    /// a separate text message.
    async fn send_photo(
        &self,
        chat_id: &str,
        file_id: &str,
        caption: &str,
        keyboard: &Keyboard,
    ) -> Result<(), ChannelError> {
        let fits = caption.chars().count() <= TELEGRAM_MAX_CAPTION_LENGTH;

        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "photo": file_id,
        });
        if fits {
            body["caption"] = Value::String(caption.to_string());
            if let Some(markup) = reply_markup(keyboard) {
                body["reply_markup"] = markup;
            }
        }
        self.post("sendPhoto", &body).await?;
        tracing::info!("Telegram photo sent to {chat_id}");

        if !fits {
            self.send_message(chat_id, caption, keyboard).await?;
        }
        Ok(())
    }

    async fn post(&self, method: &str, body: &Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method} failed ({status}): {err}"),
            });
        }
        Ok(())
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for messages...");

            loop {
                let body = serde_json::json!({
                    "offset": offset,
                    "timeout": 30,
                    "allowed_updates": ["message"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    let description = data
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("no result");
                    tracing::warn!("Telegram getUpdates rejected: {description}");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(incoming) = parse_update(update) else {
                        continue;
                    };

                    tracing::debug!(
                        user = %incoming.user_id,
                        content_type = %incoming.content_type,
                        "Telegram message received"
                    );

                    if tx.send(incoming).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|msg| (msg, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError> {
        let chat_id = msg
            .metadata
            .get("chat_id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: "No chat_id in message metadata".into(),
            })?;

        match &response.body {
            ResponseBody::Text(text) => {
                self.send_message(chat_id, text, &response.keyboard).await
            }
            ResponseBody::Photo { file_id, caption } => {
                self.send_photo(chat_id, file_id, caption, &response.keyboard)
                    .await
            }
        }
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        tracing::info!("Telegram channel shutting down");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn api_url(token: &SecretString, method: &str) -> String {
    format!(
        "https://api.telegram.org/bot{}/{method}",
        token.expose_secret()
    )
}

/// Turn one `getUpdates` entry into an `IncomingMessage`. Updates without a
/// message or a sender are skipped.
fn parse_update(update: &Value) -> Option<IncomingMessage> {
    let message = update.get("message")?;
    let from = message.get("from")?;
    let user_id = from.get("id").and_then(Value::as_i64)?.to_string();

    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string())
        .unwrap_or_default();
    let username = from.get("username").and_then(Value::as_str);

    let mut incoming = if let Some(text) = message.get("text").and_then(Value::as_str) {
        IncomingMessage::new("telegram", &user_id, text)
    } else if let Some(sizes) = message.get("photo").and_then(Value::as_array) {
        let photos = sizes
            .iter()
            .filter_map(|p| serde_json::from_value::<PhotoSize>(p.clone()).ok())
            .collect();
        let mut msg = IncomingMessage::photo("telegram", &user_id, photos);
        if let Some(caption) = message.get("caption").and_then(Value::as_str) {
            msg.content = caption.to_string();
        }
        msg
    } else {
        let kind = OTHER_CONTENT_KINDS
            .iter()
            .find(|k| message.get(**k).is_some())
            .copied()
            .unwrap_or("unknown");
        IncomingMessage::other("telegram", &user_id, kind)
    };

    incoming = incoming.with_metadata(serde_json::json!({ "chat_id": chat_id }));
    if let Some(name) = from
        .get("first_name")
        .and_then(Value::as_str)
        .or(username)
    {
        incoming = incoming.with_user_name(name);
    }
    Some(incoming)
}

/// `reply_markup` payload for a keyboard, or `None` to leave it unchanged.
fn reply_markup(keyboard: &Keyboard) -> Option<Value> {
    match keyboard {
        Keyboard::Unchanged => None,
        Keyboard::Remove => Some(serde_json::json!({ "remove_keyboard": true })),
        Keyboard::Options(options) => {
            let rows: Vec<Value> = options
                .iter()
                .map(|label| serde_json::json!([{ "text": label }]))
                .collect();
            Some(serde_json::json!({
                "keyboard": rows,
                "resize_keyboard": true,
            }))
        }
    }
}

/// Split a message into chunks of at most `max_chars` characters.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    loop {
        // Byte offset of the first char past the limit
        let Some((limit, _)) = remaining.char_indices().nth(max_chars) else {
            chunks.push(remaining.to_string());
            break;
        };

        let window = &remaining[..limit];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0) // infinite loop guard
            .unwrap_or(limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
        if remaining.is_empty() {
            break;
        }
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────
