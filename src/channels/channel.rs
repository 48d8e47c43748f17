//! Channel trait and the message types that cross it.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ChannelError;

/// Stream of inbound messages produced by a channel.
pub type MessageStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

/// What kind of content an inbound message carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Photo,
    /// Anything else the platform delivers (sticker, document, voice...).
    Other(String),
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Photo => write!(f, "photo"),
            Self::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// One resolution variant of a photo, as delivered by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

/// A message received from a channel.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub id: Uuid,
    /// Name of the channel that produced the message.
    pub channel: String,
    pub user_id: String,
    pub user_name: Option<String>,
    /// Text body, or the caption for media. Empty when absent.
    pub content: String,
    pub content_type: ContentType,
    /// Photo variants, smallest first as Telegram sends them.
    pub photos: Vec<PhotoSize>,
    /// Channel-specific routing data (e.g. Telegram chat id).
    pub metadata: serde_json::Value,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    /// A text message.
    pub fn new(channel: &str, user_id: &str, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel: channel.to_string(),
            user_id: user_id.to_string(),
            user_name: None,
            content: content.into(),
            content_type: ContentType::Text,
            photos: Vec::new(),
            metadata: serde_json::json!({}),
            received_at: Utc::now(),
        }
    }

    /// A photo message with the given resolution variants.
    pub fn photo(channel: &str, user_id: &str, photos: Vec<PhotoSize>) -> Self {
        Self {
            content_type: ContentType::Photo,
            photos,
            ..Self::new(channel, user_id, "")
        }
    }

    /// A message of some other content type, carrying no usable payload.
    pub fn other(channel: &str, user_id: &str, kind: &str) -> Self {
        Self {
            content_type: ContentType::Other(kind.to_string()),
            ..Self::new(channel, user_id, "")
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    /// Key identifying this conversation across turns.
    pub fn session_key(&self) -> String {
        format!("{}:{}", self.channel, self.user_id)
    }

    /// Trimmed text, if this is a non-empty text message.
    pub fn text(&self) -> Option<&str> {
        if self.content_type != ContentType::Text {
            return None;
        }
        let text = self.content.trim();
        (!text.is_empty()).then_some(text)
    }

    /// Highest-resolution photo variant (largest pixel area; ties go to the
    /// later variant).
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        if self.content_type != ContentType::Photo {
            return None;
        }
        self.photos
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
    }
}

/// Reply keyboard attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Keyboard {
    /// Leave whatever keyboard the client shows.
    #[default]
    Unchanged,
    /// One button per row, in order.
    Options(Vec<String>),
    /// Hide the keyboard.
    Remove,
}

impl Keyboard {
    /// Options keyboard, or `Remove` when there is nothing to offer.
    pub fn from_options(options: Vec<String>) -> Self {
        if options.is_empty() {
            Self::Remove
        } else {
            Self::Options(options)
        }
    }
}

/// Body of an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseBody {
    Text(String),
    /// A previously received photo, re-sent by reference.
    Photo { file_id: String, caption: String },
}

/// A message to send back on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingResponse {
    pub body: ResponseBody,
    pub keyboard: Keyboard,
}

impl OutgoingResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            body: ResponseBody::Text(content.into()),
            keyboard: Keyboard::Unchanged,
        }
    }

    pub fn photo(file_id: impl Into<String>, caption: impl Into<String>) -> Self {
        Self {
            body: ResponseBody::Photo {
                file_id: file_id.into(),
                caption: caption.into(),
            },
            keyboard: Keyboard::Unchanged,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Keyboard) -> Self {
        self.keyboard = keyboard;
        self
    }

    /// Text of the message, or the caption of a photo.
    pub fn content(&self) -> &str {
        match &self.body {
            ResponseBody::Text(text) => text,
            ResponseBody::Photo { caption, .. } => caption,
        }
    }
}

/// A messaging transport.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name, matched against `IncomingMessage::channel`.
    fn name(&self) -> &str;

    /// Start receiving messages.
    async fn start(&self) -> Result<MessageStream, ChannelError>;

    /// Send a response to the conversation `msg` came from.
    async fn respond(
        &self,
        msg: &IncomingMessage,
        response: OutgoingResponse,
    ) -> Result<(), ChannelError>;

    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(file_id: &str, width: u32, height: u32) -> PhotoSize {
        PhotoSize {
            file_id: file_id.to_string(),
            width,
            height,
            file_size: None,
        }
    }

    #[test]
    fn largest_photo_picks_biggest_area() {
        let msg = IncomingMessage::photo(
            "telegram",
            "1",
            vec![size("s", 90, 90), size("xl", 1280, 1280), size("m", 320, 320)],
        );
        assert_eq!(msg.largest_photo().map(|p| p.file_id.as_str()), Some("xl"));
    }

    #[test]
    fn largest_photo_ties_go_to_last_variant() {
        let msg = IncomingMessage::photo(
            "telegram",
            "1",
            vec![size("a", 800, 600), size("b", 600, 800)],
        );
        assert_eq!(msg.largest_photo().map(|p| p.file_id.as_str()), Some("b"));
    }

    #[test]
    fn largest_photo_requires_photo_content() {
        let msg = IncomingMessage::new("telegram", "1", "hello");
        assert!(msg.largest_photo().is_none());
        let empty = IncomingMessage::photo("telegram", "1", vec![]);
        assert!(empty.largest_photo().is_none());
    }

    #[test]
    fn text_is_trimmed_and_only_for_text_messages() {
        assert_eq!(IncomingMessage::new("cli", "u", "  Иван \n").text(), Some("Иван"));
        assert_eq!(IncomingMessage::new("cli", "u", "   ").text(), None);
        assert_eq!(IncomingMessage::other("cli", "u", "sticker").text(), None);
    }

    #[test]
    fn session_key_combines_channel_and_user() {
        let msg = IncomingMessage::new("telegram", "42", "hi");
        assert_eq!(msg.session_key(), "telegram:42");
    }

    #[test]
    fn keyboard_from_empty_options_removes() {
        assert_eq!(Keyboard::from_options(vec![]), Keyboard::Remove);
        assert_eq!(
            Keyboard::from_options(vec!["a".into()]),
            Keyboard::Options(vec!["a".into()])
        );
    }

    #[test]
    fn response_content_reads_caption_for_photos() {
        let response = OutgoingResponse::photo("file", "caption");
        assert_eq!(response.content(), "caption");
        assert_eq!(response.keyboard, Keyboard::Unchanged);
    }

    #[test]
    fn incoming_message_metadata_has_chat_id() {
        let msg = IncomingMessage::new("telegram", "user123", "hello")
            .with_metadata(serde_json::json!({"chat_id": "99887766"}));

        let chat_id = msg.metadata.get("chat_id").and_then(|v| v.as_str());
        assert_eq!(chat_id, Some("99887766"));
    }
}
