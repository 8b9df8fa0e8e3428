//! ChatMessage entity and repository trait.
//!
//! Maps to the `chat_messages` and `message_reads` tables in the
//! database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[cfg(test)]
use mockall::automock;

/// Maximum length of message text in characters.
pub const MAX_TEXT_LENGTH: usize = 5000;

/// Message types matching the PostgreSQL ENUM `message_type`.
///
/// Database definition:
/// ```sql
/// CREATE TYPE message_type AS ENUM (
///     'text',    -- Regular user message
///     'image',   -- Message carrying an image attachment
///     'file',    -- Message carrying a file attachment
///     'system',  -- Authored by the platform (open/close markers)
///     'typing',  -- Typing indicator
///     'read'     -- Read notification
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// A regular text message
    #[default]
    Text,
    /// A message whose primary content is an image
    Image,
    /// A message whose primary content is a file
    File,
    /// A platform-authored lifecycle marker
    System,
    /// A typing indicator
    Typing,
    /// A read notification
    Read,
}

impl MessageType {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "text" => Self::Text,
            "image" => Self::Image,
            "file" => Self::File,
            "system" => Self::System,
            "typing" => Self::Typing,
            "read" => Self::Read,
            _ => Self::Text,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::File => "file",
            Self::System => "system",
            Self::Typing => "typing",
            Self::Read => "read",
        }
    }

    /// Check if this is a platform-authored message type.
    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery states matching the PostgreSQL ENUM `message_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sent" => Self::Sent,
            "delivered" => Self::Delivered,
            "read" => Self::Read,
            "failed" => Self::Failed,
            _ => Self::Sent,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }
}

/// Attachment kinds carried in the attachments JSONB column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    File,
    Link,
}

/// A file, image, or link attached to a message.
///
/// Stored as JSONB on the `chat_messages` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// A read receipt.
///
/// Maps to the `message_reads` table; the composite primary key
/// (message_id, user_id) deduplicates receipts per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadReceipt {
    pub user_id: i64,
    pub read_at: DateTime<Utc>,
}

/// Represents a message inside a chat room.
///
/// Maps to the `chat_messages` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - room_id: BIGINT NOT NULL REFERENCES chat_rooms(id)
/// - sender_id: BIGINT NOT NULL REFERENCES users(id)
/// - message_type: message_type NOT NULL DEFAULT 'text'
/// - text: TEXT NULL (max 5000 characters)
/// - attachments: JSONB NOT NULL DEFAULT '[]'
/// - status: message_status NOT NULL DEFAULT 'sent'
/// - is_edited: BOOLEAN NOT NULL DEFAULT FALSE
/// - edited_at: TIMESTAMPTZ NULL
/// - reply_to_id: BIGINT REFERENCES chat_messages(id)
/// - mentions: BIGINT[] NOT NULL DEFAULT '{}'
/// - created_at, updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Room the message belongs to
    pub room_id: i64,

    /// Author user ID
    pub sender_id: i64,

    /// Type of message
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Message text (up to 5000 characters)
    pub text: Option<String>,

    /// Attachments carried by the message
    pub attachments: Vec<Attachment>,

    /// Delivery state
    pub status: MessageStatus,

    /// Users that have read the message, deduplicated per user
    pub read_by: Vec<ReadReceipt>,

    /// Whether the text has been edited
    pub is_edited: bool,

    /// When the text was last edited
    pub edited_at: Option<DateTime<Utc>>,

    /// Message this one replies to
    pub reply_to_id: Option<i64>,

    /// Mentioned user IDs
    pub mentions: Vec<i64>,

    /// Timestamp when the message was sent
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Create a new message in `sent` status.
    pub fn new(
        id: i64,
        room_id: i64,
        sender_id: i64,
        message_type: MessageType,
        text: Option<String>,
        reply_to_id: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            room_id,
            sender_id,
            message_type,
            text,
            attachments: Vec::new(),
            status: MessageStatus::Sent,
            read_by: Vec::new(),
            is_edited: false,
            edited_at: None,
            reply_to_id,
            mentions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a platform-authored lifecycle marker.
    pub fn system(id: i64, room_id: i64, sender_id: i64, text: &str) -> Self {
        Self::new(
            id,
            room_id,
            sender_id,
            MessageType::System,
            Some(text.to_string()),
            None,
        )
    }

    /// Whether the given user already has a read receipt.
    pub fn is_read_by(&self, user_id: i64) -> bool {
        self.read_by.iter().any(|r| r.user_id == user_id)
    }

    /// Record a read receipt for the user and mark the message read.
    ///
    /// Idempotent per user; repeated calls leave a single receipt.
    /// Returns the new receipt, or `None` for the no-op.
    pub fn mark_read(&mut self, user_id: i64) -> Option<ReadReceipt> {
        if self.is_read_by(user_id) {
            return None;
        }
        let receipt = ReadReceipt {
            user_id,
            read_at: Utc::now(),
        };
        self.read_by.push(receipt.clone());
        self.status = MessageStatus::Read;
        Some(receipt)
    }

    /// Replace the message text, marking it edited.
    pub fn edit(&mut self, new_text: String) {
        self.text = Some(new_text);
        self.is_edited = true;
        self.edited_at = Some(Utc::now());
    }

    /// Append an attachment; image attachments flip the message type to
    /// `image`, anything else to `file`.
    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.message_type = match attachment.kind {
            AttachmentKind::Image => MessageType::Image,
            _ => MessageType::File,
        };
        self.attachments.push(attachment);
    }

    /// Get the text length in characters.
    pub fn text_length(&self) -> usize {
        self.text.as_deref().map_or(0, |t| t.chars().count())
    }
}

/// Repository trait for ChatMessage data access operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    /// Find a message by its Snowflake ID, read receipts included.
    async fn find_by_id(&self, id: i64) -> Result<Option<ChatMessage>, AppError>;

    /// Create a new message.
    async fn create(&self, message: &ChatMessage) -> Result<ChatMessage, AppError>;

    /// Find messages in a room, newest first.
    ///
    /// - `before`: only messages created strictly before this instant
    /// - `limit`: maximum number of messages to return
    async fn find_by_room(
        &self,
        room_id: i64,
        limit: i32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatMessage>, AppError>;

    /// Insert a read receipt (idempotent) and mark the message read.
    ///
    /// Returns true when a new receipt was recorded.
    async fn mark_read(
        &self,
        message_id: i64,
        user_id: i64,
        read_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    /// Persist edited text / attachments / type after an entity-level
    /// mutation.
    async fn update_content(&self, message: &ChatMessage) -> Result<ChatMessage, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn message() -> ChatMessage {
        ChatMessage::new(1, 10, 7, MessageType::Text, Some("hello".into()), None)
    }

    #[test]
    fn test_mark_read_is_idempotent() {
        let mut msg = message();
        assert!(msg.mark_read(42).is_some());
        assert!(msg.mark_read(42).is_none());
        assert_eq!(msg.read_by.len(), 1);
        assert_eq!(msg.status, MessageStatus::Read);
    }

    #[test]
    fn test_read_status_implies_receipt() {
        let mut msg = message();
        assert_eq!(msg.status, MessageStatus::Sent);
        msg.mark_read(42);
        assert_eq!(msg.status, MessageStatus::Read);
        assert!(!msg.read_by.is_empty());
    }

    #[test]
    fn test_edit_sets_flags() {
        let mut msg = message();
        msg.edit("corrected".into());
        assert_eq!(msg.text.as_deref(), Some("corrected"));
        assert!(msg.is_edited);
        assert!(msg.edited_at.is_some());
    }

    #[test]
    fn test_add_attachment_flips_type() {
        let mut msg = message();
        msg.add_attachment(Attachment {
            kind: AttachmentKind::Image,
            url: "https://cdn.example.com/a.png".into(),
            name: None,
            size: None,
            mime_type: Some("image/png".into()),
            thumbnail: None,
        });
        assert_eq!(msg.message_type, MessageType::Image);

        msg.add_attachment(Attachment {
            kind: AttachmentKind::File,
            url: "https://cdn.example.com/b.pdf".into(),
            name: Some("b.pdf".into()),
            size: Some(1024),
            mime_type: Some("application/pdf".into()),
            thumbnail: None,
        });
        assert_eq!(msg.message_type, MessageType::File);
        assert_eq!(msg.attachments.len(), 2);
    }

    #[test]
    fn test_system_message() {
        let msg = ChatMessage::system(2, 10, 7, "Chat session started");
        assert!(msg.message_type.is_system());
        assert_eq!(msg.text.as_deref(), Some("Chat session started"));
    }

    #[test]
    fn test_type_round_trip() {
        for t in [
            MessageType::Text,
            MessageType::Image,
            MessageType::File,
            MessageType::System,
            MessageType::Typing,
            MessageType::Read,
        ] {
            assert_eq!(MessageType::from_str(t.as_str()), t);
        }
    }
}
