//! ChatMessage Repository Implementation
//!
//! PostgreSQL implementation of message operations with timestamp-based
//! pagination and idempotent read receipts backed by the composite key
//! on `message_reads`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    Attachment, ChatMessage, ChatMessageRepository, MessageStatus, MessageType, ReadReceipt,
};
use crate::shared::error::AppError;

/// PostgreSQL chat message repository implementation.
pub struct PgChatMessageRepository {
    pool: PgPool,
}

impl PgChatMessageRepository {
    /// Creates a new PgChatMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
#[derive(Debug, sqlx::FromRow)]
struct ChatMessageRow {
    id: i64,
    room_id: i64,
    sender_id: i64,
    message_type: String,
    text: Option<String>,
    attachments: serde_json::Value,
    status: String,
    is_edited: bool,
    edited_at: Option<DateTime<Utc>>,
    reply_to_id: Option<i64>,
    mentions: Vec<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ChatMessageRow {
    /// Converts database row to domain ChatMessage entity (read
    /// receipts loaded separately).
    fn into_message(self, read_by: Vec<ReadReceipt>) -> Result<ChatMessage, AppError> {
        let attachments: Vec<Attachment> = serde_json::from_value(self.attachments)
            .map_err(|e| AppError::Internal(format!("Failed to decode attachments: {}", e)))?;

        Ok(ChatMessage {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            message_type: MessageType::from_str(&self.message_type),
            text: self.text,
            attachments,
            status: MessageStatus::from_str(&self.status),
            read_by,
            is_edited: self.is_edited,
            edited_at: self.edited_at,
            reply_to_id: self.reply_to_id,
            mentions: self.mentions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Internal row type for read receipt queries.
#[derive(Debug, sqlx::FromRow)]
struct ReadReceiptRow {
    message_id: i64,
    user_id: i64,
    read_at: DateTime<Utc>,
}

const MESSAGE_COLUMNS: &str = r#"
    id, room_id, sender_id,
    message_type::text as message_type, text, attachments,
    status::text as status, is_edited, edited_at,
    reply_to_id, mentions, created_at, updated_at
"#;

impl PgChatMessageRepository {
    /// Load read receipts for a set of messages.
    async fn load_read_receipts(
        &self,
        message_ids: &[i64],
    ) -> Result<Vec<(i64, ReadReceipt)>, AppError> {
        let rows = sqlx::query_as::<_, ReadReceiptRow>(
            r#"
            SELECT message_id, user_id, read_at
            FROM message_reads
            WHERE message_id = ANY($1)
            ORDER BY read_at ASC
            "#,
        )
        .bind(message_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| {
                (
                    r.message_id,
                    ReadReceipt {
                        user_id: r.user_id,
                        read_at: r.read_at,
                    },
                )
            })
            .collect())
    }
}

#[async_trait]
impl ChatMessageRepository for PgChatMessageRepository {
    /// Find a message by its ID.
    ///
    /// Returns None if the message does not exist.
    async fn find_by_id(&self, id: i64) -> Result<Option<ChatMessage>, AppError> {
        let row = sqlx::query_as::<_, ChatMessageRow>(&format!(
            "SELECT {} FROM chat_messages WHERE id = $1",
            MESSAGE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let read_by = self
            .load_read_receipts(&[row.id])
            .await?
            .into_iter()
            .map(|(_, r)| r)
            .collect();

        Ok(Some(row.into_message(read_by)?))
    }

    /// Create a new message.
    ///
    /// The message ID should be a pre-generated Snowflake ID from the
    /// application layer.
    async fn create(&self, message: &ChatMessage) -> Result<ChatMessage, AppError> {
        let attachments = serde_json::to_value(&message.attachments)
            .map_err(|e| AppError::Internal(format!("Failed to encode attachments: {}", e)))?;

        let row = sqlx::query_as::<_, ChatMessageRow>(&format!(
            r#"
            INSERT INTO chat_messages
                (id, room_id, sender_id, message_type, text, attachments,
                 status, is_edited, edited_at, reply_to_id, mentions, created_at, updated_at)
            VALUES ($1, $2, $3, $4::message_type, $5, $6,
                    $7::message_status, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(message.id)
        .bind(message.room_id)
        .bind(message.sender_id)
        .bind(message.message_type.as_str())
        .bind(&message.text)
        .bind(attachments)
        .bind(message.status.as_str())
        .bind(message.is_edited)
        .bind(message.edited_at)
        .bind(message.reply_to_id)
        .bind(&message.mentions)
        .bind(message.created_at)
        .bind(message.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_message(Vec::new())
    }

    /// Find messages in a room with timestamp pagination.
    ///
    /// Messages are returned in descending order (newest first),
    /// strictly before the `before` cursor when one is supplied.
    async fn find_by_room(
        &self,
        room_id: i64,
        limit: i32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<ChatMessage>, AppError> {
        let rows = match before {
            Some(cursor) => {
                sqlx::query_as::<_, ChatMessageRow>(&format!(
                    r#"
                    SELECT {}
                    FROM chat_messages
                    WHERE room_id = $1 AND created_at < $2
                    ORDER BY created_at DESC
                    LIMIT $3
                    "#,
                    MESSAGE_COLUMNS
                ))
                .bind(room_id)
                .bind(cursor)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ChatMessageRow>(&format!(
                    r#"
                    SELECT {}
                    FROM chat_messages
                    WHERE room_id = $1
                    ORDER BY created_at DESC
                    LIMIT $2
                    "#,
                    MESSAGE_COLUMNS
                ))
                .bind(room_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let message_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let receipts = self.load_read_receipts(&message_ids).await?;

        rows.into_iter()
            .map(|row| {
                let message_id = row.id;
                let read_by: Vec<ReadReceipt> = receipts
                    .iter()
                    .filter(|(id, _)| *id == message_id)
                    .map(|(_, r)| r.clone())
                    .collect();
                row.into_message(read_by)
            })
            .collect()
    }

    /// Insert a read receipt and mark the message read, atomically.
    ///
    /// The composite primary key on `message_reads` makes the insert
    /// idempotent; the status update only runs when a receipt was
    /// actually recorded. Returns true for a newly recorded receipt.
    async fn mark_read(
        &self,
        message_id: i64,
        user_id: i64,
        read_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO message_reads (message_id, user_id, read_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id, user_id) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .bind(read_at)
        .execute(&mut *tx)
        .await?;

        let inserted = result.rows_affected() > 0;

        if inserted {
            sqlx::query(
                r#"
                UPDATE chat_messages
                SET status = 'read', updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(message_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Persist edited text / attachments / type after an entity-level
    /// mutation.
    async fn update_content(&self, message: &ChatMessage) -> Result<ChatMessage, AppError> {
        let attachments = serde_json::to_value(&message.attachments)
            .map_err(|e| AppError::Internal(format!("Failed to encode attachments: {}", e)))?;

        let row = sqlx::query_as::<_, ChatMessageRow>(&format!(
            r#"
            UPDATE chat_messages
            SET message_type = $2::message_type,
                text = $3,
                attachments = $4,
                is_edited = $5,
                edited_at = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(message.id)
        .bind(message.message_type.as_str())
        .bind(&message.text)
        .bind(attachments)
        .bind(message.is_edited)
        .bind(message.edited_at)
        .fetch_one(&self.pool)
        .await?;

        row.into_message(message.read_by.clone())
    }
}
