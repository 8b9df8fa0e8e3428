//! ChatRoom Repository Implementation
//!
//! PostgreSQL implementation of chat room operations. Multi-row writes
//! (room + participants + system message, close + closing message) run
//! inside a transaction; single-field mutations are targeted UPDATEs so
//! concurrent writers do not clobber unrelated fields.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{
    ChatMessage, ChatRoom, ChatRoomRepository, Participant, ParticipantRole, RoomCategory,
    RoomMetadata, RoomPriority, RoomStatus,
};
use crate::shared::error::AppError;

/// PostgreSQL chat room repository implementation.
pub struct PgChatRoomRepository {
    pool: PgPool,
}

impl PgChatRoomRepository {
    /// Creates a new PgChatRoomRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for chat room queries.
#[derive(Debug, sqlx::FromRow)]
struct ChatRoomRow {
    id: i64,
    room_uid: Uuid,
    subject: Option<String>,
    category: String,
    priority: String,
    status: String,
    tags: Vec<String>,
    browser: Option<String>,
    device: Option<String>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    last_message_at: DateTime<Utc>,
}

impl ChatRoomRow {
    /// Converts database row to domain ChatRoom entity (participants
    /// loaded separately).
    fn into_room(self, participants: Vec<Participant>) -> ChatRoom {
        ChatRoom {
            id: self.id,
            room_uid: self.room_uid,
            subject: self.subject,
            category: RoomCategory::from_str(&self.category),
            priority: RoomPriority::from_str(&self.priority),
            status: RoomStatus::from_str(&self.status),
            tags: self.tags,
            metadata: RoomMetadata {
                browser: self.browser,
                device: self.device,
                ip_address: self.ip_address,
                user_agent: self.user_agent,
            },
            participants,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
            last_message_at: self.last_message_at,
        }
    }
}

/// Internal row type for participant queries.
#[derive(Debug, sqlx::FromRow)]
struct ParticipantRow {
    room_id: i64,
    user_id: i64,
    role: String,
    joined_at: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl ParticipantRow {
    fn into_participant(self) -> Participant {
        Participant {
            user_id: self.user_id,
            role: ParticipantRole::from_str(&self.role),
            joined_at: self.joined_at,
            last_seen: self.last_seen,
        }
    }
}

const ROOM_COLUMNS: &str = r#"
    id, room_uid, subject,
    category::text as category, priority::text as priority,
    status::text as status, tags,
    browser, device, ip_address, user_agent,
    created_at, updated_at, closed_at, last_message_at
"#;

/// Insert a message row inside an open transaction. Shared between the
/// room-creation and room-closing paths.
async fn insert_message_tx(
    tx: &mut Transaction<'static, Postgres>,
    message: &ChatMessage,
) -> Result<(), AppError> {
    let attachments = serde_json::to_value(&message.attachments)
        .map_err(|e| AppError::Internal(format!("Failed to encode attachments: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO chat_messages
            (id, room_id, sender_id, message_type, text, attachments,
             status, is_edited, edited_at, reply_to_id, mentions, created_at, updated_at)
        VALUES ($1, $2, $3, $4::message_type, $5, $6,
                $7::message_status, $8, $9, $10, $11, $12, $13)
        "#,
    )
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
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Insert a participant row inside an open transaction. The composite
/// primary key makes re-adding a no-op.
async fn insert_participant_tx(
    tx: &mut Transaction<'static, Postgres>,
    room_id: i64,
    participant: &Participant,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO room_participants (room_id, user_id, role, joined_at, last_seen)
        VALUES ($1, $2, $3::participant_role, $4, $5)
        ON CONFLICT (room_id, user_id) DO NOTHING
        "#,
    )
    .bind(room_id)
    .bind(participant.user_id)
    .bind(participant.role.as_str())
    .bind(participant.joined_at)
    .bind(participant.last_seen)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

impl PgChatRoomRepository {
    /// Load participants for a set of rooms, join order preserved.
    async fn load_participants(
        &self,
        room_ids: &[i64],
    ) -> Result<Vec<(i64, Participant)>, AppError> {
        let rows = sqlx::query_as::<_, ParticipantRow>(
            r#"
            SELECT room_id, user_id, role::text as role, joined_at, last_seen
            FROM room_participants
            WHERE room_id = ANY($1)
            ORDER BY joined_at ASC
            "#,
        )
        .bind(room_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.room_id, r.into_participant()))
            .collect())
    }
}

#[async_trait]
impl ChatRoomRepository for PgChatRoomRepository {
    /// Find a room by its public identifier.
    ///
    /// Returns None if the room does not exist.
    async fn find_by_uid(&self, room_uid: Uuid) -> Result<Option<ChatRoom>, AppError> {
        let row = sqlx::query_as::<_, ChatRoomRow>(&format!(
            "SELECT {} FROM chat_rooms WHERE room_uid = $1",
            ROOM_COLUMNS
        ))
        .bind(room_uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let participants = self
            .load_participants(&[row.id])
            .await?
            .into_iter()
            .map(|(_, p)| p)
            .collect();

        Ok(Some(row.into_room(participants)))
    }

    /// Create a room, its participants, and the initial system message
    /// in a single transaction: partial state is never persisted.
    async fn create_with_initial_message(
        &self,
        room: &ChatRoom,
        initial_message: &ChatMessage,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO chat_rooms
                (id, room_uid, subject, category, priority, status, tags,
                 browser, device, ip_address, user_agent,
                 created_at, updated_at, closed_at, last_message_at)
            VALUES ($1, $2, $3, $4::room_category, $5::room_priority, $6::room_status, $7,
                    $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(room.id)
        .bind(room.room_uid)
        .bind(&room.subject)
        .bind(room.category.as_str())
        .bind(room.priority.as_str())
        .bind(room.status.as_str())
        .bind(&room.tags)
        .bind(&room.metadata.browser)
        .bind(&room.metadata.device)
        .bind(&room.metadata.ip_address)
        .bind(&room.metadata.user_agent)
        .bind(room.created_at)
        .bind(room.updated_at)
        .bind(room.closed_at)
        .bind(room.last_message_at)
        .execute(&mut *tx)
        .await?;

        for participant in &room.participants {
            insert_participant_tx(&mut tx, room.id, participant).await?;
        }

        insert_message_tx(&mut tx, initial_message).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Insert a participant (idempotent) and optionally promote the
    /// room status in the same transaction.
    async fn add_participant(
        &self,
        room_id: i64,
        participant: &Participant,
        promote_to: Option<RoomStatus>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        insert_participant_tx(&mut tx, room_id, participant).await?;

        if let Some(status) = promote_to {
            // Guarded on the current status so a concurrent close wins
            sqlx::query(
                r#"
                UPDATE chat_rooms
                SET status = $2::room_status, updated_at = NOW()
                WHERE id = $1 AND status = 'pending'
                "#,
            )
            .bind(room_id)
            .bind(status.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Refresh a participant's last-seen timestamp.
    async fn update_last_seen(
        &self,
        room_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE room_participants
            SET last_seen = $3
            WHERE room_id = $1 AND user_id = $2
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark the room closed and append the closing system message.
    ///
    /// The status guard in the UPDATE enforces close-once at the write
    /// boundary: a concurrent or repeated close observes zero affected
    /// rows and fails with Conflict.
    async fn close_with_system_message(
        &self,
        room_id: i64,
        closed_at: DateTime<Utc>,
        closing_message: &ChatMessage,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE chat_rooms
            SET status = 'closed', closed_at = $2, updated_at = NOW()
            WHERE id = $1 AND status <> 'closed'
            "#,
        )
        .bind(room_id)
        .bind(closed_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Chat room is already closed".into()));
        }

        insert_message_tx(&mut tx, closing_message).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Advance the room's last message timestamp.
    ///
    /// GREATEST keeps the field monotone under concurrent sends.
    async fn touch_last_message(&self, room_id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE chat_rooms
            SET last_message_at = GREATEST(last_message_at, $2), updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(room_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Rooms where the user participates and status is pending/active,
    /// newest message first.
    async fn find_open_for_user(&self, user_id: i64) -> Result<Vec<ChatRoom>, AppError> {
        let rows = sqlx::query_as::<_, ChatRoomRow>(&format!(
            r#"
            SELECT {}
            FROM chat_rooms
            WHERE status IN ('pending', 'active')
              AND id IN (SELECT room_id FROM room_participants WHERE user_id = $1)
            ORDER BY last_message_at DESC
            "#,
            ROOM_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let room_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let participants = self.load_participants(&room_ids).await?;

        let rooms = rows
            .into_iter()
            .map(|row| {
                let room_id = row.id;
                let own: Vec<Participant> = participants
                    .iter()
                    .filter(|(id, _)| *id == room_id)
                    .map(|(_, p)| p.clone())
                    .collect();
                row.into_room(own)
            })
            .collect();

        Ok(rooms)
    }
}
