//! ChatRoom entity and repository trait.
//!
//! Maps to the `chat_rooms` and `room_participants` tables in the
//! database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::chat_message::ChatMessage;
use crate::shared::error::AppError;

#[cfg(test)]
use mockall::automock;

/// Maximum length of a room subject in characters.
pub const MAX_SUBJECT_LENGTH: usize = 200;

/// Room lifecycle states matching the PostgreSQL ENUM `room_status`.
///
/// Database definition:
/// ```sql
/// CREATE TYPE room_status AS ENUM ('pending', 'active', 'closed');
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Created by a customer, waiting for an agent
    #[default]
    Pending,
    /// An agent has joined; conversation in progress
    Active,
    /// Terminal state; no further mutation allowed
    Closed,
}

impl RoomStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => Self::Pending,
            "active" => Self::Active,
            "closed" => Self::Closed,
            _ => Self::Pending,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }

    /// States in which a room shows up in a user's active list.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Room categories matching the PostgreSQL ENUM `room_category`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomCategory {
    #[default]
    General,
    Technical,
    Medical,
    Billing,
    Other,
}

impl RoomCategory {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "general" => Self::General,
            "technical" => Self::Technical,
            "medical" => Self::Medical,
            "billing" => Self::Billing,
            _ => Self::Other,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Technical => "technical",
            Self::Medical => "medical",
            Self::Billing => "billing",
            Self::Other => "other",
        }
    }
}

/// Room priorities matching the PostgreSQL ENUM `room_priority`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoomPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl RoomPriority {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            "urgent" => Self::Urgent,
            _ => Self::Medium,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }
}

/// Roles a user can hold inside a room, matching the PostgreSQL ENUM
/// `participant_role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    #[default]
    Customer,
    Support,
    Doctor,
}

impl ParticipantRole {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "customer" => Self::Customer,
            "support" => Self::Support,
            "doctor" => Self::Doctor,
            _ => Self::Customer,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Support => "support",
            Self::Doctor => "doctor",
        }
    }

    /// Agent roles promote a pending room to active when they join.
    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Support | Self::Doctor)
    }
}

/// A user bound to a room.
///
/// Maps to the `room_participants` table; the composite primary key
/// (room_id, user_id) guarantees a user appears at most once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// User ID
    pub user_id: i64,

    /// Role within this room
    pub role: ParticipantRole,

    /// When the user joined the room
    pub joined_at: DateTime<Utc>,

    /// Last time the user was seen in the room
    pub last_seen: DateTime<Utc>,
}

impl Participant {
    /// Create a participant joining now.
    pub fn new(user_id: i64, role: ParticipantRole) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            role,
            joined_at: now,
            last_seen: now,
        }
    }
}

/// Client metadata captured when the room is opened.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomMetadata {
    pub browser: Option<String>,
    pub device: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Represents a support chat session.
///
/// Maps to the `chat_rooms` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - room_uid: UUID NOT NULL UNIQUE -- public identifier
/// - subject: VARCHAR(200)
/// - category: room_category NOT NULL DEFAULT 'general'
/// - priority: room_priority NOT NULL DEFAULT 'medium'
/// - status: room_status NOT NULL DEFAULT 'pending'
/// - tags: TEXT[] NOT NULL DEFAULT '{}'
/// - browser, device, ip_address, user_agent: TEXT NULL
/// - created_at, updated_at, last_message_at: TIMESTAMPTZ NOT NULL
/// - closed_at: TIMESTAMPTZ NULL -- set iff status = 'closed'
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRoom {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Public room identifier, distinct from the primary key
    pub room_uid: Uuid,

    /// What the session is about (up to 200 characters)
    pub subject: Option<String>,

    /// Room category
    pub category: RoomCategory,

    /// Room priority
    pub priority: RoomPriority,

    /// Lifecycle state
    pub status: RoomStatus,

    /// Free-form labels
    pub tags: Vec<String>,

    /// Client metadata captured at creation
    pub metadata: RoomMetadata,

    /// Participants, in join order
    pub participants: Vec<Participant>,

    /// Room creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Set exactly once, when the room is closed
    pub closed_at: Option<DateTime<Utc>>,

    /// Timestamp of the most recent message; never moves backwards
    pub last_message_at: DateTime<Utc>,
}

impl ChatRoom {
    /// Create a new room in `pending` status.
    pub fn new(
        id: i64,
        subject: Option<String>,
        category: RoomCategory,
        priority: RoomPriority,
        metadata: RoomMetadata,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            room_uid: Uuid::new_v4(),
            subject,
            category,
            priority,
            status: RoomStatus::Pending,
            tags: Vec::new(),
            metadata,
            participants: Vec::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            last_message_at: now,
        }
    }

    /// Whether the room has been closed.
    pub fn is_closed(&self) -> bool {
        matches!(self.status, RoomStatus::Closed)
    }

    /// Whether the given user is a participant.
    pub fn is_participant(&self, user_id: i64) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    /// Add a participant. Re-adding an existing user is a no-op.
    ///
    /// An agent joining a pending room promotes it to `active`.
    /// Returns the participant that was added, or `None` for the no-op.
    ///
    /// # Errors
    ///
    /// Fails with `Conflict` if the room is closed.
    pub fn add_participant(
        &mut self,
        user_id: i64,
        role: ParticipantRole,
    ) -> Result<Option<Participant>, AppError> {
        if self.is_closed() {
            return Err(AppError::Conflict("Chat room is closed".into()));
        }
        if self.is_participant(user_id) {
            return Ok(None);
        }

        let participant = Participant::new(user_id, role);
        self.participants.push(participant.clone());

        if role.is_agent() && self.status == RoomStatus::Pending {
            self.status = RoomStatus::Active;
        }

        Ok(Some(participant))
    }

    /// Refresh a participant's last-seen timestamp.
    ///
    /// Returns false when the user is not a participant.
    pub fn update_last_seen(&mut self, user_id: i64) -> bool {
        match self.participants.iter_mut().find(|p| p.user_id == user_id) {
            Some(p) => {
                p.last_seen = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Close the room. Terminal; there is no reopen.
    ///
    /// # Errors
    ///
    /// Fails with `Conflict` if the room is already closed.
    pub fn close(&mut self) -> Result<(), AppError> {
        if self.is_closed() {
            return Err(AppError::Conflict("Chat room is already closed".into()));
        }
        self.status = RoomStatus::Closed;
        self.closed_at = Some(Utc::now());
        Ok(())
    }

    /// Advance `last_message_at`, keeping it monotonically non-decreasing.
    pub fn record_message_at(&mut self, at: DateTime<Utc>) {
        if at > self.last_message_at {
            self.last_message_at = at;
        }
    }
}

/// Repository trait for ChatRoom data access operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatRoomRepository: Send + Sync {
    /// Find a room by its public identifier, participants included.
    async fn find_by_uid(&self, room_uid: Uuid) -> Result<Option<ChatRoom>, AppError>;

    /// Create a room together with its participants and the initial
    /// system message, atomically.
    async fn create_with_initial_message(
        &self,
        room: &ChatRoom,
        initial_message: &ChatMessage,
    ) -> Result<(), AppError>;

    /// Insert a participant (idempotent) and optionally promote the
    /// room status in the same transaction.
    async fn add_participant(
        &self,
        room_id: i64,
        participant: &Participant,
        promote_to: Option<RoomStatus>,
    ) -> Result<(), AppError>;

    /// Refresh a participant's last-seen timestamp.
    async fn update_last_seen(
        &self,
        room_id: i64,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Mark the room closed and append the closing system message,
    /// atomically. Fails with `Conflict` when the room is already
    /// closed (enforced at the write boundary).
    async fn close_with_system_message(
        &self,
        room_id: i64,
        closed_at: DateTime<Utc>,
        closing_message: &ChatMessage,
    ) -> Result<(), AppError>;

    /// Advance the room's `last_message_at` without regressing it.
    async fn touch_last_message(&self, room_id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    /// Rooms where the user participates and status is pending/active,
    /// newest message first.
    async fn find_open_for_user(&self, user_id: i64) -> Result<Vec<ChatRoom>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn room() -> ChatRoom {
        ChatRoom::new(
            1,
            Some("Order never arrived".into()),
            RoomCategory::General,
            RoomPriority::Medium,
            RoomMetadata::default(),
        )
    }

    #[test]
    fn test_new_room_is_pending() {
        let room = room();
        assert_eq!(room.status, RoomStatus::Pending);
        assert!(room.closed_at.is_none());
        assert!(room.participants.is_empty());
    }

    #[test]
    fn test_add_participant_is_idempotent() {
        let mut room = room();
        assert!(room
            .add_participant(7, ParticipantRole::Customer)
            .unwrap()
            .is_some());
        assert!(room
            .add_participant(7, ParticipantRole::Customer)
            .unwrap()
            .is_none());
        assert_eq!(room.participants.len(), 1);
    }

    #[test]
    fn test_customer_join_does_not_activate() {
        let mut room = room();
        room.add_participant(7, ParticipantRole::Customer).unwrap();
        assert_eq!(room.status, RoomStatus::Pending);
    }

    #[test]
    fn test_agent_join_activates_pending_room() {
        let mut room = room();
        room.add_participant(7, ParticipantRole::Customer).unwrap();
        room.add_participant(8, ParticipantRole::Support).unwrap();
        assert_eq!(room.status, RoomStatus::Active);

        // A third join is a no-op
        assert!(room
            .add_participant(8, ParticipantRole::Support)
            .unwrap()
            .is_none());
        assert_eq!(room.participants.len(), 2);
    }

    #[test]
    fn test_close_is_terminal() {
        let mut room = room();
        room.close().unwrap();
        assert_eq!(room.status, RoomStatus::Closed);
        assert!(room.closed_at.is_some());

        assert!(room.close().is_err());
        assert!(room.add_participant(9, ParticipantRole::Support).is_err());
    }

    #[test]
    fn test_last_message_at_is_monotone() {
        let mut room = room();
        let t1 = room.last_message_at + chrono::Duration::seconds(10);
        room.record_message_at(t1);
        assert_eq!(room.last_message_at, t1);

        // An older timestamp never regresses the field
        room.record_message_at(t1 - chrono::Duration::seconds(30));
        assert_eq!(room.last_message_at, t1);
    }

    #[test]
    fn test_update_last_seen() {
        let mut room = room();
        room.add_participant(7, ParticipantRole::Customer).unwrap();
        assert!(room.update_last_seen(7));
        assert!(!room.update_last_seen(99));
    }

    #[test]
    fn test_status_round_trip() {
        for status in [RoomStatus::Pending, RoomStatus::Active, RoomStatus::Closed] {
            assert_eq!(RoomStatus::from_str(status.as_str()), status);
        }
    }
}
