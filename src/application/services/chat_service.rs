//! Chat Service
//!
//! Orchestrates the chat session lifecycle: room creation, messaging,
//! history, read receipts, and closure.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Attachment, ChatMessage, ChatMessageRepository, ChatRoom, ChatRoomRepository, MessageType,
    ParticipantRole, RoomCategory, RoomMetadata, RoomPriority, User, UserRepository,
    MAX_SUBJECT_LENGTH, MAX_TEXT_LENGTH,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Text of the system message opening every room.
const SESSION_STARTED: &str = "Chat session started";

/// Text of the system message appended on closure.
const SESSION_CLOSED: &str = "Chat session closed";

/// Create room request
#[derive(Debug, Clone)]
pub struct CreateRoomDto {
    pub subject: Option<String>,
    pub category: RoomCategory,
    pub priority: RoomPriority,
    pub metadata: RoomMetadata,
}

/// Send message request
#[derive(Debug, Clone)]
pub struct SendMessageDto {
    pub room_uid: Uuid,
    pub text: String,
    pub message_type: MessageType,
    pub reply_to: Option<i64>,
}

/// A message paired with its resolved sender display fields.
#[derive(Debug, Clone)]
pub struct MessageWithSender {
    pub message: ChatMessage,
    pub sender: Option<User>,
}

/// Per-message outcome of a mark-read call. One failing message never
/// aborts the rest of the batch.
#[derive(Debug, Clone)]
pub struct MarkReadResult {
    pub message_id: i64,
    pub updated: bool,
    pub error: Option<String>,
}

/// Chat service trait
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Create a room in `pending` status with the requester as sole
    /// customer participant and the opening system message.
    async fn create_room(
        &self,
        requester: &User,
        request: CreateRoomDto,
    ) -> Result<(ChatRoom, ChatMessage), AppError>;

    /// Add a participant to a room; re-adding is a no-op. An agent
    /// joining a pending room activates it.
    async fn add_participant(
        &self,
        room_uid: Uuid,
        user_id: i64,
        role: ParticipantRole,
    ) -> Result<ChatRoom, AppError>;

    /// Send a message to a room and advance its last-message timestamp.
    async fn send_message(
        &self,
        sender: &User,
        request: SendMessageDto,
    ) -> Result<ChatMessage, AppError>;

    /// Fetch room history, newest first, with sender display fields
    /// resolved. Viewing refreshes the caller's last-seen marker.
    async fn get_history(
        &self,
        viewer: &User,
        room_uid: Uuid,
        limit: i32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessageWithSender>, AppError>;

    /// Record read receipts for the user, independently per message.
    async fn mark_read(&self, user: &User, message_ids: Vec<i64>) -> Vec<MarkReadResult>;

    /// Close a room (terminal) and append the closing system message.
    async fn close_room(&self, actor: &User, room_uid: Uuid) -> Result<(), AppError>;

    /// Rooms where the user participates and status is pending/active,
    /// newest message first.
    async fn list_active_rooms(&self, user: &User) -> Result<Vec<ChatRoom>, AppError>;

    /// Replace a message's text; only the sender may edit.
    async fn edit_message(
        &self,
        actor: &User,
        message_id: i64,
        new_text: String,
    ) -> Result<ChatMessage, AppError>;

    /// Append an attachment to a message; only the sender may attach.
    async fn add_attachment(
        &self,
        actor: &User,
        message_id: i64,
        attachment: Attachment,
    ) -> Result<ChatMessage, AppError>;
}

/// ChatService implementation over the repository traits.
pub struct ChatServiceImpl<R, M, U>
where
    R: ChatRoomRepository,
    M: ChatMessageRepository,
    U: UserRepository,
{
    room_repo: Arc<R>,
    message_repo: Arc<M>,
    user_repo: Arc<U>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<R, M, U> ChatServiceImpl<R, M, U>
where
    R: ChatRoomRepository,
    M: ChatMessageRepository,
    U: UserRepository,
{
    pub fn new(
        room_repo: Arc<R>,
        message_repo: Arc<M>,
        user_repo: Arc<U>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            room_repo,
            message_repo,
            user_repo,
            id_generator,
        }
    }

    async fn require_room(&self, room_uid: Uuid) -> Result<ChatRoom, AppError> {
        self.room_repo
            .find_by_uid(room_uid)
            .await?
            .ok_or_else(|| AppError::NotFound("Chat room not found".into()))
    }

    async fn require_message(&self, message_id: i64) -> Result<ChatMessage, AppError> {
        self.message_repo
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".into()))
    }
}

#[async_trait]
impl<R, M, U> ChatService for ChatServiceImpl<R, M, U>
where
    R: ChatRoomRepository + 'static,
    M: ChatMessageRepository + 'static,
    U: UserRepository + 'static,
{
    async fn create_room(
        &self,
        requester: &User,
        request: CreateRoomDto,
    ) -> Result<(ChatRoom, ChatMessage), AppError> {
        if let Some(subject) = &request.subject {
            if subject.chars().count() > MAX_SUBJECT_LENGTH {
                return Err(AppError::Validation(
                    "Subject cannot exceed 200 characters".into(),
                ));
            }
        }

        let mut room = ChatRoom::new(
            self.id_generator.generate(),
            request.subject,
            request.category,
            request.priority,
            request.metadata,
        );
        room.add_participant(requester.id, ParticipantRole::Customer)?;

        let initial_message = ChatMessage::system(
            self.id_generator.generate(),
            room.id,
            requester.id,
            SESSION_STARTED,
        );

        // Room, participant, and opening message land atomically
        self.room_repo
            .create_with_initial_message(&room, &initial_message)
            .await?;

        Ok((room, initial_message))
    }

    async fn add_participant(
        &self,
        room_uid: Uuid,
        user_id: i64,
        role: ParticipantRole,
    ) -> Result<ChatRoom, AppError> {
        let mut room = self.require_room(room_uid).await?;
        let before = room.status;

        let Some(participant) = room.add_participant(user_id, role)? else {
            // Already a participant
            return Ok(room);
        };

        let promote_to = (room.status != before).then_some(room.status);
        self.room_repo
            .add_participant(room.id, &participant, promote_to)
            .await?;

        Ok(room)
    }

    async fn send_message(
        &self,
        sender: &User,
        request: SendMessageDto,
    ) -> Result<ChatMessage, AppError> {
        let room = self.require_room(request.room_uid).await?;
        if room.is_closed() {
            return Err(AppError::Conflict("Chat room is closed".into()));
        }

        if request.text.chars().count() > MAX_TEXT_LENGTH {
            return Err(AppError::Validation(
                "Message text cannot exceed 5000 characters".into(),
            ));
        }

        let message = ChatMessage::new(
            self.id_generator.generate(),
            room.id,
            sender.id,
            request.message_type,
            Some(request.text),
            request.reply_to,
        );

        let created = self.message_repo.create(&message).await?;
        self.room_repo
            .touch_last_message(room.id, created.created_at)
            .await?;

        Ok(created)
    }

    async fn get_history(
        &self,
        viewer: &User,
        room_uid: Uuid,
        limit: i32,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<MessageWithSender>, AppError> {
        let room = self.require_room(room_uid).await?;

        let messages = self
            .message_repo
            .find_by_room(room.id, limit, before)
            .await?;

        // Resolve sender display fields in one query
        let mut sender_ids: Vec<i64> = messages.iter().map(|m| m.sender_id).collect();
        sender_ids.sort_unstable();
        sender_ids.dedup();
        let senders = self.user_repo.find_display_fields(sender_ids).await?;

        // Viewing the history counts as being seen in the room
        if room.is_participant(viewer.id) {
            self.room_repo
                .update_last_seen(room.id, viewer.id, Utc::now())
                .await?;
        }

        Ok(messages
            .into_iter()
            .map(|message| {
                let sender = senders.iter().find(|u| u.id == message.sender_id).cloned();
                MessageWithSender { message, sender }
            })
            .collect())
    }

    async fn mark_read(&self, user: &User, message_ids: Vec<i64>) -> Vec<MarkReadResult> {
        let mut results = Vec::with_capacity(message_ids.len());

        for message_id in message_ids {
            match self
                .message_repo
                .mark_read(message_id, user.id, Utc::now())
                .await
            {
                Ok(updated) => results.push(MarkReadResult {
                    message_id,
                    updated,
                    error: None,
                }),
                Err(e) => {
                    tracing::warn!(message_id, "Failed to mark message read: {}", e);
                    results.push(MarkReadResult {
                        message_id,
                        updated: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        results
    }

    async fn close_room(&self, actor: &User, room_uid: Uuid) -> Result<(), AppError> {
        let mut room = self.require_room(room_uid).await?;
        room.close()?;

        let closing_message = ChatMessage::system(
            self.id_generator.generate(),
            room.id,
            actor.id,
            SESSION_CLOSED,
        );

        // The repository re-checks the status guard inside the
        // transaction, so a racing close still fails with Conflict.
        self.room_repo
            .close_with_system_message(
                room.id,
                room.closed_at.unwrap_or_else(Utc::now),
                &closing_message,
            )
            .await
    }

    async fn list_active_rooms(&self, user: &User) -> Result<Vec<ChatRoom>, AppError> {
        self.room_repo.find_open_for_user(user.id).await
    }

    async fn edit_message(
        &self,
        actor: &User,
        message_id: i64,
        new_text: String,
    ) -> Result<ChatMessage, AppError> {
        if new_text.chars().count() > MAX_TEXT_LENGTH {
            return Err(AppError::Validation(
                "Message text cannot exceed 5000 characters".into(),
            ));
        }

        let mut message = self.require_message(message_id).await?;
        if message.sender_id != actor.id {
            return Err(AppError::Forbidden(
                "Only the sender can edit a message".into(),
            ));
        }

        message.edit(new_text);
        self.message_repo.update_content(&message).await
    }

    async fn add_attachment(
        &self,
        actor: &User,
        message_id: i64,
        attachment: Attachment,
    ) -> Result<ChatMessage, AppError> {
        let mut message = self.require_message(message_id).await?;
        if message.sender_id != actor.id {
            return Err(AppError::Forbidden(
                "Only the sender can attach to a message".into(),
            ));
        }

        message.add_attachment(attachment);
        self.message_repo.update_content(&message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        MessageStatus, MockChatMessageRepository, MockChatRoomRepository, MockUserRepository,
        RoomStatus, UserRole,
    };
    use mockall::predicate::eq;

    fn customer() -> User {
        User {
            id: 7,
            name: "Jane".into(),
            email: "jane@example.com".into(),
            role: UserRole::Customer,
            is_active: true,
            is_email_verified: true,
            ..Default::default()
        }
    }

    fn service(
        room_repo: MockChatRoomRepository,
        message_repo: MockChatMessageRepository,
        user_repo: MockUserRepository,
    ) -> ChatServiceImpl<MockChatRoomRepository, MockChatMessageRepository, MockUserRepository>
    {
        ChatServiceImpl::new(
            Arc::new(room_repo),
            Arc::new(message_repo),
            Arc::new(user_repo),
            Arc::new(SnowflakeGenerator::new(1, 0)),
        )
    }

    fn pending_room(uid: Uuid, customer_id: i64) -> ChatRoom {
        let mut room = ChatRoom::new(
            100,
            Some("help".into()),
            RoomCategory::General,
            RoomPriority::Medium,
            RoomMetadata::default(),
        );
        room.room_uid = uid;
        room.add_participant(customer_id, ParticipantRole::Customer)
            .unwrap();
        room
    }

    #[tokio::test]
    async fn test_create_room_pending_with_system_message() {
        let mut room_repo = MockChatRoomRepository::new();
        room_repo
            .expect_create_with_initial_message()
            .withf(|room, message| {
                room.status == RoomStatus::Pending
                    && room.participants.len() == 1
                    && room.participants[0].role == ParticipantRole::Customer
                    && message.room_id == room.id
                    && message.message_type == MessageType::System
                    && message.text.as_deref() == Some("Chat session started")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let svc = service(
            room_repo,
            MockChatMessageRepository::new(),
            MockUserRepository::new(),
        );

        let (room, message) = svc
            .create_room(
                &customer(),
                CreateRoomDto {
                    subject: Some("Order never arrived".into()),
                    category: RoomCategory::General,
                    priority: RoomPriority::High,
                    metadata: RoomMetadata::default(),
                },
            )
            .await
            .unwrap();

        assert_eq!(room.status, RoomStatus::Pending);
        assert_eq!(room.participants.len(), 1);
        assert_eq!(message.room_id, room.id);
    }

    #[tokio::test]
    async fn test_create_room_rejects_long_subject() {
        // No expectations: any repository call would panic the mock
        let svc = service(
            MockChatRoomRepository::new(),
            MockChatMessageRepository::new(),
            MockUserRepository::new(),
        );

        let result = svc
            .create_room(
                &customer(),
                CreateRoomDto {
                    subject: Some("x".repeat(201)),
                    category: RoomCategory::General,
                    priority: RoomPriority::Medium,
                    metadata: RoomMetadata::default(),
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_send_message_to_missing_room_is_not_found() {
        let uid = Uuid::new_v4();
        let mut room_repo = MockChatRoomRepository::new();
        room_repo
            .expect_find_by_uid()
            .with(eq(uid))
            .times(1)
            .returning(|_| Ok(None));

        // Message repo must never be touched
        let svc = service(
            room_repo,
            MockChatMessageRepository::new(),
            MockUserRepository::new(),
        );

        let result = svc
            .send_message(
                &customer(),
                SendMessageDto {
                    room_uid: uid,
                    text: "hello".into(),
                    message_type: MessageType::Text,
                    reply_to: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_send_message_updates_last_message_at() {
        let uid = Uuid::new_v4();
        let mut room_repo = MockChatRoomRepository::new();
        room_repo
            .expect_find_by_uid()
            .returning(move |_| Ok(Some(pending_room(uid, 7))));
        room_repo
            .expect_touch_last_message()
            .with(eq(100i64), mockall::predicate::always())
            .times(1)
            .returning(|_, _| Ok(()));

        let mut message_repo = MockChatMessageRepository::new();
        message_repo
            .expect_create()
            .withf(|m| m.room_id == 100 && m.sender_id == 7 && m.status == MessageStatus::Sent)
            .times(1)
            .returning(|m| Ok(m.clone()));

        let svc = service(room_repo, message_repo, MockUserRepository::new());

        let message = svc
            .send_message(
                &customer(),
                SendMessageDto {
                    room_uid: uid,
                    text: "hello".into(),
                    message_type: MessageType::Text,
                    reply_to: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(message.text.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_send_message_to_closed_room_is_conflict() {
        let uid = Uuid::new_v4();
        let mut room_repo = MockChatRoomRepository::new();
        room_repo.expect_find_by_uid().returning(move |_| {
            let mut room = pending_room(uid, 7);
            room.close().unwrap();
            Ok(Some(room))
        });

        let svc = service(
            room_repo,
            MockChatMessageRepository::new(),
            MockUserRepository::new(),
        );

        let result = svc
            .send_message(
                &customer(),
                SendMessageDto {
                    room_uid: uid,
                    text: "hello".into(),
                    message_type: MessageType::Text,
                    reply_to: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_agent_join_promotes_room() {
        let uid = Uuid::new_v4();
        let mut room_repo = MockChatRoomRepository::new();
        room_repo
            .expect_find_by_uid()
            .returning(move |_| Ok(Some(pending_room(uid, 7))));
        room_repo
            .expect_add_participant()
            .withf(|room_id, participant, promote_to| {
                *room_id == 100
                    && participant.user_id == 8
                    && *promote_to == Some(RoomStatus::Active)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let svc = service(
            room_repo,
            MockChatMessageRepository::new(),
            MockUserRepository::new(),
        );

        let room = svc
            .add_participant(uid, 8, ParticipantRole::Support)
            .await
            .unwrap();
        assert_eq!(room.status, RoomStatus::Active);
    }

    #[tokio::test]
    async fn test_readd_participant_is_noop() {
        let uid = Uuid::new_v4();
        let mut room_repo = MockChatRoomRepository::new();
        room_repo
            .expect_find_by_uid()
            .returning(move |_| Ok(Some(pending_room(uid, 7))));
        // No expect_add_participant: the no-op path must not persist

        let svc = service(
            room_repo,
            MockChatMessageRepository::new(),
            MockUserRepository::new(),
        );

        let room = svc
            .add_participant(uid, 7, ParticipantRole::Customer)
            .await
            .unwrap();
        assert_eq!(room.participants.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_read_partial_failure_continues() {
        let mut message_repo = MockChatMessageRepository::new();
        message_repo
            .expect_mark_read()
            .withf(|id, _, _| *id == 1)
            .returning(|_, _, _| Ok(true));
        message_repo
            .expect_mark_read()
            .withf(|id, _, _| *id == 2)
            .returning(|_, _, _| Err(AppError::NotFound("Message not found".into())));
        message_repo
            .expect_mark_read()
            .withf(|id, _, _| *id == 3)
            .returning(|_, _, _| Ok(false));

        let svc = service(
            MockChatRoomRepository::new(),
            message_repo,
            MockUserRepository::new(),
        );

        let results = svc.mark_read(&customer(), vec![1, 2, 3]).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].updated);
        assert!(results[1].error.is_some());
        // The failure on message 2 did not stop message 3
        assert!(!results[2].updated);
        assert!(results[2].error.is_none());
    }

    #[tokio::test]
    async fn test_close_room_appends_system_message() {
        let uid = Uuid::new_v4();
        let mut room_repo = MockChatRoomRepository::new();
        room_repo
            .expect_find_by_uid()
            .returning(move |_| Ok(Some(pending_room(uid, 7))));
        room_repo
            .expect_close_with_system_message()
            .withf(|room_id, _, message| {
                *room_id == 100
                    && message.message_type == MessageType::System
                    && message.text.as_deref() == Some("Chat session closed")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let svc = service(
            room_repo,
            MockChatMessageRepository::new(),
            MockUserRepository::new(),
        );

        svc.close_room(&customer(), uid).await.unwrap();
    }

    #[tokio::test]
    async fn test_close_already_closed_room_is_conflict() {
        let uid = Uuid::new_v4();
        let mut room_repo = MockChatRoomRepository::new();
        room_repo.expect_find_by_uid().returning(move |_| {
            let mut room = pending_room(uid, 7);
            room.close().unwrap();
            Ok(Some(room))
        });
        // close_with_system_message must never run

        let svc = service(
            room_repo,
            MockChatMessageRepository::new(),
            MockUserRepository::new(),
        );

        let result = svc.close_room(&customer(), uid).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_get_history_resolves_senders_and_refreshes_last_seen() {
        let uid = Uuid::new_v4();
        let mut room_repo = MockChatRoomRepository::new();
        room_repo
            .expect_find_by_uid()
            .returning(move |_| Ok(Some(pending_room(uid, 7))));
        room_repo
            .expect_update_last_seen()
            .with(eq(100i64), eq(7i64), mockall::predicate::always())
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut message_repo = MockChatMessageRepository::new();
        message_repo
            .expect_find_by_room()
            .with(eq(100i64), eq(2i32), eq(None::<DateTime<Utc>>))
            .times(1)
            .returning(|_, _, _| {
                Ok(vec![
                    ChatMessage::new(2, 100, 7, MessageType::Text, Some("later".into()), None),
                    ChatMessage::new(1, 100, 7, MessageType::Text, Some("earlier".into()), None),
                ])
            });

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_display_fields()
            .with(eq(vec![7i64]))
            .times(1)
            .returning(|_| Ok(vec![customer()]));

        let svc = service(room_repo, message_repo, user_repo);

        let history = svc.get_history(&customer(), uid, 2, None).await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message.id, 2);
        assert_eq!(
            history[0].sender.as_ref().map(|u| u.name.as_str()),
            Some("Jane")
        );
    }

    #[tokio::test]
    async fn test_edit_message_requires_sender() {
        let mut message_repo = MockChatMessageRepository::new();
        message_repo.expect_find_by_id().returning(|_| {
            Ok(Some(ChatMessage::new(
                1,
                100,
                99, // someone else's message
                MessageType::Text,
                Some("original".into()),
                None,
            )))
        });

        let svc = service(
            MockChatRoomRepository::new(),
            message_repo,
            MockUserRepository::new(),
        );

        let result = svc.edit_message(&customer(), 1, "hijack".into()).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
