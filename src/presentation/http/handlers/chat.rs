//! Chat Handlers
//!
//! HTTP endpoints for the chat session lifecycle.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::{header::USER_AGENT, HeaderMap, StatusCode},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::application::dto::request::{
    CreateRoomRequest, HistoryQueryParams, MarkReadRequest, SendMessageRequest,
};
use crate::application::dto::response::{
    ApiResponse, CreatedRoomResponse, MarkReadOutcome, MessageResponse, RoomResponse,
};
use crate::application::services::{
    ChatService, ChatServiceImpl, CreateRoomDto, SendMessageDto,
};
use crate::domain::{MessageType, RoomMetadata};
use crate::infrastructure::repositories::{
    PgChatMessageRepository, PgChatRoomRepository, PgUserRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

fn chat_service(
    state: &AppState,
) -> ChatServiceImpl<PgChatRoomRepository, PgChatMessageRepository, PgUserRepository> {
    ChatServiceImpl::new(
        Arc::new(PgChatRoomRepository::new(state.db.clone())),
        Arc::new(PgChatMessageRepository::new(state.db.clone())),
        Arc::new(PgUserRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

/// Client metadata captured from request headers.
fn room_metadata(headers: &HeaderMap) -> RoomMetadata {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(String::from);
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string());

    RoomMetadata {
        browser: user_agent.clone(),
        device: None,
        ip_address,
        user_agent,
    }
}

/// POST /api/v1/chat/rooms
///
/// Create a chat room; the caller becomes its customer participant and
/// the opening system message is written alongside.
pub async fn create_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    headers: HeaderMap,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CreatedRoomResponse>>), AppError> {
    body.validate().map_err(validation_error)?;

    let service = chat_service(&state);
    let (room, initial_message) = service
        .create_room(
            &auth.user,
            CreateRoomDto {
                subject: body.subject,
                category: body.category.unwrap_or_default(),
                priority: body.priority.unwrap_or_default(),
                metadata: room_metadata(&headers),
            },
        )
        .await?;

    tracing::info!(room_uid = %room.room_uid, user_id = auth.user.id, "Chat room created");

    let response = CreatedRoomResponse {
        chat_room: RoomResponse::from(room),
        initial_message: MessageResponse::from(initial_message),
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// GET /api/v1/chat/rooms/active
///
/// Rooms where the caller participates and status is pending/active,
/// newest message first.
pub async fn get_active_rooms(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<RoomResponse>>>, AppError> {
    let service = chat_service(&state);
    let rooms = service.list_active_rooms(&auth.user).await?;

    let responses: Vec<RoomResponse> = rooms.into_iter().map(RoomResponse::from).collect();
    Ok(Json(ApiResponse::success(responses)))
}

/// POST /api/v1/chat/rooms/{room_uid}/close
///
/// Close a room. Terminal: re-closing fails with 409.
pub async fn close_room(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_uid): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let service = chat_service(&state);
    service.close_room(&auth.user, room_uid).await?;

    tracing::info!(%room_uid, user_id = auth.user.id, "Chat room closed");

    Ok(Json(ApiResponse::message("Chat room closed successfully")))
}

/// POST /api/v1/chat/messages
///
/// Send a message to a room.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MessageResponse>>), AppError> {
    body.validate().map_err(validation_error)?;

    let reply_to = match &body.reply_to {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| AppError::BadRequest("Invalid reply_to message ID".into()))?,
        ),
        None => None,
    };

    let service = chat_service(&state);
    let message = service
        .send_message(
            &auth.user,
            SendMessageDto {
                room_uid: body.room_id,
                text: body.content,
                message_type: body.message_type.unwrap_or(MessageType::Text),
                reply_to,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(MessageResponse::from(message))),
    ))
}

/// GET /api/v1/chat/rooms/{room_uid}/messages
///
/// Room history, newest first, bounded by `limit` and the optional
/// `before` cursor.
pub async fn get_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(room_uid): Path<Uuid>,
    Query(query): Query<HistoryQueryParams>,
) -> Result<Json<ApiResponse<Vec<MessageResponse>>>, AppError> {
    let limit = state.settings.chat.clamp_history_limit(query.limit);

    let service = chat_service(&state);
    let history = service
        .get_history(&auth.user, room_uid, limit, query.before)
        .await?;

    let responses: Vec<MessageResponse> = history
        .into_iter()
        .map(|entry| MessageResponse::from_message(entry.message, entry.sender))
        .collect();

    Ok(Json(ApiResponse::success(responses)))
}

/// POST /api/v1/chat/messages/read
///
/// Record read receipts for the caller. Outcomes are reported per
/// message; one failure does not abort the rest.
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<MarkReadRequest>,
) -> Result<Json<ApiResponse<Vec<MarkReadOutcome>>>, AppError> {
    body.validate().map_err(validation_error)?;

    let mut outcomes = Vec::with_capacity(body.message_ids.len());
    let mut parsed_ids = Vec::new();

    for raw in &body.message_ids {
        match raw.parse::<i64>() {
            Ok(id) => parsed_ids.push(id),
            Err(_) => outcomes.push(MarkReadOutcome {
                message_id: raw.clone(),
                updated: false,
                error: Some("Invalid message ID".into()),
            }),
        }
    }

    let service = chat_service(&state);
    let results = service.mark_read(&auth.user, parsed_ids).await;

    outcomes.extend(results.into_iter().map(|r| MarkReadOutcome {
        message_id: r.message_id.to_string(),
        updated: r.updated,
        error: r.error,
    }));

    Ok(Json(ApiResponse::success(outcomes)))
}
