//! Response DTOs
//!
//! Data structures for API response bodies. Every endpoint wraps its
//! payload in the `ApiResponse` envelope.

use serde::Serialize;

use crate::domain::{
    Attachment, ChatMessage, ChatRoom, Participant, ShippingAddress, ShippingMethod,
    ShippingOrder, StatusHistoryEntry, User,
};

/// Success envelope: `{"status": "success", "data": ...}` or
/// `{"status": "success", "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Envelope carrying a data payload.
    pub fn success(data: T) -> Self {
        Self {
            status: "success",
            data: Some(data),
            message: None,
        }
    }
}

impl ApiResponse<()> {
    /// Envelope carrying only a human-readable message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Participant response
#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub user_id: String,
    pub role: String,
    pub joined_at: String,
    pub last_seen: String,
}

impl From<Participant> for ParticipantResponse {
    fn from(p: Participant) -> Self {
        Self {
            user_id: p.user_id.to_string(),
            role: p.role.as_str().to_string(),
            joined_at: p.joined_at.to_rfc3339(),
            last_seen: p.last_seen.to_rfc3339(),
        }
    }
}

/// Chat room response
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: String,
    pub room_id: String,
    pub subject: Option<String>,
    pub category: String,
    pub priority: String,
    pub status: String,
    pub tags: Vec<String>,
    pub participants: Vec<ParticipantResponse>,
    pub created_at: String,
    pub closed_at: Option<String>,
    pub last_message_at: String,
}

impl From<ChatRoom> for RoomResponse {
    fn from(room: ChatRoom) -> Self {
        Self {
            id: room.id.to_string(),
            room_id: room.room_uid.to_string(),
            subject: room.subject,
            category: room.category.as_str().to_string(),
            priority: room.priority.as_str().to_string(),
            status: room.status.as_str().to_string(),
            tags: room.tags,
            participants: room
                .participants
                .into_iter()
                .map(ParticipantResponse::from)
                .collect(),
            created_at: room.created_at.to_rfc3339(),
            closed_at: room.closed_at.map(|t| t.to_rfc3339()),
            last_message_at: room.last_message_at.to_rfc3339(),
        }
    }
}

/// Sender display fields resolved onto a message
#[derive(Debug, Serialize)]
pub struct SenderResponse {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<User> for SenderResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name,
            email: user.email,
        }
    }
}

/// Read receipt response
#[derive(Debug, Serialize)]
pub struct ReadReceiptResponse {
    pub user_id: String,
    pub read_at: String,
}

/// Chat message response
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: String,
    pub room_id: String,
    pub sender_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<SenderResponse>,
    #[serde(rename = "type")]
    pub message_type: String,
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    pub status: String,
    pub read_by: Vec<ReadReceiptResponse>,
    pub is_edited: bool,
    pub edited_at: Option<String>,
    pub reply_to_id: Option<String>,
    pub mentions: Vec<String>,
    pub created_at: String,
}

impl MessageResponse {
    /// Build from a message, optionally resolving the sender.
    pub fn from_message(message: ChatMessage, sender: Option<User>) -> Self {
        Self {
            id: message.id.to_string(),
            room_id: message.room_id.to_string(),
            sender_id: message.sender_id.to_string(),
            sender: sender.map(SenderResponse::from),
            message_type: message.message_type.as_str().to_string(),
            text: message.text,
            attachments: message.attachments,
            status: message.status.as_str().to_string(),
            read_by: message
                .read_by
                .into_iter()
                .map(|r| ReadReceiptResponse {
                    user_id: r.user_id.to_string(),
                    read_at: r.read_at.to_rfc3339(),
                })
                .collect(),
            is_edited: message.is_edited,
            edited_at: message.edited_at.map(|t| t.to_rfc3339()),
            reply_to_id: message.reply_to_id.map(|id| id.to_string()),
            mentions: message.mentions.iter().map(|id| id.to_string()).collect(),
            created_at: message.created_at.to_rfc3339(),
        }
    }
}

impl From<ChatMessage> for MessageResponse {
    fn from(message: ChatMessage) -> Self {
        Self::from_message(message, None)
    }
}

/// Room creation response: the room plus its initial system message
#[derive(Debug, Serialize)]
pub struct CreatedRoomResponse {
    pub chat_room: RoomResponse,
    pub initial_message: MessageResponse,
}

/// Per-message outcome of a mark-read request
#[derive(Debug, Serialize)]
pub struct MarkReadOutcome {
    pub message_id: String,
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Shipping address response
#[derive(Debug, Serialize)]
pub struct AddressResponse {
    pub id: String,
    pub full_name: String,
    pub phone_number: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
    pub created_at: String,
}

impl From<ShippingAddress> for AddressResponse {
    fn from(a: ShippingAddress) -> Self {
        Self {
            id: a.id.to_string(),
            full_name: a.full_name,
            phone_number: a.phone_number,
            address_line1: a.address_line1,
            address_line2: a.address_line2,
            city: a.city,
            state: a.state,
            postal_code: a.postal_code,
            country: a.country,
            is_default: a.is_default,
            created_at: a.created_at.to_rfc3339(),
        }
    }
}

/// Shipping method response
#[derive(Debug, Serialize)]
pub struct MethodResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub base_price: f64,
    pub price_per_kg: f64,
    pub estimated_days_min: i32,
    pub estimated_days_max: i32,
    pub max_weight: f64,
}

impl From<ShippingMethod> for MethodResponse {
    fn from(m: ShippingMethod) -> Self {
        Self {
            id: m.id.to_string(),
            name: m.name,
            description: m.description,
            base_price: m.base_price,
            price_per_kg: m.price_per_kg,
            estimated_days_min: m.estimated_days.min,
            estimated_days_max: m.estimated_days.max,
            max_weight: m.restrictions.max_weight,
        }
    }
}

/// Status history entry response
#[derive(Debug, Serialize)]
pub struct HistoryEntryResponse {
    pub status: String,
    pub timestamp: String,
    pub note: Option<String>,
}

impl From<StatusHistoryEntry> for HistoryEntryResponse {
    fn from(e: StatusHistoryEntry) -> Self {
        Self {
            status: e.status.as_str().to_string(),
            timestamp: e.timestamp.to_rfc3339(),
            note: e.note,
        }
    }
}

/// Shipping order response
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_ref: String,
    pub address_id: String,
    pub method_id: String,
    pub tracking_number: Option<String>,
    pub status: String,
    pub status_history: Vec<HistoryEntryResponse>,
    pub weight: f64,
    pub shipping_cost: f64,
    pub estimated_delivery_date: Option<String>,
    pub actual_delivery_date: Option<String>,
    pub created_at: String,
}

impl From<ShippingOrder> for OrderResponse {
    fn from(o: ShippingOrder) -> Self {
        // Newest history entry first in the API shape
        let mut history: Vec<HistoryEntryResponse> = o
            .status_history
            .into_iter()
            .map(HistoryEntryResponse::from)
            .collect();
        history.reverse();

        Self {
            id: o.id.to_string(),
            order_ref: o.order_ref.to_string(),
            address_id: o.address_id.to_string(),
            method_id: o.method_id.to_string(),
            tracking_number: o.tracking_number,
            status: o.status.as_str().to_string(),
            status_history: history,
            weight: o.package.weight,
            shipping_cost: o.shipping_cost,
            estimated_delivery_date: o.estimated_delivery_date.map(|t| t.to_rfc3339()),
            actual_delivery_date: o.actual_delivery_date.map(|t| t.to_rfc3339()),
            created_at: o.created_at.to_rfc3339(),
        }
    }
}
