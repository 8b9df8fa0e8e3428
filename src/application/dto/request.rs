//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::Validate;

use crate::domain::{MessageType, RoomCategory, RoomPriority, ShippingStatus};
use crate::shared::validation::{PHONE_NUMBER_RE, POSTAL_CODE_RE};

/// Create chat room request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoomRequest {
    #[validate(length(max = 200, message = "Subject cannot exceed 200 characters"))]
    pub subject: Option<String>,

    pub category: Option<RoomCategory>,

    pub priority: Option<RoomPriority>,
}

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    /// Public room identifier
    pub room_id: uuid::Uuid,

    #[validate(length(min = 1, max = 5000, message = "Content must be 1-5000 characters"))]
    pub content: String,

    #[serde(rename = "type")]
    pub message_type: Option<MessageType>,

    /// ID of the message being replied to
    pub reply_to: Option<String>,
}

/// Mark messages read request
#[derive(Debug, Deserialize, Validate)]
pub struct MarkReadRequest {
    #[validate(length(min = 1, message = "At least one message ID is required"))]
    pub message_ids: Vec<String>,
}

/// Chat history query parameters
#[derive(Debug, Deserialize)]
pub struct HistoryQueryParams {
    pub limit: Option<i32>,
    /// Only messages created strictly before this instant
    pub before: Option<chrono::DateTime<chrono::Utc>>,
}

/// Create shipping address request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAddressRequest {
    #[validate(length(min = 2, max = 100, message = "Full name must be 2-100 characters"))]
    pub full_name: String,

    #[validate(regex(path = *PHONE_NUMBER_RE, message = "Invalid phone number format"))]
    pub phone_number: String,

    #[validate(length(min = 1, max = 100, message = "Address line 1 must be 1-100 characters"))]
    pub address_line1: String,

    #[validate(length(max = 100, message = "Address line 2 cannot exceed 100 characters"))]
    pub address_line2: Option<String>,

    #[validate(length(min = 1, max = 50, message = "City must be 1-50 characters"))]
    pub city: String,

    #[validate(length(min = 1, max = 50, message = "State must be 1-50 characters"))]
    pub state: String,

    #[validate(regex(path = *POSTAL_CODE_RE, message = "Invalid postal code format"))]
    pub postal_code: String,

    #[validate(length(min = 1, max = 50, message = "Country must be 1-50 characters"))]
    pub country: String,

    #[serde(default)]
    pub is_default: bool,
}

/// Create shipping order request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// Upstream order identifier
    pub order_ref: String,

    pub address_id: String,

    pub method_id: String,

    #[validate(range(min = 0.0, message = "Weight cannot be negative"))]
    pub weight: f64,

    #[validate(range(min = 0.0, message = "Length cannot be negative"))]
    pub length: f64,

    #[validate(range(min = 0.0, message = "Width cannot be negative"))]
    pub width: f64,

    #[validate(range(min = 0.0, message = "Height cannot be negative"))]
    pub height: f64,

    #[validate(length(max = 500, message = "Notes cannot exceed 500 characters"))]
    pub notes: Option<String>,
}

/// Update shipping status request
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: ShippingStatus,

    #[validate(length(max = 500, message = "Note cannot exceed 500 characters"))]
    pub note: Option<String>,
}

/// Assign tracking number request
#[derive(Debug, Deserialize, Validate)]
pub struct AssignTrackingRequest {
    #[validate(length(min = 1, max = 64, message = "Tracking number must be 1-64 characters"))]
    pub tracking_number: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_length_bound() {
        let req = CreateRoomRequest {
            subject: Some("x".repeat(201)),
            category: None,
            priority: None,
        };
        assert!(req.validate().is_err());

        let req = CreateRoomRequest {
            subject: Some("x".repeat(200)),
            category: None,
            priority: None,
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_address_format_validation() {
        let mut req = CreateAddressRequest {
            full_name: "Jane Doe".into(),
            phone_number: "555-123-4567".into(),
            address_line1: "1 Main St".into(),
            address_line2: None,
            city: "Springfield".into(),
            state: "IL".into(),
            postal_code: "62704".into(),
            country: "USA".into(),
            is_default: false,
        };
        assert!(req.validate().is_ok());

        req.phone_number = "not-a-phone".into();
        assert!(req.validate().is_err());

        req.phone_number = "555-123-4567".into();
        req.postal_code = "abc".into();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_order_weight_bound() {
        let req = CreateOrderRequest {
            order_ref: "1".into(),
            address_id: "2".into(),
            method_id: "3".into(),
            weight: -1.0,
            length: 1.0,
            width: 1.0,
            height: 1.0,
            notes: None,
        };
        assert!(req.validate().is_err());
    }
}
