//! ShippingOrder entity and repository trait.
//!
//! Maps to the `shipping_orders` and `shipping_status_history` tables.
//! Status changes go through an explicit transition table; the history
//! is an append-only audit log whose newest row always matches the
//! order's current status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[cfg(test)]
use mockall::automock;

/// Maximum length of the order notes field.
pub const MAX_NOTES_LENGTH: usize = 500;

/// Shipping states matching the PostgreSQL ENUM `shipping_status`.
///
/// Database definition:
/// ```sql
/// CREATE TYPE shipping_status AS ENUM (
///     'pending', 'processing', 'shipped', 'in_transit',
///     'delivered', 'failed', 'returned'
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShippingStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    InTransit,
    Delivered,
    Failed,
    Returned,
}

impl ShippingStatus {
    /// Convert from database string representation.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pending" => Self::Pending,
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "in_transit" => Self::InTransit,
            "delivered" => Self::Delivered,
            "failed" => Self::Failed,
            "returned" => Self::Returned,
            _ => Self::Pending,
        }
    }

    /// Convert to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Returned => "returned",
        }
    }

    /// The forward-only transition table.
    ///
    /// pending → processing → shipped → in_transit →
    /// {delivered, failed, returned}; failed → returned.
    /// Delivered and returned are terminal.
    pub fn can_transition_to(&self, next: ShippingStatus) -> bool {
        use ShippingStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, InTransit)
                | (InTransit, Delivered)
                | (InTransit, Failed)
                | (InTransit, Returned)
                | (Failed, Returned)
        )
    }

    /// Terminal states accept no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Returned)
    }
}

impl std::fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the append-only status audit log.
///
/// Maps to the `shipping_status_history` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: ShippingStatus,
    pub timestamp: DateTime<Utc>,
    pub note: Option<String>,
}

/// Package weight and dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageDetails {
    /// Weight in kg, non-negative
    pub weight: f64,
    /// Length in cm, non-negative
    pub length: f64,
    /// Width in cm, non-negative
    pub width: f64,
    /// Height in cm, non-negative
    pub height: f64,
}

/// Represents the shipping leg of a placed order.
///
/// Maps to the `shipping_orders` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - order_ref: BIGINT NOT NULL -- upstream order identifier
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - address_id: BIGINT NOT NULL REFERENCES shipping_addresses(id)
/// - method_id: BIGINT NOT NULL REFERENCES shipping_methods(id)
/// - tracking_number: VARCHAR(64) UNIQUE NULL
/// - status: shipping_status NOT NULL DEFAULT 'pending'
/// - weight, length, width, height: DOUBLE PRECISION NOT NULL CHECK (>= 0)
/// - shipping_cost: DOUBLE PRECISION NOT NULL CHECK (>= 0)
/// - estimated_delivery_date, actual_delivery_date: TIMESTAMPTZ NULL
/// - notes: VARCHAR(500) NULL
/// - created_at, updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingOrder {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Upstream order identifier
    pub order_ref: i64,

    /// Owning user
    pub user_id: i64,

    /// Destination address
    pub address_id: i64,

    /// Chosen shipping method
    pub method_id: i64,

    /// Carrier tracking number, unique when present
    pub tracking_number: Option<String>,

    /// Current shipping state
    pub status: ShippingStatus,

    /// Append-only audit log, oldest first
    pub status_history: Vec<StatusHistoryEntry>,

    /// Package weight and dimensions
    pub package: PackageDetails,

    /// Computed shipping cost, non-negative
    pub shipping_cost: f64,

    /// Promised delivery date, recomputable
    pub estimated_delivery_date: Option<DateTime<Utc>>,

    /// Stamped when the order enters `delivered`
    pub actual_delivery_date: Option<DateTime<Utc>>,

    /// Free-form notes (up to 500 characters)
    pub notes: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ShippingOrder {
    /// Create a new shipping order in `pending` status with an empty
    /// history.
    pub fn new(
        id: i64,
        order_ref: i64,
        user_id: i64,
        address_id: i64,
        method_id: i64,
        package: PackageDetails,
        shipping_cost: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            order_ref,
            user_id,
            address_id,
            method_id,
            tracking_number: None,
            status: ShippingStatus::Pending,
            status_history: Vec::new(),
            package,
            shipping_cost,
            estimated_delivery_date: None,
            actual_delivery_date: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a status transition, appending the audit entry.
    ///
    /// Entering `delivered` stamps `actual_delivery_date`.
    ///
    /// # Errors
    ///
    /// Fails with `Conflict` when the transition table forbids the move.
    pub fn update_status(
        &mut self,
        new_status: ShippingStatus,
        note: Option<String>,
    ) -> Result<StatusHistoryEntry, AppError> {
        if !self.status.can_transition_to(new_status) {
            return Err(AppError::Conflict(format!(
                "Cannot transition shipping order from {} to {}",
                self.status, new_status
            )));
        }

        let entry = StatusHistoryEntry {
            status: new_status,
            timestamp: Utc::now(),
            note,
        };

        self.status = new_status;
        if new_status == ShippingStatus::Delivered {
            self.actual_delivery_date = Some(entry.timestamp);
        }
        self.status_history.push(entry.clone());

        Ok(entry)
    }

    /// The newest history entry, when any update has occurred.
    pub fn latest_history(&self) -> Option<&StatusHistoryEntry> {
        self.status_history.last()
    }
}

/// Repository trait for ShippingOrder data access operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShippingOrderRepository: Send + Sync {
    /// Find an order by its Snowflake ID, history included (oldest
    /// first).
    async fn find_by_id(&self, id: i64) -> Result<Option<ShippingOrder>, AppError>;

    /// All orders belonging to a user, newest first.
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<ShippingOrder>, AppError>;

    /// Create a new order (no history rows yet).
    async fn create(&self, order: &ShippingOrder) -> Result<ShippingOrder, AppError>;

    /// Set the status and append the matching history row atomically.
    async fn update_status(
        &self,
        order_id: i64,
        entry: &StatusHistoryEntry,
        actual_delivery_date: Option<DateTime<Utc>>,
    ) -> Result<(), AppError>;

    /// Store a freshly computed estimated delivery date.
    async fn set_estimated_delivery(
        &self,
        order_id: i64,
        estimated: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Assign the unique carrier tracking number.
    async fn set_tracking_number(
        &self,
        order_id: i64,
        tracking_number: &str,
    ) -> Result<(), AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn order() -> ShippingOrder {
        ShippingOrder::new(
            1,
            100,
            7,
            20,
            30,
            PackageDetails {
                weight: 2.5,
                length: 30.0,
                width: 20.0,
                height: 10.0,
            },
            15.0,
        )
    }

    #[test]
    fn test_new_order_pending_with_empty_history() {
        let order = order();
        assert_eq!(order.status, ShippingStatus::Pending);
        assert!(order.status_history.is_empty());
    }

    #[test]
    fn test_history_head_matches_status() {
        let mut order = order();
        order
            .update_status(ShippingStatus::Processing, Some("picked".into()))
            .unwrap();
        order.update_status(ShippingStatus::Shipped, None).unwrap();

        assert_eq!(order.status, ShippingStatus::Shipped);
        assert_eq!(order.latest_history().unwrap().status, order.status);
        assert_eq!(order.status_history.len(), 2);
    }

    #[test]
    fn test_delivered_stamps_actual_date() {
        let mut order = order();
        order.update_status(ShippingStatus::Processing, None).unwrap();
        order.update_status(ShippingStatus::Shipped, None).unwrap();
        order.update_status(ShippingStatus::InTransit, None).unwrap();
        assert!(order.actual_delivery_date.is_none());
        order.update_status(ShippingStatus::Delivered, None).unwrap();
        assert!(order.actual_delivery_date.is_some());
    }

    #[test_case(ShippingStatus::Pending, ShippingStatus::Processing, true; "pending to processing")]
    #[test_case(ShippingStatus::Processing, ShippingStatus::Shipped, true; "processing to shipped")]
    #[test_case(ShippingStatus::Shipped, ShippingStatus::InTransit, true; "shipped to in transit")]
    #[test_case(ShippingStatus::InTransit, ShippingStatus::Delivered, true; "in transit to delivered")]
    #[test_case(ShippingStatus::InTransit, ShippingStatus::Failed, true; "in transit to failed")]
    #[test_case(ShippingStatus::Failed, ShippingStatus::Returned, true; "failed to returned")]
    #[test_case(ShippingStatus::Pending, ShippingStatus::Delivered, false; "no skip to delivered")]
    #[test_case(ShippingStatus::Delivered, ShippingStatus::Processing, false; "delivered is terminal")]
    #[test_case(ShippingStatus::Returned, ShippingStatus::Pending, false; "returned is terminal")]
    #[test_case(ShippingStatus::Shipped, ShippingStatus::Shipped, false; "no self transition")]
    fn test_transition_table(from: ShippingStatus, to: ShippingStatus, allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_illegal_transition_leaves_order_untouched() {
        let mut order = order();
        let err = order.update_status(ShippingStatus::Delivered, None);
        assert!(err.is_err());
        assert_eq!(order.status, ShippingStatus::Pending);
        assert!(order.status_history.is_empty());
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            ShippingStatus::Pending,
            ShippingStatus::Processing,
            ShippingStatus::Shipped,
            ShippingStatus::InTransit,
            ShippingStatus::Delivered,
            ShippingStatus::Failed,
            ShippingStatus::Returned,
        ] {
            assert_eq!(ShippingStatus::from_str(s.as_str()), s);
        }
    }
}
