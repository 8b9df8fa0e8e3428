//! ShippingAddress entity and repository trait.
//!
//! Maps to the `shipping_addresses` table. At most one address per user
//! carries the default flag; the repository enforces the handover when
//! a new default is written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[cfg(test)]
use mockall::automock;

/// Represents a user's saved postal address.
///
/// Maps to the `shipping_addresses` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - user_id: BIGINT NOT NULL REFERENCES users(id)
/// - full_name: VARCHAR(100) NOT NULL
/// - phone_number: VARCHAR(20) NOT NULL -- format-validated at the API
/// - address_line1: VARCHAR(100) NOT NULL
/// - address_line2: VARCHAR(100) NULL
/// - city, state, country: VARCHAR(50) NOT NULL
/// - postal_code: VARCHAR(10) NOT NULL -- format-validated at the API
/// - is_default: BOOLEAN NOT NULL DEFAULT FALSE
/// - created_at, updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Owning user
    pub user_id: i64,

    /// Recipient name (2-100 characters)
    pub full_name: String,

    /// Contact phone number
    pub phone_number: String,

    /// Street address
    pub address_line1: String,

    /// Apartment, suite, etc.
    pub address_line2: Option<String>,

    pub city: String,

    pub state: String,

    pub postal_code: String,

    pub country: String,

    /// At most one per user; enforced on write
    pub is_default: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Repository trait for ShippingAddress data access operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShippingAddressRepository: Send + Sync {
    /// Find an address by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<ShippingAddress>, AppError>;

    /// All addresses for a user, default first, then newest.
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<ShippingAddress>, AppError>;

    /// Create an address. When `is_default` is set, the user's previous
    /// default is unset in the same transaction.
    async fn create(&self, address: &ShippingAddress) -> Result<ShippingAddress, AppError>;
}
