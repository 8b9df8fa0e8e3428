//! ShippingAddress Repository Implementation
//!
//! PostgreSQL implementation of address storage. Writing a new default
//! address clears the user's previous default in the same transaction,
//! so at most one default exists per user.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{ShippingAddress, ShippingAddressRepository};
use crate::shared::error::AppError;

/// PostgreSQL shipping address repository implementation.
pub struct PgShippingAddressRepository {
    pool: PgPool,
}

impl PgShippingAddressRepository {
    /// Creates a new PgShippingAddressRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for address queries.
#[derive(Debug, sqlx::FromRow)]
struct ShippingAddressRow {
    id: i64,
    user_id: i64,
    full_name: String,
    phone_number: String,
    address_line1: String,
    address_line2: Option<String>,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShippingAddressRow {
    fn into_address(self) -> ShippingAddress {
        ShippingAddress {
            id: self.id,
            user_id: self.user_id,
            full_name: self.full_name,
            phone_number: self.phone_number,
            address_line1: self.address_line1,
            address_line2: self.address_line2,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
            is_default: self.is_default,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ADDRESS_COLUMNS: &str = r#"
    id, user_id, full_name, phone_number,
    address_line1, address_line2, city, state, postal_code, country,
    is_default, created_at, updated_at
"#;

#[async_trait]
impl ShippingAddressRepository for PgShippingAddressRepository {
    /// Find an address by its ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<ShippingAddress>, AppError> {
        let row = sqlx::query_as::<_, ShippingAddressRow>(&format!(
            "SELECT {} FROM shipping_addresses WHERE id = $1",
            ADDRESS_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_address()))
    }

    /// All addresses for a user, default first, then newest.
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<ShippingAddress>, AppError> {
        let rows = sqlx::query_as::<_, ShippingAddressRow>(&format!(
            r#"
            SELECT {}
            FROM shipping_addresses
            WHERE user_id = $1
            ORDER BY is_default DESC, created_at DESC
            "#,
            ADDRESS_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_address()).collect())
    }

    /// Create an address; a new default unsets the previous one.
    async fn create(&self, address: &ShippingAddress) -> Result<ShippingAddress, AppError> {
        let mut tx = self.pool.begin().await?;

        if address.is_default {
            sqlx::query(
                r#"
                UPDATE shipping_addresses
                SET is_default = FALSE, updated_at = NOW()
                WHERE user_id = $1 AND is_default = TRUE
                "#,
            )
            .bind(address.user_id)
            .execute(&mut *tx)
            .await?;
        }

        let row = sqlx::query_as::<_, ShippingAddressRow>(&format!(
            r#"
            INSERT INTO shipping_addresses
                (id, user_id, full_name, phone_number,
                 address_line1, address_line2, city, state, postal_code, country,
                 is_default, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            ADDRESS_COLUMNS
        ))
        .bind(address.id)
        .bind(address.user_id)
        .bind(&address.full_name)
        .bind(&address.phone_number)
        .bind(&address.address_line1)
        .bind(&address.address_line2)
        .bind(&address.city)
        .bind(&address.state)
        .bind(&address.postal_code)
        .bind(&address.country)
        .bind(address.is_default)
        .bind(address.created_at)
        .bind(address.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into_address())
    }
}
