//! ShippingMethod Repository Implementation
//!
//! PostgreSQL implementation for the shipping method reference data.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    EstimatedDays, MethodRestrictions, ShippingMethod, ShippingMethodRepository,
};
use crate::shared::error::AppError;

/// PostgreSQL shipping method repository implementation.
pub struct PgShippingMethodRepository {
    pool: PgPool,
}

impl PgShippingMethodRepository {
    /// Creates a new PgShippingMethodRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for shipping method queries.
#[derive(Debug, sqlx::FromRow)]
struct ShippingMethodRow {
    id: i64,
    name: String,
    description: String,
    base_price: f64,
    price_per_kg: f64,
    estimated_days_min: i32,
    estimated_days_max: i32,
    is_active: bool,
    max_weight: f64,
    max_length: f64,
    max_width: f64,
    max_height: f64,
    restricted_countries: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShippingMethodRow {
    fn into_method(self) -> ShippingMethod {
        ShippingMethod {
            id: self.id,
            name: self.name,
            description: self.description,
            base_price: self.base_price,
            price_per_kg: self.price_per_kg,
            estimated_days: EstimatedDays {
                min: self.estimated_days_min,
                max: self.estimated_days_max,
            },
            is_active: self.is_active,
            restrictions: MethodRestrictions {
                max_weight: self.max_weight,
                max_length: self.max_length,
                max_width: self.max_width,
                max_height: self.max_height,
                restricted_countries: self.restricted_countries,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const METHOD_COLUMNS: &str = r#"
    id, name, description, base_price, price_per_kg,
    estimated_days_min, estimated_days_max, is_active,
    max_weight, max_length, max_width, max_height,
    restricted_countries, created_at, updated_at
"#;

#[async_trait]
impl ShippingMethodRepository for PgShippingMethodRepository {
    /// Find a method by its ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<ShippingMethod>, AppError> {
        let row = sqlx::query_as::<_, ShippingMethodRow>(&format!(
            "SELECT {} FROM shipping_methods WHERE id = $1",
            METHOD_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_method()))
    }

    /// All active methods, cheapest first.
    async fn find_active(&self) -> Result<Vec<ShippingMethod>, AppError> {
        let rows = sqlx::query_as::<_, ShippingMethodRow>(&format!(
            r#"
            SELECT {}
            FROM shipping_methods
            WHERE is_active = TRUE
            ORDER BY base_price ASC
            "#,
            METHOD_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_method()).collect())
    }
}
