//! ShippingOrder Repository Implementation
//!
//! PostgreSQL implementation of shipping order operations. A status
//! change writes the order row and its audit row in one transaction so
//! the history head can never diverge from the current status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{
    PackageDetails, ShippingOrder, ShippingOrderRepository, ShippingStatus, StatusHistoryEntry,
};
use crate::shared::error::AppError;

/// PostgreSQL shipping order repository implementation.
pub struct PgShippingOrderRepository {
    pool: PgPool,
}

impl PgShippingOrderRepository {
    /// Creates a new PgShippingOrderRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for shipping order queries.
#[derive(Debug, sqlx::FromRow)]
struct ShippingOrderRow {
    id: i64,
    order_ref: i64,
    user_id: i64,
    address_id: i64,
    method_id: i64,
    tracking_number: Option<String>,
    status: String,
    weight: f64,
    length: f64,
    width: f64,
    height: f64,
    shipping_cost: f64,
    estimated_delivery_date: Option<DateTime<Utc>>,
    actual_delivery_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShippingOrderRow {
    /// Converts database row to domain ShippingOrder entity (history
    /// loaded separately).
    fn into_order(self, status_history: Vec<StatusHistoryEntry>) -> ShippingOrder {
        ShippingOrder {
            id: self.id,
            order_ref: self.order_ref,
            user_id: self.user_id,
            address_id: self.address_id,
            method_id: self.method_id,
            tracking_number: self.tracking_number,
            status: ShippingStatus::from_str(&self.status),
            status_history,
            package: PackageDetails {
                weight: self.weight,
                length: self.length,
                width: self.width,
                height: self.height,
            },
            shipping_cost: self.shipping_cost,
            estimated_delivery_date: self.estimated_delivery_date,
            actual_delivery_date: self.actual_delivery_date,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Internal row type for status history queries.
#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    shipping_order_id: i64,
    status: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl HistoryRow {
    fn into_entry(self) -> StatusHistoryEntry {
        StatusHistoryEntry {
            status: ShippingStatus::from_str(&self.status),
            timestamp: self.created_at,
            note: self.note,
        }
    }
}

const ORDER_COLUMNS: &str = r#"
    id, order_ref, user_id, address_id, method_id,
    tracking_number, status::text as status,
    weight, length, width, height, shipping_cost,
    estimated_delivery_date, actual_delivery_date, notes,
    created_at, updated_at
"#;

impl PgShippingOrderRepository {
    /// Load audit rows for a set of orders, oldest first.
    async fn load_history(
        &self,
        order_ids: &[i64],
    ) -> Result<Vec<(i64, StatusHistoryEntry)>, AppError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT shipping_order_id, status::text as status, note, created_at
            FROM shipping_status_history
            WHERE shipping_order_id = ANY($1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| (r.shipping_order_id, r.into_entry()))
            .collect())
    }
}

#[async_trait]
impl ShippingOrderRepository for PgShippingOrderRepository {
    /// Find an order by its ID, history included.
    async fn find_by_id(&self, id: i64) -> Result<Option<ShippingOrder>, AppError> {
        let row = sqlx::query_as::<_, ShippingOrderRow>(&format!(
            "SELECT {} FROM shipping_orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let history = self
            .load_history(&[row.id])
            .await?
            .into_iter()
            .map(|(_, e)| e)
            .collect();

        Ok(Some(row.into_order(history)))
    }

    /// All orders belonging to a user, newest first.
    async fn find_by_user(&self, user_id: i64) -> Result<Vec<ShippingOrder>, AppError> {
        let rows = sqlx::query_as::<_, ShippingOrderRow>(&format!(
            r#"
            SELECT {}
            FROM shipping_orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let history = self.load_history(&order_ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_id = row.id;
                let own: Vec<StatusHistoryEntry> = history
                    .iter()
                    .filter(|(id, _)| *id == order_id)
                    .map(|(_, e)| e.clone())
                    .collect();
                row.into_order(own)
            })
            .collect())
    }

    /// Create a new order (no history rows yet).
    async fn create(&self, order: &ShippingOrder) -> Result<ShippingOrder, AppError> {
        let row = sqlx::query_as::<_, ShippingOrderRow>(&format!(
            r#"
            INSERT INTO shipping_orders
                (id, order_ref, user_id, address_id, method_id, tracking_number,
                 status, weight, length, width, height, shipping_cost,
                 estimated_delivery_date, actual_delivery_date, notes,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6,
                    $7::shipping_status, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(order.order_ref)
        .bind(order.user_id)
        .bind(order.address_id)
        .bind(order.method_id)
        .bind(&order.tracking_number)
        .bind(order.status.as_str())
        .bind(order.package.weight)
        .bind(order.package.length)
        .bind(order.package.width)
        .bind(order.package.height)
        .bind(order.shipping_cost)
        .bind(order.estimated_delivery_date)
        .bind(order.actual_delivery_date)
        .bind(&order.notes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_order(Vec::new()))
    }

    /// Set the status and append the matching history row atomically.
    async fn update_status(
        &self,
        order_id: i64,
        entry: &StatusHistoryEntry,
        actual_delivery_date: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE shipping_orders
            SET status = $2::shipping_status,
                actual_delivery_date = COALESCE($3, actual_delivery_date),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(entry.status.as_str())
        .bind(actual_delivery_date)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Shipping order {} not found",
                order_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO shipping_status_history (shipping_order_id, status, note, created_at)
            VALUES ($1, $2::shipping_status, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(entry.status.as_str())
        .bind(&entry.note)
        .bind(entry.timestamp)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Store a freshly computed estimated delivery date.
    async fn set_estimated_delivery(
        &self,
        order_id: i64,
        estimated: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE shipping_orders
            SET estimated_delivery_date = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(estimated)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Shipping order {} not found",
                order_id
            )));
        }

        Ok(())
    }

    /// Assign the unique carrier tracking number.
    ///
    /// The unique index surfaces duplicates as a database error, which
    /// the service maps to Conflict.
    async fn set_tracking_number(
        &self,
        order_id: i64,
        tracking_number: &str,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE shipping_orders
            SET tracking_number = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order_id)
        .bind(tracking_number)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Tracking number is already in use".into())
            }
            _ => AppError::Database(e),
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Shipping order {} not found",
                order_id
            )));
        }

        Ok(())
    }
}
