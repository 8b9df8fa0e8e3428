//! ShippingMethod entity and repository trait.
//!
//! Maps to the `shipping_methods` table. Reference data: rows are
//! seeded/administered out of band and read by the order flow.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

#[cfg(test)]
use mockall::automock;

/// Delivery window in whole days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EstimatedDays {
    /// Earliest delivery, at least 1
    pub min: i32,
    /// Latest delivery, at least 1
    pub max: i32,
}

/// Physical limits a package must fit within.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodRestrictions {
    /// Maximum package weight in kg
    pub max_weight: f64,
    /// Maximum package length in cm
    pub max_length: f64,
    /// Maximum package width in cm
    pub max_width: f64,
    /// Maximum package height in cm
    pub max_height: f64,
    /// ISO country names this method does not ship to
    pub restricted_countries: Vec<String>,
}

/// Represents a shipping method offered to customers.
///
/// Maps to the `shipping_methods` table:
/// - id: BIGINT PRIMARY KEY (Snowflake ID)
/// - name: VARCHAR(50) NOT NULL UNIQUE
/// - description: VARCHAR(200) NOT NULL
/// - base_price: DOUBLE PRECISION NOT NULL CHECK (base_price >= 0)
/// - price_per_kg: DOUBLE PRECISION NOT NULL CHECK (price_per_kg >= 0)
/// - estimated_days_min, estimated_days_max: INTEGER NOT NULL CHECK (>= 1)
/// - is_active: BOOLEAN NOT NULL DEFAULT TRUE
/// - max_weight, max_length, max_width, max_height: DOUBLE PRECISION
/// - restricted_countries: TEXT[] NOT NULL DEFAULT '{}'
/// - created_at, updated_at: TIMESTAMPTZ NOT NULL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingMethod {
    /// Snowflake ID (primary key)
    pub id: i64,

    /// Unique method name (up to 50 characters)
    pub name: String,

    /// Customer-facing description (up to 200 characters)
    pub description: String,

    /// Flat price component
    pub base_price: f64,

    /// Per-kilogram price component
    pub price_per_kg: f64,

    /// Delivery window
    pub estimated_days: EstimatedDays,

    /// Inactive methods are hidden and refuse new orders
    pub is_active: bool,

    /// Package restrictions
    pub restrictions: MethodRestrictions,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ShippingMethod {
    /// Compute the shipping cost for a package weight.
    ///
    /// cost = base_price + weight * price_per_kg
    ///
    /// # Errors
    ///
    /// Fails with `Validation` when the weight exceeds the method's
    /// maximum allowed weight.
    pub fn cost_for_weight(&self, weight: f64) -> Result<f64, AppError> {
        if weight > self.restrictions.max_weight {
            return Err(AppError::Validation(
                "Package weight exceeds maximum allowed weight".into(),
            ));
        }
        Ok(self.base_price + weight * self.price_per_kg)
    }

    /// Whether the package dimensions fit this method.
    pub fn fits_dimensions(&self, length: f64, width: f64, height: f64) -> bool {
        length <= self.restrictions.max_length
            && width <= self.restrictions.max_width
            && height <= self.restrictions.max_height
    }

    /// Whether this method ships to the given country.
    pub fn ships_to(&self, country: &str) -> bool {
        !self
            .restrictions
            .restricted_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
    }

    /// The delivery date this method promises, counted from `from`.
    ///
    /// Uses the maximum day bound of the window.
    pub fn promised_delivery(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from + chrono::Duration::days(i64::from(self.estimated_days.max))
    }
}

/// Repository trait for ShippingMethod data access operations.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ShippingMethodRepository: Send + Sync {
    /// Find a method by its Snowflake ID.
    async fn find_by_id(&self, id: i64) -> Result<Option<ShippingMethod>, AppError>;

    /// All active methods, ordered by base price.
    async fn find_active(&self) -> Result<Vec<ShippingMethod>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn method(base_price: f64, price_per_kg: f64, max_weight: f64) -> ShippingMethod {
        let now = Utc::now();
        ShippingMethod {
            id: 1,
            name: "Standard".into(),
            description: "3-5 business days".into(),
            base_price,
            price_per_kg,
            estimated_days: EstimatedDays { min: 2, max: 5 },
            is_active: true,
            restrictions: MethodRestrictions {
                max_weight,
                max_length: 120.0,
                max_width: 80.0,
                max_height: 80.0,
                restricted_countries: vec!["Atlantis".into()],
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_cost_for_weight() {
        let m = method(10.0, 2.0, 30.0);
        assert_eq!(m.cost_for_weight(5.0).unwrap(), 20.0);
        assert_eq!(m.cost_for_weight(0.0).unwrap(), 10.0);
    }

    #[test]
    fn test_cost_rejects_overweight() {
        let m = method(10.0, 2.0, 10.0);
        assert!(m.cost_for_weight(15.0).is_err());
    }

    #[test]
    fn test_promised_delivery_uses_max_bound() {
        let m = method(10.0, 2.0, 30.0);
        let from = Utc::now();
        assert_eq!(m.promised_delivery(from), from + chrono::Duration::days(5));
    }

    #[test]
    fn test_restrictions() {
        let m = method(10.0, 2.0, 30.0);
        assert!(m.fits_dimensions(100.0, 50.0, 50.0));
        assert!(!m.fits_dimensions(130.0, 50.0, 50.0));
        assert!(m.ships_to("Norway"));
        assert!(!m.ships_to("atlantis"));
    }
}
