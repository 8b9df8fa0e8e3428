//! Shipping Service
//!
//! Orchestrates addresses, methods, and the shipping order lifecycle:
//! creation with cost calculation, transition-checked status updates,
//! delivery estimation, and tracking assignment.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    PackageDetails, ShippingAddress, ShippingAddressRepository, ShippingMethod,
    ShippingMethodRepository, ShippingOrder, ShippingOrderRepository, ShippingStatus, User,
};
use crate::shared::error::AppError;
use crate::shared::snowflake::SnowflakeGenerator;

/// Create address request
#[derive(Debug, Clone)]
pub struct CreateAddressDto {
    pub full_name: String,
    pub phone_number: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

/// Create shipping order request
#[derive(Debug, Clone)]
pub struct CreateOrderDto {
    pub order_ref: i64,
    pub address_id: i64,
    pub method_id: i64,
    pub package: PackageDetails,
    pub notes: Option<String>,
}

/// Shipping service trait
#[async_trait]
pub trait ShippingService: Send + Sync {
    /// Save an address for the user; a new default unsets the old one.
    async fn create_address(
        &self,
        user: &User,
        request: CreateAddressDto,
    ) -> Result<ShippingAddress, AppError>;

    /// The user's saved addresses, default first.
    async fn list_addresses(&self, user: &User) -> Result<Vec<ShippingAddress>, AppError>;

    /// Active shipping methods, cheapest first.
    async fn list_methods(&self) -> Result<Vec<ShippingMethod>, AppError>;

    /// Create a shipping order in `pending` status with its cost
    /// computed from the chosen method and package weight.
    async fn create_order(
        &self,
        user: &User,
        request: CreateOrderDto,
    ) -> Result<ShippingOrder, AppError>;

    /// Load an order; non-staff callers only see their own.
    async fn get_order(&self, user: &User, order_id: i64) -> Result<ShippingOrder, AppError>;

    /// The user's orders, newest first.
    async fn list_orders(&self, user: &User) -> Result<Vec<ShippingOrder>, AppError>;

    /// Apply a transition-checked status update, appending the audit
    /// entry.
    async fn update_status(
        &self,
        order_id: i64,
        new_status: ShippingStatus,
        note: Option<String>,
    ) -> Result<ShippingOrder, AppError>;

    /// Recompute the promised delivery date from the order's method.
    async fn estimate_delivery(&self, order_id: i64) -> Result<DateTime<Utc>, AppError>;

    /// Assign the unique carrier tracking number.
    async fn assign_tracking(
        &self,
        order_id: i64,
        tracking_number: String,
    ) -> Result<(), AppError>;
}

/// ShippingService implementation over the repository traits.
pub struct ShippingServiceImpl<O, A, M>
where
    O: ShippingOrderRepository,
    A: ShippingAddressRepository,
    M: ShippingMethodRepository,
{
    order_repo: Arc<O>,
    address_repo: Arc<A>,
    method_repo: Arc<M>,
    id_generator: Arc<SnowflakeGenerator>,
}

impl<O, A, M> ShippingServiceImpl<O, A, M>
where
    O: ShippingOrderRepository,
    A: ShippingAddressRepository,
    M: ShippingMethodRepository,
{
    pub fn new(
        order_repo: Arc<O>,
        address_repo: Arc<A>,
        method_repo: Arc<M>,
        id_generator: Arc<SnowflakeGenerator>,
    ) -> Self {
        Self {
            order_repo,
            address_repo,
            method_repo,
            id_generator,
        }
    }

    async fn require_order(&self, order_id: i64) -> Result<ShippingOrder, AppError> {
        self.order_repo
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Shipping order not found".into()))
    }

    async fn require_method(&self, method_id: i64) -> Result<ShippingMethod, AppError> {
        self.method_repo
            .find_by_id(method_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Shipping method not found".into()))
    }
}

#[async_trait]
impl<O, A, M> ShippingService for ShippingServiceImpl<O, A, M>
where
    O: ShippingOrderRepository + 'static,
    A: ShippingAddressRepository + 'static,
    M: ShippingMethodRepository + 'static,
{
    async fn create_address(
        &self,
        user: &User,
        request: CreateAddressDto,
    ) -> Result<ShippingAddress, AppError> {
        let now = Utc::now();
        let address = ShippingAddress {
            id: self.id_generator.generate(),
            user_id: user.id,
            full_name: request.full_name,
            phone_number: request.phone_number,
            address_line1: request.address_line1,
            address_line2: request.address_line2,
            city: request.city,
            state: request.state,
            postal_code: request.postal_code,
            country: request.country,
            is_default: request.is_default,
            created_at: now,
            updated_at: now,
        };

        self.address_repo.create(&address).await
    }

    async fn list_addresses(&self, user: &User) -> Result<Vec<ShippingAddress>, AppError> {
        self.address_repo.find_by_user(user.id).await
    }

    async fn list_methods(&self) -> Result<Vec<ShippingMethod>, AppError> {
        self.method_repo.find_active().await
    }

    async fn create_order(
        &self,
        user: &User,
        request: CreateOrderDto,
    ) -> Result<ShippingOrder, AppError> {
        let address = self
            .address_repo
            .find_by_id(request.address_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Shipping address not found".into()))?;

        if address.user_id != user.id && !user.role.is_staff() {
            return Err(AppError::Forbidden(
                "Address belongs to a different user".into(),
            ));
        }

        let method = self.require_method(request.method_id).await?;
        if !method.is_active {
            return Err(AppError::Validation("Shipping method is not active".into()));
        }
        if !method.ships_to(&address.country) {
            return Err(AppError::Validation(format!(
                "Shipping method does not ship to {}",
                address.country
            )));
        }
        if !method.fits_dimensions(
            request.package.length,
            request.package.width,
            request.package.height,
        ) {
            return Err(AppError::Validation(
                "Package dimensions exceed method limits".into(),
            ));
        }

        let shipping_cost = method.cost_for_weight(request.package.weight)?;

        let mut order = ShippingOrder::new(
            self.id_generator.generate(),
            request.order_ref,
            user.id,
            address.id,
            method.id,
            request.package,
            shipping_cost,
        );
        order.notes = request.notes;
        order.estimated_delivery_date = Some(method.promised_delivery(order.created_at));

        self.order_repo.create(&order).await
    }

    async fn get_order(&self, user: &User, order_id: i64) -> Result<ShippingOrder, AppError> {
        let order = self.require_order(order_id).await?;
        if order.user_id != user.id && !user.role.is_staff() {
            // Hide the existence of other users' orders
            return Err(AppError::NotFound("Shipping order not found".into()));
        }
        Ok(order)
    }

    async fn list_orders(&self, user: &User) -> Result<Vec<ShippingOrder>, AppError> {
        self.order_repo.find_by_user(user.id).await
    }

    async fn update_status(
        &self,
        order_id: i64,
        new_status: ShippingStatus,
        note: Option<String>,
    ) -> Result<ShippingOrder, AppError> {
        let mut order = self.require_order(order_id).await?;

        let entry = order.update_status(new_status, note)?;
        self.order_repo
            .update_status(order.id, &entry, order.actual_delivery_date)
            .await?;

        Ok(order)
    }

    async fn estimate_delivery(&self, order_id: i64) -> Result<DateTime<Utc>, AppError> {
        let order = self.require_order(order_id).await?;
        let method = self.require_method(order.method_id).await?;

        let estimated = method.promised_delivery(Utc::now());
        self.order_repo
            .set_estimated_delivery(order.id, estimated)
            .await?;

        Ok(estimated)
    }

    async fn assign_tracking(
        &self,
        order_id: i64,
        tracking_number: String,
    ) -> Result<(), AppError> {
        let order = self.require_order(order_id).await?;
        self.order_repo
            .set_tracking_number(order.id, &tracking_number)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        EstimatedDays, MethodRestrictions, MockShippingAddressRepository,
        MockShippingMethodRepository, MockShippingOrderRepository, UserRole,
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

    fn address(user_id: i64) -> ShippingAddress {
        let now = Utc::now();
        ShippingAddress {
            id: 20,
            user_id,
            full_name: "Jane Doe".into(),
            phone_number: "555-123-4567".into(),
            address_line1: "1 Main St".into(),
            address_line2: None,
            city: "Springfield".into(),
            state: "IL".into(),
            postal_code: "62704".into(),
            country: "USA".into(),
            is_default: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn method() -> ShippingMethod {
        let now = Utc::now();
        ShippingMethod {
            id: 30,
            name: "Standard".into(),
            description: "3-5 business days".into(),
            base_price: 10.0,
            price_per_kg: 2.0,
            estimated_days: EstimatedDays { min: 2, max: 5 },
            is_active: true,
            restrictions: MethodRestrictions {
                max_weight: 30.0,
                max_length: 120.0,
                max_width: 80.0,
                max_height: 80.0,
                restricted_countries: vec![],
            },
            created_at: now,
            updated_at: now,
        }
    }

    fn package(weight: f64) -> PackageDetails {
        PackageDetails {
            weight,
            length: 30.0,
            width: 20.0,
            height: 10.0,
        }
    }

    fn service(
        order_repo: MockShippingOrderRepository,
        address_repo: MockShippingAddressRepository,
        method_repo: MockShippingMethodRepository,
    ) -> ShippingServiceImpl<
        MockShippingOrderRepository,
        MockShippingAddressRepository,
        MockShippingMethodRepository,
    > {
        ShippingServiceImpl::new(
            Arc::new(order_repo),
            Arc::new(address_repo),
            Arc::new(method_repo),
            Arc::new(SnowflakeGenerator::new(1, 0)),
        )
    }

    #[tokio::test]
    async fn test_create_order_computes_cost() {
        let mut address_repo = MockShippingAddressRepository::new();
        address_repo
            .expect_find_by_id()
            .with(eq(20i64))
            .returning(|_| Ok(Some(address(7))));

        let mut method_repo = MockShippingMethodRepository::new();
        method_repo
            .expect_find_by_id()
            .with(eq(30i64))
            .returning(|_| Ok(Some(method())));

        let mut order_repo = MockShippingOrderRepository::new();
        order_repo
            .expect_create()
            .withf(|order| {
                order.status == ShippingStatus::Pending
                    && order.status_history.is_empty()
                    && (order.shipping_cost - 20.0).abs() < f64::EPSILON
                    && order.estimated_delivery_date.is_some()
            })
            .times(1)
            .returning(|order| Ok(order.clone()));

        let svc = service(order_repo, address_repo, method_repo);

        let order = svc
            .create_order(
                &customer(),
                CreateOrderDto {
                    order_ref: 100,
                    address_id: 20,
                    method_id: 30,
                    package: package(5.0),
                    notes: None,
                },
            )
            .await
            .unwrap();

        // basePrice 10 + 5kg * 2 = 20
        assert_eq!(order.shipping_cost, 20.0);
    }

    #[tokio::test]
    async fn test_create_order_rejects_overweight() {
        let mut address_repo = MockShippingAddressRepository::new();
        address_repo
            .expect_find_by_id()
            .returning(|_| Ok(Some(address(7))));

        let mut method_repo = MockShippingMethodRepository::new();
        method_repo.expect_find_by_id().returning(|_| {
            let mut m = method();
            m.restrictions.max_weight = 10.0;
            Ok(Some(m))
        });

        // Order repo must never be touched
        let svc = service(
            MockShippingOrderRepository::new(),
            address_repo,
            method_repo,
        );

        let result = svc
            .create_order(
                &customer(),
                CreateOrderDto {
                    order_ref: 100,
                    address_id: 20,
                    method_id: 30,
                    package: package(15.0),
                    notes: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_order_rejects_foreign_address() {
        let mut address_repo = MockShippingAddressRepository::new();
        address_repo
            .expect_find_by_id()
            .returning(|_| Ok(Some(address(99))));

        let svc = service(
            MockShippingOrderRepository::new(),
            address_repo,
            MockShippingMethodRepository::new(),
        );

        let result = svc
            .create_order(
                &customer(),
                CreateOrderDto {
                    order_ref: 100,
                    address_id: 20,
                    method_id: 30,
                    package: package(5.0),
                    notes: None,
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_status_appends_history() {
        let mut order_repo = MockShippingOrderRepository::new();
        order_repo.expect_find_by_id().returning(|_| {
            Ok(Some(ShippingOrder::new(
                1,
                100,
                7,
                20,
                30,
                package(5.0),
                20.0,
            )))
        });
        order_repo
            .expect_update_status()
            .withf(|order_id, entry, actual| {
                *order_id == 1
                    && entry.status == ShippingStatus::Processing
                    && entry.note.as_deref() == Some("picked")
                    && actual.is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let svc = service(
            order_repo,
            MockShippingAddressRepository::new(),
            MockShippingMethodRepository::new(),
        );

        let order = svc
            .update_status(1, ShippingStatus::Processing, Some("picked".into()))
            .await
            .unwrap();

        assert_eq!(order.status, ShippingStatus::Processing);
        assert_eq!(order.latest_history().unwrap().status, order.status);
    }

    #[tokio::test]
    async fn test_update_status_rejects_illegal_transition() {
        let mut order_repo = MockShippingOrderRepository::new();
        order_repo.expect_find_by_id().returning(|_| {
            Ok(Some(ShippingOrder::new(
                1,
                100,
                7,
                20,
                30,
                package(5.0),
                20.0,
            )))
        });
        // update_status must never be persisted

        let svc = service(
            order_repo,
            MockShippingAddressRepository::new(),
            MockShippingMethodRepository::new(),
        );

        let result = svc.update_status(1, ShippingStatus::Delivered, None).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_estimate_delivery_uses_max_days() {
        let mut order_repo = MockShippingOrderRepository::new();
        order_repo.expect_find_by_id().returning(|_| {
            Ok(Some(ShippingOrder::new(
                1,
                100,
                7,
                20,
                30,
                package(5.0),
                20.0,
            )))
        });
        order_repo
            .expect_set_estimated_delivery()
            .times(1)
            .returning(|_, _| Ok(()));

        let mut method_repo = MockShippingMethodRepository::new();
        method_repo
            .expect_find_by_id()
            .with(eq(30i64))
            .returning(|_| Ok(Some(method())));

        let svc = service(
            order_repo,
            MockShippingAddressRepository::new(),
            method_repo,
        );

        let before = Utc::now();
        let estimated = svc.estimate_delivery(1).await.unwrap();
        let after = Utc::now();

        // estimatedDays {min: 2, max: 5} -> now + 5 days
        assert!(estimated >= before + chrono::Duration::days(5));
        assert!(estimated <= after + chrono::Duration::days(5));
    }

    #[tokio::test]
    async fn test_get_order_hides_foreign_orders() {
        let mut order_repo = MockShippingOrderRepository::new();
        order_repo.expect_find_by_id().returning(|_| {
            Ok(Some(ShippingOrder::new(
                1,
                100,
                99, // someone else's order
                20,
                30,
                package(5.0),
                20.0,
            )))
        });

        let svc = service(
            order_repo,
            MockShippingAddressRepository::new(),
            MockShippingMethodRepository::new(),
        );

        let result = svc.get_order(&customer(), 1).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
