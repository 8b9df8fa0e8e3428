//! Shipping Handlers
//!
//! HTTP endpoints for addresses, methods, and shipping orders.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::application::dto::request::{
    AssignTrackingRequest, CreateAddressRequest, CreateOrderRequest, UpdateStatusRequest,
};
use crate::application::dto::response::{
    AddressResponse, ApiResponse, MethodResponse, OrderResponse,
};
use crate::application::services::{
    CreateAddressDto, CreateOrderDto, ShippingService, ShippingServiceImpl,
};
use crate::domain::PackageDetails;
use crate::infrastructure::repositories::{
    PgShippingAddressRepository, PgShippingMethodRepository, PgShippingOrderRepository,
};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

fn shipping_service(
    state: &AppState,
) -> ShippingServiceImpl<
    PgShippingOrderRepository,
    PgShippingAddressRepository,
    PgShippingMethodRepository,
> {
    ShippingServiceImpl::new(
        Arc::new(PgShippingOrderRepository::new(state.db.clone())),
        Arc::new(PgShippingAddressRepository::new(state.db.clone())),
        Arc::new(PgShippingMethodRepository::new(state.db.clone())),
        state.snowflake.clone(),
    )
}

fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.parse::<i64>()
        .map_err(|_| AppError::BadRequest(format!("Invalid {} ID", what)))
}

/// POST /api/v1/shipping/addresses
pub async fn create_address(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateAddressRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AddressResponse>>), AppError> {
    body.validate().map_err(validation_error)?;

    let service = shipping_service(&state);
    let address = service
        .create_address(
            &auth.user,
            CreateAddressDto {
                full_name: body.full_name,
                phone_number: body.phone_number,
                address_line1: body.address_line1,
                address_line2: body.address_line2,
                city: body.city,
                state: body.state,
                postal_code: body.postal_code,
                country: body.country,
                is_default: body.is_default,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AddressResponse::from(address))),
    ))
}

/// GET /api/v1/shipping/addresses
pub async fn list_addresses(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<AddressResponse>>>, AppError> {
    let service = shipping_service(&state);
    let addresses = service.list_addresses(&auth.user).await?;

    let responses: Vec<AddressResponse> =
        addresses.into_iter().map(AddressResponse::from).collect();
    Ok(Json(ApiResponse::success(responses)))
}

/// GET /api/v1/shipping/methods
pub async fn list_methods(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<MethodResponse>>>, AppError> {
    let service = shipping_service(&state);
    let methods = service.list_methods().await?;

    let responses: Vec<MethodResponse> = methods.into_iter().map(MethodResponse::from).collect();
    Ok(Json(ApiResponse::success(responses)))
}

/// POST /api/v1/shipping/orders
pub async fn create_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), AppError> {
    body.validate().map_err(validation_error)?;

    let order_ref = parse_id(&body.order_ref, "order")?;
    let address_id = parse_id(&body.address_id, "address")?;
    let method_id = parse_id(&body.method_id, "method")?;

    let service = shipping_service(&state);
    let order = service
        .create_order(
            &auth.user,
            CreateOrderDto {
                order_ref,
                address_id,
                method_id,
                package: PackageDetails {
                    weight: body.weight,
                    length: body.length,
                    width: body.width,
                    height: body.height,
                },
                notes: body.notes,
            },
        )
        .await?;

    tracing::info!(order_id = order.id, user_id = auth.user.id, "Shipping order created");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(OrderResponse::from(order))),
    ))
}

/// GET /api/v1/shipping/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, AppError> {
    let service = shipping_service(&state);
    let orders = service.list_orders(&auth.user).await?;

    let responses: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(ApiResponse::success(responses)))
}

/// GET /api/v1/shipping/orders/{order_id}
pub async fn get_order(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, AppError> {
    let order_id = parse_id(&order_id, "shipping order")?;

    let service = shipping_service(&state);
    let order = service.get_order(&auth.user, order_id).await?;

    Ok(Json(ApiResponse::success(OrderResponse::from(order))))
}

/// POST /api/v1/shipping/orders/{order_id}/status
///
/// Staff only (enforced by route middleware). Transitions go through
/// the explicit table; illegal moves fail with 409.
pub async fn update_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, AppError> {
    body.validate().map_err(validation_error)?;
    let order_id = parse_id(&order_id, "shipping order")?;

    let service = shipping_service(&state);
    let order = service
        .update_status(order_id, body.status, body.note)
        .await?;

    tracing::info!(order_id, status = %order.status, "Shipping status updated");

    Ok(Json(ApiResponse::success(OrderResponse::from(order))))
}

/// POST /api/v1/shipping/orders/{order_id}/estimate
///
/// Recompute the promised delivery date from the order's method.
pub async fn estimate_delivery(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let order_id = parse_id(&order_id, "shipping order")?;

    let service = shipping_service(&state);
    let estimated = service.estimate_delivery(order_id).await?;

    Ok(Json(ApiResponse::success(serde_json::json!({
        "estimated_delivery_date": estimated.to_rfc3339(),
    }))))
}

/// POST /api/v1/shipping/orders/{order_id}/tracking
///
/// Staff only (enforced by route middleware).
pub async fn assign_tracking(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(body): Json<AssignTrackingRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    body.validate().map_err(validation_error)?;
    let order_id = parse_id(&order_id, "shipping order")?;

    let service = shipping_service(&state);
    service
        .assign_tracking(order_id, body.tracking_number)
        .await?;

    Ok(Json(ApiResponse::message("Tracking number assigned")))
}
