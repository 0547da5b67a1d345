use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::Caller;
use crate::entities::{order_item, sales_order::OrderStatus};
use crate::handlers::common::{created, paginate, Created, PageParams};
use crate::handlers::pick_lists::PickListResponse;
use crate::services::orders::{CreateOrderInput, OrderDetails, UpdateOrderInput};
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    #[schema(value_type = String, example = "10.00")]
    pub unit_price: Decimal,
    #[schema(value_type = Option<String>, example = "20.00")]
    pub line_total: Option<Decimal>,
}

impl From<order_item::Model> for OrderItemResponse {
    fn from(model: order_item::Model) -> Self {
        Self {
            line_total: model.line_total(),
            id: model.id,
            product_id: model.product_id,
            quantity: model.quantity,
            unit_price: model.unit_price,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    #[schema(example = "SO-000001")]
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    #[schema(value_type = String, example = "45.00")]
    pub total_amount: Decimal,
    pub notes: Option<String>,
    pub shipping_address: Option<String>,
    pub version: i32,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        let order = details.order;
        Self {
            id: order.id,
            order_number: order.order_number,
            customer_id: order.customer_id,
            status: order.status,
            total_amount: order.total_amount,
            notes: order.notes,
            shipping_address: order.shipping_address,
            version: order.version,
            items: details.items.into_iter().map(OrderItemResponse::from).collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders listed", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<PaginatedResponse<OrderResponse>> {
    let (page, limit) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let (orders, total) = state
        .services
        .orders
        .list_orders(&caller, query.status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginate(orders, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order fetched", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderResponse> {
    let details = state.services.orders.get_order(&caller, id).await?;
    Ok(Json(ApiResponse::success(details.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderInput,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateOrderInput>,
) -> Created<OrderResponse> {
    let details = state.services.orders.create_order(&caller, payload).await?;
    created(details.into())
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderInput,
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderResponse>),
        (status = 409, description = "Order is no longer editable", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderInput>,
) -> ApiResult<OrderResponse> {
    let details = state
        .services
        .orders
        .update_order(&caller, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(details.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 409, description = "Order is no longer editable", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, crate::errors::ServiceError> {
    state.services.orders.delete_order(&caller, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/:id/pick-list",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Pick list of the order", body = ApiResponse<PickListResponse>),
        (status = 404, description = "Order has no pick list", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order_pick_list(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<PickListResponse> {
    let details = state
        .services
        .picking
        .get_for_order(&caller, id)
        .await?
        .ok_or_else(|| crate::errors::ServiceError::NotFound(format!("Order {} has no pick list", id)))?;
    Ok(Json(ApiResponse::success(details.into())))
}
