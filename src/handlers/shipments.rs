use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::Caller;
use crate::entities::shipment::{self, DeliveryStatus};
use crate::handlers::common::{created, paginate, Created, PageParams};
use crate::services::shipments::{CreateShipmentInput, UpdateShipmentInput};
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ShipmentListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Only shipments of this order
    pub sales_order_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShipmentResponse {
    pub id: Uuid,
    pub sales_order_id: Uuid,
    pub packed_by: Uuid,
    #[schema(example = "DHL")]
    pub courier_name: String,
    #[schema(example = "1Z999AA10123456784")]
    pub tracking_number: Option<String>,
    #[schema(value_type = Option<String>, example = "2.50")]
    pub weight: Option<Decimal>,
    pub dispatch_date: NaiveDate,
    pub delivery_status: DeliveryStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<shipment::Model> for ShipmentResponse {
    fn from(model: shipment::Model) -> Self {
        Self {
            id: model.id,
            sales_order_id: model.sales_order_id,
            packed_by: model.packed_by,
            courier_name: model.courier_name,
            tracking_number: model.tracking_number,
            weight: model.weight,
            dispatch_date: model.dispatch_date,
            delivery_status: model.delivery_status,
            delivered_at: model.delivered_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments",
    params(ShipmentListQuery),
    responses(
        (status = 200, description = "Shipments listed", body = ApiResponse<PaginatedResponse<ShipmentResponse>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn list_shipments(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ShipmentListQuery>,
) -> ApiResult<PaginatedResponse<ShipmentResponse>> {
    let (page, limit) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let (records, total) = state
        .services
        .shipments
        .list_shipments(&caller, query.sales_order_id, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginate(records, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/shipments/:id",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment fetched", body = ApiResponse<ShipmentResponse>),
        (status = 404, description = "Shipment not found", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn get_shipment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentResponse> {
    let record = state.services.shipments.get_shipment(&caller, id).await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments",
    request_body = CreateShipmentInput,
    responses(
        (status = 201, description = "Shipment created, order shipped", body = ApiResponse<ShipmentResponse>),
        (status = 412, description = "Order is not packed", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn create_shipment(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateShipmentInput>,
) -> Created<ShipmentResponse> {
    let record = state
        .services
        .shipments
        .create_shipment(&caller, payload)
        .await?;
    created(record.into())
}

#[utoipa::path(
    put,
    path = "/api/v1/shipments/:id",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = UpdateShipmentInput,
    responses(
        (status = 200, description = "Shipment updated", body = ApiResponse<ShipmentResponse>),
        (status = 400, description = "Invalid update", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn update_shipment(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShipmentInput>,
) -> ApiResult<ShipmentResponse> {
    let record = state
        .services
        .shipments
        .update_shipment(&caller, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/shipments/:id/deliver",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment delivered", body = ApiResponse<ShipmentResponse>),
        (status = 409, description = "Order is not shipped", body = crate::errors::ErrorResponse)
    ),
    tag = "shipments"
)]
pub async fn mark_delivered(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ShipmentResponse> {
    let record = state.services.shipments.mark_delivered(&caller, id).await?;
    Ok(Json(ApiResponse::success(record.into())))
}
