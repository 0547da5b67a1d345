use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::Caller;
use crate::entities::{
    pick_list::{self, PickListStatus},
    pick_list_item,
};
use crate::handlers::common::{paginate, PageParams};
use crate::services::picking::PickListDetails;
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PickListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<PickListStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPickerRequest {
    pub picker_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordPickRequest {
    pub quantity_picked: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PickListItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity_required: i32,
    pub quantity_picked: i32,
}

impl From<pick_list_item::Model> for PickListItemResponse {
    fn from(model: pick_list_item::Model) -> Self {
        Self {
            id: model.id,
            product_id: model.product_id,
            quantity_required: model.quantity_required,
            quantity_picked: model.quantity_picked,
        }
    }
}

/// Pick list header; `items` is only filled on single-list reads.
#[derive(Debug, Serialize, ToSchema)]
pub struct PickListResponse {
    pub id: Uuid,
    pub sales_order_id: Uuid,
    pub warehouse_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: PickListStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<PickListItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<pick_list::Model> for PickListResponse {
    fn from(model: pick_list::Model) -> Self {
        Self {
            id: model.id,
            sales_order_id: model.sales_order_id,
            warehouse_id: model.warehouse_id,
            assigned_to: model.assigned_to,
            status: model.status,
            started_at: model.started_at,
            completed_at: model.completed_at,
            items: Vec::new(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<PickListDetails> for PickListResponse {
    fn from(details: PickListDetails) -> Self {
        let mut response = Self::from(details.pick_list);
        response.items = details
            .items
            .into_iter()
            .map(PickListItemResponse::from)
            .collect();
        response
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/pick-lists",
    params(PickListQuery),
    responses(
        (status = 200, description = "Pick lists listed", body = ApiResponse<PaginatedResponse<PickListResponse>>)
    ),
    tag = "picking"
)]
pub async fn list_pick_lists(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<PickListQuery>,
) -> ApiResult<PaginatedResponse<PickListResponse>> {
    let (page, limit) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let (lists, total) = state
        .services
        .picking
        .list_pick_lists(&caller, query.status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginate(lists, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/pick-lists/:id",
    params(("id" = Uuid, Path, description = "Pick list ID")),
    responses(
        (status = 200, description = "Pick list with its lines", body = ApiResponse<PickListResponse>),
        (status = 404, description = "Pick list not found", body = crate::errors::ErrorResponse)
    ),
    tag = "picking"
)]
pub async fn get_pick_list(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<PickListResponse> {
    let details = state.services.picking.get_pick_list(&caller, id).await?;
    Ok(Json(ApiResponse::success(details.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/pick-lists/:id/assign",
    params(("id" = Uuid, Path, description = "Pick list ID")),
    request_body = AssignPickerRequest,
    responses(
        (status = 200, description = "Picker assigned", body = ApiResponse<PickListResponse>),
        (status = 400, description = "User is not an active picker", body = crate::errors::ErrorResponse)
    ),
    tag = "picking"
)]
pub async fn assign_picker(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignPickerRequest>,
) -> ApiResult<PickListResponse> {
    let list = state
        .services
        .picking
        .assign_picker(&caller, id, payload.picker_id)
        .await?;
    Ok(Json(ApiResponse::success(list.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/pick-lists/:id/start",
    params(("id" = Uuid, Path, description = "Pick list ID")),
    responses(
        (status = 200, description = "Picking started", body = ApiResponse<PickListResponse>),
        (status = 409, description = "Pick list cannot start", body = crate::errors::ErrorResponse)
    ),
    tag = "picking"
)]
pub async fn start_picking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<PickListResponse> {
    let list = state.services.picking.start_picking(&caller, id).await?;
    Ok(Json(ApiResponse::success(list.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/pick-lists/:id/complete",
    params(("id" = Uuid, Path, description = "Pick list ID")),
    responses(
        (status = 200, description = "Picking completed", body = ApiResponse<PickListResponse>),
        (status = 409, description = "Pick list cannot complete", body = crate::errors::ErrorResponse)
    ),
    tag = "picking"
)]
pub async fn complete_picking(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<PickListResponse> {
    let list = state.services.picking.complete_picking(&caller, id).await?;
    Ok(Json(ApiResponse::success(list.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/pick-list-items/:id/pick",
    params(("id" = Uuid, Path, description = "Pick list item ID")),
    request_body = RecordPickRequest,
    responses(
        (status = 200, description = "Pick recorded", body = ApiResponse<PickListItemResponse>),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse)
    ),
    tag = "picking"
)]
pub async fn record_pick(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<RecordPickRequest>,
) -> ApiResult<PickListItemResponse> {
    let item = state
        .services
        .picking
        .record_pick(&caller, id, payload.quantity_picked)
        .await?;
    Ok(Json(ApiResponse::success(item.into())))
}
