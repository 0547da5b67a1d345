use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::Caller;
use crate::entities::packing_task::{self, PackingStatus};
use crate::handlers::common::{paginate, PageParams};
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PackingTaskQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<PackingStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPackerRequest {
    pub packer_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PackingTaskResponse {
    pub id: Uuid,
    pub sales_order_id: Uuid,
    pub pick_list_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: PackingStatus,
    pub packed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<packing_task::Model> for PackingTaskResponse {
    fn from(model: packing_task::Model) -> Self {
        Self {
            id: model.id,
            sales_order_id: model.sales_order_id,
            pick_list_id: model.pick_list_id,
            assigned_to: model.assigned_to,
            status: model.status,
            packed_at: model.packed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/packing-tasks",
    params(PackingTaskQuery),
    responses(
        (status = 200, description = "Packing tasks listed", body = ApiResponse<PaginatedResponse<PackingTaskResponse>>)
    ),
    tag = "packing"
)]
pub async fn list_packing_tasks(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<PackingTaskQuery>,
) -> ApiResult<PaginatedResponse<PackingTaskResponse>> {
    let (page, limit) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let (tasks, total) = state
        .services
        .packing
        .list_packing_tasks(&caller, query.status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginate(tasks, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/packing-tasks/:id",
    params(("id" = Uuid, Path, description = "Packing task ID")),
    responses(
        (status = 200, description = "Packing task fetched", body = ApiResponse<PackingTaskResponse>),
        (status = 404, description = "Packing task not found", body = crate::errors::ErrorResponse)
    ),
    tag = "packing"
)]
pub async fn get_packing_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<PackingTaskResponse> {
    let task = state.services.packing.get_packing_task(&caller, id).await?;
    Ok(Json(ApiResponse::success(task.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/packing-tasks/:id/assign",
    params(("id" = Uuid, Path, description = "Packing task ID")),
    request_body = AssignPackerRequest,
    responses(
        (status = 200, description = "Packer assigned", body = ApiResponse<PackingTaskResponse>),
        (status = 409, description = "Task can no longer be reassigned", body = crate::errors::ErrorResponse)
    ),
    tag = "packing"
)]
pub async fn assign_packer(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignPackerRequest>,
) -> ApiResult<PackingTaskResponse> {
    let task = state
        .services
        .packing
        .assign_packer(&caller, id, payload.packer_id)
        .await?;
    Ok(Json(ApiResponse::success(task.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/packing-tasks/:id/start",
    params(("id" = Uuid, Path, description = "Packing task ID")),
    responses(
        (status = 200, description = "Packing started", body = ApiResponse<PackingTaskResponse>),
        (status = 403, description = "Task assigned to someone else", body = crate::errors::ErrorResponse)
    ),
    tag = "packing"
)]
pub async fn start_packing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<PackingTaskResponse> {
    let task = state.services.packing.start_packing(&caller, id).await?;
    Ok(Json(ApiResponse::success(task.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/packing-tasks/:id/complete",
    params(("id" = Uuid, Path, description = "Packing task ID")),
    responses(
        (status = 200, description = "Order packed", body = ApiResponse<PackingTaskResponse>),
        (status = 409, description = "Task or order in the wrong state", body = crate::errors::ErrorResponse)
    ),
    tag = "packing"
)]
pub async fn complete_packing(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<PackingTaskResponse> {
    let task = state.services.packing.complete_packing(&caller, id).await?;
    Ok(Json(ApiResponse::success(task.into())))
}
