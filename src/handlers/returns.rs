use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::Caller;
use crate::entities::return_authorization::{self, ReturnStatus};
use crate::handlers::common::{created, paginate, Created, PageParams};
use crate::services::returns::{CreateReturnInput, InspectReturnInput, RefundInput};
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReturnListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<ReturnStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReturnResponse {
    pub id: Uuid,
    #[schema(example = "RMA-2026-0001")]
    pub rma_number: String,
    pub sales_order_id: Uuid,
    pub shipment_id: Uuid,
    pub customer_id: Uuid,
    pub status: ReturnStatus,
    pub reason: String,
    pub return_type: Option<String>,
    #[schema(value_type = Option<String>)]
    pub recovery_value: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub refund_amount: Option<Decimal>,
    pub notes: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub inspected_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<return_authorization::Model> for ReturnResponse {
    fn from(model: return_authorization::Model) -> Self {
        Self {
            id: model.id,
            rma_number: model.rma_number,
            sales_order_id: model.sales_order_id,
            shipment_id: model.shipment_id,
            customer_id: model.customer_id,
            status: model.status,
            reason: model.reason,
            return_type: model.return_type,
            recovery_value: model.recovery_value,
            refund_amount: model.refund_amount,
            notes: model.notes,
            received_at: model.received_at,
            inspected_at: model.inspected_at,
            completed_at: model.completed_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/returns",
    params(ReturnListQuery),
    responses(
        (status = 200, description = "Returns listed", body = ApiResponse<PaginatedResponse<ReturnResponse>>)
    ),
    tag = "returns"
)]
pub async fn list_returns(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ReturnListQuery>,
) -> ApiResult<PaginatedResponse<ReturnResponse>> {
    let (page, limit) = PageParams {
        page: query.page,
        limit: query.limit,
    }
    .resolve(&state.config);
    let (returns, total) = state
        .services
        .returns
        .list_returns(&caller, query.status, page, limit)
        .await?;
    Ok(Json(ApiResponse::success(paginate(returns, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/returns/:id",
    params(("id" = Uuid, Path, description = "Return ID")),
    responses(
        (status = 200, description = "Return fetched", body = ApiResponse<ReturnResponse>),
        (status = 404, description = "Return not found", body = crate::errors::ErrorResponse)
    ),
    tag = "returns"
)]
pub async fn get_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let rma = state.services.returns.get_return(&caller, id).await?;
    Ok(Json(ApiResponse::success(rma.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns",
    request_body = CreateReturnInput,
    responses(
        (status = 201, description = "RMA created", body = ApiResponse<ReturnResponse>),
        (status = 409, description = "Order is not delivered", body = crate::errors::ErrorResponse)
    ),
    tag = "returns"
)]
pub async fn create_return(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateReturnInput>,
) -> Created<ReturnResponse> {
    let rma = state.services.returns.create_rma(&caller, payload).await?;
    created(rma.into())
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/:id/awaiting",
    params(("id" = Uuid, Path, description = "Return ID")),
    responses(
        (status = 200, description = "Awaiting the customer's parcel", body = ApiResponse<ReturnResponse>),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "returns"
)]
pub async fn mark_awaiting_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let rma = state
        .services
        .returns
        .mark_awaiting_return(&caller, id)
        .await?;
    Ok(Json(ApiResponse::success(rma.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/:id/receive",
    params(("id" = Uuid, Path, description = "Return ID")),
    responses(
        (status = 200, description = "Goods received", body = ApiResponse<ReturnResponse>),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "returns"
)]
pub async fn receive_item(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let rma = state.services.returns.receive_item(&caller, id).await?;
    Ok(Json(ApiResponse::success(rma.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/:id/inspection",
    params(("id" = Uuid, Path, description = "Return ID")),
    responses(
        (status = 200, description = "Inspection started", body = ApiResponse<ReturnResponse>),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "returns"
)]
pub async fn start_inspection(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let rma = state.services.returns.start_inspection(&caller, id).await?;
    Ok(Json(ApiResponse::success(rma.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/:id/inspect",
    params(("id" = Uuid, Path, description = "Return ID")),
    request_body = InspectReturnInput,
    responses(
        (status = 200, description = "Inspection recorded", body = ApiResponse<ReturnResponse>),
        (status = 400, description = "Unknown outcome", body = crate::errors::ErrorResponse),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "returns"
)]
pub async fn inspect_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<InspectReturnInput>,
) -> ApiResult<ReturnResponse> {
    let rma = state
        .services
        .returns
        .inspect_rma(&caller, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(rma.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/:id/refund",
    params(("id" = Uuid, Path, description = "Return ID")),
    request_body = RefundInput,
    responses(
        (status = 200, description = "Refund recorded", body = ApiResponse<ReturnResponse>),
        (status = 400, description = "Amount out of range", body = crate::errors::ErrorResponse),
        (status = 409, description = "Return not approved", body = crate::errors::ErrorResponse)
    ),
    tag = "returns"
)]
pub async fn process_refund(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Json(payload): Json<RefundInput>,
) -> ApiResult<ReturnResponse> {
    let rma = state
        .services
        .returns
        .process_refund(&caller, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(rma.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/returns/:id/close",
    params(("id" = Uuid, Path, description = "Return ID")),
    responses(
        (status = 200, description = "Return closed", body = ApiResponse<ReturnResponse>),
        (status = 409, description = "Transition not allowed", body = crate::errors::ErrorResponse)
    ),
    tag = "returns"
)]
pub async fn close_return(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<ReturnResponse> {
    let rma = state.services.returns.close_rma(&caller, id).await?;
    Ok(Json(ApiResponse::success(rma.into())))
}
