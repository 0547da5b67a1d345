use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Caller;
use crate::services::stock::StockLedger;
use crate::{ApiResponse, ApiResult, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct StockLevelResponse {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: i32,
    pub reserved: i32,
    pub available: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    pub product_id: Uuid,
    pub warehouse_id: Uuid,
    /// Signed change to the on-hand quantity
    pub delta: i32,
}

#[utoipa::path(
    get,
    path = "/api/v1/stock/:product_id/:warehouse_id",
    params(
        ("product_id" = Uuid, Path, description = "Product ID"),
        ("warehouse_id" = Uuid, Path, description = "Warehouse ID")
    ),
    responses(
        (status = 200, description = "Stock level of the cell", body = ApiResponse<StockLevelResponse>),
        (status = 404, description = "Product or warehouse not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn get_stock_level(
    State(state): State<AppState>,
    caller: Caller,
    Path((product_id, warehouse_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StockLevelResponse> {
    let cell = state
        .services
        .stock
        .get_level(&caller, product_id, warehouse_id)
        .await?;
    let (quantity, reserved) = cell.map(|c| (c.quantity, c.reserved)).unwrap_or((0, 0));
    Ok(Json(ApiResponse::success(StockLevelResponse {
        product_id,
        warehouse_id,
        quantity,
        reserved,
        available: quantity - reserved,
    })))
}

#[utoipa::path(
    post,
    path = "/api/v1/stock/adjust",
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock adjusted", body = ApiResponse<StockLevelResponse>),
        (status = 422, description = "Not enough stock", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<AdjustStockRequest>,
) -> ApiResult<StockLevelResponse> {
    let stock = &state.services.stock;
    stock
        .adjust(&caller, payload.product_id, payload.warehouse_id, payload.delta)
        .await?;
    let cell = stock
        .get_level(&caller, payload.product_id, payload.warehouse_id)
        .await?;
    let (quantity, reserved) = cell.map(|c| (c.quantity, c.reserved)).unwrap_or((0, 0));
    Ok(Json(ApiResponse::success(StockLevelResponse {
        product_id: payload.product_id,
        warehouse_id: payload.warehouse_id,
        quantity,
        reserved,
        available: quantity - reserved,
    })))
}
