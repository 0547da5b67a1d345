use axum::{http::StatusCode, Json};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::{ApiResponse, PaginatedResponse};

/// Response for endpoints that create a resource.
pub type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ServiceError>;

pub fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

/// Pagination parameters for list operations
#[derive(Debug, Deserialize, Default, Clone, Copy, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageParams {
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size, clamped to the configured maximum
    pub limit: Option<u64>,
}

impl PageParams {
    /// Resolves `(page, limit)` against the configured bounds.
    pub fn resolve(&self, config: &AppConfig) -> (u64, u64) {
        (self.page.unwrap_or(1).max(1), config.page_size(self.limit))
    }
}

/// Converts a page of records into the response envelope.
pub fn paginate<M, T>(records: Vec<M>, total: u64, page: u64, limit: u64) -> PaginatedResponse<T>
where
    T: From<M>,
{
    PaginatedResponse {
        items: records.into_iter().map(T::from).collect(),
        total,
        page,
        limit,
        total_pages: total.div_ceil(limit.max(1)),
    }
}
