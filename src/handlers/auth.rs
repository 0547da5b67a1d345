use axum::{extract::State, response::Json};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Caller, LoginCredentials, Role, TokenResponse};
use crate::errors::ServiceError;
use crate::{ApiResponse, ApiResult, AppState};

/// Identity carried by the presented token.
#[derive(Debug, Serialize, ToSchema)]
pub struct WhoAmI {
    pub user_id: Uuid,
    pub role: Role,
    pub company_id: Option<Uuid>,
    /// Tenant selected through `X-Company-Id` (super admins only)
    pub acting_company: Option<Uuid>,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginCredentials,
    responses(
        (status = 200, description = "Access token issued", body = ApiResponse<TokenResponse>),
        (status = 401, description = "Invalid credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> ApiResult<TokenResponse> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
        return Err(ServiceError::ValidationError(
            "Email and password are required".to_string(),
        ));
    }

    let token = state.auth.login(&credentials).await?;
    info!(email = %credentials.email.trim().to_lowercase(), "user logged in");
    Ok(Json(ApiResponse::success(token)))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current identity", body = ApiResponse<WhoAmI>),
        (status = 401, description = "Missing or invalid token", body = crate::errors::ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn whoami(caller: Caller) -> ApiResult<WhoAmI> {
    Ok(Json(ApiResponse::success(WhoAmI {
        user_id: caller.user_id,
        role: caller.role,
        company_id: caller.company_id,
        acting_company: caller.acting_company,
    })))
}
