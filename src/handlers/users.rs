use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Caller, Role};
use crate::entities::user;
use crate::handlers::common::{created, paginate, Created, PageParams};
use crate::services::users::CreateUserInput;
use crate::{ApiResponse, ApiResult, AppState, PaginatedResponse};

/// A user account without its credentials.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    #[schema(example = "picker@acme.test")]
    pub email: String,
    pub name: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            company_id: model.company_id,
            email: model.email,
            name: model.name,
            role: model.role,
            active: model.active,
            created_at: model.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserInput,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserResponse>),
        (status = 403, description = "Not allowed to create this user", body = crate::errors::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    Json(payload): Json<CreateUserInput>,
) -> Created<UserResponse> {
    let created_user = state.services.users.create_user(&caller, payload).await?;
    created(created_user.into())
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(PageParams),
    responses(
        (status = 200, description = "Users listed", body = ApiResponse<PaginatedResponse<UserResponse>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
    Query(params): Query<PageParams>,
) -> ApiResult<PaginatedResponse<UserResponse>> {
    let (page, limit) = params.resolve(&state.config);
    let (users, total) = state.services.users.list_users(&caller, page, limit).await?;
    Ok(Json(ApiResponse::success(paginate(users, total, page, limit))))
}
