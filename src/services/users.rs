use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{hash_password, Action, Caller, Role};
use crate::db::DbPool;
use crate::entities::user;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::page_index;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    pub role: Role,
    /// Target tenant. Only super admins may set it; everyone else creates users in their own company.
    pub company_id: Option<Uuid>,
}

/// Service for managing user accounts
#[derive(Clone)]
pub struct UserService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl UserService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a user. Company admins create users in their own tenant and cannot mint
    /// super admins; super admins may create users anywhere.
    #[instrument(skip(self, caller, input), fields(user_id = %caller.user_id, email = %input.email))]
    pub async fn create_user(
        &self,
        caller: &Caller,
        input: CreateUserInput,
    ) -> Result<user::Model, ServiceError> {
        caller.require(Action::ManageUsers)?;
        input.validate()?;

        let company_id = if caller.role.is_super_admin() {
            input.company_id.or(caller.acting_company).or(caller.company_id)
        } else {
            if input.role == Role::SuperAdmin {
                return Err(ServiceError::Forbidden(
                    "only super admins may create super admins".into(),
                ));
            }
            Some(caller.write_scope()?)
        };
        if company_id.is_none() && input.role != Role::SuperAdmin {
            return Err(ServiceError::ValidationError(
                "company_id is required for tenant users".into(),
            ));
        }

        let db = &*self.db_pool;
        let email = input.email.trim().to_lowercase();
        let taken = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .count(db)
            .await?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!("email {} is already registered", email)));
        }

        let now = Utc::now();
        let created = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            email: Set(email),
            name: Set(input.name),
            password_hash: Set(hash_password(&input.password)?),
            role: Set(input.role),
            active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await?;

        info!(new_user_id = %created.id, role = %created.role, "user created");
        self.event_sender
            .emit(Event::UserCreated {
                user_id: created.id,
                company_id: created.company_id,
            })
            .await;
        Ok(created)
    }

    #[instrument(skip(self, caller))]
    pub async fn list_users(
        &self,
        caller: &Caller,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<user::Model>, u64), ServiceError> {
        caller.require(Action::ManageUsers)?;
        let paginator = caller
            .read_scope()?
            .apply(user::Entity::find(), user::Column::CompanyId)
            .order_by_asc(user::Column::Email)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let users = paginator.fetch_page(page_index(page)).await?;
        Ok((users, total))
    }
}

/// Loads a user that may be given floor work of `role` in `company_id`.
///
/// Users of other tenants are reported as missing.
pub(crate) async fn find_assignable<C>(
    conn: &C,
    company_id: Uuid,
    user_id: Uuid,
    role: Role,
) -> Result<user::Model, ServiceError>
where
    C: ConnectionTrait,
{
    let worker = user::Entity::find_by_id(user_id)
        .filter(user::Column::CompanyId.eq(company_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("User", user_id))?;

    if worker.role != role {
        return Err(ServiceError::ValidationError(format!(
            "user {} has role {}, expected {}",
            user_id, worker.role, role
        )));
    }
    if !worker.active {
        return Err(ServiceError::ValidationError(format!(
            "user {} is inactive",
            user_id
        )));
    }
    Ok(worker)
}
