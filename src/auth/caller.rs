//! Identity and tenant resolution for every service call.

use super::rbac::{Action, Role};
use crate::errors::ServiceError;
use axum::{extract::FromRequestParts, http::request::Parts};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};
use uuid::Uuid;

/// The authenticated principal on whose behalf a service operation runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    /// Home tenant. `None` only for platform super admins.
    pub company_id: Option<Uuid>,
    /// Tenant chosen explicitly for this request (super admins only).
    pub acting_company: Option<Uuid>,
}

/// Which tenants a read may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantScope {
    Company(Uuid),
    AllCompanies,
}

impl TenantScope {
    /// Restricts `select` to the scope's tenant through `column`.
    pub fn apply<E, C>(self, select: Select<E>, column: C) -> Select<E>
    where
        E: EntityTrait,
        C: ColumnTrait,
    {
        match self {
            TenantScope::Company(company_id) => select.filter(column.eq(company_id)),
            TenantScope::AllCompanies => select,
        }
    }
}

impl Caller {
    pub fn new(user_id: Uuid, role: Role, company_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            role,
            company_id,
            acting_company: None,
        }
    }

    /// Selects the tenant a super admin acts on. Ignored for every other role.
    pub fn acting_for(mut self, company_id: Uuid) -> Self {
        if self.role.is_super_admin() {
            self.acting_company = Some(company_id);
        }
        self
    }

    pub fn require(&self, action: Action) -> Result<(), ServiceError> {
        if action.allows(self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "role {} may not perform {:?}",
                self.role, action
            )))
        }
    }

    /// Tenants visible to reads. Super admins without an explicit company see every tenant.
    pub fn read_scope(&self) -> Result<TenantScope, ServiceError> {
        if self.role.is_super_admin() {
            return Ok(match self.acting_company.or(self.company_id) {
                Some(company_id) => TenantScope::Company(company_id),
                None => TenantScope::AllCompanies,
            });
        }
        self.company_id
            .map(TenantScope::Company)
            .ok_or_else(|| ServiceError::Forbidden("caller is not attached to a company".into()))
    }

    /// The single tenant a write lands in.
    pub fn write_scope(&self) -> Result<Uuid, ServiceError> {
        if self.role.is_super_admin() {
            return self.acting_company.or(self.company_id).ok_or_else(|| {
                ServiceError::ValidationError(
                    "super admin writes must name a company (X-Company-Id)".into(),
                )
            });
        }
        self.company_id
            .ok_or_else(|| ServiceError::Forbidden("caller is not attached to a company".into()))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("authentication required".into()))
    }
}
