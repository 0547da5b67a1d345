// Fulfillment workflow
pub mod orders;
pub mod packing;
pub mod picking;
pub mod returns;
pub mod shipments;

// Supporting services
pub mod sequences;
pub mod stock;
pub mod users;

use sea_orm::{ConnectionTrait, EntityTrait, PrimaryKeyTrait};
use uuid::Uuid;

use crate::auth::TenantScope;
use crate::errors::ServiceError;

/// Loads a row by id within `scope`. Rows of another tenant are reported exactly like
/// missing rows.
pub(crate) async fn find_in_scope<E, C>(
    conn: &C,
    scope: TenantScope,
    company_column: E::Column,
    id: Uuid,
    label: &str,
) -> Result<E::Model, ServiceError>
where
    E: EntityTrait,
    C: ConnectionTrait,
    Uuid: Into<<E::PrimaryKey as PrimaryKeyTrait>::ValueType>,
{
    scope
        .apply(E::find_by_id(id), company_column)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found(label, id))
}

/// Converts a 1-based page number into the paginator's 0-based index.
pub(crate) fn page_index(page: u64) -> u64 {
    page.max(1) - 1
}
