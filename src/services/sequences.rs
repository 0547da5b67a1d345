//! Per-tenant counters backing human readable document numbers.
//!
//! Each counter is one `tenant_sequences` row. Incrementing it with a single
//! `UPDATE ... SET value = value + 1` inside the caller's transaction holds the row lock
//! until commit, so two concurrent writers never observe the same value.

use chrono::{Datelike, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::tenant_sequence;
use crate::errors::ServiceError;

pub const SALES_ORDER_SEQUENCE: &str = "sales_order";

fn return_sequence(year: i32) -> String {
    format!("return_{}", year)
}

/// Allocates the next value of `name` for `company_id`, starting at 1.
pub async fn next_value<C>(conn: &C, company_id: Uuid, name: &str) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    tenant_sequence::Entity::insert(tenant_sequence::ActiveModel {
        company_id: Set(company_id),
        name: Set(name.to_string()),
        value: Set(0),
    })
    .on_conflict(
        OnConflict::columns([
            tenant_sequence::Column::CompanyId,
            tenant_sequence::Column::Name,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    tenant_sequence::Entity::update_many()
        .col_expr(
            tenant_sequence::Column::Value,
            Expr::col(tenant_sequence::Column::Value).add(1),
        )
        .filter(tenant_sequence::Column::CompanyId.eq(company_id))
        .filter(tenant_sequence::Column::Name.eq(name))
        .exec(conn)
        .await?;

    tenant_sequence::Entity::find_by_id((company_id, name.to_string()))
        .one(conn)
        .await?
        .map(|row| row.value)
        .ok_or_else(|| ServiceError::InternalError(format!("sequence {} vanished", name)))
}

/// `SO-000042`
pub async fn next_order_number<C>(conn: &C, company_id: Uuid) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let seq = next_value(conn, company_id, SALES_ORDER_SEQUENCE).await?;
    Ok(format_order_number(seq))
}

/// `RMA-2026-0007`, numbered per calendar year.
pub async fn next_rma_number<C>(conn: &C, company_id: Uuid) -> Result<String, ServiceError>
where
    C: ConnectionTrait,
{
    let year = Utc::now().year();
    let seq = next_value(conn, company_id, &return_sequence(year)).await?;
    Ok(format_rma_number(year, seq))
}

pub fn format_order_number(seq: i64) -> String {
    format!("SO-{:06}", seq)
}

pub fn format_rma_number(year: i32, seq: i64) -> String {
    format!("RMA-{}-{:04}", year, seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_zero_padded() {
        assert_eq!(format_order_number(42), "SO-000042");
        assert_eq!(format_rma_number(2026, 1), "RMA-2026-0001");
        assert_eq!(format_rma_number(2026, 12345), "RMA-2026-12345");
    }
}
