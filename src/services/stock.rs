use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{Action, Caller, TenantScope};
use crate::db::{transaction, DbPool};
use crate::entities::{product, product_stock, warehouse};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::services::find_in_scope;

/// Quantity bookkeeping for product x warehouse cells.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// `quantity - reserved` for the cell, zero when the cell does not exist yet.
    async fn available(
        &self,
        caller: &Caller,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<i32, ServiceError>;

    /// Applies `delta` to the on-hand quantity and returns the new quantity.
    async fn adjust(
        &self,
        caller: &Caller,
        product_id: Uuid,
        warehouse_id: Uuid,
        delta: i32,
    ) -> Result<i32, ServiceError>;
}

/// Service for reading and adjusting stock levels
#[derive(Clone)]
pub struct StockService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl StockService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Full stock row for a cell.
    #[instrument(skip(self, caller))]
    pub async fn get_level(
        &self,
        caller: &Caller,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<Option<product_stock::Model>, ServiceError> {
        caller.require(Action::ReadStock)?;
        let scope = caller.read_scope()?;
        let db = &*self.db_pool;

        ensure_cell_in_scope(db, scope, product_id, warehouse_id).await?;
        Ok(find_cell(db, product_id, warehouse_id).await?)
    }
}

#[async_trait]
impl StockLedger for StockService {
    #[instrument(skip(self, caller))]
    async fn available(
        &self,
        caller: &Caller,
        product_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<i32, ServiceError> {
        Ok(self
            .get_level(caller, product_id, warehouse_id)
            .await?
            .map(|cell| cell.available())
            .unwrap_or(0))
    }

    #[instrument(skip(self, caller))]
    async fn adjust(
        &self,
        caller: &Caller,
        product_id: Uuid,
        warehouse_id: Uuid,
        delta: i32,
    ) -> Result<i32, ServiceError> {
        caller.require(Action::AdjustStock)?;
        let company_id = caller.write_scope()?;

        let txn = self.db_pool.begin().await?;
        let outcome = adjust_in(&txn, company_id, product_id, warehouse_id, delta).await;
        let cell = transaction::conclude(txn, outcome).await?;

        info!(%product_id, %warehouse_id, delta, quantity = cell.quantity, "stock adjusted");
        metrics::increment_counter("stock_adjustments_total");
        self.event_sender
            .emit(Event::StockAdjusted {
                product_id,
                warehouse_id,
                delta,
                new_quantity: cell.quantity,
            })
            .await;
        Ok(cell.quantity)
    }
}

async fn find_cell<C>(
    conn: &C,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> Result<Option<product_stock::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(product_stock::Entity::find()
        .filter(product_stock::Column::ProductId.eq(product_id))
        .filter(product_stock::Column::WarehouseId.eq(warehouse_id))
        .one(conn)
        .await?)
}

async fn ensure_cell_in_scope<C>(
    conn: &C,
    scope: TenantScope,
    product_id: Uuid,
    warehouse_id: Uuid,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    find_in_scope::<product::Entity, _>(conn, scope, product::Column::CompanyId, product_id, "Product")
        .await?;
    find_in_scope::<warehouse::Entity, _>(
        conn,
        scope,
        warehouse::Column::CompanyId,
        warehouse_id,
        "Warehouse",
    )
    .await?;
    Ok(())
}

/// Adjusts a cell inside an open transaction, creating it on first use.
///
/// The update is guarded so the quantity never drops below zero or below what is reserved.
pub(crate) async fn adjust_in<C>(
    conn: &C,
    company_id: Uuid,
    product_id: Uuid,
    warehouse_id: Uuid,
    delta: i32,
) -> Result<product_stock::Model, ServiceError>
where
    C: ConnectionTrait,
{
    ensure_cell_in_scope(conn, TenantScope::Company(company_id), product_id, warehouse_id).await?;

    product_stock::Entity::insert(product_stock::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(company_id),
        product_id: Set(product_id),
        warehouse_id: Set(warehouse_id),
        location_id: Set(None),
        quantity: Set(0),
        reserved: Set(0),
        updated_at: Set(Utc::now()),
    })
    .on_conflict(
        OnConflict::columns([
            product_stock::Column::ProductId,
            product_stock::Column::WarehouseId,
        ])
        .do_nothing()
        .to_owned(),
    )
    .exec_without_returning(conn)
    .await?;

    let updated = product_stock::Entity::update_many()
        .col_expr(
            product_stock::Column::Quantity,
            Expr::col(product_stock::Column::Quantity).add(delta),
        )
        .col_expr(product_stock::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product_stock::Column::ProductId.eq(product_id))
        .filter(product_stock::Column::WarehouseId.eq(warehouse_id))
        .filter(
            Expr::expr(Expr::col(product_stock::Column::Quantity).add(delta))
                .gte(Expr::col(product_stock::Column::Reserved)),
        )
        .filter(Expr::expr(Expr::col(product_stock::Column::Quantity).add(delta)).gte(0))
        .exec(conn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "cannot apply {} to product {} in warehouse {}",
            delta, product_id, warehouse_id
        )));
    }

    find_cell(conn, product_id, warehouse_id)
        .await?
        .ok_or_else(|| ServiceError::InternalError("stock cell vanished".to_string()))
}
