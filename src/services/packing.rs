use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::auth::{Action, Caller, Role, TenantScope};
use crate::db::{ensure_swapped, transaction, DbPool};
use crate::entities::{
    packing_task::{self, PackingStatus},
    sales_order::{self, OrderStatus},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::services::{find_in_scope, orders, page_index, users};

/// Service for packing tasks
#[derive(Clone)]
pub struct PackingService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PackingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Packers only act on tasks assigned to them.
    fn ensure_may_act(caller: &Caller, task: &packing_task::Model) -> Result<(), ServiceError> {
        if caller.role == Role::Packer && task.assigned_to != Some(caller.user_id) {
            return Err(ServiceError::Forbidden(format!(
                "packing task {} is not assigned to you",
                task.id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn assign_packer(
        &self,
        caller: &Caller,
        task_id: Uuid,
        packer_id: Uuid,
    ) -> Result<packing_task::Model, ServiceError> {
        caller.require(Action::AssignWork)?;
        let company_id = caller.write_scope()?;

        let txn = self.db_pool.begin().await?;
        let outcome = self.assign_in(&txn, company_id, task_id, packer_id).await;
        let task = transaction::conclude(txn, outcome).await?;

        info!(%task_id, %packer_id, "packer assigned");
        self.event_sender
            .emit(Event::PackerAssigned {
                packing_task_id: task_id,
                packer_id,
            })
            .await;
        Ok(task)
    }

    async fn assign_in(
        &self,
        txn: &DatabaseTransaction,
        company_id: Uuid,
        task_id: Uuid,
        packer_id: Uuid,
    ) -> Result<packing_task::Model, ServiceError> {
        let task = load(txn, TenantScope::Company(company_id), task_id).await?;
        if !task.status.can_reassign() {
            return Err(ServiceError::InvalidState(format!(
                "packing task {} is {} and cannot be reassigned",
                task.id, task.status
            )));
        }
        users::find_assignable(txn, company_id, packer_id, Role::Packer).await?;

        let result = packing_task::Entity::update_many()
            .col_expr(packing_task::Column::AssignedTo, Expr::value(Some(packer_id)))
            .col_expr(packing_task::Column::Status, Expr::value(PackingStatus::Pending))
            .col_expr(packing_task::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(packing_task::Column::Id.eq(task.id))
            .filter(packing_task::Column::CompanyId.eq(company_id))
            .filter(packing_task::Column::Status.eq(task.status))
            .exec(txn)
            .await?;
        ensure_swapped(&result, "Packing task", task.id)?;
        load(txn, TenantScope::Company(company_id), task.id).await
    }

    /// `pending -> packing`; the order follows to `packing` when it had not got there yet.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn start_packing(
        &self,
        caller: &Caller,
        task_id: Uuid,
    ) -> Result<packing_task::Model, ServiceError> {
        caller.require(Action::Pack)?;
        let company_id = caller.write_scope()?;

        let txn = self.db_pool.begin().await?;
        let outcome = self.start_in(&txn, caller, company_id, task_id).await;
        let task = transaction::conclude(txn, outcome).await?;

        info!(%task_id, "packing started");
        metrics::increment_counter("packing_started_total");
        self.event_sender
            .emit(Event::PackingStarted {
                packing_task_id: task_id,
                order_id: task.sales_order_id,
            })
            .await;
        Ok(task)
    }

    async fn start_in(
        &self,
        txn: &DatabaseTransaction,
        caller: &Caller,
        company_id: Uuid,
        task_id: Uuid,
    ) -> Result<packing_task::Model, ServiceError> {
        let task = load(txn, TenantScope::Company(company_id), task_id).await?;
        Self::ensure_may_act(caller, &task)?;
        if !task.status.can_start() {
            return Err(ServiceError::InvalidState(format!(
                "packing task {} cannot start in status {}",
                task.id, task.status
            )));
        }
        let order = order_of(txn, &task).await?;
        if !order.status.can_be_packed() {
            return Err(ServiceError::InvalidState(format!(
                "Order {} cannot be packed in status {}",
                order.order_number, order.status
            )));
        }

        swap_task_status(txn, &task, PackingStatus::Packing, false).await?;
        if order.status.advances_on_pack_start() {
            orders::transition_order(txn, &order, OrderStatus::Packing).await?;
        }
        load(txn, TenantScope::Company(company_id), task.id).await
    }

    /// Completes the task and marks its order `packed` in one transaction.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn complete_packing(
        &self,
        caller: &Caller,
        task_id: Uuid,
    ) -> Result<packing_task::Model, ServiceError> {
        caller.require(Action::Pack)?;
        let company_id = caller.write_scope()?;

        let txn = self.db_pool.begin().await?;
        let outcome = self.complete_in(&txn, caller, company_id, task_id).await;
        let task = transaction::conclude(txn, outcome).await.map_err(|e| {
            error!(%task_id, error = %e, "packing completion rolled back");
            e
        })?;

        info!(%task_id, order_id = %task.sales_order_id, "order packed");
        metrics::increment_counter("orders_packed_total");
        self.event_sender
            .emit(Event::OrderPacked {
                packing_task_id: task_id,
                order_id: task.sales_order_id,
            })
            .await;
        Ok(task)
    }

    async fn complete_in(
        &self,
        txn: &DatabaseTransaction,
        caller: &Caller,
        company_id: Uuid,
        task_id: Uuid,
    ) -> Result<packing_task::Model, ServiceError> {
        let task = load(txn, TenantScope::Company(company_id), task_id).await?;
        Self::ensure_may_act(caller, &task)?;
        if !task.status.can_complete() {
            return Err(ServiceError::InvalidState(format!(
                "packing task {} cannot complete in status {}",
                task.id, task.status
            )));
        }

        swap_task_status(txn, &task, PackingStatus::Completed, true).await?;

        let order = order_of(txn, &task).await?;
        if !order.status.can_be_packed() {
            return Err(ServiceError::InvalidState(format!(
                "Order {} cannot be packed in status {}",
                order.order_number, order.status
            )));
        }
        orders::transition_order(txn, &order, OrderStatus::Packed).await?;

        load(txn, TenantScope::Company(company_id), task.id).await
    }

    #[instrument(skip(self, caller))]
    pub async fn get_packing_task(
        &self,
        caller: &Caller,
        task_id: Uuid,
    ) -> Result<packing_task::Model, ServiceError> {
        caller.require(Action::ReadOrders)?;
        let task = load(&*self.db_pool, caller.read_scope()?, task_id).await?;
        if caller.role == Role::Packer && task.assigned_to != Some(caller.user_id) {
            return Err(ServiceError::not_found("Packing task", task_id));
        }
        Ok(task)
    }

    #[instrument(skip(self, caller))]
    pub async fn list_packing_tasks(
        &self,
        caller: &Caller,
        status: Option<PackingStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<packing_task::Model>, u64), ServiceError> {
        caller.require(Action::ReadOrders)?;
        let mut query = caller
            .read_scope()?
            .apply(packing_task::Entity::find(), packing_task::Column::CompanyId);
        if let Some(status) = status {
            query = query.filter(packing_task::Column::Status.eq(status));
        }
        if caller.role == Role::Packer {
            query = query.filter(packing_task::Column::AssignedTo.eq(caller.user_id));
        }

        let paginator = query
            .order_by_desc(packing_task::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let tasks = paginator.fetch_page(page_index(page)).await?;
        Ok((tasks, total))
    }
}

async fn load<C>(
    conn: &C,
    scope: TenantScope,
    task_id: Uuid,
) -> Result<packing_task::Model, ServiceError>
where
    C: ConnectionTrait,
{
    find_in_scope::<packing_task::Entity, _>(
        conn,
        scope,
        packing_task::Column::CompanyId,
        task_id,
        "Packing task",
    )
    .await
}

async fn order_of<C>(conn: &C, task: &packing_task::Model) -> Result<sales_order::Model, ServiceError>
where
    C: ConnectionTrait,
{
    sales_order::Entity::find_by_id(task.sales_order_id)
        .filter(sales_order::Column::CompanyId.eq(task.company_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Order", task.sales_order_id))
}

async fn swap_task_status<C>(
    conn: &C,
    task: &packing_task::Model,
    next: PackingStatus,
    stamp_packed_at: bool,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut update = packing_task::Entity::update_many()
        .col_expr(packing_task::Column::Status, Expr::value(next))
        .col_expr(packing_task::Column::UpdatedAt, Expr::value(now));
    if stamp_packed_at {
        update = update.col_expr(packing_task::Column::PackedAt, Expr::value(Some(now)));
    }
    let result = update
        .filter(packing_task::Column::Id.eq(task.id))
        .filter(packing_task::Column::CompanyId.eq(task.company_id))
        .filter(packing_task::Column::Status.eq(task.status))
        .exec(conn)
        .await?;
    ensure_swapped(&result, "Packing task", task.id)
}
