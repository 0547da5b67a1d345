use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait, UpdateMany,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{Action, Caller, TenantScope};
use crate::config::ReturnPolicy;
use crate::db::{ensure_swapped, transaction, DbPool};
use crate::entities::{
    order_item, pick_list,
    return_authorization::{self, InspectionOutcome, ReturnStatus, ReturnTransition},
    sales_order::{self, OrderStatus},
    shipment,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::services::{find_in_scope, page_index, sequences, stock};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateReturnInput {
    pub sales_order_id: Uuid,
    pub shipment_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub reason: String,
    #[validate(length(max = 50))]
    pub return_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InspectReturnInput {
    /// `APPROVED` or `REJECTED`
    pub outcome: String,
    pub recovery_value: Option<Decimal>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundInput {
    pub amount: Decimal,
}

/// Service for return merchandise authorizations
#[derive(Clone)]
pub struct ReturnService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    policy: ReturnPolicy,
}

impl ReturnService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, policy: ReturnPolicy) -> Self {
        Self {
            db_pool,
            event_sender,
            policy,
        }
    }

    /// Opens an RMA against a delivered order and one of its shipments.
    #[instrument(skip(self, caller, input), fields(user_id = %caller.user_id, order_id = %input.sales_order_id))]
    pub async fn create_rma(
        &self,
        caller: &Caller,
        input: CreateReturnInput,
    ) -> Result<return_authorization::Model, ServiceError> {
        caller.require(Action::ManageReturns)?;
        let company_id = caller.write_scope()?;
        input.validate()?;

        let txn = self.db_pool.begin().await?;
        let outcome = self.create_in(&txn, caller, company_id, input).await;
        let created = transaction::conclude(txn, outcome).await?;

        info!(return_id = %created.id, rma_number = %created.rma_number, "return created");
        metrics::increment_counter("returns_created_total");
        self.event_sender
            .emit(Event::ReturnCreated {
                return_id: created.id,
                rma_number: created.rma_number.clone(),
                order_id: created.sales_order_id,
            })
            .await;
        Ok(created)
    }

    async fn create_in(
        &self,
        txn: &DatabaseTransaction,
        caller: &Caller,
        company_id: Uuid,
        input: CreateReturnInput,
    ) -> Result<return_authorization::Model, ServiceError> {
        // Claim the number first so the sequence row lock orders concurrent creates
        let rma_number = sequences::next_rma_number(txn, company_id).await?;

        let scope = TenantScope::Company(company_id);
        let order = find_in_scope::<sales_order::Entity, _>(
            txn,
            scope,
            sales_order::Column::CompanyId,
            input.sales_order_id,
            "Order",
        )
        .await?;
        let shipped = find_in_scope::<shipment::Entity, _>(
            txn,
            scope,
            shipment::Column::CompanyId,
            input.shipment_id,
            "Shipment",
        )
        .await?;
        if order.status != OrderStatus::Delivered {
            return Err(ServiceError::InvalidState(format!(
                "Order {} must be delivered before a return, current status: {}",
                order.order_number, order.status
            )));
        }
        if shipped.sales_order_id != order.id {
            return Err(ServiceError::ValidationError(format!(
                "shipment {} does not belong to order {}",
                shipped.id, order.order_number
            )));
        }

        let existing = return_authorization::Entity::find()
            .filter(return_authorization::Column::CompanyId.eq(company_id))
            .filter(return_authorization::Column::SalesOrderId.eq(order.id))
            .filter(return_authorization::Column::ShipmentId.eq(shipped.id))
            .one(txn)
            .await?;
        if let Some(existing) = existing {
            return Err(ServiceError::Conflict(format!(
                "Order {} already has return {} for shipment {}",
                order.order_number, existing.rma_number, shipped.id
            )));
        }

        let now = Utc::now();
        let created = return_authorization::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            rma_number: Set(rma_number),
            sales_order_id: Set(order.id),
            shipment_id: Set(shipped.id),
            customer_id: Set(order.customer_id),
            status: Set(ReturnStatus::RmaCreated),
            reason: Set(input.reason),
            return_type: Set(input.return_type),
            recovery_value: Set(None),
            refund_amount: Set(None),
            notes: Set(input.notes.filter(|n| !n.trim().is_empty())),
            created_by: Set(caller.user_id),
            received_at: Set(None),
            inspected_at: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(format!(
                "Order {} already has a return for shipment {}",
                order.order_number, shipped.id
            )),
            _ => ServiceError::from(err),
        })?;
        Ok(created)
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn mark_awaiting_return(
        &self,
        caller: &Caller,
        return_id: Uuid,
    ) -> Result<return_authorization::Model, ServiceError> {
        self.simple_step(caller, return_id, ReturnTransition::MarkAwaitingReturn, |update| update)
            .await
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn receive_item(
        &self,
        caller: &Caller,
        return_id: Uuid,
    ) -> Result<return_authorization::Model, ServiceError> {
        let now = Utc::now();
        self.simple_step(caller, return_id, ReturnTransition::Receive, |update| {
            update.col_expr(
                return_authorization::Column::ReceivedAt,
                Expr::value(Some(now)),
            )
        })
        .await
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn start_inspection(
        &self,
        caller: &Caller,
        return_id: Uuid,
    ) -> Result<return_authorization::Model, ServiceError> {
        self.simple_step(caller, return_id, ReturnTransition::StartInspection, |update| update)
            .await
    }

    /// Records the inspection result. Approved goods go back on the shelf when
    /// [`ReturnPolicy::restock_on_approval`] is set.
    #[instrument(skip(self, caller, input), fields(user_id = %caller.user_id))]
    pub async fn inspect_rma(
        &self,
        caller: &Caller,
        return_id: Uuid,
        input: InspectReturnInput,
    ) -> Result<return_authorization::Model, ServiceError> {
        caller.require(Action::ManageReturns)?;
        let company_id = caller.write_scope()?;
        let outcome: InspectionOutcome = input
            .outcome
            .trim()
            .parse()
            .map_err(ServiceError::ValidationError)?;
        if matches!(input.recovery_value, Some(v) if v.is_sign_negative()) {
            return Err(ServiceError::ValidationError(
                "recovery_value must not be negative".into(),
            ));
        }

        let txn = self.db_pool.begin().await?;
        let result = self
            .inspect_in(&txn, company_id, return_id, outcome, &input)
            .await;
        let (before, after) = transaction::conclude(txn, result).await?;

        self.announce(&before, &after).await;
        Ok(after)
    }

    async fn inspect_in(
        &self,
        txn: &DatabaseTransaction,
        company_id: Uuid,
        return_id: Uuid,
        outcome: InspectionOutcome,
        input: &InspectReturnInput,
    ) -> Result<(return_authorization::Model, return_authorization::Model), ServiceError> {
        let before = load(txn, TenantScope::Company(company_id), return_id).await?;
        let notes = before.notes_with(input.notes.as_deref());
        let now = Utc::now();
        let after = step(txn, &before, ReturnTransition::Inspect(outcome), |update| {
            update
                .col_expr(
                    return_authorization::Column::RecoveryValue,
                    Expr::value(input.recovery_value),
                )
                .col_expr(return_authorization::Column::Notes, Expr::value(notes))
                .col_expr(
                    return_authorization::Column::InspectedAt,
                    Expr::value(Some(now)),
                )
        })
        .await?;

        if outcome == InspectionOutcome::Approved && self.policy.restock_on_approval {
            restock(txn, &after).await?;
        }
        Ok((before, after))
    }

    #[instrument(skip(self, caller, input), fields(user_id = %caller.user_id, amount = %input.amount))]
    pub async fn process_refund(
        &self,
        caller: &Caller,
        return_id: Uuid,
        input: RefundInput,
    ) -> Result<return_authorization::Model, ServiceError> {
        caller.require(Action::Refund)?;
        let company_id = caller.write_scope()?;
        if input.amount.is_sign_negative() {
            return Err(ServiceError::ValidationError(
                "refund amount must not be negative".into(),
            ));
        }

        let txn = self.db_pool.begin().await?;
        let result = self.refund_in(&txn, company_id, return_id, input.amount).await;
        let (before, after) = transaction::conclude(txn, result).await?;

        metrics::increment_counter("returns_refunded_total");
        self.announce(&before, &after).await;
        self.event_sender
            .emit(Event::ReturnRefunded {
                return_id,
                amount: input.amount,
            })
            .await;
        Ok(after)
    }

    async fn refund_in(
        &self,
        txn: &DatabaseTransaction,
        company_id: Uuid,
        return_id: Uuid,
        amount: Decimal,
    ) -> Result<(return_authorization::Model, return_authorization::Model), ServiceError> {
        let before = load(txn, TenantScope::Company(company_id), return_id).await?;
        allowed(&before, ReturnTransition::Refund)?;

        let order = sales_order::Entity::find_by_id(before.sales_order_id)
            .filter(sales_order::Column::CompanyId.eq(company_id))
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", before.sales_order_id))?;
        if amount > order.total_amount {
            return Err(ServiceError::ValidationError(format!(
                "refund {} exceeds order total {}",
                amount, order.total_amount
            )));
        }

        let now = Utc::now();
        let after = step(txn, &before, ReturnTransition::Refund, |update| {
            update
                .col_expr(
                    return_authorization::Column::RefundAmount,
                    Expr::value(Some(amount)),
                )
                .col_expr(
                    return_authorization::Column::CompletedAt,
                    Expr::value(Some(now)),
                )
        })
        .await?;
        Ok((before, after))
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn close_rma(
        &self,
        caller: &Caller,
        return_id: Uuid,
    ) -> Result<return_authorization::Model, ServiceError> {
        self.simple_step(caller, return_id, ReturnTransition::Close, |update| update)
            .await
    }

    #[instrument(skip(self, caller))]
    pub async fn get_return(
        &self,
        caller: &Caller,
        return_id: Uuid,
    ) -> Result<return_authorization::Model, ServiceError> {
        caller.require(Action::ReadOrders)?;
        load(&*self.db_pool, caller.read_scope()?, return_id).await
    }

    #[instrument(skip(self, caller))]
    pub async fn list_returns(
        &self,
        caller: &Caller,
        status: Option<ReturnStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<return_authorization::Model>, u64), ServiceError> {
        caller.require(Action::ReadOrders)?;
        let mut query = caller.read_scope()?.apply(
            return_authorization::Entity::find(),
            return_authorization::Column::CompanyId,
        );
        if let Some(status) = status {
            query = query.filter(return_authorization::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(return_authorization::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let returns = paginator.fetch_page(page_index(page)).await?;
        Ok((returns, total))
    }

    async fn simple_step<F>(
        &self,
        caller: &Caller,
        return_id: Uuid,
        transition: ReturnTransition,
        extra: F,
    ) -> Result<return_authorization::Model, ServiceError>
    where
        F: FnOnce(UpdateMany<return_authorization::Entity>) -> UpdateMany<return_authorization::Entity>,
    {
        caller.require(Action::ManageReturns)?;
        let company_id = caller.write_scope()?;

        let txn = self.db_pool.begin().await?;
        let result = async {
            let before = load(&txn, TenantScope::Company(company_id), return_id).await?;
            let after = step(&txn, &before, transition, extra).await?;
            Ok::<_, ServiceError>((before, after))
        }
        .await;
        let (before, after) = transaction::conclude(txn, result).await?;

        self.announce(&before, &after).await;
        Ok(after)
    }

    async fn announce(
        &self,
        before: &return_authorization::Model,
        after: &return_authorization::Model,
    ) {
        info!(
            return_id = %after.id,
            from = %before.status,
            to = %after.status,
            "return transitioned"
        );
        self.event_sender
            .emit(Event::ReturnTransitioned {
                return_id: after.id,
                from: before.status.to_string(),
                to: after.status.to_string(),
            })
            .await;
    }
}

fn allowed(
    rma: &return_authorization::Model,
    transition: ReturnTransition,
) -> Result<ReturnStatus, ServiceError> {
    rma.status.apply(transition).ok_or_else(|| {
        ServiceError::InvalidState(format!(
            "cannot {} return {} in status {}",
            transition.name(),
            rma.rma_number,
            rma.status
        ))
    })
}

/// Moves `rma` along `transition`, guarded on the status it was read with.
async fn step<C, F>(
    conn: &C,
    rma: &return_authorization::Model,
    transition: ReturnTransition,
    extra: F,
) -> Result<return_authorization::Model, ServiceError>
where
    C: ConnectionTrait,
    F: FnOnce(UpdateMany<return_authorization::Entity>) -> UpdateMany<return_authorization::Entity>,
{
    let next = allowed(rma, transition)?;
    let update = return_authorization::Entity::update_many()
        .col_expr(return_authorization::Column::Status, Expr::value(next))
        .col_expr(return_authorization::Column::UpdatedAt, Expr::value(Utc::now()));
    let result = extra(update)
        .filter(return_authorization::Column::Id.eq(rma.id))
        .filter(return_authorization::Column::CompanyId.eq(rma.company_id))
        .filter(return_authorization::Column::Status.eq(rma.status))
        .exec(conn)
        .await?;
    ensure_swapped(&result, "Return", rma.id)?;
    load(conn, TenantScope::Company(rma.company_id), rma.id).await
}

/// Adds the order's quantities back at the warehouse it was picked from.
async fn restock<C>(conn: &C, rma: &return_authorization::Model) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let Some(list) = pick_list::Entity::find()
        .filter(pick_list::Column::SalesOrderId.eq(rma.sales_order_id))
        .filter(pick_list::Column::CompanyId.eq(rma.company_id))
        .one(conn)
        .await?
    else {
        warn!(return_id = %rma.id, "no pick list for returned order, skipping restock");
        return Ok(());
    };

    let items = order_item::Entity::find()
        .filter(order_item::Column::SalesOrderId.eq(rma.sales_order_id))
        .all(conn)
        .await?;
    for item in items {
        let cell = stock::adjust_in(
            conn,
            rma.company_id,
            item.product_id,
            list.warehouse_id,
            item.quantity,
        )
        .await?;
        info!(
            return_id = %rma.id,
            product_id = %item.product_id,
            quantity = cell.quantity,
            "returned stock restocked"
        );
    }
    Ok(())
}

async fn load<C>(
    conn: &C,
    scope: TenantScope,
    return_id: Uuid,
) -> Result<return_authorization::Model, ServiceError>
where
    C: ConnectionTrait,
{
    find_in_scope::<return_authorization::Entity, _>(
        conn,
        scope,
        return_authorization::Column::CompanyId,
        return_id,
        "Return",
    )
    .await
}
