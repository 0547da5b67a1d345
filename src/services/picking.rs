use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::{Action, Caller, Role, TenantScope};
use crate::config::PickingPolicy;
use crate::db::{ensure_swapped, transaction, DbPool};
use crate::entities::{
    order_item, packing_task,
    pick_list::{self, PickListStatus},
    pick_list_item, sales_order, warehouse,
    packing_task::PackingStatus,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::services::{find_in_scope, orders, page_index, users};

/// A pick list with its lines.
#[derive(Debug, Clone, PartialEq)]
pub struct PickListDetails {
    pub pick_list: pick_list::Model,
    pub items: Vec<pick_list_item::Model>,
}

/// Creates the pick list (one line per distinct product, quantities summed) and the packing
/// task for a freshly itemised order, against the tenant's oldest warehouse.
pub(crate) async fn create_for_order<C>(
    conn: &C,
    order: &sales_order::Model,
    items: &[order_item::Model],
) -> Result<(pick_list::Model, packing_task::Model), ServiceError>
where
    C: ConnectionTrait,
{
    let warehouse = warehouse::Entity::find()
        .filter(warehouse::Column::CompanyId.eq(order.company_id))
        .order_by_asc(warehouse::Column::CreatedAt)
        .one(conn)
        .await?
        .ok_or_else(|| {
            ServiceError::ValidationError(
                "a warehouse is required before orders with items can be created".into(),
            )
        })?;

    let now = Utc::now();
    let pick_list = pick_list::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(order.company_id),
        sales_order_id: Set(order.id),
        warehouse_id: Set(warehouse.id),
        assigned_to: Set(None),
        status: Set(PickListStatus::Pending),
        started_at: Set(None),
        completed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    for (product_id, quantity_required) in required_quantities(items)? {
        pick_list_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            pick_list_id: Set(pick_list.id),
            product_id: Set(product_id),
            quantity_required: Set(quantity_required),
            quantity_picked: Set(0),
        }
        .insert(conn)
        .await?;
    }

    let task = packing_task::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_id: Set(order.company_id),
        sales_order_id: Set(order.id),
        pick_list_id: Set(pick_list.id),
        assigned_to: Set(None),
        status: Set(PackingStatus::Pending),
        packed_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await?;

    info!(order_id = %order.id, pick_list_id = %pick_list.id, warehouse_id = %warehouse.id, "pick list created");
    Ok((pick_list, task))
}

/// Summed quantity per product, in order of first appearance.
pub(crate) fn required_quantities(
    items: &[order_item::Model],
) -> Result<Vec<(Uuid, i32)>, ServiceError> {
    let mut totals: Vec<(Uuid, i32)> = Vec::new();
    for item in items {
        match totals.iter_mut().find(|(product_id, _)| *product_id == item.product_id) {
            Some((_, quantity)) => {
                *quantity = quantity.checked_add(item.quantity).ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "quantity required for product {} exceeds {}",
                        item.product_id,
                        i32::MAX
                    ))
                })?;
            }
            None => totals.push((item.product_id, item.quantity)),
        }
    }
    Ok(totals)
}

/// Deletes every pick list of an order together with its lines and packing tasks.
pub(crate) async fn remove_for_order<C>(conn: &C, order_id: Uuid) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let pick_list_ids: Vec<Uuid> = pick_list::Entity::find()
        .select_only()
        .column(pick_list::Column::Id)
        .filter(pick_list::Column::SalesOrderId.eq(order_id))
        .into_tuple()
        .all(conn)
        .await?;

    for pick_list_id in &pick_list_ids {
        pick_list_item::Entity::delete_many()
            .filter(pick_list_item::Column::PickListId.eq(*pick_list_id))
            .exec(conn)
            .await?;
        packing_task::Entity::delete_many()
            .filter(packing_task::Column::PickListId.eq(*pick_list_id))
            .exec(conn)
            .await?;
    }
    pick_list::Entity::delete_many()
        .filter(pick_list::Column::SalesOrderId.eq(order_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Service for pick list operations
#[derive(Clone)]
pub struct PickingService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    policy: PickingPolicy,
}

impl PickingService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, policy: PickingPolicy) -> Self {
        Self {
            db_pool,
            event_sender,
            policy,
        }
    }

    fn ensure_picker_may_act(caller: &Caller, pick_list: &pick_list::Model) -> Result<(), ServiceError> {
        if caller.role == Role::Picker {
            if let Some(assignee) = pick_list.assigned_to {
                if assignee != caller.user_id {
                    return Err(ServiceError::Forbidden(format!(
                        "pick list {} is assigned to another picker",
                        pick_list.id
                    )));
                }
            }
        }
        Ok(())
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn assign_picker(
        &self,
        caller: &Caller,
        pick_list_id: Uuid,
        picker_id: Uuid,
    ) -> Result<pick_list::Model, ServiceError> {
        caller.require(Action::AssignWork)?;
        let company_id = caller.write_scope()?;

        let txn = self.db_pool.begin().await?;
        let outcome = async {
            let list = self.load(&txn, TenantScope::Company(company_id), pick_list_id).await?;
            if list.status == PickListStatus::Completed {
                return Err(ServiceError::InvalidState(format!(
                    "pick list {} is already completed",
                    list.id
                )));
            }
            users::find_assignable(&txn, company_id, picker_id, Role::Picker).await?;

            let result = pick_list::Entity::update_many()
                .col_expr(pick_list::Column::AssignedTo, Expr::value(Some(picker_id)))
                .col_expr(pick_list::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(pick_list::Column::Id.eq(list.id))
                .filter(pick_list::Column::CompanyId.eq(company_id))
                .filter(pick_list::Column::Status.eq(list.status))
                .exec(&txn)
                .await?;
            ensure_swapped(&result, "Pick list", list.id)?;
            self.load(&txn, TenantScope::Company(company_id), list.id).await
        }
        .await;
        let list = transaction::conclude(txn, outcome).await?;

        info!(%pick_list_id, %picker_id, "picker assigned");
        self.event_sender
            .emit(Event::PickerAssigned {
                pick_list_id,
                picker_id,
            })
            .await;
        Ok(list)
    }

    /// Moves the pick list to `in_progress` and a `pick_list_created` order to `picking`.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn start_picking(
        &self,
        caller: &Caller,
        pick_list_id: Uuid,
    ) -> Result<pick_list::Model, ServiceError> {
        caller.require(Action::Pick)?;
        let company_id = caller.write_scope()?;
        let strict = self.policy.enforce_status_order;

        let txn = self.db_pool.begin().await?;
        let outcome = async {
            let list = self.load(&txn, TenantScope::Company(company_id), pick_list_id).await?;
            Self::ensure_picker_may_act(caller, &list)?;
            let next = list.status.start(strict).ok_or_else(|| {
                ServiceError::InvalidState(format!(
                    "pick list {} cannot start picking in status {}",
                    list.id, list.status
                ))
            })?;

            let now = Utc::now();
            let result = pick_list::Entity::update_many()
                .col_expr(pick_list::Column::Status, Expr::value(next))
                .col_expr(
                    pick_list::Column::StartedAt,
                    Expr::value(Some(list.started_at.unwrap_or(now))),
                )
                .col_expr(pick_list::Column::UpdatedAt, Expr::value(now))
                .filter(pick_list::Column::Id.eq(list.id))
                .filter(pick_list::Column::CompanyId.eq(company_id))
                .filter(pick_list::Column::Status.eq(list.status))
                .exec(&txn)
                .await?;
            ensure_swapped(&result, "Pick list", list.id)?;

            let order = self.order_of(&txn, &list).await?;
            if order.status.advances_on_pick_start() {
                orders::transition_order(&txn, &order, sales_order::OrderStatus::Picking).await?;
            }
            self.load(&txn, TenantScope::Company(company_id), list.id).await
        }
        .await;
        let list = transaction::conclude(txn, outcome).await?;

        info!(%pick_list_id, status = %list.status, "picking started");
        metrics::increment_counter("picking_started_total");
        self.event_sender
            .emit(Event::PickingStarted {
                pick_list_id,
                order_id: list.sales_order_id,
            })
            .await;
        Ok(list)
    }

    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn complete_picking(
        &self,
        caller: &Caller,
        pick_list_id: Uuid,
    ) -> Result<pick_list::Model, ServiceError> {
        caller.require(Action::Pick)?;
        let company_id = caller.write_scope()?;
        let strict = self.policy.enforce_status_order;

        let txn = self.db_pool.begin().await?;
        let outcome = async {
            let list = self.load(&txn, TenantScope::Company(company_id), pick_list_id).await?;
            Self::ensure_picker_may_act(caller, &list)?;
            let next = list.status.complete(strict).ok_or_else(|| {
                ServiceError::InvalidState(format!(
                    "pick list {} cannot complete picking in status {}",
                    list.id, list.status
                ))
            })?;

            let result = pick_list::Entity::update_many()
                .col_expr(pick_list::Column::Status, Expr::value(next))
                .col_expr(pick_list::Column::CompletedAt, Expr::value(Some(Utc::now())))
                .col_expr(pick_list::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(pick_list::Column::Id.eq(list.id))
                .filter(pick_list::Column::CompanyId.eq(company_id))
                .filter(pick_list::Column::Status.eq(list.status))
                .exec(&txn)
                .await?;
            ensure_swapped(&result, "Pick list", list.id)?;
            self.load(&txn, TenantScope::Company(company_id), list.id).await
        }
        .await;
        let list = transaction::conclude(txn, outcome).await?;

        info!(%pick_list_id, "picking completed");
        metrics::increment_counter("picking_completed_total");
        self.event_sender
            .emit(Event::PickingCompleted {
                pick_list_id,
                order_id: list.sales_order_id,
            })
            .await;
        Ok(list)
    }

    /// Records the picked quantity of one pick list line.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn record_pick(
        &self,
        caller: &Caller,
        item_id: Uuid,
        quantity_picked: i32,
    ) -> Result<pick_list_item::Model, ServiceError> {
        caller.require(Action::Pick)?;
        let company_id = caller.write_scope()?;
        if quantity_picked < 0 {
            return Err(ServiceError::ValidationError(
                "quantity_picked must not be negative".into(),
            ));
        }

        let txn = self.db_pool.begin().await?;
        let outcome = self
            .record_pick_in(&txn, caller, company_id, item_id, quantity_picked)
            .await;
        let item = transaction::conclude(txn, outcome).await?;

        info!(%item_id, quantity_picked, "pick recorded");
        self.event_sender
            .emit(Event::ItemPicked {
                pick_list_item_id: item_id,
                quantity_picked,
            })
            .await;
        Ok(item)
    }

    async fn record_pick_in(
        &self,
        txn: &DatabaseTransaction,
        caller: &Caller,
        company_id: Uuid,
        item_id: Uuid,
        quantity_picked: i32,
    ) -> Result<pick_list_item::Model, ServiceError> {
        let item = pick_list_item::Entity::find_by_id(item_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Pick list item", item_id))?;
        let list = pick_list::Entity::find_by_id(item.pick_list_id)
            .filter(pick_list::Column::CompanyId.eq(company_id))
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Pick list item", item_id))?;
        Self::ensure_picker_may_act(caller, &list)?;

        if !list.status.accepts_picks(self.policy.enforce_status_order) {
            return Err(ServiceError::InvalidState(format!(
                "pick list {} does not accept picks in status {}",
                list.id, list.status
            )));
        }
        if self.policy.enforce_picked_quantity && quantity_picked > item.quantity_required {
            return Err(ServiceError::ValidationError(format!(
                "quantity_picked {} exceeds quantity_required {}",
                quantity_picked, item.quantity_required
            )));
        }

        let mut active: pick_list_item::ActiveModel = item.into();
        active.quantity_picked = Set(quantity_picked);
        Ok(active.update(txn).await?)
    }

    #[instrument(skip(self, caller))]
    pub async fn get_pick_list(
        &self,
        caller: &Caller,
        pick_list_id: Uuid,
    ) -> Result<PickListDetails, ServiceError> {
        caller.require(Action::ReadOrders)?;
        let db = &*self.db_pool;
        let pick_list = self.load(db, caller.read_scope()?, pick_list_id).await?;
        let items = pick_list_item::Entity::find()
            .filter(pick_list_item::Column::PickListId.eq(pick_list.id))
            .all(db)
            .await?;
        Ok(PickListDetails { pick_list, items })
    }

    /// Pick list of an order, if it has one.
    #[instrument(skip(self, caller))]
    pub async fn get_for_order(
        &self,
        caller: &Caller,
        order_id: Uuid,
    ) -> Result<Option<PickListDetails>, ServiceError> {
        caller.require(Action::ReadOrders)?;
        let scope = caller.read_scope()?;
        let db = &*self.db_pool;
        let list = scope
            .apply(pick_list::Entity::find(), pick_list::Column::CompanyId)
            .filter(pick_list::Column::SalesOrderId.eq(order_id))
            .one(db)
            .await?;
        match list {
            Some(list) => Ok(Some(self.get_pick_list(caller, list.id).await?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, caller))]
    pub async fn list_pick_lists(
        &self,
        caller: &Caller,
        status: Option<PickListStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<pick_list::Model>, u64), ServiceError> {
        caller.require(Action::ReadOrders)?;
        let mut query = caller
            .read_scope()?
            .apply(pick_list::Entity::find(), pick_list::Column::CompanyId);
        if let Some(status) = status {
            query = query.filter(pick_list::Column::Status.eq(status));
        }
        if caller.role == Role::Picker {
            query = query.filter(
                pick_list::Column::AssignedTo
                    .eq(caller.user_id)
                    .or(pick_list::Column::AssignedTo.is_null()),
            );
        }

        let paginator = query
            .order_by_desc(pick_list::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let lists = paginator.fetch_page(page_index(page)).await?;
        Ok((lists, total))
    }

    async fn load<C>(
        &self,
        conn: &C,
        scope: TenantScope,
        pick_list_id: Uuid,
    ) -> Result<pick_list::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        find_in_scope::<pick_list::Entity, _>(
            conn,
            scope,
            pick_list::Column::CompanyId,
            pick_list_id,
            "Pick list",
        )
        .await
    }

    async fn order_of<C>(
        &self,
        conn: &C,
        list: &pick_list::Model,
    ) -> Result<sales_order::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        sales_order::Entity::find_by_id(list.sales_order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", list.sales_order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(product_id: Uuid, quantity: i32) -> order_item::Model {
        order_item::Model {
            id: Uuid::new_v4(),
            sales_order_id: Uuid::new_v4(),
            product_id,
            quantity,
            unit_price: dec!(1),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn quantities_are_summed_per_product_in_first_seen_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let totals = required_quantities(&[item(a, 2), item(b, 1), item(a, 3)]).unwrap();
        assert_eq!(totals, vec![(a, 5), (b, 1)]);
    }

    #[test]
    fn no_items_means_no_lines() {
        assert!(required_quantities(&[]).unwrap().is_empty());
    }

    #[test]
    fn overflowing_quantities_are_a_validation_error() {
        let a = Uuid::new_v4();
        let err = required_quantities(&[item(a, i32::MAX), item(a, 1)]).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
