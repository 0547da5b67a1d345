use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{Action, Caller};
use crate::db::{ensure_swapped, transaction, DbPool};
use crate::entities::{
    order_item, product,
    sales_order::{self, OrderStatus},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::services::{find_in_scope, page_index, picking, sequences};

/// One requested order line.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Overrides the catalogue price when present.
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderInput {
    pub customer_id: Uuid,
    #[serde(default)]
    pub items: Vec<OrderItemInput>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 1000))]
    pub shipping_address: Option<String>,
}

/// Partial update. `items`, when present, replaces every line of the order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderInput {
    pub customer_id: Option<Uuid>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    #[validate(length(max = 1000))]
    pub shipping_address: Option<String>,
    pub items: Option<Vec<OrderItemInput>>,
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub order: sales_order::Model,
    pub items: Vec<order_item::Model>,
}

fn validate_items(items: &[OrderItemInput]) -> Result<(), ServiceError> {
    let mut per_product: HashMap<Uuid, i32> = HashMap::new();
    for (index, item) in items.iter().enumerate() {
        if item.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "items[{}].quantity must be at least 1",
                index
            )));
        }
        if matches!(item.unit_price, Some(price) if price.is_sign_negative()) {
            return Err(ServiceError::ValidationError(format!(
                "items[{}].unit_price must not be negative",
                index
            )));
        }
        let summed = per_product.entry(item.product_id).or_insert(0);
        *summed = summed.checked_add(item.quantity).ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "items[{}].quantity pushes product {} past {}",
                index,
                item.product_id,
                i32::MAX
            ))
        })?;
    }
    Ok(())
}

fn out_of_range(product_id: Uuid) -> ServiceError {
    ServiceError::ValidationError(format!(
        "order total for product {} is out of range",
        product_id
    ))
}

/// Inserts the order lines, pricing each from the catalogue unless overridden, and returns
/// them with the order total.
async fn insert_items<C>(
    conn: &C,
    company_id: Uuid,
    order_id: Uuid,
    items: &[OrderItemInput],
) -> Result<(Vec<order_item::Model>, Decimal), ServiceError>
where
    C: ConnectionTrait,
{
    let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
    let prices: HashMap<Uuid, Decimal> = product::Entity::find()
        .filter(product::Column::CompanyId.eq(company_id))
        .filter(product::Column::Id.is_in(product_ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|p| (p.id, p.price))
        .collect();

    let now = Utc::now();
    let mut created = Vec::with_capacity(items.len());
    let mut total = Decimal::ZERO;
    for item in items {
        let catalogue_price = prices
            .get(&item.product_id)
            .copied()
            .ok_or_else(|| ServiceError::not_found("Product", item.product_id))?;
        let unit_price = item.unit_price.unwrap_or(catalogue_price);
        total = unit_price
            .checked_mul(Decimal::from(item.quantity))
            .and_then(|line_total| total.checked_add(line_total))
            .ok_or_else(|| out_of_range(item.product_id))?;

        let line = order_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            sales_order_id: Set(order_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            unit_price: Set(unit_price),
            created_at: Set(now),
        }
        .insert(conn)
        .await?;
        created.push(line);
    }
    Ok((created, total))
}

/// Service for the sales order aggregate
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates an order and, when it has lines, its pick list and packing task.
    #[instrument(skip(self, caller, input), fields(user_id = %caller.user_id))]
    pub async fn create_order(
        &self,
        caller: &Caller,
        input: CreateOrderInput,
    ) -> Result<OrderDetails, ServiceError> {
        caller.require(Action::ManageOrders)?;
        let company_id = caller.write_scope()?;
        input.validate()?;
        validate_items(&input.items)?;

        let txn = self.db_pool.begin().await?;
        let outcome = self.create_in(&txn, caller, company_id, input).await;
        let (details, pick_list_id) = transaction::conclude(txn, outcome).await?;

        info!(
            order_id = %details.order.id,
            order_number = %details.order.order_number,
            status = %details.order.status,
            "order created"
        );
        metrics::increment_counter("orders_created_total");
        self.event_sender
            .emit(Event::OrderCreated {
                company_id,
                order_id: details.order.id,
                order_number: details.order.order_number.clone(),
            })
            .await;
        if let Some(pick_list_id) = pick_list_id {
            self.event_sender
                .emit(Event::PickListCreated {
                    company_id,
                    order_id: details.order.id,
                    pick_list_id,
                })
                .await;
        }
        Ok(details)
    }

    async fn create_in(
        &self,
        txn: &DatabaseTransaction,
        caller: &Caller,
        company_id: Uuid,
        input: CreateOrderInput,
    ) -> Result<(OrderDetails, Option<Uuid>), ServiceError> {
        let order_number = sequences::next_order_number(txn, company_id).await?;
        let now = Utc::now();

        let order = sales_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            order_number: Set(order_number),
            customer_id: Set(input.customer_id),
            status: Set(OrderStatus::Pending),
            total_amount: Set(Decimal::ZERO),
            notes: Set(input.notes),
            shipping_address: Set(input.shipping_address),
            created_by: Set(Some(caller.user_id)),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        let (items, total) = insert_items(txn, company_id, order.id, &input.items).await?;
        let pick_list = if items.is_empty() {
            None
        } else {
            Some(picking::create_for_order(txn, &order, &items).await?.0)
        };
        let status = if pick_list.is_some() {
            OrderStatus::PickListCreated
        } else {
            OrderStatus::Pending
        };

        let mut active: sales_order::ActiveModel = order.into();
        active.total_amount = Set(total);
        active.status = Set(status);
        let order = active.update(txn).await?;

        Ok((OrderDetails { order, items }, pick_list.map(|p| p.id)))
    }

    /// Updates an editable order. Replacing the lines regenerates the pick list.
    #[instrument(skip(self, caller, patch), fields(user_id = %caller.user_id))]
    pub async fn update_order(
        &self,
        caller: &Caller,
        order_id: Uuid,
        patch: UpdateOrderInput,
    ) -> Result<OrderDetails, ServiceError> {
        caller.require(Action::ManageOrders)?;
        let company_id = caller.write_scope()?;
        patch.validate()?;
        if let Some(items) = &patch.items {
            validate_items(items)?;
        }

        let txn = self.db_pool.begin().await?;
        let outcome = self.update_in(&txn, company_id, order_id, patch).await;
        let (details, pick_list_id) = transaction::conclude(txn, outcome).await?;

        info!(%order_id, status = %details.order.status, "order updated");
        self.event_sender
            .emit(Event::OrderUpdated {
                company_id,
                order_id,
            })
            .await;
        if let Some(pick_list_id) = pick_list_id {
            self.event_sender
                .emit(Event::PickListCreated {
                    company_id,
                    order_id,
                    pick_list_id,
                })
                .await;
        }
        Ok(details)
    }

    async fn update_in(
        &self,
        txn: &DatabaseTransaction,
        company_id: Uuid,
        order_id: Uuid,
        patch: UpdateOrderInput,
    ) -> Result<(OrderDetails, Option<Uuid>), ServiceError> {
        let order = find_in_scope::<sales_order::Entity, _>(
            txn,
            crate::auth::TenantScope::Company(company_id),
            sales_order::Column::CompanyId,
            order_id,
            "Order",
        )
        .await?;
        if !order.status.is_editable() {
            return Err(ServiceError::InvalidState(format!(
                "Order {} cannot be edited in status {}",
                order.order_number, order.status
            )));
        }

        let mut total = order.total_amount;
        let mut status = order.status;
        let mut regenerated = None;
        if let Some(items) = &patch.items {
            order_item::Entity::delete_many()
                .filter(order_item::Column::SalesOrderId.eq(order.id))
                .exec(txn)
                .await?;
            picking::remove_for_order(txn, order.id).await?;

            let (created, new_total) = insert_items(txn, company_id, order.id, items).await?;
            total = new_total;
            status = if created.is_empty() {
                OrderStatus::Pending
            } else {
                regenerated = Some(picking::create_for_order(txn, &order, &created).await?.0.id);
                OrderStatus::PickListCreated
            };
        }

        let result = sales_order::Entity::update_many()
            .col_expr(
                sales_order::Column::CustomerId,
                Expr::value(patch.customer_id.unwrap_or(order.customer_id)),
            )
            .col_expr(
                sales_order::Column::Notes,
                Expr::value(patch.notes.or(order.notes.clone())),
            )
            .col_expr(
                sales_order::Column::ShippingAddress,
                Expr::value(patch.shipping_address.or(order.shipping_address.clone())),
            )
            .col_expr(sales_order::Column::TotalAmount, Expr::value(total))
            .col_expr(sales_order::Column::Status, Expr::value(status))
            .col_expr(sales_order::Column::Version, Expr::value(order.version + 1))
            .col_expr(sales_order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sales_order::Column::Id.eq(order.id))
            .filter(sales_order::Column::CompanyId.eq(company_id))
            .filter(sales_order::Column::Status.eq(order.status))
            .filter(sales_order::Column::Version.eq(order.version))
            .exec(txn)
            .await?;
        ensure_swapped(&result, "Order", order.id)?;

        let details = load_details(txn, order.id).await?;
        Ok((details, regenerated))
    }

    /// Deletes an editable order with its lines, pick list and packing task.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn delete_order(&self, caller: &Caller, order_id: Uuid) -> Result<(), ServiceError> {
        caller.require(Action::ManageOrders)?;
        let company_id = caller.write_scope()?;

        let txn = self.db_pool.begin().await?;
        let outcome = self.delete_in(&txn, company_id, order_id).await;
        transaction::conclude(txn, outcome).await?;

        info!(%order_id, "order deleted");
        metrics::increment_counter("orders_deleted_total");
        self.event_sender
            .emit(Event::OrderDeleted {
                company_id,
                order_id,
            })
            .await;
        Ok(())
    }

    async fn delete_in(
        &self,
        txn: &DatabaseTransaction,
        company_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), ServiceError> {
        let order = find_in_scope::<sales_order::Entity, _>(
            txn,
            crate::auth::TenantScope::Company(company_id),
            sales_order::Column::CompanyId,
            order_id,
            "Order",
        )
        .await?;
        if !order.status.is_editable() {
            return Err(ServiceError::InvalidState(format!(
                "Order {} cannot be deleted in status {}",
                order.order_number, order.status
            )));
        }

        order_item::Entity::delete_many()
            .filter(order_item::Column::SalesOrderId.eq(order.id))
            .exec(txn)
            .await?;
        picking::remove_for_order(txn, order.id).await?;

        let result = sales_order::Entity::delete_many()
            .filter(sales_order::Column::Id.eq(order.id))
            .filter(sales_order::Column::CompanyId.eq(company_id))
            .filter(sales_order::Column::Status.eq(order.status))
            .exec(txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Order {} was modified concurrently",
                order.id
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, caller))]
    pub async fn get_order(
        &self,
        caller: &Caller,
        order_id: Uuid,
    ) -> Result<OrderDetails, ServiceError> {
        caller.require(Action::ReadOrders)?;
        let db = &*self.db_pool;
        let order = find_in_scope::<sales_order::Entity, _>(
            db,
            caller.read_scope()?,
            sales_order::Column::CompanyId,
            order_id,
            "Order",
        )
        .await?;
        let items = items_of(db, order.id).await?;
        Ok(OrderDetails { order, items })
    }

    /// Lists orders newest first, optionally filtered by status.
    #[instrument(skip(self, caller))]
    pub async fn list_orders(
        &self,
        caller: &Caller,
        status: Option<OrderStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderDetails>, u64), ServiceError> {
        caller.require(Action::ReadOrders)?;
        let db = &*self.db_pool;

        let mut query = caller
            .read_scope()?
            .apply(sales_order::Entity::find(), sales_order::Column::CompanyId);
        if let Some(status) = status {
            query = query.filter(sales_order::Column::Status.eq(status));
        }

        let paginator = query
            .order_by_desc(sales_order::Column::CreatedAt)
            .order_by_desc(sales_order::Column::OrderNumber)
            .paginate(db, limit);
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page_index(page)).await?;

        let ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let mut items_by_order: HashMap<Uuid, Vec<order_item::Model>> = HashMap::new();
        for item in order_item::Entity::find()
            .filter(order_item::Column::SalesOrderId.is_in(ids))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(db)
            .await?
        {
            items_by_order
                .entry(item.sales_order_id)
                .or_default()
                .push(item);
        }

        let details = orders
            .into_iter()
            .map(|order| {
                let items = items_by_order.remove(&order.id).unwrap_or_default();
                OrderDetails { order, items }
            })
            .collect();
        Ok((details, total))
    }
}

/// Moves an order from the status it was read with to `next`, bumping its version.
pub(crate) async fn transition_order<C>(
    conn: &C,
    order: &sales_order::Model,
    next: OrderStatus,
) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let result = sales_order::Entity::update_many()
        .col_expr(sales_order::Column::Status, Expr::value(next))
        .col_expr(
            sales_order::Column::Version,
            Expr::col(sales_order::Column::Version).add(1),
        )
        .col_expr(sales_order::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(sales_order::Column::Id.eq(order.id))
        .filter(sales_order::Column::CompanyId.eq(order.company_id))
        .filter(sales_order::Column::Status.eq(order.status))
        .exec(conn)
        .await?;
    ensure_swapped(&result, "Order", order.id)?;
    info!(order_id = %order.id, from = %order.status, to = %next, "order status changed");
    Ok(())
}

async fn items_of<C>(conn: &C, order_id: Uuid) -> Result<Vec<order_item::Model>, ServiceError>
where
    C: ConnectionTrait,
{
    Ok(order_item::Entity::find()
        .filter(order_item::Column::SalesOrderId.eq(order_id))
        .order_by_asc(order_item::Column::CreatedAt)
        .all(conn)
        .await?)
}

async fn load_details<C>(conn: &C, order_id: Uuid) -> Result<OrderDetails, ServiceError>
where
    C: ConnectionTrait,
{
    let order = sales_order::Entity::find_by_id(order_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
    let items = items_of(conn, order_id).await?;
    Ok(OrderDetails { order, items })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, unit_price: Option<Decimal>) -> OrderItemInput {
        OrderItemInput {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price,
        }
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let err = validate_items(&[line(2, None), line(0, None)]).unwrap_err();
        assert!(err.to_string().contains("items[1].quantity"));
    }

    #[test]
    fn quantities_summing_past_i32_are_rejected() {
        let mut first = line(i32::MAX, None);
        let mut second = line(1, None);
        second.product_id = first.product_id;
        let err = validate_items(&[first.clone(), second.clone()]).unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
        assert!(err.to_string().contains("items[1].quantity"));

        first.quantity = i32::MAX - 1;
        second.quantity = 1;
        assert!(validate_items(&[first, second]).is_ok());
    }

    #[test]
    fn negative_price_override_is_rejected() {
        assert!(validate_items(&[line(1, Some(dec!(-1)))]).is_err());
        assert!(validate_items(&[line(1, Some(dec!(0)))]).is_ok());
    }
}
