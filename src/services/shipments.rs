use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{Action, Caller, TenantScope};
use crate::db::{ensure_swapped, transaction, DbPool};
use crate::entities::{
    sales_order::{self, OrderStatus},
    shipment::{self, DeliveryStatus},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::metrics;
use crate::services::{find_in_scope, orders, page_index};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateShipmentInput {
    pub sales_order_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub courier_name: String,
    #[validate(length(max = 100))]
    pub tracking_number: Option<String>,
    pub weight: Option<Decimal>,
    /// Defaults to today.
    pub dispatch_date: Option<NaiveDate>,
    /// Defaults to `pending`.
    pub delivery_status: Option<DeliveryStatus>,
}

/// Courier details that may change after dispatch. The order link never changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateShipmentInput {
    #[validate(length(min = 1, max = 100))]
    pub courier_name: Option<String>,
    #[validate(length(max = 100))]
    pub tracking_number: Option<String>,
    pub weight: Option<Decimal>,
    pub dispatch_date: Option<NaiveDate>,
    pub delivery_status: Option<DeliveryStatus>,
}

fn check_weight(weight: Option<Decimal>) -> Result<(), ServiceError> {
    match weight {
        Some(w) if w.is_sign_negative() => Err(ServiceError::ValidationError(
            "weight must not be negative".into(),
        )),
        _ => Ok(()),
    }
}

/// Delivery goes through [`ShipmentService::mark_delivered`] so the order moves with it.
fn check_manual_status(status: Option<DeliveryStatus>) -> Result<(), ServiceError> {
    if status == Some(DeliveryStatus::Delivered) {
        return Err(ServiceError::ValidationError(
            "use the deliver operation to mark a shipment delivered".into(),
        ));
    }
    Ok(())
}

/// Writes `patch` over `existing`, provided the delivery status is still the one it was read with.
pub(crate) async fn apply_patch<C>(
    conn: &C,
    existing: &shipment::Model,
    patch: UpdateShipmentInput,
) -> Result<shipment::Model, ServiceError>
where
    C: ConnectionTrait,
{
    if existing.delivery_status == DeliveryStatus::Delivered && patch.delivery_status.is_some() {
        return Err(ServiceError::InvalidState(format!(
            "shipment {} is already delivered",
            existing.id
        )));
    }

    let mut update = shipment::Entity::update_many()
        .col_expr(shipment::Column::UpdatedAt, Expr::value(Utc::now()));
    if let Some(courier_name) = patch.courier_name {
        update = update.col_expr(shipment::Column::CourierName, Expr::value(courier_name));
    }
    if let Some(tracking_number) = patch.tracking_number {
        update = update.col_expr(
            shipment::Column::TrackingNumber,
            Expr::value(Some(tracking_number)),
        );
    }
    if let Some(weight) = patch.weight {
        update = update.col_expr(shipment::Column::Weight, Expr::value(Some(weight)));
    }
    if let Some(dispatch_date) = patch.dispatch_date {
        update = update.col_expr(shipment::Column::DispatchDate, Expr::value(dispatch_date));
    }
    if let Some(delivery_status) = patch.delivery_status {
        update = update.col_expr(shipment::Column::DeliveryStatus, Expr::value(delivery_status));
    }

    let result = update
        .filter(shipment::Column::Id.eq(existing.id))
        .filter(shipment::Column::CompanyId.eq(existing.company_id))
        .filter(shipment::Column::DeliveryStatus.eq(existing.delivery_status))
        .exec(conn)
        .await?;
    ensure_swapped(&result, "Shipment", existing.id)?;

    load(conn, TenantScope::Company(existing.company_id), existing.id).await
}

/// Service for managing shipments
#[derive(Clone)]
pub struct ShipmentService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ShipmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Ships a packed order.
    #[instrument(skip(self, caller, input), fields(user_id = %caller.user_id, order_id = %input.sales_order_id))]
    pub async fn create_shipment(
        &self,
        caller: &Caller,
        input: CreateShipmentInput,
    ) -> Result<shipment::Model, ServiceError> {
        caller.require(Action::ManageShipments)?;
        let company_id = caller.write_scope()?;
        input.validate()?;
        check_weight(input.weight)?;
        check_manual_status(input.delivery_status)?;

        let txn = self.db_pool.begin().await?;
        let outcome = self.create_in(&txn, caller, company_id, input).await;
        let created = transaction::conclude(txn, outcome).await?;

        info!(shipment_id = %created.id, order_id = %created.sales_order_id, "shipment created");
        metrics::increment_counter("shipments_created_total");
        self.event_sender
            .emit(Event::ShipmentCreated {
                shipment_id: created.id,
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
        input: CreateShipmentInput,
    ) -> Result<shipment::Model, ServiceError> {
        let order = find_in_scope::<sales_order::Entity, _>(
            txn,
            TenantScope::Company(company_id),
            sales_order::Column::CompanyId,
            input.sales_order_id,
            "Order",
        )
        .await?;
        if order.status != OrderStatus::Packed {
            return Err(ServiceError::PreconditionFailed(format!(
                "Order {} must be packed before shipping, current status: {}",
                order.order_number, order.status
            )));
        }

        let now = Utc::now();
        let created = shipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(order.company_id),
            sales_order_id: Set(order.id),
            packed_by: Set(caller.user_id),
            courier_name: Set(input.courier_name),
            tracking_number: Set(input.tracking_number),
            weight: Set(input.weight),
            dispatch_date: Set(input.dispatch_date.unwrap_or_else(|| now.date_naive())),
            delivery_status: Set(input.delivery_status.unwrap_or(DeliveryStatus::Pending)),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        orders::transition_order(txn, &order, OrderStatus::Shipped).await?;
        Ok(created)
    }

    #[instrument(skip(self, caller, patch), fields(user_id = %caller.user_id))]
    pub async fn update_shipment(
        &self,
        caller: &Caller,
        shipment_id: Uuid,
        patch: UpdateShipmentInput,
    ) -> Result<shipment::Model, ServiceError> {
        caller.require(Action::ManageShipments)?;
        let company_id = caller.write_scope()?;
        patch.validate()?;
        check_weight(patch.weight)?;
        check_manual_status(patch.delivery_status)?;

        let txn = self.db_pool.begin().await?;
        let outcome = async {
            let existing = load(&txn, TenantScope::Company(company_id), shipment_id).await?;
            apply_patch(&txn, &existing, patch).await
        }
        .await;
        let updated = transaction::conclude(txn, outcome).await?;

        info!(%shipment_id, delivery_status = %updated.delivery_status, "shipment updated");
        self.event_sender
            .emit(Event::ShipmentUpdated { shipment_id })
            .await;
        Ok(updated)
    }

    /// Records delivery: the shipment becomes `delivered` and its order `DELIVERED`.
    #[instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn mark_delivered(
        &self,
        caller: &Caller,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        caller.require(Action::DeliverShipments)?;
        let company_id = caller.write_scope()?;

        let txn = self.db_pool.begin().await?;
        let outcome = self.deliver_in(&txn, company_id, shipment_id).await;
        let delivered = transaction::conclude(txn, outcome).await?;

        info!(%shipment_id, order_id = %delivered.sales_order_id, "order delivered");
        metrics::increment_counter("orders_delivered_total");
        self.event_sender
            .emit(Event::OrderDelivered {
                shipment_id,
                order_id: delivered.sales_order_id,
            })
            .await;
        Ok(delivered)
    }

    async fn deliver_in(
        &self,
        txn: &DatabaseTransaction,
        company_id: Uuid,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        let existing = load(txn, TenantScope::Company(company_id), shipment_id).await?;
        let order = sales_order::Entity::find_by_id(existing.sales_order_id)
            .filter(sales_order::Column::CompanyId.eq(company_id))
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", existing.sales_order_id))?;
        if order.status != OrderStatus::Shipped {
            return Err(ServiceError::InvalidState(format!(
                "Order {} cannot be delivered in status {}",
                order.order_number, order.status
            )));
        }

        let now = Utc::now();
        let result = shipment::Entity::update_many()
            .col_expr(
                shipment::Column::DeliveryStatus,
                Expr::value(DeliveryStatus::Delivered),
            )
            .col_expr(shipment::Column::DeliveredAt, Expr::value(Some(now)))
            .col_expr(shipment::Column::UpdatedAt, Expr::value(now))
            .filter(shipment::Column::Id.eq(existing.id))
            .filter(shipment::Column::CompanyId.eq(company_id))
            .filter(shipment::Column::DeliveryStatus.eq(existing.delivery_status))
            .exec(txn)
            .await?;
        ensure_swapped(&result, "Shipment", existing.id)?;
        orders::transition_order(txn, &order, OrderStatus::Delivered).await?;

        load(txn, TenantScope::Company(company_id), existing.id).await
    }

    #[instrument(skip(self, caller))]
    pub async fn get_shipment(
        &self,
        caller: &Caller,
        shipment_id: Uuid,
    ) -> Result<shipment::Model, ServiceError> {
        caller.require(Action::ReadOrders)?;
        load(&*self.db_pool, caller.read_scope()?, shipment_id).await
    }

    /// Lists shipments newest first, optionally for one order.
    #[instrument(skip(self, caller))]
    pub async fn list_shipments(
        &self,
        caller: &Caller,
        sales_order_id: Option<Uuid>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<shipment::Model>, u64), ServiceError> {
        caller.require(Action::ReadOrders)?;
        let mut query = caller
            .read_scope()?
            .apply(shipment::Entity::find(), shipment::Column::CompanyId);
        if let Some(order_id) = sales_order_id {
            query = query.filter(shipment::Column::SalesOrderId.eq(order_id));
        }

        let paginator = query
            .order_by_desc(shipment::Column::CreatedAt)
            .paginate(&*self.db_pool, limit);
        let total = paginator.num_items().await?;
        let shipments = paginator.fetch_page(page_index(page)).await?;
        Ok((shipments, total))
    }
}

async fn load<C>(
    conn: &C,
    scope: TenantScope,
    shipment_id: Uuid,
) -> Result<shipment::Model, ServiceError>
where
    C: ConnectionTrait,
{
    find_in_scope::<shipment::Entity, _>(
        conn,
        scope,
        shipment::Column::CompanyId,
        shipment_id,
        "Shipment",
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn negative_weight_is_rejected() {
        assert!(check_weight(Some(dec!(-0.5))).is_err());
        assert!(check_weight(Some(dec!(1.2))).is_ok());
        assert!(check_weight(None).is_ok());
    }

    #[test]
    fn delivered_cannot_be_set_by_hand() {
        assert!(check_manual_status(Some(DeliveryStatus::Delivered)).is_err());
        assert!(check_manual_status(Some(DeliveryStatus::InTransit)).is_ok());
    }

    async fn shipped_order(db: &DbPool) -> shipment::Model {
        let now = Utc::now();
        let company_id = Uuid::new_v4();
        let order = sales_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            order_number: Set("SO-000001".into()),
            customer_id: Set(Uuid::new_v4()),
            status: Set(OrderStatus::Shipped),
            total_amount: Set(dec!(10)),
            notes: Set(None),
            shipping_address: Set(None),
            created_by: Set(None),
            version: Set(1),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap();
        shipment::ActiveModel {
            id: Set(Uuid::new_v4()),
            company_id: Set(company_id),
            sales_order_id: Set(order.id),
            packed_by: Set(Uuid::new_v4()),
            courier_name: Set("DHL".into()),
            tracking_number: Set(None),
            weight: Set(None),
            dispatch_date: Set(now.date_naive()),
            delivery_status: Set(DeliveryStatus::Pending),
            delivered_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .unwrap()
    }

    async fn test_db() -> DbPool {
        let db = crate::db::establish_connection_with_config(&crate::db::DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .unwrap();
        crate::db::run_migrations(&db).await.unwrap();
        db
    }

    #[tokio::test]
    async fn patch_applies_when_status_is_unchanged() {
        let db = test_db().await;
        let existing = shipped_order(&db).await;

        let updated = apply_patch(
            &db,
            &existing,
            UpdateShipmentInput {
                tracking_number: Some("1Z42".into()),
                delivery_status: Some(DeliveryStatus::InTransit),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.tracking_number.as_deref(), Some("1Z42"));
        assert_eq!(updated.delivery_status, DeliveryStatus::InTransit);
        assert_eq!(updated.courier_name, "DHL");
    }

    #[tokio::test]
    async fn stale_patch_loses_to_a_delivery() {
        let db = test_db().await;
        let stale = shipped_order(&db).await;

        // Delivery lands between the read and the write
        shipment::Entity::update_many()
            .col_expr(
                shipment::Column::DeliveryStatus,
                Expr::value(DeliveryStatus::Delivered),
            )
            .filter(shipment::Column::Id.eq(stale.id))
            .exec(&db)
            .await
            .unwrap();

        let err = apply_patch(
            &db,
            &stale,
            UpdateShipmentInput {
                delivery_status: Some(DeliveryStatus::InTransit),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let current = shipment::Entity::find_by_id(stale.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.delivery_status, DeliveryStatus::Delivered);
    }

    #[tokio::test]
    async fn stale_order_transition_is_a_conflict() {
        let db = test_db().await;
        let shipped = shipped_order(&db).await;
        let order = sales_order::Entity::find_by_id(shipped.sales_order_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();

        orders::transition_order(&db, &order, OrderStatus::Delivered)
            .await
            .unwrap();
        let err = orders::transition_order(&db, &order, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }
}
