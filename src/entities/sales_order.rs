use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Lifecycle of a sales order from intake to delivery.
///
/// The mixed-case `DELIVERED` value is what the warehouse floor tooling writes and is kept as-is.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "pick_list_created")]
    PickListCreated,
    #[sea_orm(string_value = "picking")]
    Picking,
    #[sea_orm(string_value = "packing")]
    Packing,
    #[sea_orm(string_value = "packed")]
    Packed,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "DELIVERED")]
    #[serde(rename = "DELIVERED")]
    Delivered,
}

impl OrderStatus {
    /// Statuses in which items, notes and the order itself may still change.
    pub const EDITABLE: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::PickListCreated];

    /// Statuses from which a completed packing task may move the order to `packed`.
    pub const PACKABLE: [OrderStatus; 3] = [
        OrderStatus::PickListCreated,
        OrderStatus::Picking,
        OrderStatus::Packing,
    ];

    pub fn is_editable(self) -> bool {
        Self::EDITABLE.contains(&self)
    }

    pub fn can_be_packed(self) -> bool {
        Self::PACKABLE.contains(&self)
    }

    /// Whether starting to pick moves the order forward.
    pub fn advances_on_pick_start(self) -> bool {
        self == OrderStatus::PickListCreated
    }

    /// Whether starting to pack moves the order forward.
    pub fn advances_on_pack_start(self) -> bool {
        matches!(self, OrderStatus::PickListCreated | OrderStatus::Picking)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sales_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub order_number: String,
    pub customer_id: Uuid,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub shipping_address: Option<String>,
    pub created_by: Option<Uuid>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_one = "super::pick_list::Entity")]
    PickList,
    #[sea_orm(has_many = "super::shipment::Entity")]
    Shipment,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::pick_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PickList.def()
    }
}

impl Related<super::shipment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Shipment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
