use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum PackingStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "packing")]
    Packing,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl PackingStatus {
    /// (Re)assigning a packer resets the task; completed tasks are frozen.
    pub fn can_reassign(self) -> bool {
        self != PackingStatus::Completed
    }

    pub fn can_start(self) -> bool {
        self == PackingStatus::Pending
    }

    pub fn can_complete(self) -> bool {
        matches!(self, PackingStatus::Pending | PackingStatus::Packing)
    }
}

impl fmt::Display for PackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "packing_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub sales_order_id: Uuid,
    pub pick_list_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: PackingStatus,
    pub packed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sales_order::Entity",
        from = "Column::SalesOrderId",
        to = "super::sales_order::Column::Id"
    )]
    SalesOrder,
    #[sea_orm(
        belongs_to = "super::pick_list::Entity",
        from = "Column::PickListId",
        to = "super::pick_list::Column::Id"
    )]
    PickList,
}

impl Related<super::sales_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesOrder.def()
    }
}

impl Related<super::pick_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PickList.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
