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
pub enum PickListStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl PickListStatus {
    /// Status a pick list moves to when picking starts, if allowed.
    ///
    /// With `strict` ordering only `pending` may start; otherwise any unfinished list may.
    pub fn start(self, strict: bool) -> Option<PickListStatus> {
        match (self, strict) {
            (PickListStatus::Pending, _) => Some(PickListStatus::InProgress),
            (PickListStatus::InProgress, false) => Some(PickListStatus::InProgress),
            _ => None,
        }
    }

    /// Status a pick list moves to when picking completes, if allowed.
    pub fn complete(self, strict: bool) -> Option<PickListStatus> {
        match (self, strict) {
            (PickListStatus::InProgress, _) => Some(PickListStatus::Completed),
            (PickListStatus::Pending, false) => Some(PickListStatus::Completed),
            _ => None,
        }
    }

    /// Whether picked quantities may still be recorded.
    pub fn accepts_picks(self, strict: bool) -> bool {
        match self {
            PickListStatus::InProgress => true,
            PickListStatus::Pending => !strict,
            PickListStatus::Completed => false,
        }
    }
}

impl fmt::Display for PickListStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_value())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pick_lists")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    #[sea_orm(unique)]
    pub sales_order_id: Uuid,
    pub warehouse_id: Uuid,
    pub assigned_to: Option<Uuid>,
    pub status: PickListStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
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
        belongs_to = "super::warehouse::Entity",
        from = "Column::WarehouseId",
        to = "super::warehouse::Column::Id"
    )]
    Warehouse,
    #[sea_orm(has_many = "super::pick_list_item::Entity")]
    PickListItem,
    #[sea_orm(has_many = "super::packing_task::Entity")]
    PackingTask,
}

impl Related<super::sales_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SalesOrder.def()
    }
}

impl Related<super::warehouse::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Warehouse.def()
    }
}

impl Related<super::pick_list_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PickListItem.def()
    }
}

impl Related<super::packing_task::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PackingTask.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PickListStatus::Pending, false, Some(PickListStatus::InProgress))]
    #[case(PickListStatus::Pending, true, Some(PickListStatus::InProgress))]
    #[case(PickListStatus::InProgress, false, Some(PickListStatus::InProgress))]
    #[case(PickListStatus::InProgress, true, None)]
    #[case(PickListStatus::Completed, false, None)]
    #[case(PickListStatus::Completed, true, None)]
    fn start_transitions(
        #[case] from: PickListStatus,
        #[case] strict: bool,
        #[case] expected: Option<PickListStatus>,
    ) {
        assert_eq!(from.start(strict), expected);
    }

    #[rstest]
    #[case(PickListStatus::Pending, false, Some(PickListStatus::Completed))]
    #[case(PickListStatus::Pending, true, None)]
    #[case(PickListStatus::InProgress, true, Some(PickListStatus::Completed))]
    #[case(PickListStatus::Completed, false, None)]
    fn complete_transitions(
        #[case] from: PickListStatus,
        #[case] strict: bool,
        #[case] expected: Option<PickListStatus>,
    ) {
        assert_eq!(from.complete(strict), expected);
    }

    #[test]
    fn completed_lists_reject_picks() {
        assert!(!PickListStatus::Completed.accepts_picks(false));
        assert!(PickListStatus::Pending.accepts_picks(false));
        assert!(!PickListStatus::Pending.accepts_picks(true));
    }
}
