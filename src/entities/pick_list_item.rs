use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "pick_list_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub pick_list_id: Uuid,
    pub product_id: Uuid,
    pub quantity_required: i32,
    pub quantity_picked: i32,
}

impl Model {
    pub fn is_fully_picked(&self) -> bool {
        self.quantity_picked >= self.quantity_required
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::pick_list::Entity",
        from = "Column::PickListId",
        to = "super::pick_list::Column::Id"
    )]
    PickList,
}

impl Related<super::pick_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PickList.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
