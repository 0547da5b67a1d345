use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "warehouses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub company_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::pick_list::Entity")]
    PickList,
    #[sea_orm(has_many = "super::product_stock::Entity")]
    ProductStock,
}

impl Related<super::pick_list::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PickList.def()
    }
}

impl Related<super::product_stock::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProductStock.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
