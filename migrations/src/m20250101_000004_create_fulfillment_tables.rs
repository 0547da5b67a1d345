use sea_orm_migration::prelude::*;

use crate::m20250101_000002_create_catalog_tables::Warehouses;
use crate::m20250101_000003_create_sales_orders_table::SalesOrders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PickLists::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PickLists::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PickLists::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(PickLists::SalesOrderId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PickLists::WarehouseId).uuid().not_null())
                    .col(ColumnDef::new(PickLists::AssignedTo).uuid().null())
                    .col(
                        ColumnDef::new(PickLists::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(PickLists::StartedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PickLists::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PickLists::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PickLists::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pick_lists_sales_order")
                            .from(PickLists::Table, PickLists::SalesOrderId)
                            .to(SalesOrders::Table, SalesOrders::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pick_lists_warehouse")
                            .from(PickLists::Table, PickLists::WarehouseId)
                            .to(Warehouses::Table, Warehouses::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PickListItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PickListItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PickListItems::PickListId).uuid().not_null())
                    .col(ColumnDef::new(PickListItems::ProductId).uuid().not_null())
                    .col(
                        ColumnDef::new(PickListItems::QuantityRequired)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PickListItems::QuantityPicked)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_pick_list_items_pick_list")
                            .from(PickListItems::Table, PickListItems::PickListId)
                            .to(PickLists::Table, PickLists::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_pick_list_items_pick_list_id")
                    .table(PickListItems::Table)
                    .col(PickListItems::PickListId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PackingTasks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PackingTasks::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PackingTasks::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(PackingTasks::SalesOrderId)
                            .uuid()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(PackingTasks::PickListId).uuid().not_null())
                    .col(ColumnDef::new(PackingTasks::AssignedTo).uuid().null())
                    .col(
                        ColumnDef::new(PackingTasks::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(PackingTasks::PackedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(PackingTasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PackingTasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_packing_tasks_sales_order")
                            .from(PackingTasks::Table, PackingTasks::SalesOrderId)
                            .to(SalesOrders::Table, SalesOrders::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_packing_tasks_pick_list")
                            .from(PackingTasks::Table, PackingTasks::PickListId)
                            .to(PickLists::Table, PickLists::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_packing_tasks_company_assignee")
                    .table(PackingTasks::Table)
                    .col(PackingTasks::CompanyId)
                    .col(PackingTasks::AssignedTo)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PackingTasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PickListItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PickLists::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum PickLists {
    Table,
    Id,
    CompanyId,
    SalesOrderId,
    WarehouseId,
    AssignedTo,
    Status,
    StartedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum PickListItems {
    Table,
    Id,
    PickListId,
    ProductId,
    QuantityRequired,
    QuantityPicked,
}

#[derive(DeriveIden)]
pub enum PackingTasks {
    Table,
    Id,
    CompanyId,
    SalesOrderId,
    PickListId,
    AssignedTo,
    Status,
    PackedAt,
    CreatedAt,
    UpdatedAt,
}
