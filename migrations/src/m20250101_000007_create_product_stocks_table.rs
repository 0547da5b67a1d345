use sea_orm_migration::prelude::*;

use crate::m20250101_000002_create_catalog_tables::{Products, Warehouses};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProductStocks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProductStocks::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProductStocks::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(ProductStocks::ProductId).uuid().not_null())
                    .col(ColumnDef::new(ProductStocks::WarehouseId).uuid().not_null())
                    .col(ColumnDef::new(ProductStocks::LocationId).uuid().null())
                    .col(
                        ColumnDef::new(ProductStocks::Quantity)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProductStocks::Reserved)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(ProductStocks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_stocks_product")
                            .from(ProductStocks::Table, ProductStocks::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_product_stocks_warehouse")
                            .from(ProductStocks::Table, ProductStocks::WarehouseId)
                            .to(Warehouses::Table, Warehouses::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_product_stocks_cell")
                    .table(ProductStocks::Table)
                    .col(ProductStocks::ProductId)
                    .col(ProductStocks::WarehouseId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProductStocks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum ProductStocks {
    Table,
    Id,
    CompanyId,
    ProductId,
    WarehouseId,
    LocationId,
    Quantity,
    Reserved,
    UpdatedAt,
}
