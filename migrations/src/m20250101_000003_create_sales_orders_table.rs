use sea_orm_migration::prelude::*;

use crate::m20250101_000002_create_catalog_tables::Products;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SalesOrders::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SalesOrders::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SalesOrders::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(SalesOrders::OrderNumber).string().not_null())
                    .col(ColumnDef::new(SalesOrders::CustomerId).uuid().not_null())
                    .col(
                        ColumnDef::new(SalesOrders::Status)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::TotalAmount)
                            .decimal_len(14, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(SalesOrders::Notes).text().null())
                    .col(ColumnDef::new(SalesOrders::ShippingAddress).text().null())
                    .col(ColumnDef::new(SalesOrders::CreatedBy).uuid().null())
                    .col(
                        ColumnDef::new(SalesOrders::Version)
                            .integer()
                            .not_null()
                            .default(1),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(SalesOrders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sales_orders_company_number")
                    .table(SalesOrders::Table)
                    .col(SalesOrders::CompanyId)
                    .col(SalesOrders::OrderNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_sales_orders_company_status")
                    .table(SalesOrders::Table)
                    .col(SalesOrders::CompanyId)
                    .col(SalesOrders::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(OrderItems::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(OrderItems::SalesOrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(OrderItems::UnitPrice)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(OrderItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_sales_order")
                            .from(OrderItems::Table, OrderItems::SalesOrderId)
                            .to(SalesOrders::Table, SalesOrders::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_product")
                            .from(OrderItems::Table, OrderItems::ProductId)
                            .to(Products::Table, Products::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_items_sales_order_id")
                    .table(OrderItems::Table)
                    .col(OrderItems::SalesOrderId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SalesOrders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum SalesOrders {
    Table,
    Id,
    CompanyId,
    OrderNumber,
    CustomerId,
    Status,
    TotalAmount,
    Notes,
    ShippingAddress,
    CreatedBy,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum OrderItems {
    Table,
    Id,
    SalesOrderId,
    ProductId,
    Quantity,
    UnitPrice,
    CreatedAt,
}
