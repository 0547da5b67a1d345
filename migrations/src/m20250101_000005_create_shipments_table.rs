use sea_orm_migration::prelude::*;

use crate::m20250101_000003_create_sales_orders_table::SalesOrders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Shipments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Shipments::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Shipments::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Shipments::SalesOrderId).uuid().not_null())
                    .col(ColumnDef::new(Shipments::PackedBy).uuid().not_null())
                    .col(ColumnDef::new(Shipments::CourierName).string().not_null())
                    .col(ColumnDef::new(Shipments::TrackingNumber).string().null())
                    .col(ColumnDef::new(Shipments::Weight).decimal_len(10, 3).null())
                    .col(ColumnDef::new(Shipments::DispatchDate).date().not_null())
                    .col(
                        ColumnDef::new(Shipments::DeliveryStatus)
                            .string_len(32)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(Shipments::DeliveredAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Shipments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Shipments::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_shipments_sales_order")
                            .from(Shipments::Table, Shipments::SalesOrderId)
                            .to(SalesOrders::Table, SalesOrders::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_shipments_company_order")
                    .table(Shipments::Table)
                    .col(Shipments::CompanyId)
                    .col(Shipments::SalesOrderId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Shipments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Shipments {
    Table,
    Id,
    CompanyId,
    SalesOrderId,
    PackedBy,
    CourierName,
    TrackingNumber,
    Weight,
    DispatchDate,
    DeliveryStatus,
    DeliveredAt,
    CreatedAt,
    UpdatedAt,
}
