use sea_orm_migration::prelude::*;

use crate::m20250101_000003_create_sales_orders_table::SalesOrders;
use crate::m20250101_000005_create_shipments_table::Shipments;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Returns::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Returns::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Returns::CompanyId).uuid().not_null())
                    .col(ColumnDef::new(Returns::RmaNumber).string().not_null())
                    .col(ColumnDef::new(Returns::SalesOrderId).uuid().not_null())
                    .col(ColumnDef::new(Returns::ShipmentId).uuid().not_null())
                    .col(ColumnDef::new(Returns::CustomerId).uuid().not_null())
                    .col(
                        ColumnDef::new(Returns::Status)
                            .string_len(32)
                            .not_null()
                            .default("RMA_CREATED"),
                    )
                    .col(ColumnDef::new(Returns::Reason).text().not_null())
                    .col(ColumnDef::new(Returns::ReturnType).string().null())
                    .col(
                        ColumnDef::new(Returns::RecoveryValue)
                            .decimal_len(14, 2)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Returns::RefundAmount)
                            .decimal_len(14, 2)
                            .null(),
                    )
                    .col(ColumnDef::new(Returns::Notes).text().null())
                    .col(ColumnDef::new(Returns::CreatedBy).uuid().not_null())
                    .col(
                        ColumnDef::new(Returns::ReceivedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Returns::InspectedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Returns::CompletedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Returns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Returns::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_returns_sales_order")
                            .from(Returns::Table, Returns::SalesOrderId)
                            .to(SalesOrders::Table, SalesOrders::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_returns_shipment")
                            .from(Returns::Table, Returns::ShipmentId)
                            .to(Shipments::Table, Shipments::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Second line of defence behind the per-tenant sequence
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_returns_company_rma_number")
                    .table(Returns::Table)
                    .col(Returns::CompanyId)
                    .col(Returns::RmaNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_returns_company_order_shipment")
                    .table(Returns::Table)
                    .col(Returns::CompanyId)
                    .col(Returns::SalesOrderId)
                    .col(Returns::ShipmentId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_returns_company_status")
                    .table(Returns::Table)
                    .col(Returns::CompanyId)
                    .col(Returns::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Returns::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Returns {
    Table,
    Id,
    CompanyId,
    RmaNumber,
    SalesOrderId,
    ShipmentId,
    CustomerId,
    Status,
    Reason,
    ReturnType,
    RecoveryValue,
    RefundAmount,
    Notes,
    CreatedBy,
    ReceivedAt,
    InspectedAt,
    CompletedAt,
    CreatedAt,
    UpdatedAt,
}
