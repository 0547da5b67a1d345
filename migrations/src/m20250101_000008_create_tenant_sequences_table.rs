use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TenantSequences::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TenantSequences::CompanyId).uuid().not_null())
                    .col(
                        ColumnDef::new(TenantSequences::Name)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TenantSequences::Value)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_tenant_sequences")
                            .col(TenantSequences::CompanyId)
                            .col(TenantSequences::Name),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TenantSequences::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum TenantSequences {
    Table,
    CompanyId,
    Name,
    Value,
}
