pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_users_table;
mod m20250101_000002_create_catalog_tables;
mod m20250101_000003_create_sales_orders_table;
mod m20250101_000004_create_fulfillment_tables;
mod m20250101_000005_create_shipments_table;
mod m20250101_000006_create_returns_table;
mod m20250101_000007_create_product_stocks_table;
mod m20250101_000008_create_tenant_sequences_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_users_table::Migration),
            Box::new(m20250101_000002_create_catalog_tables::Migration),
            Box::new(m20250101_000003_create_sales_orders_table::Migration),
            Box::new(m20250101_000004_create_fulfillment_tables::Migration),
            Box::new(m20250101_000005_create_shipments_table::Migration),
            Box::new(m20250101_000006_create_returns_table::Migration),
            Box::new(m20250101_000007_create_product_stocks_table::Migration),
            Box::new(m20250101_000008_create_tenant_sequences_table::Migration),
        ]
    }
}
