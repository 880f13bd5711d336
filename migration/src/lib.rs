pub use sea_orm_migration::prelude::*;

mod m20260801_000001_create_users;
mod m20260801_000002_create_products;
mod m20260802_000001_create_offers;
mod m20260802_000002_create_transactions;
mod m20260803_000001_create_job_status;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260801_000001_create_users::Migration),
            Box::new(m20260801_000002_create_products::Migration),
            Box::new(m20260802_000001_create_offers::Migration),
            Box::new(m20260802_000002_create_transactions::Migration),
            Box::new(m20260803_000001_create_job_status::Migration),
        ]
    }
}
