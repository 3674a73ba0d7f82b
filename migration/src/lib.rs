pub use sea_orm_migration::prelude::*;

mod m20251019_000001_create_prizes;
mod m20251019_000002_create_redeem_codes;
mod m20251019_000003_add_prize_reservation;
mod m20251019_000004_create_users;
mod m20251019_000005_create_products;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251019_000001_create_prizes::Migration),
            Box::new(m20251019_000002_create_redeem_codes::Migration),
            Box::new(m20251019_000003_add_prize_reservation::Migration),
            Box::new(m20251019_000004_create_users::Migration),
            Box::new(m20251019_000005_create_products::Migration),
        ]
    }
}
