pub use sea_orm_migration::prelude::*;

mod m20260201_000001_create_rules;
mod m20260201_000002_create_referrals;
mod m20260201_000003_create_rewards;
mod m20260201_000004_create_partners;
mod m20260201_000005_create_earnings;
mod m20260201_000006_create_payouts;
mod m20260201_000007_create_settings;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
  fn migrations() -> Vec<Box<dyn MigrationTrait>> {
    vec![
      Box::new(m20260201_000001_create_rules::Migration),
      Box::new(m20260201_000002_create_referrals::Migration),
      Box::new(m20260201_000003_create_rewards::Migration),
      Box::new(m20260201_000004_create_partners::Migration),
      Box::new(m20260201_000005_create_earnings::Migration),
      Box::new(m20260201_000006_create_payouts::Migration),
      Box::new(m20260201_000007_create_settings::Migration),
    ]
  }
}
