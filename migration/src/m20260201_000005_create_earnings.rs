use sea_orm_migration::prelude::*;

use super::m20260201_000004_create_partners::Partners;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Earnings::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Earnings::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Earnings::PartnerId).integer().not_null())
          .col(
            ColumnDef::new(Earnings::ReferredUserId).big_integer().null(),
          )
          .col(
            ColumnDef::new(Earnings::SubscriptionId).string().not_null(),
          )
          .col(ColumnDef::new(Earnings::Amount).big_integer().not_null())
          .col(
            ColumnDef::new(Earnings::CommissionRate).integer().not_null(),
          )
          .col(ColumnDef::new(Earnings::Level).integer().not_null())
          .col(
            ColumnDef::new(Earnings::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Earnings::PayoutId).integer().null())
          .col(ColumnDef::new(Earnings::PaidAt).date_time().null())
          .col(ColumnDef::new(Earnings::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_earnings_partner")
              .from(Earnings::Table, Earnings::PartnerId)
              .to(Partners::Table, Partners::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    // Idempotency key: one commission per partner per level per purchase
    manager
      .create_index(
        Index::create()
          .name("idx_earnings_idempotency")
          .table(Earnings::Table)
          .col(Earnings::SubscriptionId)
          .col(Earnings::PartnerId)
          .col(Earnings::Level)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_earnings_partner")
          .table(Earnings::Table)
          .col(Earnings::PartnerId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Earnings::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Earnings {
  Table,
  Id,
  PartnerId,
  ReferredUserId,
  SubscriptionId,
  Amount,
  CommissionRate,
  Level,
  Status,
  PayoutId,
  PaidAt,
  CreatedAt,
}
