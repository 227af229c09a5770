use sea_orm_migration::prelude::*;

use super::m20260201_000002_create_referrals::Referrals;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Rewards::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Rewards::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Rewards::ReferralId).integer().not_null())
          .col(ColumnDef::new(Rewards::UserId).big_integer().not_null())
          .col(ColumnDef::new(Rewards::Role).string().not_null())
          .col(ColumnDef::new(Rewards::Amount).big_integer().not_null())
          .col(
            ColumnDef::new(Rewards::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Rewards::RuleId).integer().null())
          .col(ColumnDef::new(Rewards::EventId).string().not_null())
          .col(ColumnDef::new(Rewards::Description).string().null())
          .col(ColumnDef::new(Rewards::PaidAt).date_time().null())
          .col(ColumnDef::new(Rewards::PaidBy).big_integer().null())
          .col(ColumnDef::new(Rewards::PaidMethod).string().null())
          .col(ColumnDef::new(Rewards::TransactionId).string().null())
          .col(ColumnDef::new(Rewards::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_rewards_referral")
              .from(Rewards::Table, Rewards::ReferralId)
              .to(Referrals::Table, Referrals::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    // Idempotency key: one reward per beneficiary role per triggering event
    manager
      .create_index(
        Index::create()
          .name("idx_rewards_idempotency")
          .table(Rewards::Table)
          .col(Rewards::ReferralId)
          .col(Rewards::EventId)
          .col(Rewards::Role)
          .unique()
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_rewards_user")
          .table(Rewards::Table)
          .col(Rewards::UserId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Rewards::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Rewards {
  Table,
  Id,
  ReferralId,
  UserId,
  Role,
  Amount,
  Status,
  RuleId,
  EventId,
  Description,
  PaidAt,
  PaidBy,
  PaidMethod,
  TransactionId,
  CreatedAt,
}
