use sea_orm_migration::prelude::*;

use super::m20260201_000001_create_rules::Rules;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Referrals::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Referrals::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(Referrals::ReferrerId).big_integer().not_null(),
          )
          .col(
            ColumnDef::new(Referrals::ReferredId).big_integer().not_null(),
          )
          .col(ColumnDef::new(Referrals::ReferralCode).string().null())
          .col(ColumnDef::new(Referrals::RuleId).integer().null())
          .col(
            ColumnDef::new(Referrals::Status)
              .string()
              .not_null()
              .default("active"),
          )
          .col(
            ColumnDef::new(Referrals::ReferrerReward)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Referrals::ReferredReward)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(ColumnDef::new(Referrals::CompletedAt).date_time().null())
          .col(ColumnDef::new(Referrals::CancelledAt).date_time().null())
          .col(ColumnDef::new(Referrals::CancelledReason).string().null())
          .col(ColumnDef::new(Referrals::CreatedAt).date_time().not_null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_referrals_rule")
              .from(Referrals::Table, Referrals::RuleId)
              .to(Rules::Table, Rules::Id)
              .on_delete(ForeignKeyAction::SetNull),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_referrals_referred")
          .table(Referrals::Table)
          .col(Referrals::ReferredId)
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_referrals_referrer")
          .table(Referrals::Table)
          .col(Referrals::ReferrerId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Referrals::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Referrals {
  Table,
  Id,
  ReferrerId,
  ReferredId,
  ReferralCode,
  RuleId,
  Status,
  ReferrerReward,
  ReferredReward,
  CompletedAt,
  CancelledAt,
  CancelledReason,
  CreatedAt,
}
