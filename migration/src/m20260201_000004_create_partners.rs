use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Partners::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Partners::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(
            ColumnDef::new(Partners::UserId)
              .big_integer()
              .not_null()
              .unique_key(),
          )
          .col(
            ColumnDef::new(Partners::CommissionRate)
              .integer()
              .not_null()
              .default(10),
          )
          .col(
            ColumnDef::new(Partners::TotalEarnings)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Partners::PaidEarnings)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Partners::PendingEarnings)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Partners::ReferralCode)
              .string()
              .not_null()
              .unique_key(),
          )
          .col(
            ColumnDef::new(Partners::ReferralCount)
              .integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Partners::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Partners::PayoutMethod).string().null())
          .col(ColumnDef::new(Partners::PayoutDetails).string().null())
          .col(ColumnDef::new(Partners::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_partners_user")
          .table(Partners::Table)
          .col(Partners::UserId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Partners::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Partners {
  Table,
  Id,
  UserId,
  CommissionRate,
  TotalEarnings,
  PaidEarnings,
  PendingEarnings,
  ReferralCode,
  ReferralCount,
  Status,
  PayoutMethod,
  PayoutDetails,
  CreatedAt,
}
