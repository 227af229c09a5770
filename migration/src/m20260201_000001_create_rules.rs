use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
  async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager
      .create_table(
        Table::create()
          .table(Rules::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Rules::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Rules::Name).string().not_null())
          .col(ColumnDef::new(Rules::RuleType).string().not_null())
          .col(
            ColumnDef::new(Rules::ReferrerReward)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Rules::ReferredReward)
              .big_integer()
              .not_null()
              .default(0),
          )
          .col(
            ColumnDef::new(Rules::MinPurchaseAmount).big_integer().null(),
          )
          .col(ColumnDef::new(Rules::AppliesToPlans).json().null())
          .col(
            ColumnDef::new(Rules::Repeatable)
              .boolean()
              .not_null()
              .default(false),
          )
          .col(
            ColumnDef::new(Rules::IsActive).boolean().not_null().default(true),
          )
          .col(ColumnDef::new(Rules::StartsAt).date_time().null())
          .col(ColumnDef::new(Rules::EndsAt).date_time().null())
          .col(ColumnDef::new(Rules::CreatedAt).date_time().not_null())
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Rules::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Rules {
  Table,
  Id,
  Name,
  RuleType,
  ReferrerReward,
  ReferredReward,
  MinPurchaseAmount,
  AppliesToPlans,
  Repeatable,
  IsActive,
  StartsAt,
  EndsAt,
  CreatedAt,
}
