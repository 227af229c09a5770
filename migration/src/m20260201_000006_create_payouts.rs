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
          .table(Payouts::Table)
          .if_not_exists()
          .col(
            ColumnDef::new(Payouts::Id)
              .integer()
              .not_null()
              .auto_increment()
              .primary_key(),
          )
          .col(ColumnDef::new(Payouts::PartnerId).integer().not_null())
          .col(ColumnDef::new(Payouts::Amount).big_integer().not_null())
          .col(ColumnDef::new(Payouts::Method).string().not_null())
          .col(
            ColumnDef::new(Payouts::Status)
              .string()
              .not_null()
              .default("pending"),
          )
          .col(ColumnDef::new(Payouts::TransactionId).string().null())
          .col(ColumnDef::new(Payouts::Notes).string().null())
          .col(ColumnDef::new(Payouts::CreatedAt).date_time().not_null())
          .col(ColumnDef::new(Payouts::ProcessedAt).date_time().null())
          .foreign_key(
            ForeignKey::create()
              .name("fk_payouts_partner")
              .from(Payouts::Table, Payouts::PartnerId)
              .to(Partners::Table, Partners::Id)
              .on_delete(ForeignKeyAction::Cascade),
          )
          .to_owned(),
      )
      .await?;

    manager
      .create_index(
        Index::create()
          .name("idx_payouts_partner")
          .table(Payouts::Table)
          .col(Payouts::PartnerId)
          .to_owned(),
      )
      .await
  }

  async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
    manager.drop_table(Table::drop().table(Payouts::Table).to_owned()).await
  }
}

#[derive(DeriveIden)]
pub enum Payouts {
  Table,
  Id,
  PartnerId,
  Amount,
  Method,
  Status,
  TransactionId,
  Notes,
  CreatedAt,
  ProcessedAt,
}
