use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::partner;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum EarningStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "approved")]
  Approved,
  #[sea_orm(string_value = "paid")]
  Paid,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
}

impl EarningStatus {
  /// Central transition table; everything not listed here is illegal.
  pub fn can_transition(self, to: EarningStatus) -> bool {
    use EarningStatus::*;
    matches!(
      (self, to),
      (Pending, Approved)
        | (Pending, Cancelled)
        | (Approved, Paid)
        | (Approved, Cancelled)
    )
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "earnings")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub partner_id: i32,
  /// The purchaser the commission descends from; may be absent when the
  /// attribution chain skipped an inactive partner.
  pub referred_user_id: Option<i64>,
  /// Triggering purchase; (subscription_id, partner_id, level) is the
  /// idempotency key.
  pub subscription_id: String,
  pub amount: i64,
  /// Rate snapshot at accrual time, not the live partner/settings value.
  pub commission_rate: i32,
  pub level: i32,
  pub status: EarningStatus,
  /// Reservation marker: set while an open payout holds this row.
  pub payout_id: Option<i32>,
  pub paid_at: Option<DateTime>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "partner::Entity",
    from = "Column::PartnerId",
    to = "partner::Column::Id"
  )]
  Partner,
}

impl Related<partner::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Partner.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
