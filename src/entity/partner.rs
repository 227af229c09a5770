use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{earning, payout};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PartnerStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "active")]
  Active,
  #[sea_orm(string_value = "suspended")]
  Suspended,
  #[sea_orm(string_value = "rejected")]
  Rejected,
}

impl PartnerStatus {
  pub fn can_transition(self, to: PartnerStatus) -> bool {
    use PartnerStatus::*;
    matches!(
      (self, to),
      (Pending, Active)
        | (Pending, Rejected)
        | (Active, Suspended)
        | (Suspended, Active)
    )
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "partners")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  #[sea_orm(unique)]
  pub user_id: i64,
  /// Level-1 commission rate in percent; levels 2/3 come from settings.
  pub commission_rate: i32,
  /// Denormalized mirrors of the earnings table, re-derived on every
  /// earning mutation. `pending_earnings + paid_earnings <= total_earnings`.
  pub total_earnings: i64,
  pub paid_earnings: i64,
  pub pending_earnings: i64,
  #[sea_orm(unique)]
  pub referral_code: String,
  pub referral_count: i32,
  pub status: PartnerStatus,
  pub payout_method: Option<String>,
  pub payout_details: Option<String>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "earning::Entity")]
  Earnings,
  #[sea_orm(has_many = "payout::Entity")]
  Payouts,
}

impl Related<earning::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Earnings.def()
  }
}

impl Related<payout::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Payouts.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
