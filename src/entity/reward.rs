use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::referral;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
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

impl RewardStatus {
  /// Central transition table; everything not listed here is illegal.
  pub fn can_transition(self, to: RewardStatus) -> bool {
    use RewardStatus::*;
    matches!(
      (self, to),
      (Pending, Approved)
        | (Pending, Cancelled)
        | (Approved, Paid)
        | (Approved, Cancelled)
    )
  }
}

/// Which side of the referral the reward is credited to.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum RewardRole {
  #[sea_orm(string_value = "referrer")]
  #[default]
  Referrer,
  #[sea_orm(string_value = "referred")]
  Referred,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rewards")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub referral_id: i32,
  pub user_id: i64,
  pub role: RewardRole,
  pub amount: i64,
  pub status: RewardStatus,
  pub rule_id: Option<i32>,
  /// Triggering purchase event id; (referral_id, event_id, role) is the
  /// idempotency key.
  pub event_id: String,
  pub description: Option<String>,
  pub paid_at: Option<DateTime>,
  pub paid_by: Option<i64>,
  pub paid_method: Option<String>,
  pub transaction_id: Option<String>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "referral::Entity",
    from = "Column::ReferralId",
    to = "referral::Column::Id"
  )]
  Referral,
}

impl Related<referral::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Referral.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
