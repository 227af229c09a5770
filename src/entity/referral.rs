use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{reward, rule};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
  #[sea_orm(string_value = "active")]
  #[default]
  Active,
  #[sea_orm(string_value = "completed")]
  Completed,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
}

impl ReferralStatus {
  /// Central transition table; everything not listed here is illegal.
  pub fn can_transition(self, to: ReferralStatus) -> bool {
    use ReferralStatus::*;
    matches!(
      (self, to),
      (Active, Completed) | (Active, Cancelled) | (Completed, Cancelled)
    )
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "referrals")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub referrer_id: i64,
  pub referred_id: i64,
  pub referral_code: Option<String>,
  pub rule_id: Option<i32>,
  pub status: ReferralStatus,
  /// Snapshot amounts taken when the referral was linked to a rule, not
  /// live rule values.
  pub referrer_reward: i64,
  pub referred_reward: i64,
  pub completed_at: Option<DateTime>,
  pub cancelled_at: Option<DateTime>,
  pub cancelled_reason: Option<String>,
  pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "rule::Entity",
    from = "Column::RuleId",
    to = "rule::Column::Id"
  )]
  Rule,
  #[sea_orm(has_many = "reward::Entity")]
  Rewards,
}

impl Related<rule::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Rule.def()
  }
}

impl Related<reward::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Rewards.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
