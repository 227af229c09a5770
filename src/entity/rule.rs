use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::referral;

/// Rule kinds ordered by selection priority:
/// `first_purchase` > `subscription` > `cumulative`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
  #[sea_orm(string_value = "first_purchase")]
  #[default]
  FirstPurchase,
  #[sea_orm(string_value = "subscription")]
  Subscription,
  #[sea_orm(string_value = "cumulative")]
  Cumulative,
}

impl RuleType {
  pub fn priority(self) -> u8 {
    match self {
      RuleType::FirstPurchase => 0,
      RuleType::Subscription => 1,
      RuleType::Cumulative => 2,
    }
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rules")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub name: String,
  pub rule_type: RuleType,
  pub referrer_reward: i64,
  pub referred_reward: i64,
  pub min_purchase_amount: Option<i64>,
  /// JSON array of plan ids; `None` means the rule applies to all plans.
  pub applies_to_plans: Option<Json>,
  /// Whether a subscription/cumulative rule may fire more than once per
  /// referral.
  pub repeatable: bool,
  pub is_active: bool,
  pub starts_at: Option<DateTime>,
  pub ends_at: Option<DateTime>,
  pub created_at: DateTime,
}

impl Model {
  pub fn applies_to_plan(&self, plan_id: &str) -> bool {
    match &self.applies_to_plans {
      Some(Json::Array(plans)) => {
        plans.iter().any(|p| p.as_str() == Some(plan_id))
      }
      Some(_) => false,
      None => true,
    }
  }

  pub fn window_contains(&self, at: DateTime) -> bool {
    if let Some(starts) = self.starts_at
      && at < starts
    {
      return false;
    }
    if let Some(ends) = self.ends_at
      && at > ends
    {
      return false;
    }
    true
  }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(has_many = "referral::Entity")]
  Referrals,
}

impl Related<referral::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Referrals.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
