use std::cmp::Reverse;

use serde::Deserialize;

use crate::{
  entity::{RuleType, rule},
  prelude::*,
  sv::purchase::PurchaseEvent,
};

pub struct Rules<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDraft {
  pub name: String,
  pub rule_type: RuleType,
  #[serde(default)]
  pub referrer_reward: i64,
  #[serde(default)]
  pub referred_reward: i64,
  pub min_purchase_amount: Option<i64>,
  pub applies_to_plans: Option<Vec<String>>,
  #[serde(default)]
  pub repeatable: bool,
  #[serde(default = "default_true")]
  pub is_active: bool,
  pub starts_at: Option<DateTime>,
  pub ends_at: Option<DateTime>,
}

fn default_true() -> bool {
  true
}

/// Pure selection policy over already-loaded candidates, independent of
/// the store so it can be tested in isolation.
///
/// Filters: active, validity window contains the event timestamp, plan
/// set (if any) includes the plan, amount threshold holds. Picks by type
/// priority, ties broken by most recently created rule.
pub fn select<'r>(
  candidates: &'r [rule::Model],
  event: &PurchaseEvent,
) -> Option<&'r rule::Model> {
  candidates
    .iter()
    .filter(|rule| rule.is_active)
    .filter(|rule| rule.window_contains(event.timestamp))
    .filter(|rule| rule.applies_to_plan(&event.plan_id))
    .filter(|rule| threshold_holds(rule, event))
    .min_by_key(|rule| {
      (rule.rule_type.priority(), Reverse(rule.created_at), Reverse(rule.id))
    })
}

fn threshold_holds(rule: &rule::Model, event: &PurchaseEvent) -> bool {
  match rule.rule_type {
    RuleType::FirstPurchase => {
      event.is_first_purchase
        && rule.min_purchase_amount.is_none_or(|min| event.amount >= min)
    }
    RuleType::Subscription => {
      rule.min_purchase_amount.is_none_or(|min| event.amount >= min)
    }
    // Cumulative rules threshold against the referred user's running
    // lifetime spend, not just this purchase.
    RuleType::Cumulative => {
      rule.min_purchase_amount.is_none_or(|min| event.spend_to_date() >= min)
    }
  }
}

impl<'a> Rules<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn create(&self, draft: RuleDraft) -> Result<rule::Model> {
    if draft.name.trim().is_empty() {
      return Err(Error::InvalidArgs("Rule name must not be empty".into()));
    }
    if draft.referrer_reward < 0 || draft.referred_reward < 0 {
      return Err(Error::InvalidArgs(
        "Reward amounts must not be negative".into(),
      ));
    }

    let now = Utc::now().naive_utc();
    Ok(
      rule::ActiveModel {
        id: NotSet,
        name: Set(draft.name),
        rule_type: Set(draft.rule_type),
        referrer_reward: Set(draft.referrer_reward),
        referred_reward: Set(draft.referred_reward),
        min_purchase_amount: Set(draft.min_purchase_amount),
        applies_to_plans: Set(draft.applies_to_plans.map(|plans| {
          json::Value::Array(
            plans.into_iter().map(json::Value::String).collect(),
          )
        })),
        repeatable: Set(draft.repeatable),
        is_active: Set(draft.is_active),
        starts_at: Set(draft.starts_at),
        ends_at: Set(draft.ends_at),
        created_at: Set(now),
      }
      .insert(self.db)
      .await?,
    )
  }

  /// Edits apply only to future evaluations; rewards already accrued keep
  /// their snapshot amounts.
  pub async fn update(&self, id: i32, draft: RuleDraft) -> Result<rule::Model> {
    let rule = self.by_id(id).await?;

    Ok(
      rule::ActiveModel {
        name: Set(draft.name),
        rule_type: Set(draft.rule_type),
        referrer_reward: Set(draft.referrer_reward),
        referred_reward: Set(draft.referred_reward),
        min_purchase_amount: Set(draft.min_purchase_amount),
        applies_to_plans: Set(draft.applies_to_plans.map(|plans| {
          json::Value::Array(
            plans.into_iter().map(json::Value::String).collect(),
          )
        })),
        repeatable: Set(draft.repeatable),
        is_active: Set(draft.is_active),
        starts_at: Set(draft.starts_at),
        ends_at: Set(draft.ends_at),
        ..rule.into()
      }
      .update(self.db)
      .await?,
    )
  }

  pub async fn delete(&self, id: i32) -> Result<()> {
    let rule = self.by_id(id).await?;
    rule::Entity::delete_by_id(rule.id).exec(self.db).await?;
    Ok(())
  }

  pub async fn by_id(&self, id: i32) -> Result<rule::Model> {
    rule::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::RuleNotFound)
  }

  pub async fn list(
    &self,
    page: u64,
    limit: u64,
  ) -> Result<(Vec<rule::Model>, u64)> {
    let paginator = rule::Entity::find()
      .order_by_desc(rule::Column::CreatedAt)
      .paginate(self.db, limit);

    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((data, total))
  }

  /// Load active rules and apply the pure selection policy. No matching
  /// rule is a normal outcome, not an error.
  pub async fn applicable(
    &self,
    event: &PurchaseEvent,
  ) -> Result<Option<rule::Model>> {
    let candidates = rule::Entity::find()
      .filter(rule::Column::IsActive.eq(true))
      .all(self.db)
      .await?;

    Ok(select(&candidates, event).cloned())
  }
}
