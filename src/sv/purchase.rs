use serde::{Deserialize, Serialize};

use crate::{
  entity::{ReferralStatus, earning, referral, reward},
  prelude::*,
  sv::{Accrual, Commission, Rules},
};

/// Purchase event from the billing webhook path. `event_id` is the
/// idempotency key; the caller may deliver the same event any number of
/// times.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseEvent {
  pub event_id: String,
  pub user_id: i64,
  pub plan_id: String,
  pub subscription_id: String,
  pub amount: i64,
  pub timestamp: DateTime,
  pub is_first_purchase: bool,
  /// The purchaser's lifetime spend including this purchase, supplied by
  /// billing. Cumulative rules threshold against it.
  #[serde(default)]
  pub lifetime_spend: Option<i64>,
}

impl PurchaseEvent {
  pub fn spend_to_date(&self) -> i64 {
    self.lifetime_spend.unwrap_or(self.amount)
  }
}

#[derive(Debug, Default, Serialize)]
pub struct Ingest {
  pub rewards: Vec<reward::Model>,
  pub earnings: Vec<earning::Model>,
  /// True when the rewards were accrued by an earlier delivery of this
  /// event; callers must not re-announce them.
  pub replay: bool,
}

/// Ingestion facade: rule evaluation and reward accrual for the
/// purchaser's referral, then partner commission distribution. Every leg
/// is idempotent, so billing retries resolve to the same rows.
pub struct Purchases<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Purchases<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn ingest(&self, event: &PurchaseEvent) -> Result<Ingest> {
    if event.event_id.trim().is_empty() {
      return Err(Error::InvalidArgs("Event id must not be empty".into()));
    }
    if event.amount <= 0 {
      return Err(Error::InvalidArgs(
        "Purchase amount must be positive".into(),
      ));
    }

    let mut out = Ingest::default();

    let referral = referral::Entity::find()
      .filter(referral::Column::ReferredId.eq(event.user_id))
      .filter(referral::Column::Status.ne(ReferralStatus::Cancelled))
      .one(self.db)
      .await?;

    if let Some(referral) = referral
      && let Some(rule) = Rules::new(self.db).applicable(event).await?
    {
      let accrued =
        Accrual::new(self.db).accrue(referral.id, event, &rule).await?;
      out.rewards = accrued.rewards;
      out.replay = accrued.replay;
    }

    out.earnings = Commission::new(self.db)
      .distribute(event.user_id, &event.subscription_id, event.amount)
      .await?;

    debug!(
      "ingested event {}: {} reward(s), {} commission(s)",
      event.event_id,
      out.rewards.len(),
      out.earnings.len()
    );

    Ok(out)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    entity::{PartnerStatus, RewardStatus, RuleType},
    sv::{
      Ledger,
      test_utils::{fixtures, test_db},
    },
  };

  #[tokio::test]
  async fn first_purchase_event_rewards_both_sides_exactly_once() {
    let db = test_db::setup().await;

    fixtures::rule(&db, RuleType::FirstPurchase, 10, 5).await;
    fixtures::referral(&db, 1, 2).await;

    let event = fixtures::event("evt-1", 2, 50);
    let sv = Purchases::new(&db);

    let first = sv.ingest(&event).await.unwrap();
    assert!(!first.replay);
    assert_eq!(first.rewards.len(), 2);
    assert!(
      first.rewards.iter().all(|r| r.status == RewardStatus::Pending)
    );
    assert_eq!(first.rewards[0].amount, 10);
    assert_eq!(first.rewards[1].amount, 5);

    let referral = referral::Entity::find()
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(referral.status, ReferralStatus::Completed);

    // Billing retries the webhook: identical rows, identical balances,
    // and the replay marker so nothing gets re-announced.
    let second = sv.ingest(&event).await.unwrap();
    assert!(second.replay);
    assert_eq!(
      first.rewards.iter().map(|r| r.id).collect::<Vec<_>>(),
      second.rewards.iter().map(|r| r.id).collect::<Vec<_>>()
    );
    assert_eq!(reward::Entity::find().count(&db).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn purchase_without_referral_or_rule_is_quiet() {
    let db = test_db::setup().await;

    let out = Purchases::new(&db)
      .ingest(&fixtures::event("evt-1", 2, 50))
      .await
      .unwrap();
    assert!(out.rewards.is_empty());
    assert!(out.earnings.is_empty());
  }

  #[tokio::test]
  async fn rewards_and_commissions_accrue_from_one_event() {
    let db = test_db::setup().await;

    fixtures::rule(&db, RuleType::FirstPurchase, 10, 5).await;
    fixtures::referral(&db, 1, 2).await;
    let partner =
      fixtures::partner(&db, 1, 10, PartnerStatus::Active).await;

    let out = Purchases::new(&db)
      .ingest(&fixtures::event("evt-1", 2, 10_000))
      .await
      .unwrap();
    assert_eq!(out.rewards.len(), 2);
    assert_eq!(out.earnings.len(), 1);
    assert_eq!(out.earnings[0].amount, 1_000);

    let balance =
      Ledger::new(&db).partner_balance(partner.id).await.unwrap();
    assert_eq!(balance.pending, 1_000);
  }

  #[tokio::test]
  async fn invalid_events_are_rejected() {
    let db = test_db::setup().await;
    let sv = Purchases::new(&db);

    let mut event = fixtures::event("evt-1", 2, 0);
    let err = sv.ingest(&event).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgs(_)));

    event.amount = 50;
    event.event_id = "  ".into();
    let err = sv.ingest(&event).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgs(_)));
  }
}
