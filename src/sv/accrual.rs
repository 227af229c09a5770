use sea_orm::SqlErr;

use crate::{
  entity::{
    ReferralStatus, RewardRole, RewardStatus, RuleType, referral, reward, rule,
  },
  prelude::*,
  sv::{purchase::PurchaseEvent, strict_txn},
};

pub struct Accrual<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug)]
pub struct Accrued {
  pub rewards: Vec<reward::Model>,
  /// True when the event had already been processed and the existing rows
  /// were returned unchanged.
  pub replay: bool,
}

impl<'a> Accrual<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Create pending reward rows for the referrer and the referred user.
  ///
  /// Exactly-once per (referral, event, beneficiary role): retrying the
  /// same event id returns the rows created the first time. A
  /// `first_purchase` rule completes the owning referral; subscription and
  /// cumulative rules leave it active so repeat rewards stay possible.
  pub async fn accrue(
    &self,
    referral_id: i32,
    event: &PurchaseEvent,
    rule: &rule::Model,
  ) -> Result<Accrued> {
    let txn = strict_txn(self.db).await?;

    let referral = referral::Entity::find_by_id(referral_id)
      .one(&txn)
      .await?
      .ok_or(Error::ReferralNotFound)?;

    if referral.status == ReferralStatus::Cancelled {
      return Err(Error::ReferralInactive);
    }

    // Replay of the same purchase event: resolve to the existing result.
    let existing = reward::Entity::find()
      .filter(reward::Column::ReferralId.eq(referral_id))
      .filter(reward::Column::EventId.eq(&event.event_id))
      .all(&txn)
      .await?;
    if !existing.is_empty() {
      return Ok(Accrued { rewards: existing, replay: true });
    }

    // first_purchase rules fire at most once per referral; other types
    // only when the rule is flagged repeatable.
    let once = rule.rule_type == RuleType::FirstPurchase || !rule.repeatable;
    if once {
      let fired = reward::Entity::find()
        .filter(reward::Column::ReferralId.eq(referral_id))
        .filter(reward::Column::RuleId.eq(rule.id))
        .filter(reward::Column::Status.ne(RewardStatus::Cancelled))
        .all(&txn)
        .await?;
      if !fired.is_empty() {
        return Ok(Accrued { rewards: fired, replay: true });
      }
    }

    let now = Utc::now().naive_utc();
    let mut rewards = Vec::new();

    let beneficiaries = [
      (RewardRole::Referrer, referral.referrer_id, rule.referrer_reward),
      (RewardRole::Referred, referral.referred_id, rule.referred_reward),
    ];
    for (role, user_id, amount) in beneficiaries {
      if amount <= 0 {
        continue;
      }

      let inserted = reward::ActiveModel {
        id: NotSet,
        referral_id: Set(referral_id),
        user_id: Set(user_id),
        role: Set(role),
        amount: Set(amount),
        status: Set(RewardStatus::Pending),
        rule_id: Set(Some(rule.id)),
        event_id: Set(event.event_id.clone()),
        description: Set(Some(rule.name.clone())),
        paid_at: Set(None),
        paid_by: Set(None),
        paid_method: Set(None),
        transaction_id: Set(None),
        created_at: Set(now),
      }
      .insert(&txn)
      .await;

      match inserted {
        Ok(row) => rewards.push(row),
        // A concurrent delivery of the same event won the insert race;
        // resolve to its rows instead of surfacing the index violation.
        Err(err)
          if matches!(
            err.sql_err(),
            Some(SqlErr::UniqueConstraintViolation(_))
          ) =>
        {
          txn.rollback().await?;
          let rewards = reward::Entity::find()
            .filter(reward::Column::ReferralId.eq(referral_id))
            .filter(reward::Column::EventId.eq(&event.event_id))
            .all(self.db)
            .await?;
          return Ok(Accrued { rewards, replay: true });
        }
        Err(err) => return Err(err.into()),
      }
    }

    if rule.rule_type == RuleType::FirstPurchase
      && referral.status == ReferralStatus::Active
    {
      referral::ActiveModel {
        status: Set(ReferralStatus::Completed),
        completed_at: Set(Some(now)),
        referrer_reward: Set(rule.referrer_reward),
        referred_reward: Set(rule.referred_reward),
        ..referral.into()
      }
      .update(&txn)
      .await?;
    }

    txn.commit().await?;

    info!(
      "accrued {} reward(s) for referral {} on event {}",
      rewards.len(),
      referral_id,
      event.event_id
    );

    Ok(Accrued { rewards, replay: false })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::{fixtures, test_db};

  #[tokio::test]
  async fn first_purchase_creates_rewards_and_completes_referral() {
    let db = test_db::setup().await;

    let rule = fixtures::rule(&db, RuleType::FirstPurchase, 10, 5).await;
    let referral = fixtures::referral(&db, 1, 2).await;
    let event = fixtures::event("evt-1", 2, 50);

    let accrued =
      Accrual::new(&db).accrue(referral.id, &event, &rule).await.unwrap();
    assert!(!accrued.replay);
    assert_eq!(accrued.rewards.len(), 2);

    let referrer = &accrued.rewards[0];
    assert_eq!(referrer.user_id, 1);
    assert_eq!(referrer.amount, 10);
    assert_eq!(referrer.status, RewardStatus::Pending);

    let referred = &accrued.rewards[1];
    assert_eq!(referred.user_id, 2);
    assert_eq!(referred.amount, 5);

    let referral = referral::Entity::find_by_id(referral.id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(referral.status, ReferralStatus::Completed);
  }

  #[tokio::test]
  async fn replayed_event_is_a_no_op() {
    let db = test_db::setup().await;

    let rule = fixtures::rule(&db, RuleType::FirstPurchase, 10, 5).await;
    let referral = fixtures::referral(&db, 1, 2).await;
    let event = fixtures::event("evt-1", 2, 50);

    let sv = Accrual::new(&db);
    let first = sv.accrue(referral.id, &event, &rule).await.unwrap();
    let second = sv.accrue(referral.id, &event, &rule).await.unwrap();

    assert!(second.replay);
    assert_eq!(
      first.rewards.iter().map(|r| r.id).collect::<Vec<_>>(),
      second.rewards.iter().map(|r| r.id).collect::<Vec<_>>()
    );

    let count = reward::Entity::find().count(&db).await.unwrap();
    assert_eq!(count, 2);
  }

  #[tokio::test]
  async fn non_repeatable_rule_fires_once_per_referral() {
    let db = test_db::setup().await;

    let rule = fixtures::rule(&db, RuleType::Subscription, 10, 0).await;
    let referral = fixtures::referral(&db, 1, 2).await;

    let sv = Accrual::new(&db);
    let first = sv
      .accrue(referral.id, &fixtures::event("evt-1", 2, 50), &rule)
      .await
      .unwrap();
    assert!(!first.replay);

    // A different event, same non-repeatable rule.
    let second = sv
      .accrue(referral.id, &fixtures::event("evt-2", 2, 50), &rule)
      .await
      .unwrap();
    assert!(second.replay);
    assert_eq!(reward::Entity::find().count(&db).await.unwrap(), 1);

    // The referral stays active for subscription rules.
    let referral = referral::Entity::find_by_id(referral.id)
      .one(&db)
      .await
      .unwrap()
      .unwrap();
    assert_eq!(referral.status, ReferralStatus::Active);
  }

  #[tokio::test]
  async fn repeatable_rule_fires_per_event() {
    let db = test_db::setup().await;

    let rule = fixtures::rule(&db, RuleType::Subscription, 10, 0).await;
    let rule = rule::ActiveModel { repeatable: Set(true), ..rule.into() }
      .update(&db)
      .await
      .unwrap();

    let referral = fixtures::referral(&db, 1, 2).await;

    let sv = Accrual::new(&db);
    sv.accrue(referral.id, &fixtures::event("evt-1", 2, 50), &rule)
      .await
      .unwrap();
    let second = sv
      .accrue(referral.id, &fixtures::event("evt-2", 2, 50), &rule)
      .await
      .unwrap();

    assert!(!second.replay);
    assert_eq!(reward::Entity::find().count(&db).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn duplicate_event_rows_resolve_instead_of_erroring() {
    let db = test_db::setup().await;

    let rule = fixtures::rule(&db, RuleType::FirstPurchase, 10, 5).await;
    let referral = fixtures::referral(&db, 1, 2).await;

    // Rows created by another writer for the same event.
    reward::ActiveModel {
      id: NotSet,
      referral_id: Set(referral.id),
      user_id: Set(1),
      role: Set(RewardRole::Referrer),
      amount: Set(10),
      status: Set(RewardStatus::Pending),
      rule_id: Set(Some(rule.id)),
      event_id: Set("evt-1".into()),
      description: Set(None),
      paid_at: Set(None),
      paid_by: Set(None),
      paid_method: Set(None),
      transaction_id: Set(None),
      created_at: Set(Utc::now().naive_utc()),
    }
    .insert(&db)
    .await
    .unwrap();

    let accrued = Accrual::new(&db)
      .accrue(referral.id, &fixtures::event("evt-1", 2, 50), &rule)
      .await
      .unwrap();
    assert!(accrued.replay);
    assert_eq!(accrued.rewards.len(), 1);
    assert_eq!(reward::Entity::find().count(&db).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn cancelled_referral_refuses_accrual() {
    let db = test_db::setup().await;

    let rule = fixtures::rule(&db, RuleType::FirstPurchase, 10, 5).await;
    let referral = fixtures::referral(&db, 1, 2).await;
    referral::ActiveModel {
      status: Set(ReferralStatus::Cancelled),
      ..referral.clone().into()
    }
    .update(&db)
    .await
    .unwrap();

    let err = Accrual::new(&db)
      .accrue(referral.id, &fixtures::event("evt-1", 2, 50), &rule)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::ReferralInactive));
    assert_eq!(reward::Entity::find().count(&db).await.unwrap(), 0);
  }
}
