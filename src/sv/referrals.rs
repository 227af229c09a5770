use crate::{
  entity::{
    ReferralStatus, RewardStatus, partner, referral, reward, rule,
  },
  prelude::*,
  sv::strict_txn,
};

pub struct Referrals<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Referrals<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Record a referrer -> referred relationship. The first referral wins:
  /// a user already referred by anyone (active or completed) cannot be
  /// referred again.
  pub async fn create(
    &self,
    referrer_id: i64,
    referred_id: i64,
    referral_code: Option<String>,
    rule_id: Option<i32>,
  ) -> Result<referral::Model> {
    if referrer_id == referred_id {
      return Err(Error::InvalidArgs("Cannot refer yourself".into()));
    }

    let txn = strict_txn(self.db).await?;

    let taken = referral::Entity::find()
      .filter(referral::Column::ReferredId.eq(referred_id))
      .filter(referral::Column::Status.ne(ReferralStatus::Cancelled))
      .one(&txn)
      .await?;
    if taken.is_some() {
      return Err(Error::DuplicateReferral);
    }

    // Snapshot reward amounts from the rule; later rule edits must not
    // change what this referral promises.
    let (referrer_reward, referred_reward) = match rule_id {
      Some(id) => {
        let rule = rule::Entity::find_by_id(id)
          .one(&txn)
          .await?
          .ok_or(Error::RuleNotFound)?;
        (rule.referrer_reward, rule.referred_reward)
      }
      None => (0, 0),
    };

    let now = Utc::now().naive_utc();
    let created = referral::ActiveModel {
      id: NotSet,
      referrer_id: Set(referrer_id),
      referred_id: Set(referred_id),
      referral_code: Set(referral_code),
      rule_id: Set(rule_id),
      status: Set(ReferralStatus::Active),
      referrer_reward: Set(referrer_reward),
      referred_reward: Set(referred_reward),
      completed_at: Set(None),
      cancelled_at: Set(None),
      cancelled_reason: Set(None),
      created_at: Set(now),
    }
    .insert(&txn)
    .await?;

    self.recount_partner_referrals(&txn, referrer_id).await?;

    txn.commit().await?;
    Ok(created)
  }

  pub async fn by_id(&self, id: i32) -> Result<referral::Model> {
    referral::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::ReferralNotFound)
  }

  pub async fn list(
    &self,
    status: Option<ReferralStatus>,
    page: u64,
    limit: u64,
  ) -> Result<(Vec<referral::Model>, u64)> {
    let mut query =
      referral::Entity::find().order_by_desc(referral::Column::CreatedAt);
    if let Some(status) = status {
      query = query.filter(referral::Column::Status.eq(status));
    }

    let paginator = query.paginate(self.db, limit);
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((data, total))
  }

  pub async fn set_code(
    &self,
    id: i32,
    referral_code: Option<String>,
  ) -> Result<referral::Model> {
    let referral = self.by_id(id).await?;
    Ok(
      referral::ActiveModel {
        referral_code: Set(referral_code),
        ..referral.into()
      }
      .update(self.db)
      .await?,
    )
  }

  pub async fn complete(&self, id: i32) -> Result<referral::Model> {
    let referral = self.by_id(id).await?;
    transition_guard(referral.status, ReferralStatus::Completed)?;

    let now = Utc::now().naive_utc();
    Ok(
      referral::ActiveModel {
        status: Set(ReferralStatus::Completed),
        completed_at: Set(Some(now)),
        ..referral.into()
      }
      .update(self.db)
      .await?,
    )
  }

  /// Admin cancel. Refused once any reward on the referral has been paid;
  /// unpaid rewards are cancelled alongside the referral.
  pub async fn cancel(
    &self,
    id: i32,
    reason: Option<String>,
  ) -> Result<referral::Model> {
    let txn = strict_txn(self.db).await?;

    let referral = referral::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::ReferralNotFound)?;
    transition_guard(referral.status, ReferralStatus::Cancelled)?;

    let rewards = reward::Entity::find()
      .filter(reward::Column::ReferralId.eq(id))
      .all(&txn)
      .await?;
    if rewards.iter().any(|r| r.status == RewardStatus::Paid) {
      return Err(Error::CannotCancelPaidReward);
    }

    for row in rewards {
      if row.status == RewardStatus::Cancelled {
        continue;
      }
      reward::ActiveModel {
        status: Set(RewardStatus::Cancelled),
        ..row.into()
      }
      .update(&txn)
      .await?;
    }

    let now = Utc::now().naive_utc();
    let referrer_id = referral.referrer_id;
    let cancelled = referral::ActiveModel {
      status: Set(ReferralStatus::Cancelled),
      cancelled_at: Set(Some(now)),
      cancelled_reason: Set(reason),
      ..referral.into()
    }
    .update(&txn)
    .await?;

    self.recount_partner_referrals(&txn, referrer_id).await?;

    txn.commit().await?;
    Ok(cancelled)
  }

  /// Re-derive (never increment) the referrer's partner referral_count.
  async fn recount_partner_referrals<C: ConnectionTrait>(
    &self,
    conn: &C,
    referrer_id: i64,
  ) -> Result<()> {
    let Some(partner) = partner::Entity::find()
      .filter(partner::Column::UserId.eq(referrer_id))
      .one(conn)
      .await?
    else {
      return Ok(());
    };

    let count = referral::Entity::find()
      .filter(referral::Column::ReferrerId.eq(referrer_id))
      .filter(referral::Column::Status.ne(ReferralStatus::Cancelled))
      .count(conn)
      .await?;

    partner::ActiveModel {
      referral_count: Set(count as i32),
      ..partner.into()
    }
    .update(conn)
    .await?;

    Ok(())
  }
}

fn transition_guard(from: ReferralStatus, to: ReferralStatus) -> Result<()> {
  if from.can_transition(to) {
    Ok(())
  } else {
    Err(Error::InvalidTransition {
      entity: "referral",
      from: format!("{from:?}"),
      to: format!("{to:?}"),
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::test_db;

  #[tokio::test]
  async fn first_referral_wins() {
    let db = test_db::setup().await;
    let sv = Referrals::new(&db);

    sv.create(1, 2, None, None).await.unwrap();

    // A second referrer cannot claim the same referred user.
    let err = sv.create(3, 2, None, None).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateReferral));

    // Nor can the same referrer re-create the link.
    let err = sv.create(1, 2, None, None).await.unwrap_err();
    assert!(matches!(err, Error::DuplicateReferral));
  }

  #[tokio::test]
  async fn self_referral_is_rejected() {
    let db = test_db::setup().await;
    let err =
      Referrals::new(&db).create(7, 7, None, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgs(_)));
  }

  #[tokio::test]
  async fn cancelled_referral_frees_the_referred_user() {
    let db = test_db::setup().await;
    let sv = Referrals::new(&db);

    let first = sv.create(1, 2, None, None).await.unwrap();
    sv.cancel(first.id, Some("fraud".into())).await.unwrap();

    let second = sv.create(3, 2, None, None).await.unwrap();
    assert_eq!(second.referrer_id, 3);
  }

  #[tokio::test]
  async fn complete_then_cancel_flow() {
    let db = test_db::setup().await;
    let sv = Referrals::new(&db);

    let referral = sv.create(1, 2, None, None).await.unwrap();
    let completed = sv.complete(referral.id).await.unwrap();
    assert_eq!(completed.status, ReferralStatus::Completed);
    assert!(completed.completed_at.is_some());

    // Completing twice is an illegal transition.
    let err = sv.complete(referral.id).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    let cancelled = sv.cancel(referral.id, None).await.unwrap();
    assert_eq!(cancelled.status, ReferralStatus::Cancelled);

    let err = sv.cancel(referral.id, None).await.unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
  }
}
