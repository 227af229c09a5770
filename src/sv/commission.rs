use sea_orm::SqlErr;

use crate::{
  entity::{
    EarningStatus, PartnerStatus, ReferralStatus, earning, partner, referral,
  },
  prelude::*,
  sv::{Settings, ledger, strict_txn},
};

/// Commission depth cap: direct referrer is level 1.
pub const MAX_LEVELS: i32 = 3;

pub struct Commission<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Commission<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Walk the referral chain upward from the purchaser and credit each
  /// active partner ancestor a percentage of the purchase.
  ///
  /// The walk follows referral rows, not partner rows: an inactive or
  /// missing partner consumes its level but does not stop partners
  /// further up from being credited. Level 1 uses the partner's own rate,
  /// levels 2 and 3 the settings-configured global rates. Reprocessing
  /// the same subscription id is a no-op per (partner, level).
  pub async fn distribute(
    &self,
    purchaser: i64,
    subscription_id: &str,
    amount: i64,
  ) -> Result<Vec<earning::Model>> {
    if amount <= 0 {
      return Err(Error::InvalidArgs(
        "Purchase amount must be positive".into(),
      ));
    }

    let settings = Settings::new(self.db);
    let level2_rate = settings.level_rate(2).await?;
    let level3_rate = settings.level_rate(3).await?;

    let txn = strict_txn(self.db).await?;

    // Bounded walk with an explicit ancestor array instead of recursion;
    // a revisited id means the referral data is corrupt.
    let mut seen = [0i64; MAX_LEVELS as usize + 1];
    seen[0] = purchaser;
    let mut len = 1;

    let mut credited = Vec::new();
    let mut current = purchaser;
    let now = Utc::now().naive_utc();

    for level in 1..=MAX_LEVELS {
      let Some(link) = referral::Entity::find()
        .filter(referral::Column::ReferredId.eq(current))
        .filter(referral::Column::Status.ne(ReferralStatus::Cancelled))
        .one(&txn)
        .await?
      else {
        break;
      };

      let referrer = link.referrer_id;
      if seen[..len].contains(&referrer) {
        return Err(Error::ReferralChainCycleDetected(referrer));
      }
      seen[len] = referrer;
      len += 1;

      let ancestor = partner::Entity::find()
        .filter(partner::Column::UserId.eq(referrer))
        .one(&txn)
        .await?;

      // Skip missing/inactive partners; the level index still advances.
      if let Some(ancestor) = ancestor
        && ancestor.status == PartnerStatus::Active
      {
        let rate = match level {
          1 => ancestor.commission_rate,
          2 => level2_rate,
          _ => level3_rate,
        };
        let commission = amount * rate as i64 / 100;

        if commission > 0 {
          let existing = earning::Entity::find()
            .filter(earning::Column::SubscriptionId.eq(subscription_id))
            .filter(earning::Column::PartnerId.eq(ancestor.id))
            .filter(earning::Column::Level.eq(level))
            .one(&txn)
            .await?;

          if let Some(existing) = existing {
            credited.push(existing);
          } else {
            let inserted = earning::ActiveModel {
              id: NotSet,
              partner_id: Set(ancestor.id),
              referred_user_id: Set(Some(purchaser)),
              subscription_id: Set(subscription_id.to_string()),
              amount: Set(commission),
              commission_rate: Set(rate),
              level: Set(level),
              status: Set(EarningStatus::Pending),
              payout_id: Set(None),
              paid_at: Set(None),
              created_at: Set(now),
            }
            .insert(&txn)
            .await;

            match inserted {
              Ok(row) => {
                ledger::recompute_partner(&txn, ancestor.id).await?;
                credited.push(row);
              }
              // A concurrent distribution for this subscription won the
              // insert race; rerun so every level resolves to the rows
              // it committed.
              Err(err)
                if matches!(
                  err.sql_err(),
                  Some(SqlErr::UniqueConstraintViolation(_))
                ) =>
              {
                txn.rollback().await?;
                return Box::pin(self.distribute(
                  purchaser,
                  subscription_id,
                  amount,
                ))
                .await;
              }
              Err(err) => return Err(err.into()),
            }
          }
        }
      }

      current = referrer;
    }

    txn.commit().await?;

    if !credited.is_empty() {
      info!(
        "distributed {} commission(s) for subscription {}",
        credited.len(),
        subscription_id
      );
    }

    Ok(credited)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::test_utils::{fixtures, test_db};

  /// Chain D -> C -> B -> A: A referred B, B referred C, C referred D.
  async fn chain(db: &DatabaseConnection) {
    fixtures::referral(db, 1, 2).await; // A referred B
    fixtures::referral(db, 2, 3).await; // B referred C
    fixtures::referral(db, 3, 4).await; // C referred D
  }

  #[tokio::test]
  async fn credits_three_levels() {
    let db = test_db::setup().await;
    chain(&db).await;

    let a = fixtures::partner(&db, 1, 10, PartnerStatus::Active).await;
    let b = fixtures::partner(&db, 2, 10, PartnerStatus::Active).await;
    let c = fixtures::partner(&db, 3, 10, PartnerStatus::Active).await;

    let rows =
      Commission::new(&db).distribute(4, "sub-1", 10_000).await.unwrap();
    assert_eq!(rows.len(), 3);

    // C is the direct referrer: level 1 at its own 10%.
    assert_eq!(rows[0].partner_id, c.id);
    assert_eq!(rows[0].level, 1);
    assert_eq!(rows[0].amount, 1_000);

    // B at the global level-2 rate (5%).
    assert_eq!(rows[1].partner_id, b.id);
    assert_eq!(rows[1].level, 2);
    assert_eq!(rows[1].amount, 500);

    // A at the global level-3 rate (2%).
    assert_eq!(rows[2].partner_id, a.id);
    assert_eq!(rows[2].level, 3);
    assert_eq!(rows[2].amount, 200);

    let a = fixtures::reload_partner(&db, a.id).await;
    assert_eq!(a.total_earnings, 200);
    assert_eq!(a.pending_earnings, 200);
    assert_eq!(a.paid_earnings, 0);
  }

  #[tokio::test]
  async fn depth_is_capped_at_three() {
    let db = test_db::setup().await;
    // E -> D -> C -> B -> A, purchase by E.
    fixtures::referral(&db, 1, 2).await;
    fixtures::referral(&db, 2, 3).await;
    fixtures::referral(&db, 3, 4).await;
    fixtures::referral(&db, 4, 5).await;
    for user in 1..=4 {
      fixtures::partner(&db, user, 10, PartnerStatus::Active).await;
    }

    let rows =
      Commission::new(&db).distribute(5, "sub-1", 10_000).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.level <= MAX_LEVELS));

    // A (user 1) is level 4 away and gets nothing.
    let a = fixtures::partner_by_user(&db, 1).await;
    assert_eq!(a.total_earnings, 0);
  }

  #[tokio::test]
  async fn inactive_partner_is_skipped_but_consumes_its_level() {
    let db = test_db::setup().await;
    chain(&db).await;

    let a = fixtures::partner(&db, 1, 10, PartnerStatus::Active).await;
    let b = fixtures::partner(&db, 2, 10, PartnerStatus::Suspended).await;
    let c = fixtures::partner(&db, 3, 10, PartnerStatus::Active).await;

    let rows =
      Commission::new(&db).distribute(4, "sub-1", 10_000).await.unwrap();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].partner_id, c.id);
    assert_eq!(rows[0].level, 1);
    assert_eq!(rows[0].amount, 1_000);

    // A is credited at the level-3 rate, not bumped down to level 2.
    assert_eq!(rows[1].partner_id, a.id);
    assert_eq!(rows[1].level, 3);
    assert_eq!(rows[1].amount, 200);

    let b = fixtures::reload_partner(&db, b.id).await;
    assert_eq!(b.total_earnings, 0);
  }

  #[tokio::test]
  async fn replayed_subscription_is_a_no_op() {
    let db = test_db::setup().await;
    chain(&db).await;
    fixtures::partner(&db, 3, 10, PartnerStatus::Active).await;

    let sv = Commission::new(&db);
    let first = sv.distribute(4, "sub-1", 10_000).await.unwrap();
    let second = sv.distribute(4, "sub-1", 10_000).await.unwrap();

    assert_eq!(
      first.iter().map(|r| r.id).collect::<Vec<_>>(),
      second.iter().map(|r| r.id).collect::<Vec<_>>()
    );
    assert_eq!(earning::Entity::find().count(&db).await.unwrap(), 1);

    let c = fixtures::partner_by_user(&db, 3).await;
    assert_eq!(c.total_earnings, 1_000);
  }

  #[tokio::test]
  async fn chain_cycle_is_a_fatal_error() {
    let db = test_db::setup().await;
    // Corrupt data: 1 referred 2, 2 referred 1.
    fixtures::referral(&db, 1, 2).await;
    fixtures::referral(&db, 2, 1).await;
    fixtures::partner(&db, 1, 10, PartnerStatus::Active).await;
    fixtures::partner(&db, 2, 10, PartnerStatus::Active).await;

    let err =
      Commission::new(&db).distribute(1, "sub-1", 10_000).await.unwrap_err();
    assert!(matches!(err, Error::ReferralChainCycleDetected(_)));

    // The aborted walk must not leave partial commissions behind.
    assert_eq!(earning::Entity::find().count(&db).await.unwrap(), 0);
  }
}
