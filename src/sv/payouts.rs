use sea_orm::sea_query::Expr;
use serde::Deserialize;

use crate::{
  entity::{
    EarningStatus, PartnerStatus, PayoutStatus, earning, partner, payout,
  },
  prelude::*,
  sv::{Settings, ledger, strict_txn},
};

pub struct Payouts<'a> {
  db: &'a DatabaseConnection,
}

/// Admin-chosen terminal disposition for a payout under processing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessOutcome {
  Completed,
  Failed,
  Cancelled,
}

impl<'a> Payouts<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Open a payout request against the partner's approved balance.
  ///
  /// The requested amount is reserved immediately by stamping whole
  /// approved earning rows oldest-first, so concurrent requests cannot
  /// jointly overdraw. The amount must cover whole rows exactly; paying
  /// out the full approved balance always aligns.
  pub async fn create_request(
    &self,
    partner_id: i32,
    amount: i64,
    method: &str,
    notes: Option<String>,
  ) -> Result<payout::Model> {
    if amount <= 0 {
      return Err(Error::InvalidArgs("Payout amount must be positive".into()));
    }
    if method.trim().is_empty() {
      return Err(Error::InvalidArgs("Payout method must not be empty".into()));
    }

    let min = Settings::new(self.db).payout_min().await?;
    if amount < min {
      return Err(Error::InvalidArgs(format!(
        "Payout amount is below the configured minimum of {min}"
      )));
    }

    let txn = strict_txn(self.db).await?;

    let partner = partner::Entity::find_by_id(partner_id)
      .one(&txn)
      .await?
      .ok_or(Error::PartnerNotFound)?;
    if partner.status != PartnerStatus::Active {
      return Err(Error::Conflict("partner is not active".into()));
    }

    // Approved rows not already held by an open payout.
    let available = earning::Entity::find()
      .filter(earning::Column::PartnerId.eq(partner_id))
      .filter(earning::Column::Status.eq(EarningStatus::Approved))
      .filter(earning::Column::PayoutId.is_null())
      .order_by_asc(earning::Column::CreatedAt)
      .order_by_asc(earning::Column::Id)
      .all(&txn)
      .await?;

    let pool: i64 = available.iter().map(|row| row.amount).sum();
    if amount > pool {
      return Err(Error::InsufficientBalance);
    }

    let mut covered = 0;
    let mut reserve = Vec::new();
    for row in available {
      if covered == amount {
        break;
      }
      covered += row.amount;
      reserve.push(row);
    }
    if covered != amount {
      return Err(Error::InvalidArgs(
        "Payout amount must cover whole approved earnings; \
         request the exact accrued sum"
          .into(),
      ));
    }

    let now = Utc::now().naive_utc();
    let created = payout::ActiveModel {
      id: NotSet,
      partner_id: Set(partner_id),
      amount: Set(amount),
      method: Set(method.to_string()),
      status: Set(PayoutStatus::Pending),
      transaction_id: Set(None),
      notes: Set(notes),
      created_at: Set(now),
      processed_at: Set(None),
    }
    .insert(&txn)
    .await?;

    // Conditional stamp: only rows still unreserved count. A concurrent
    // request that stamped any of them first makes the row check fail.
    let ids: Vec<i32> = reserve.iter().map(|row| row.id).collect();
    let stamped = earning::Entity::update_many()
      .col_expr(earning::Column::PayoutId, Expr::value(created.id))
      .filter(earning::Column::Id.is_in(ids))
      .filter(earning::Column::PayoutId.is_null())
      .filter(earning::Column::Status.eq(EarningStatus::Approved))
      .exec(&txn)
      .await?;
    if stamped.rows_affected != reserve.len() as u64 {
      txn.rollback().await?;
      return Err(Error::Conflict(
        "approved earnings were reserved concurrently".into(),
      ));
    }

    txn.commit().await?;

    info!(
      "payout #{} requested: {} for partner {} via {}",
      created.id, amount, partner_id, method
    );

    Ok(created)
  }

  /// Drive a payout to its terminal state. `completed` flips the reserved
  /// earnings to paid; `failed` and `cancelled` release the reservation
  /// and leave the rows approved. Terminal payouts are never re-applied.
  pub async fn process(
    &self,
    payout_id: i32,
    outcome: ProcessOutcome,
    transaction_id: Option<String>,
    notes: Option<String>,
  ) -> Result<payout::Model> {
    if outcome == ProcessOutcome::Cancelled {
      return self.cancel(payout_id).await;
    }

    let txn = strict_txn(self.db).await?;

    let payout = payout::Entity::find_by_id(payout_id)
      .one(&txn)
      .await?
      .ok_or(Error::PayoutNotFound)?;
    if payout.status.is_terminal() {
      return Err(Error::PayoutAlreadyFinalized);
    }

    // pending -> processing -> terminal in one administrative step.
    let terminal = match outcome {
      ProcessOutcome::Completed => PayoutStatus::Completed,
      ProcessOutcome::Failed => PayoutStatus::Failed,
      ProcessOutcome::Cancelled => unreachable!(),
    };
    let via = PayoutStatus::Processing;
    if !(payout.status.can_transition(via) && via.can_transition(terminal)) {
      return Err(Error::InvalidTransition {
        entity: "payout",
        from: format!("{:?}", payout.status),
        to: format!("{terminal:?}"),
      });
    }

    let reserved = earning::Entity::find()
      .filter(earning::Column::PayoutId.eq(payout.id))
      .all(&txn)
      .await?;

    let now = Utc::now().naive_utc();
    match terminal {
      PayoutStatus::Completed => {
        for row in reserved {
          earning::ActiveModel {
            status: Set(EarningStatus::Paid),
            paid_at: Set(Some(now)),
            ..row.into()
          }
          .update(&txn)
          .await?;
        }
        ledger::recompute_partner(&txn, payout.partner_id).await?;
      }
      _ => {
        for row in reserved {
          earning::ActiveModel { payout_id: Set(None), ..row.into() }
            .update(&txn)
            .await?;
        }
      }
    }

    let partner_id = payout.partner_id;
    let updated = payout::ActiveModel {
      status: Set(terminal),
      transaction_id: Set(transaction_id),
      notes: Set(notes.or(payout.notes.clone())),
      processed_at: Set(Some(now)),
      ..payout.into()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;

    info!(
      "payout #{} for partner {} finalized as {:?}",
      updated.id, partner_id, updated.status
    );

    Ok(updated)
  }

  /// Cancellation is only reachable from `pending`; it releases the
  /// reservation back to the available pool.
  pub async fn cancel(&self, payout_id: i32) -> Result<payout::Model> {
    let txn = strict_txn(self.db).await?;

    let payout = payout::Entity::find_by_id(payout_id)
      .one(&txn)
      .await?
      .ok_or(Error::PayoutNotFound)?;
    if payout.status.is_terminal() {
      return Err(Error::PayoutAlreadyFinalized);
    }
    if !payout.status.can_transition(PayoutStatus::Cancelled) {
      return Err(Error::InvalidTransition {
        entity: "payout",
        from: format!("{:?}", payout.status),
        to: "Cancelled".into(),
      });
    }

    let reserved = earning::Entity::find()
      .filter(earning::Column::PayoutId.eq(payout.id))
      .all(&txn)
      .await?;
    for row in reserved {
      earning::ActiveModel { payout_id: Set(None), ..row.into() }
        .update(&txn)
        .await?;
    }

    let now = Utc::now().naive_utc();
    let updated = payout::ActiveModel {
      status: Set(PayoutStatus::Cancelled),
      processed_at: Set(Some(now)),
      ..payout.into()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;
    Ok(updated)
  }

  pub async fn by_id(&self, id: i32) -> Result<payout::Model> {
    payout::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::PayoutNotFound)
  }

  pub async fn list(
    &self,
    partner_id: i32,
    page: u64,
    limit: u64,
  ) -> Result<(Vec<payout::Model>, u64)> {
    let paginator = payout::Entity::find()
      .filter(payout::Column::PartnerId.eq(partner_id))
      .order_by_desc(payout::Column::CreatedAt)
      .paginate(self.db, limit);

    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((data, total))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::sv::{
    Commission, Ledger,
    test_utils::{fixtures, test_db},
  };

  /// One active partner (user 1) with a single approved 1_000 earning
  /// from user 2's 10_000 purchase.
  async fn seeded(db: &DatabaseConnection) -> partner::Model {
    fixtures::referral(db, 1, 2).await;
    let partner = fixtures::partner(db, 1, 10, PartnerStatus::Active).await;
    let rows =
      Commission::new(db).distribute(2, "sub-1", 10_000).await.unwrap();
    Ledger::new(db).approve_earning(rows[0].id).await.unwrap();
    fixtures::reload_partner(db, partner.id).await
  }

  #[tokio::test]
  async fn full_balance_round_trip() {
    let db = test_db::setup().await;
    let partner = seeded(&db).await;
    assert_eq!(partner.pending_earnings, 1_000);

    let sv = Payouts::new(&db);
    let payout =
      sv.create_request(partner.id, 1_000, "usdt", None).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Pending);

    let done = sv
      .process(
        payout.id,
        ProcessOutcome::Completed,
        Some("tx-99".into()),
        None,
      )
      .await
      .unwrap();
    assert_eq!(done.status, PayoutStatus::Completed);
    assert_eq!(done.transaction_id.as_deref(), Some("tx-99"));

    let partner = fixtures::reload_partner(&db, partner.id).await;
    assert_eq!(partner.paid_earnings, 1_000);
    assert_eq!(partner.pending_earnings, 0);
    assert_eq!(partner.total_earnings, 1_000);

    let earning = earning::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(earning.status, EarningStatus::Paid);
    assert!(earning.paid_at.is_some());
  }

  #[tokio::test]
  async fn overdraw_is_rejected_without_a_row() {
    let db = test_db::setup().await;
    let partner = seeded(&db).await;

    let err = Payouts::new(&db)
      .create_request(partner.id, 1_001, "usdt", None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance));
    assert_eq!(payout::Entity::find().count(&db).await.unwrap(), 0);
  }

  #[tokio::test]
  async fn pending_earnings_are_not_payable() {
    let db = test_db::setup().await;
    fixtures::referral(&db, 1, 2).await;
    let partner = fixtures::partner(&db, 1, 10, PartnerStatus::Active).await;
    // Distributed but never approved.
    Commission::new(&db).distribute(2, "sub-1", 10_000).await.unwrap();

    let err = Payouts::new(&db)
      .create_request(partner.id, 1_000, "usdt", None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance));
  }

  #[tokio::test]
  async fn reservation_blocks_concurrent_requests() {
    let db = test_db::setup().await;
    let partner = seeded(&db).await;

    let sv = Payouts::new(&db);
    sv.create_request(partner.id, 1_000, "usdt", None).await.unwrap();

    // The same balance cannot back a second request.
    let err = sv
      .create_request(partner.id, 1_000, "usdt", None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InsufficientBalance));
  }

  #[tokio::test]
  async fn reservation_stamps_only_the_covering_rows() {
    let db = test_db::setup().await;
    let partner = seeded(&db).await;
    // A second approved earning from another subscription.
    let rows =
      Commission::new(&db).distribute(2, "sub-2", 5_000).await.unwrap();
    Ledger::new(&db).approve_earning(rows[0].id).await.unwrap();

    let payout = Payouts::new(&db)
      .create_request(partner.id, 1_000, "usdt", None)
      .await
      .unwrap();

    let earnings = earning::Entity::find()
      .order_by_asc(earning::Column::Id)
      .all(&db)
      .await
      .unwrap();
    assert_eq!(earnings[0].payout_id, Some(payout.id));
    assert_eq!(earnings[1].payout_id, None);
  }

  #[tokio::test]
  async fn failed_payout_releases_the_reservation() {
    let db = test_db::setup().await;
    let partner = seeded(&db).await;

    let sv = Payouts::new(&db);
    let payout =
      sv.create_request(partner.id, 1_000, "usdt", None).await.unwrap();
    sv.process(payout.id, ProcessOutcome::Failed, None, None).await.unwrap();

    let earning = earning::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(earning.status, EarningStatus::Approved);
    assert_eq!(earning.payout_id, None);

    // The released balance backs a fresh request.
    sv.create_request(partner.id, 1_000, "usdt", None).await.unwrap();
  }

  #[tokio::test]
  async fn terminal_payouts_are_never_reapplied() {
    let db = test_db::setup().await;
    let partner = seeded(&db).await;

    let sv = Payouts::new(&db);
    let payout =
      sv.create_request(partner.id, 1_000, "usdt", None).await.unwrap();
    sv.process(payout.id, ProcessOutcome::Completed, None, None)
      .await
      .unwrap();

    let err = sv
      .process(payout.id, ProcessOutcome::Completed, None, None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::PayoutAlreadyFinalized));

    let err = sv.cancel(payout.id).await.unwrap_err();
    assert!(matches!(err, Error::PayoutAlreadyFinalized));

    // Aggregates unchanged by the rejected retries.
    let partner = fixtures::reload_partner(&db, partner.id).await;
    assert_eq!(partner.paid_earnings, 1_000);
  }

  #[tokio::test]
  async fn cancel_only_from_pending() {
    let db = test_db::setup().await;
    let partner = seeded(&db).await;

    let sv = Payouts::new(&db);
    let payout =
      sv.create_request(partner.id, 1_000, "usdt", None).await.unwrap();
    let cancelled = sv.cancel(payout.id).await.unwrap();
    assert_eq!(cancelled.status, PayoutStatus::Cancelled);

    let earning = earning::Entity::find().one(&db).await.unwrap().unwrap();
    assert_eq!(earning.payout_id, None);
  }

  #[tokio::test]
  async fn misaligned_partial_amount_is_rejected() {
    let db = test_db::setup().await;
    let partner = seeded(&db).await;

    let err = Payouts::new(&db)
      .create_request(partner.id, 400, "usdt", None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidArgs(_)));
  }

  #[tokio::test]
  async fn minimum_amount_is_enforced() {
    let db = test_db::setup().await;
    let partner = seeded(&db).await;
    Settings::new(&db)
      .set(crate::sv::settings::PAYOUT_MIN, "5000")
      .await
      .unwrap();

    let err = Payouts::new(&db)
      .create_request(partner.id, 1_000, "usdt", None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::InvalidArgs(_)));
  }
}
