use serde::Serialize;

use crate::{
  entity::{EarningStatus, RewardStatus, earning, partner, reward},
  prelude::*,
  sv::strict_txn,
};

/// Read-side balance split. `approved` is the only pool eligible for
/// payout; `pending` is still accruing; `paid` is historical.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balance {
  pub pending: i64,
  pub approved: i64,
  pub paid: i64,
}

pub struct Ledger<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Ledger<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Referral-reward balance for a plain user.
  pub async fn user_balance(&self, user_id: i64) -> Result<Balance> {
    let rows = reward::Entity::find()
      .filter(reward::Column::UserId.eq(user_id))
      .all(self.db)
      .await?;

    let mut balance = Balance::default();
    for row in rows {
      match row.status {
        RewardStatus::Pending => balance.pending += row.amount,
        RewardStatus::Approved => balance.approved += row.amount,
        RewardStatus::Paid => balance.paid += row.amount,
        RewardStatus::Cancelled => {}
      }
    }
    Ok(balance)
  }

  /// Commission balance for a partner.
  pub async fn partner_balance(&self, partner_id: i32) -> Result<Balance> {
    let rows = earning::Entity::find()
      .filter(earning::Column::PartnerId.eq(partner_id))
      .all(self.db)
      .await?;

    let mut balance = Balance::default();
    for row in rows {
      match row.status {
        EarningStatus::Pending => balance.pending += row.amount,
        EarningStatus::Approved => balance.approved += row.amount,
        EarningStatus::Paid => balance.paid += row.amount,
        EarningStatus::Cancelled => {}
      }
    }
    Ok(balance)
  }

  pub async fn rewards(
    &self,
    user_id: Option<i64>,
    status: Option<RewardStatus>,
    page: u64,
    limit: u64,
  ) -> Result<(Vec<reward::Model>, u64)> {
    let mut query =
      reward::Entity::find().order_by_desc(reward::Column::CreatedAt);
    if let Some(user_id) = user_id {
      query = query.filter(reward::Column::UserId.eq(user_id));
    }
    if let Some(status) = status {
      query = query.filter(reward::Column::Status.eq(status));
    }

    let paginator = query.paginate(self.db, limit);
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((data, total))
  }

  pub async fn earnings(
    &self,
    partner_id: i32,
    page: u64,
    limit: u64,
  ) -> Result<(Vec<earning::Model>, u64)> {
    let paginator = earning::Entity::find()
      .filter(earning::Column::PartnerId.eq(partner_id))
      .order_by_desc(earning::Column::CreatedAt)
      .paginate(self.db, limit);

    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((data, total))
  }

  pub async fn approve_reward(&self, id: i32) -> Result<reward::Model> {
    let row = self.reward_by_id(id).await?;
    reward_guard(row.status, RewardStatus::Approved)?;

    Ok(
      reward::ActiveModel {
        status: Set(RewardStatus::Approved),
        ..row.into()
      }
      .update(self.db)
      .await?,
    )
  }

  pub async fn pay_reward(
    &self,
    id: i32,
    paid_by: Option<i64>,
    paid_method: Option<String>,
    transaction_id: Option<String>,
  ) -> Result<reward::Model> {
    let row = self.reward_by_id(id).await?;
    reward_guard(row.status, RewardStatus::Paid)?;

    let now = Utc::now().naive_utc();
    Ok(
      reward::ActiveModel {
        status: Set(RewardStatus::Paid),
        paid_at: Set(Some(now)),
        paid_by: Set(paid_by),
        paid_method: Set(paid_method),
        transaction_id: Set(transaction_id),
        ..row.into()
      }
      .update(self.db)
      .await?,
    )
  }

  pub async fn cancel_reward(&self, id: i32) -> Result<reward::Model> {
    let row = self.reward_by_id(id).await?;
    reward_guard(row.status, RewardStatus::Cancelled)?;

    Ok(
      reward::ActiveModel {
        status: Set(RewardStatus::Cancelled),
        ..row.into()
      }
      .update(self.db)
      .await?,
    )
  }

  pub async fn approve_earning(&self, id: i32) -> Result<earning::Model> {
    let txn = strict_txn(self.db).await?;

    let row = earning::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::EarningNotFound)?;
    earning_guard(row.status, EarningStatus::Approved)?;

    let updated = earning::ActiveModel {
      status: Set(EarningStatus::Approved),
      ..row.into()
    }
    .update(&txn)
    .await?;

    recompute_partner(&txn, updated.partner_id).await?;

    txn.commit().await?;
    Ok(updated)
  }

  /// Admin cancel of a commission. Refused for paid rows and for rows
  /// reserved by an open payout.
  pub async fn cancel_earning(&self, id: i32) -> Result<earning::Model> {
    let txn = strict_txn(self.db).await?;

    let row = earning::Entity::find_by_id(id)
      .one(&txn)
      .await?
      .ok_or(Error::EarningNotFound)?;
    if row.payout_id.is_some() {
      return Err(Error::Conflict(
        "earning is reserved by an open payout".into(),
      ));
    }
    earning_guard(row.status, EarningStatus::Cancelled)?;

    let updated = earning::ActiveModel {
      status: Set(EarningStatus::Cancelled),
      ..row.into()
    }
    .update(&txn)
    .await?;

    recompute_partner(&txn, updated.partner_id).await?;

    txn.commit().await?;
    Ok(updated)
  }

  async fn reward_by_id(&self, id: i32) -> Result<reward::Model> {
    reward::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::RewardNotFound)
  }
}

fn reward_guard(from: RewardStatus, to: RewardStatus) -> Result<()> {
  if from.can_transition(to) {
    return Ok(());
  }
  if to == RewardStatus::Cancelled && from == RewardStatus::Paid {
    return Err(Error::CannotCancelPaidReward);
  }
  Err(Error::InvalidTransition {
    entity: "reward",
    from: format!("{from:?}"),
    to: format!("{to:?}"),
  })
}

fn earning_guard(from: EarningStatus, to: EarningStatus) -> Result<()> {
  if from.can_transition(to) {
    return Ok(());
  }
  if to == EarningStatus::Cancelled && from == EarningStatus::Paid {
    return Err(Error::CannotCancelPaidReward);
  }
  Err(Error::InvalidTransition {
    entity: "earning",
    from: format!("{from:?}"),
    to: format!("{to:?}"),
  })
}

/// Re-derive the partner's cached earning aggregates from the earnings
/// table inside the caller's transaction. Recomputation, not
/// incrementing, is the canonical source of truth.
pub(crate) async fn recompute_partner<C: ConnectionTrait>(
  conn: &C,
  partner_id: i32,
) -> Result<partner::Model> {
  let rows = earning::Entity::find()
    .filter(earning::Column::PartnerId.eq(partner_id))
    .all(conn)
    .await?;

  let mut total = 0;
  let mut pending = 0;
  let mut paid = 0;
  for row in rows {
    match row.status {
      EarningStatus::Pending | EarningStatus::Approved => {
        total += row.amount;
        pending += row.amount;
      }
      EarningStatus::Paid => {
        total += row.amount;
        paid += row.amount;
      }
      EarningStatus::Cancelled => {}
    }
  }

  let partner = partner::Entity::find_by_id(partner_id)
    .one(conn)
    .await?
    .ok_or(Error::PartnerNotFound)?;

  Ok(
    partner::ActiveModel {
      total_earnings: Set(total),
      pending_earnings: Set(pending),
      paid_earnings: Set(paid),
      ..partner.into()
    }
    .update(conn)
    .await?,
  )
}
