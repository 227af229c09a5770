use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::QuerySelect;

use crate::{
  entity::{EarningStatus, RewardStatus, earning, reward},
  plugins::Plugin,
  prelude::*,
  state::AppState,
  sv::{Ledger, Settings},
};

const SCAN_INTERVAL: Duration = Duration::from_secs(600);
const BATCH: u64 = 100;

/// Timed auto-approval of pending rewards and commissions. Idle while
/// the approval setting says `manual`; with a delay configured, rows
/// older than the delay get approved in batches.
pub struct RewardApproval;

#[async_trait]
impl Plugin for RewardApproval {
  async fn start(&self, app: Arc<AppState>) -> anyhow::Result<()> {
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(SCAN_INTERVAL);
      loop {
        interval.tick().await;

        match approve_due(&app.db).await {
          Ok(0) => {}
          Ok(n) => info!("auto-approved {n} accrual(s)"),
          Err(err) => error!("auto-approval sweep failed: {err}"),
        }
      }
    });

    Ok(())
  }
}

/// One sweep: approve pending rewards and earnings that aged past the
/// configured delay. Each approval commits on its own, so a failure in
/// the middle of a batch loses nothing already approved.
pub(crate) async fn approve_due(db: &DatabaseConnection) -> Result<u64> {
  let Some(hours) = Settings::new(db).approval_delay_hours().await? else {
    return Ok(0);
  };
  let cutoff = Utc::now().naive_utc() - TimeDelta::hours(hours);

  let ledger = Ledger::new(db);
  let mut approved = 0;

  let rewards = reward::Entity::find()
    .filter(reward::Column::Status.eq(RewardStatus::Pending))
    .filter(reward::Column::CreatedAt.lt(cutoff))
    .limit(BATCH)
    .all(db)
    .await?;
  for row in rewards {
    ledger.approve_reward(row.id).await?;
    approved += 1;
  }

  let earnings = earning::Entity::find()
    .filter(earning::Column::Status.eq(EarningStatus::Pending))
    .filter(earning::Column::CreatedAt.lt(cutoff))
    .limit(BATCH)
    .all(db)
    .await?;
  for row in earnings {
    ledger.approve_earning(row.id).await?;
    approved += 1;
  }

  Ok(approved)
}
