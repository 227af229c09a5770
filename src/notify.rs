use async_trait::async_trait;

use crate::{
  entity::{payout, reward},
  prelude::*,
};

/// Domain event sink. Delivery and formatting are the notifier's
/// responsibility; the engine fires these after the owning transaction
/// commits and ignores failures.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn reward_accrued(&self, reward: &reward::Model);
  async fn payout_completed(&self, payout: &payout::Model);
}

/// Default sink that only logs. Deployments plug a real messaging
/// integration behind the same trait.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
  async fn reward_accrued(&self, reward: &reward::Model) {
    info!(
      "reward #{} accrued: {} to user {}",
      reward.id, reward.amount, reward.user_id
    );
  }

  async fn payout_completed(&self, payout: &payout::Model) {
    info!(
      "payout #{} completed: {} via {}",
      payout.id, payout.amount, payout.method
    );
  }
}
