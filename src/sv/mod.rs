use sea_orm::{DatabaseTransaction, DbBackend, IsolationLevel};

use crate::prelude::*;

pub mod accrual;
pub mod commission;
pub mod ledger;
pub mod partners;
pub mod payouts;
pub mod purchase;
pub mod referrals;
pub mod rules;
pub mod settings;
#[cfg(test)]
pub mod test_utils;

pub use accrual::Accrual;
pub use commission::Commission;
pub use ledger::Ledger;
pub use partners::Partners;
pub use payouts::Payouts;
pub use purchase::{PurchaseEvent, Purchases};
pub use referrals::Referrals;
pub use rules::Rules;
pub use settings::Settings;

/// Begin a write transaction at the strictest isolation the backend
/// offers, for read-then-write sequences that must not interleave.
/// SQLite rejects explicit isolation levels; its single writer already
/// serializes transactions.
pub(crate) async fn strict_txn(
  db: &DatabaseConnection,
) -> Result<DatabaseTransaction> {
  Ok(match db.get_database_backend() {
    DbBackend::Sqlite => db.begin().await?,
    _ => {
      db.begin_with_config(Some(IsolationLevel::Serializable), None).await?
    }
  })
}
