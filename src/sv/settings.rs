use crate::{entity::setting, prelude::*};

pub const LEVEL2_RATE: &str = "commission.level2_rate";
pub const LEVEL3_RATE: &str = "commission.level3_rate";
pub const PAYOUT_MIN: &str = "payout.min_amount";
/// `manual` or a delay in hours for timed auto-approval.
pub const REWARD_APPROVAL: &str = "rewards.approval";

pub const DEFAULT_LEVEL2_RATE: i32 = 5;
pub const DEFAULT_LEVEL3_RATE: i32 = 2;

pub struct Settings<'a> {
  db: &'a DatabaseConnection,
}

impl<'a> Settings<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  pub async fn get(&self, key: &str) -> Result<Option<String>> {
    let row = setting::Entity::find_by_id(key).one(self.db).await?;
    Ok(row.map(|s| s.value))
  }

  pub async fn set(&self, key: &str, value: &str) -> Result<()> {
    let now = Utc::now().naive_utc();

    if let Some(row) = setting::Entity::find_by_id(key).one(self.db).await? {
      setting::ActiveModel {
        value: Set(value.to_string()),
        updated_at: Set(now),
        ..row.into()
      }
      .update(self.db)
      .await?;
    } else {
      setting::ActiveModel {
        key: Set(key.to_string()),
        value: Set(value.to_string()),
        updated_at: Set(now),
      }
      .insert(self.db)
      .await?;
    }

    Ok(())
  }

  /// Commission percentage for chain levels 2 and 3. Level 1 comes from
  /// the partner's own rate, not from settings.
  pub async fn level_rate(&self, level: i32) -> Result<i32> {
    let (key, default) = match level {
      2 => (LEVEL2_RATE, DEFAULT_LEVEL2_RATE),
      3 => (LEVEL3_RATE, DEFAULT_LEVEL3_RATE),
      _ => {
        return Err(Error::Internal(format!(
          "no settings-level rate for level {level}"
        )));
      }
    };

    Ok(
      self
        .get(key)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(default),
    )
  }

  pub async fn payout_min(&self) -> Result<i64> {
    Ok(
      self
        .get(PAYOUT_MIN)
        .await?
        .and_then(|v| v.parse().ok())
        .unwrap_or(0),
    )
  }

  /// `None` means manual approval; `Some(h)` auto-approves pending
  /// rewards/earnings older than `h` hours.
  pub async fn approval_delay_hours(&self) -> Result<Option<i64>> {
    Ok(self.get(REWARD_APPROVAL).await?.and_then(|v| v.parse().ok()))
  }
}
