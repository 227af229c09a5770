use serde::Deserialize;
use uuid::Uuid;

use crate::{
  entity::{PartnerStatus, partner},
  prelude::*,
};

pub const DEFAULT_COMMISSION_RATE: i32 = 10;

pub struct Partners<'a> {
  db: &'a DatabaseConnection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDraft {
  pub user_id: i64,
  pub commission_rate: Option<i32>,
  pub payout_method: Option<String>,
  pub payout_details: Option<String>,
}

impl<'a> Partners<'a> {
  pub fn new(db: &'a DatabaseConnection) -> Self {
    Self { db }
  }

  /// Enroll a user into the partner program. New partners start pending
  /// and earn nothing until activated.
  pub async fn register(&self, draft: PartnerDraft) -> Result<partner::Model> {
    let rate = draft.commission_rate.unwrap_or(DEFAULT_COMMISSION_RATE);
    if !(0..=100).contains(&rate) {
      return Err(Error::InvalidArgs(
        "Commission rate must be between 0 and 100".into(),
      ));
    }

    let existing = partner::Entity::find()
      .filter(partner::Column::UserId.eq(draft.user_id))
      .one(self.db)
      .await?;
    if existing.is_some() {
      return Err(Error::Conflict("user is already a partner".into()));
    }

    let now = Utc::now().naive_utc();
    Ok(
      partner::ActiveModel {
        id: NotSet,
        user_id: Set(draft.user_id),
        commission_rate: Set(rate),
        total_earnings: Set(0),
        paid_earnings: Set(0),
        pending_earnings: Set(0),
        referral_code: Set(generate_code()),
        referral_count: Set(0),
        status: Set(PartnerStatus::Pending),
        payout_method: Set(draft.payout_method),
        payout_details: Set(draft.payout_details),
        created_at: Set(now),
      }
      .insert(self.db)
      .await?,
    )
  }

  pub async fn by_id(&self, id: i32) -> Result<partner::Model> {
    partner::Entity::find_by_id(id)
      .one(self.db)
      .await?
      .ok_or(Error::PartnerNotFound)
  }

  pub async fn by_user(&self, user_id: i64) -> Result<Option<partner::Model>> {
    Ok(
      partner::Entity::find()
        .filter(partner::Column::UserId.eq(user_id))
        .one(self.db)
        .await?,
    )
  }

  pub async fn by_code(&self, code: &str) -> Result<Option<partner::Model>> {
    Ok(
      partner::Entity::find()
        .filter(partner::Column::ReferralCode.eq(code))
        .one(self.db)
        .await?,
    )
  }

  pub async fn list(
    &self,
    status: Option<PartnerStatus>,
    page: u64,
    limit: u64,
  ) -> Result<(Vec<partner::Model>, u64)> {
    let mut query =
      partner::Entity::find().order_by_desc(partner::Column::CreatedAt);
    if let Some(status) = status {
      query = query.filter(partner::Column::Status.eq(status));
    }

    let paginator = query.paginate(self.db, limit);
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page.saturating_sub(1)).await?;
    Ok((data, total))
  }

  pub async fn set_status(
    &self,
    id: i32,
    to: PartnerStatus,
  ) -> Result<partner::Model> {
    let partner = self.by_id(id).await?;
    if !partner.status.can_transition(to) {
      return Err(Error::InvalidTransition {
        entity: "partner",
        from: format!("{:?}", partner.status),
        to: format!("{to:?}"),
      });
    }

    Ok(
      partner::ActiveModel { status: Set(to), ..partner.into() }
        .update(self.db)
        .await?,
    )
  }

  /// Level-1 rate only; future accruals use the new rate, existing
  /// earning rows keep their snapshot.
  pub async fn set_commission_rate(
    &self,
    id: i32,
    rate: i32,
  ) -> Result<partner::Model> {
    if !(0..=100).contains(&rate) {
      return Err(Error::InvalidArgs(
        "Commission rate must be between 0 and 100".into(),
      ));
    }

    let partner = self.by_id(id).await?;
    Ok(
      partner::ActiveModel { commission_rate: Set(rate), ..partner.into() }
        .update(self.db)
        .await?,
    )
  }

  pub async fn set_payout_profile(
    &self,
    id: i32,
    method: Option<String>,
    details: Option<String>,
  ) -> Result<partner::Model> {
    let partner = self.by_id(id).await?;
    Ok(
      partner::ActiveModel {
        payout_method: Set(method),
        payout_details: Set(details),
        ..partner.into()
      }
      .update(self.db)
      .await?,
    )
  }
}

fn generate_code() -> String {
  let raw = Uuid::new_v4().simple().to_string();
  format!("P{}", raw[..8].to_uppercase())
}
