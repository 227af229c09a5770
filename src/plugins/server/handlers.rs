use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};

use crate::{
  entity::{
    PartnerStatus, PayoutStatus, ReferralStatus, RewardStatus, earning,
    partner, payout, referral, reward, rule,
  },
  prelude::*,
  state::AppState,
  sv::{
    Ledger, Partners, Payouts, Purchases, Referrals, Rules,
    partners::PartnerDraft,
    payouts::ProcessOutcome,
    purchase::{Ingest, PurchaseEvent},
    rules::RuleDraft,
  },
};

/// Page/limit with API defaults. Limit is capped so a single request
/// cannot dump the whole table.
fn pager(page: Option<u64>, limit: Option<u64>) -> (u64, u64) {
  (page.unwrap_or(1).max(1), limit.unwrap_or(20).clamp(1, 100))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
  pub data: Vec<T>,
  pub total: u64,
  pub page: u64,
  pub limit: u64,
  pub total_pages: u64,
}

impl<T> Page<T> {
  fn new(data: Vec<T>, total: u64, page: u64, limit: u64) -> Self {
    Self { data, total, page, limit, total_pages: total.div_ceil(limit) }
  }
}

pub async fn health() -> Json<json::Value> {
  Json(json::json!({ "success": true }))
}

pub async fn ingest_purchase(
  State(app): State<Arc<AppState>>,
  Json(event): Json<PurchaseEvent>,
) -> Result<Json<Ingest>> {
  let out = Purchases::new(&app.db).ingest(&event).await?;
  // Replayed deliveries return rows announced the first time around.
  if !out.replay {
    for reward in &out.rewards {
      app.notifier.reward_accrued(reward).await;
    }
  }
  Ok(Json(out))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReferral {
  pub referrer_id: i64,
  pub referred_id: i64,
  pub referral_code: Option<String>,
  pub rule_id: Option<i32>,
}

pub async fn create_referral(
  State(app): State<Arc<AppState>>,
  Json(body): Json<CreateReferral>,
) -> Result<Json<referral::Model>> {
  let created = Referrals::new(&app.db)
    .create(
      body.referrer_id,
      body.referred_id,
      body.referral_code,
      body.rule_id,
    )
    .await?;
  Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub struct ReferralsQuery {
  pub status: Option<ReferralStatus>,
  pub page: Option<u64>,
  pub limit: Option<u64>,
}

pub async fn list_referrals(
  State(app): State<Arc<AppState>>,
  Query(query): Query<ReferralsQuery>,
) -> Result<Json<Page<referral::Model>>> {
  let (page, limit) = pager(query.page, query.limit);
  let (data, total) =
    Referrals::new(&app.db).list(query.status, page, limit).await?;
  Ok(Json(Page::new(data, total, page, limit)))
}

pub async fn get_referral(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
) -> Result<Json<referral::Model>> {
  Ok(Json(Referrals::new(&app.db).by_id(id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchReferral {
  pub referral_code: Option<String>,
}

pub async fn patch_referral(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Json(body): Json<PatchReferral>,
) -> Result<Json<referral::Model>> {
  Ok(Json(Referrals::new(&app.db).set_code(id, body.referral_code).await?))
}

pub async fn complete_referral(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
) -> Result<Json<referral::Model>> {
  Ok(Json(Referrals::new(&app.db).complete(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelReferral {
  pub reason: Option<String>,
}

pub async fn cancel_referral(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  body: Option<Json<CancelReferral>>,
) -> Result<Json<referral::Model>> {
  let reason = body.map(|Json(b)| b.reason).unwrap_or_default();
  Ok(Json(Referrals::new(&app.db).cancel(id, reason).await?))
}

#[derive(Debug, Deserialize)]
pub struct RulesQuery {
  pub page: Option<u64>,
  pub limit: Option<u64>,
}

pub async fn list_rules(
  State(app): State<Arc<AppState>>,
  Query(query): Query<RulesQuery>,
) -> Result<Json<Page<rule::Model>>> {
  let (page, limit) = pager(query.page, query.limit);
  let (data, total) = Rules::new(&app.db).list(page, limit).await?;
  Ok(Json(Page::new(data, total, page, limit)))
}

pub async fn create_rule(
  State(app): State<Arc<AppState>>,
  Json(draft): Json<RuleDraft>,
) -> Result<Json<rule::Model>> {
  Ok(Json(Rules::new(&app.db).create(draft).await?))
}

pub async fn update_rule(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Json(draft): Json<RuleDraft>,
) -> Result<Json<rule::Model>> {
  Ok(Json(Rules::new(&app.db).update(id, draft).await?))
}

pub async fn delete_rule(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
) -> Result<Json<json::Value>> {
  Rules::new(&app.db).delete(id).await?;
  Ok(Json(json::json!({ "success": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardsQuery {
  pub status: Option<RewardStatus>,
  pub user_id: Option<i64>,
  pub page: Option<u64>,
  pub limit: Option<u64>,
}

pub async fn list_rewards(
  State(app): State<Arc<AppState>>,
  Query(query): Query<RewardsQuery>,
) -> Result<Json<Page<reward::Model>>> {
  let (page, limit) = pager(query.page, query.limit);
  let (data, total) = Ledger::new(&app.db)
    .rewards(query.user_id, query.status, page, limit)
    .await?;
  Ok(Json(Page::new(data, total, page, limit)))
}

pub async fn approve_reward(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
) -> Result<Json<reward::Model>> {
  Ok(Json(Ledger::new(&app.db).approve_reward(id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayReward {
  pub paid_method: Option<String>,
  pub transaction_id: Option<String>,
  pub paid_by: Option<i64>,
}

pub async fn pay_reward(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Json(body): Json<PayReward>,
) -> Result<Json<reward::Model>> {
  let paid = Ledger::new(&app.db)
    .pay_reward(id, body.paid_by, body.paid_method, body.transaction_id)
    .await?;
  Ok(Json(paid))
}

#[derive(Debug, Deserialize)]
pub struct PartnersQuery {
  pub status: Option<PartnerStatus>,
  pub page: Option<u64>,
  pub limit: Option<u64>,
}

pub async fn list_partners(
  State(app): State<Arc<AppState>>,
  Query(query): Query<PartnersQuery>,
) -> Result<Json<Page<partner::Model>>> {
  let (page, limit) = pager(query.page, query.limit);
  let (data, total) =
    Partners::new(&app.db).list(query.status, page, limit).await?;
  Ok(Json(Page::new(data, total, page, limit)))
}

pub async fn register_partner(
  State(app): State<Arc<AppState>>,
  Json(draft): Json<PartnerDraft>,
) -> Result<Json<partner::Model>> {
  Ok(Json(Partners::new(&app.db).register(draft).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchPartner {
  pub commission_rate: Option<i32>,
  pub status: Option<PartnerStatus>,
  pub payout_method: Option<String>,
  pub payout_details: Option<String>,
}

pub async fn patch_partner(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Json(body): Json<PatchPartner>,
) -> Result<Json<partner::Model>> {
  let sv = Partners::new(&app.db);

  if let Some(rate) = body.commission_rate {
    sv.set_commission_rate(id, rate).await?;
  }
  if let Some(status) = body.status {
    sv.set_status(id, status).await?;
  }
  if body.payout_method.is_some() || body.payout_details.is_some() {
    let current = sv.by_id(id).await?;
    sv.set_payout_profile(
      id,
      body.payout_method.or(current.payout_method),
      body.payout_details.or(current.payout_details),
    )
    .await?;
  }

  Ok(Json(sv.by_id(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct EarningsQuery {
  pub page: Option<u64>,
  pub limit: Option<u64>,
}

pub async fn list_earnings(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Query(query): Query<EarningsQuery>,
) -> Result<Json<Page<earning::Model>>> {
  // 404 for unknown partners rather than an empty page.
  Partners::new(&app.db).by_id(id).await?;

  let (page, limit) = pager(query.page, query.limit);
  let (data, total) = Ledger::new(&app.db).earnings(id, page, limit).await?;
  Ok(Json(Page::new(data, total, page, limit)))
}

pub async fn list_payouts(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Query(query): Query<EarningsQuery>,
) -> Result<Json<Page<payout::Model>>> {
  Partners::new(&app.db).by_id(id).await?;

  let (page, limit) = pager(query.page, query.limit);
  let (data, total) = Payouts::new(&app.db).list(id, page, limit).await?;
  Ok(Json(Page::new(data, total, page, limit)))
}

#[derive(Debug, Deserialize)]
pub struct CreatePayout {
  pub amount: i64,
  pub method: String,
  pub notes: Option<String>,
}

pub async fn create_payout(
  State(app): State<Arc<AppState>>,
  Path(id): Path<i32>,
  Json(body): Json<CreatePayout>,
) -> Result<Json<payout::Model>> {
  let created = Payouts::new(&app.db)
    .create_request(id, body.amount, &body.method, body.notes)
    .await?;
  Ok(Json(created))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessPayout {
  pub status: ProcessOutcome,
  pub transaction_id: Option<String>,
  pub notes: Option<String>,
}

pub async fn process_payout(
  State(app): State<Arc<AppState>>,
  Path((partner_id, payout_id)): Path<(i32, i32)>,
  Json(body): Json<ProcessPayout>,
) -> Result<Json<payout::Model>> {
  let sv = Payouts::new(&app.db);

  let payout = sv.by_id(payout_id).await?;
  if payout.partner_id != partner_id {
    return Err(Error::PayoutNotFound);
  }

  let updated =
    sv.process(payout_id, body.status, body.transaction_id, body.notes).await?;
  if updated.status == PayoutStatus::Completed {
    app.notifier.payout_completed(&updated).await;
  }
  Ok(Json(updated))
}
