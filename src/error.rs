use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Db(#[from] sea_orm::DbErr),

  #[error("{0}")]
  InvalidArgs(String),

  #[error("referral not found")]
  ReferralNotFound,
  #[error("rule not found")]
  RuleNotFound,
  #[error("reward not found")]
  RewardNotFound,
  #[error("partner not found")]
  PartnerNotFound,
  #[error("earning not found")]
  EarningNotFound,
  #[error("payout not found")]
  PayoutNotFound,

  #[error("user is already referred by someone else")]
  DuplicateReferral,
  #[error("{0}")]
  Conflict(String),
  #[error("insufficient approved balance")]
  InsufficientBalance,
  #[error("referral is not active")]
  ReferralInactive,
  #[error("cannot cancel a paid reward")]
  CannotCancelPaidReward,
  #[error("payout already finalized")]
  PayoutAlreadyFinalized,
  #[error("illegal {entity} transition: {from} -> {to}")]
  InvalidTransition { entity: &'static str, from: String, to: String },

  /// Data integrity failure, never retried automatically.
  #[error("referral chain cycle detected at user {0}")]
  ReferralChainCycleDetected(i64),

  #[error("{0}")]
  Internal(String),
}

impl Error {
  pub fn status(&self) -> StatusCode {
    use Error::*;
    match self {
      InvalidArgs(_) => StatusCode::BAD_REQUEST,
      ReferralNotFound | RuleNotFound | RewardNotFound | PartnerNotFound
      | EarningNotFound | PayoutNotFound => StatusCode::NOT_FOUND,
      DuplicateReferral
      | Conflict(_)
      | InsufficientBalance
      | ReferralInactive
      | CannotCancelPaidReward
      | PayoutAlreadyFinalized
      | InvalidTransition { .. } => StatusCode::CONFLICT,
      Db(_) | ReferralChainCycleDetected(_) | Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match &self {
      Error::ReferralChainCycleDetected(user) => {
        tracing::error!("referral chain cycle detected at user {user}");
      }
      Error::Db(err) => {
        tracing::error!("database error: {err}");
      }
      _ => {}
    }

    let body =
      Json(json::json!({ "success": false, "error": self.to_string() }));
    (self.status(), body).into_response()
  }
}
