pub mod earning;
pub mod partner;
pub mod payout;
pub mod referral;
pub mod reward;
pub mod rule;
pub mod setting;

pub use earning::EarningStatus;
pub use partner::PartnerStatus;
pub use payout::PayoutStatus;
pub use referral::ReferralStatus;
pub use reward::{RewardRole, RewardStatus};
pub use rule::RuleType;
