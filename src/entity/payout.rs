use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::partner;

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[derive(EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
  #[sea_orm(string_value = "pending")]
  #[default]
  Pending,
  #[sea_orm(string_value = "processing")]
  Processing,
  #[sea_orm(string_value = "completed")]
  Completed,
  #[sea_orm(string_value = "failed")]
  Failed,
  #[sea_orm(string_value = "cancelled")]
  Cancelled,
}

impl PayoutStatus {
  /// Central transition table. Nothing skips `processing` except
  /// cancellation from `pending`.
  pub fn can_transition(self, to: PayoutStatus) -> bool {
    use PayoutStatus::*;
    matches!(
      (self, to),
      (Pending, Processing)
        | (Pending, Cancelled)
        | (Processing, Completed)
        | (Processing, Failed)
    )
  }

  pub fn is_terminal(self) -> bool {
    use PayoutStatus::*;
    matches!(self, Completed | Failed | Cancelled)
  }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payouts")]
pub struct Model {
  #[sea_orm(primary_key)]
  pub id: i32,
  pub partner_id: i32,
  pub amount: i64,
  pub method: String,
  pub status: PayoutStatus,
  pub transaction_id: Option<String>,
  pub notes: Option<String>,
  pub created_at: DateTime,
  pub processed_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
  #[sea_orm(
    belongs_to = "partner::Entity",
    from = "Column::PartnerId",
    to = "partner::Column::Id"
  )]
  Partner,
}

impl Related<partner::Entity> for Entity {
  fn to() -> RelationDef {
    Relation::Partner.def()
  }
}

impl ActiveModelBehavior for ActiveModel {}
