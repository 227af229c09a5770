//! Shared test utilities for database setup and common fixtures

#[cfg(test)]
pub mod test_db {
  use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbBackend, Schema,
  };

  use crate::entity::*;

  /// Creates an in-memory SQLite database with all required tables
  pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    let schema = Schema::new(DbBackend::Sqlite);

    let stmt = schema.create_table_from_entity(rule::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(referral::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(reward::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(partner::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(earning::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(payout::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    let stmt = schema.create_table_from_entity(setting::Entity);
    db.execute(db.get_database_backend().build(&stmt)).await.unwrap();

    db
  }
}

#[cfg(test)]
pub mod fixtures {
  use crate::{entity::*, prelude::*, sv::purchase::PurchaseEvent};

  pub async fn rule(
    db: &DatabaseConnection,
    rule_type: RuleType,
    referrer_reward: i64,
    referred_reward: i64,
  ) -> rule::Model {
    let now = Utc::now().naive_utc();
    rule::ActiveModel {
      id: NotSet,
      name: Set(format!("{rule_type:?}")),
      rule_type: Set(rule_type),
      referrer_reward: Set(referrer_reward),
      referred_reward: Set(referred_reward),
      min_purchase_amount: Set(None),
      applies_to_plans: Set(None),
      repeatable: Set(false),
      is_active: Set(true),
      starts_at: Set(None),
      ends_at: Set(None),
      created_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
  }

  pub async fn referral(
    db: &DatabaseConnection,
    referrer_id: i64,
    referred_id: i64,
  ) -> referral::Model {
    let now = Utc::now().naive_utc();
    referral::ActiveModel {
      id: NotSet,
      referrer_id: Set(referrer_id),
      referred_id: Set(referred_id),
      referral_code: Set(None),
      rule_id: Set(None),
      status: Set(ReferralStatus::Active),
      referrer_reward: Set(0),
      referred_reward: Set(0),
      completed_at: Set(None),
      cancelled_at: Set(None),
      cancelled_reason: Set(None),
      created_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
  }

  pub async fn partner(
    db: &DatabaseConnection,
    user_id: i64,
    commission_rate: i32,
    status: PartnerStatus,
  ) -> partner::Model {
    let now = Utc::now().naive_utc();
    partner::ActiveModel {
      id: NotSet,
      user_id: Set(user_id),
      commission_rate: Set(commission_rate),
      total_earnings: Set(0),
      paid_earnings: Set(0),
      pending_earnings: Set(0),
      referral_code: Set(format!("P{user_id:08}")),
      referral_count: Set(0),
      status: Set(status),
      payout_method: Set(None),
      payout_details: Set(None),
      created_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap()
  }

  pub async fn reload_partner(
    db: &DatabaseConnection,
    id: i32,
  ) -> partner::Model {
    partner::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
  }

  pub async fn partner_by_user(
    db: &DatabaseConnection,
    user_id: i64,
  ) -> partner::Model {
    partner::Entity::find()
      .filter(partner::Column::UserId.eq(user_id))
      .one(db)
      .await
      .unwrap()
      .unwrap()
  }

  pub fn event(event_id: &str, user_id: i64, amount: i64) -> PurchaseEvent {
    PurchaseEvent {
      event_id: event_id.to_string(),
      user_id,
      plan_id: "monthly".to_string(),
      subscription_id: format!("sub-{event_id}"),
      amount,
      timestamp: Utc::now().naive_utc(),
      is_first_purchase: true,
      lifetime_spend: None,
    }
  }
}
