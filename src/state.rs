use crate::{
  notify::{LogNotifier, Notifier},
  prelude::*,
};

pub struct AppState {
  pub db: DatabaseConnection,
  pub notifier: Box<dyn Notifier>,
}

impl AppState {
  pub async fn new(db_url: &str) -> anyhow::Result<Self> {
    let db = Database::connect(db_url).await?;
    migration::Migrator::up(&db, None).await?;

    Ok(Self { db, notifier: Box::new(LogNotifier) })
  }
}
