mod entity;
mod error;
mod notify;
mod plugins;
mod prelude;
mod state;
mod sv;

use std::env;

use tracing_subscriber::{
  EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::{plugins::App, prelude::*, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  dotenvy::dotenv().ok();

  tracing_subscriber::registry()
    .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
      "referral_engine=debug,tower_http=debug,sea_orm=warn".into()
    }))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let db_url = env::var("DATABASE_URL")
    .unwrap_or_else(|_| "sqlite:referrals.db?mode=rwc".into());

  info!("Starting Referral Engine v{}", env!("CARGO_PKG_VERSION"));

  let app = Arc::new(AppState::new(&db_url).await?);

  App::new()
    .register(plugins::server::Plugin)
    .register(plugins::cron::RewardApproval)
    .run(app)
    .await;

  tokio::signal::ctrl_c().await?;
  info!("Shutting down");

  Ok(())
}
