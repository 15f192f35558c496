// Copyright (c) MySocial Team
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use anyhow::Result;
use dotenv::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use match_abuse_service::api::{self, AppState};
use match_abuse_service::config::Config;
use match_abuse_service::db::init_database;
use match_abuse_service::services::{AppServices, DisabledMailer, Mailer, SmtpMailer};
use match_abuse_service::store::PgStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv().ok();

    // LOG_FORMAT=json switches to structured output
    let json_logs = std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,match_abuse_service=debug".into()),
        ))
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    let config = Config::init()?;
    info!("Initialized configuration");

    let db = Arc::new(init_database(&config.database).await?);
    info!("Connected to database");

    let mailer: Arc<dyn Mailer> = match SmtpMailer::from_config(&config.mail)? {
        Some(mailer) => Arc::new(mailer),
        None => {
            warn!("SMTP_HOST is not set; abuse report notifications are disabled");
            Arc::new(DisabledMailer)
        }
    };

    let store = Arc::new(PgStore::new(db.clone()));
    let services = AppServices::new(store, mailer, config.mail.site_address.clone());
    let state = AppState::new(services, Some(db));

    tokio::select! {
        result = api::start_api_server(&config.api, state) => {
            if let Err(e) = result {
                error!("API server error: {:#}", e);
                return Err(e);
            }
        }
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        }
    }

    info!("Match abuse service shutdown complete");
    Ok(())
}
