use anyhow::Context;
use dotenvy::dotenv;
use teloxide::prelude::*;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod bot;
mod config;
mod error;
mod models;
mod services;
mod state;
mod wireguard;

use crate::config::AppConfig;
use crate::services::expiry_monitor::ExpiryMonitor;
use crate::services::notification_service::NotificationService;
use crate::services::subscription_service::SubscriptionService;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gadget_bot=info,gadget_db=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!("Starting VPN subscription bot...");
    tracing::info!("Database: {}", config.database_url);
    tracing::info!("WireGuard endpoint: {}", config.wireguard.server_endpoint);
    tracing::info!("Admins configured: {}", config.admin_ids.len());

    let pool = gadget_db::init_db(&config.database_url)
        .await
        .context("failed to open database")?;

    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let subscriptions = SubscriptionService::new(
        pool,
        config.wireguard.clone(),
        config.pricing.clone(),
        config.admin_ids.clone(),
        notice_tx,
    );

    let bot = Bot::new(&config.bot_token);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let monitor = ExpiryMonitor::new(subscriptions.clone(), config.reconcile_interval);
    let monitor_handle = tokio::spawn(monitor.start(shutdown_tx.subscribe()));
    tokio::spawn(NotificationService::new(bot.clone()).run(notice_rx));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, shutting down");
                let _ = signal_tx.send(());
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let state = AppState {
        subscriptions,
        payment: config.payment.clone(),
    };
    bot::run_bot(bot, shutdown_tx.subscribe(), state).await;

    // The dispatcher can also stop on its own; make sure the monitor follows.
    let _ = shutdown_tx.send(());
    if let Err(e) = monitor_handle.await {
        tracing::error!("Expiry monitor task failed: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
