use tokio::sync::broadcast;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::services::subscription_service::SubscriptionService;

/// Runs reconciliation on a fixed period until shutdown is signalled.
pub struct ExpiryMonitor {
    service: SubscriptionService,
    period: Duration,
}

impl ExpiryMonitor {
    pub fn new(service: SubscriptionService, period: Duration) -> Self {
        Self { service, period }
    }

    /// The first pass runs immediately. A failed pass is logged and the loop
    /// keeps its schedule.
    pub async fn start(self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting expiry monitor (every {:?})", self.period);
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.recv() => {
                    info!("Expiry monitor stopped");
                    break;
                }
            }
        }
    }

    async fn tick(&self) {
        match self.service.reconcile_expired().await {
            Ok(report) if report.is_empty() => debug!("No expired subscriptions"),
            Ok(report) => info!(
                "Expiry pass: {} deactivated, {} failed, {} notified",
                report.deactivated, report.failed, report.notified
            ),
            Err(e) => error!("Expiry pass failed: {}", e),
        }
    }
}
