use teloxide::prelude::*;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::services::subscription_service::ExpiryNotice;

pub const EXPIRY_MESSAGE: &str =
    "⚠️ Your subscription has expired. Choose a new plan to keep using the VPN.";

/// Delivers queued expiry notices to users via Telegram.
pub struct NotificationService {
    bot: Bot,
}

impl NotificationService {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Drains notices until every sender is gone. A failed delivery is
    /// logged and dropped.
    pub async fn run(self, mut notices: mpsc::UnboundedReceiver<ExpiryNotice>) {
        info!("Notification forwarder started");
        let mut sent = 0usize;

        while let Some(ExpiryNotice { user_id }) = notices.recv().await {
            match self.bot.send_message(ChatId(user_id), EXPIRY_MESSAGE).await {
                Ok(_) => {
                    sent += 1;
                    info!("✓ Expiry notice sent to {}", user_id);
                }
                Err(e) => warn!("✗ Failed to notify {} about expiry: {}", user_id, e),
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        info!("Notification forwarder stopped after {} notices", sent);
    }
}
