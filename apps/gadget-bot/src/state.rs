use crate::config::PaymentConfig;
use crate::services::subscription_service::SubscriptionService;

#[derive(Clone)]
pub struct AppState {
    pub subscriptions: SubscriptionService,
    pub payment: PaymentConfig,
}
