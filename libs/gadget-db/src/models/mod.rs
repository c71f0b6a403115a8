pub mod config;
pub mod subscription;
pub mod user;

pub use config::ProvisionedConfig;
pub use subscription::{ExpiredSubscription, Subscription, SubscriptionKind};
pub use user::User;
