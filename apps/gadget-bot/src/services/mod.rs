pub mod expiry_monitor;
pub mod notification_service;
pub mod pricing;
pub mod subscription_service;
pub mod user_locks;
