pub mod address_repo;
pub mod config_repo;
pub mod payment_repo;
pub mod subscription_repo;
pub mod user_repo;

pub use address_repo::AddressRepository;
pub use config_repo::ConfigRepository;
pub use payment_repo::PaymentRepository;
pub use subscription_repo::SubscriptionRepository;
pub use user_repo::UserRepository;
