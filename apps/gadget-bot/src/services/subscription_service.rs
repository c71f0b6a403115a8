use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gadget_db::models::{ProvisionedConfig, Subscription, SubscriptionKind};
use gadget_db::repositories::{
    AddressRepository, ConfigRepository, PaymentRepository, SubscriptionRepository, UserRepository,
};
use gadget_db::sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::WireGuardConfig;
use crate::error::{InvalidRequest, LifecycleError};
use crate::models::Platform;
use crate::services::pricing::PricingConfig;
use crate::services::user_locks::UserLocks;
use crate::wireguard::{self, KeyGenerator, X25519KeyGenerator};

pub const TRIAL_MONTHS: u32 = 1;

/// Longest single purchase or extension accepted, in months.
pub const MAX_SUBSCRIPTION_MONTHS: u32 = 120;

fn validate_months(months: u32) -> Result<(), InvalidRequest> {
    if (1..=MAX_SUBSCRIPTION_MONTHS).contains(&months) {
        Ok(())
    } else {
        Err(InvalidRequest::InvalidDuration(months))
    }
}

/// A freshly provisioned peer: the subscription that pays for it and the
/// profile the user imports.
#[derive(Debug, Clone)]
pub struct IssuedProfile {
    pub subscription: Subscription,
    pub address: Ipv4Addr,
    pub public_key: String,
    pub profile_text: String,
    pub scannable: String,
}

#[derive(Debug, Clone)]
pub enum PaymentOutcome {
    /// No active subscription existed; a new one and a new peer were created.
    Provisioned(IssuedProfile),
    /// The active subscription was pushed forward, or an active trial was
    /// converted into a paid subscription. The existing profile stays valid.
    Extended(Subscription),
    /// This payment id was processed before. Nothing changed.
    Duplicate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub user_id: i64,
    pub active: bool,
    pub end_date: Option<DateTime<Utc>>,
    pub is_trial: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub platform: Platform,
    pub profile_text: String,
    /// Present for mobile platforms only.
    pub scannable: Option<String>,
}

/// Sent once per user whose subscription was deactivated by reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryNotice {
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub deactivated: usize,
    pub failed: usize,
    pub notified: usize,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.deactivated == 0 && self.failed == 0
    }
}

/// Owns every subscription state transition: trial, purchase, extension,
/// expiry and admin overrides.
#[derive(Clone)]
pub struct SubscriptionService {
    pool: SqlitePool,
    users: UserRepository,
    subscriptions: SubscriptionRepository,
    configs: ConfigRepository,
    keys: Arc<dyn KeyGenerator>,
    wireguard: Arc<WireGuardConfig>,
    pricing: Arc<PricingConfig>,
    admin_ids: Arc<HashSet<i64>>,
    locks: UserLocks,
    notices: mpsc::UnboundedSender<ExpiryNotice>,
}

impl SubscriptionService {
    pub fn new(
        pool: SqlitePool,
        wireguard: WireGuardConfig,
        pricing: PricingConfig,
        admin_ids: HashSet<i64>,
        notices: mpsc::UnboundedSender<ExpiryNotice>,
    ) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            subscriptions: SubscriptionRepository::new(pool.clone()),
            configs: ConfigRepository::new(pool.clone()),
            pool,
            keys: Arc::new(X25519KeyGenerator),
            wireguard: Arc::new(wireguard),
            pricing: Arc::new(pricing),
            admin_ids: Arc::new(admin_ids),
            locks: UserLocks::new(),
            notices,
        }
    }

    #[cfg(test)]
    pub fn with_key_generator(mut self, keys: Arc<dyn KeyGenerator>) -> Self {
        self.keys = keys;
        self
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Idempotent. Returns `true` for a first-time user.
    pub async fn register_user(
        &self,
        user_id: i64,
        username: Option<&str>,
    ) -> Result<bool, LifecycleError> {
        let created = self.users.add(user_id, username).await?;
        if created {
            info!("Registered user {} ({:?})", user_id, username);
        }
        Ok(created)
    }

    /// One free month per user, ever, and only while nothing else is active.
    pub async fn request_trial(&self, user_id: i64) -> Result<IssuedProfile, LifecycleError> {
        self.users.add(user_id, None).await?;
        let _guard = self.locks.lock(user_id).await;

        if self.subscriptions.get_active(user_id).await?.is_some() {
            return Err(LifecycleError::AlreadyActive);
        }
        if self.subscriptions.has_used_trial(user_id).await? {
            return Err(LifecycleError::TrialAlreadyUsed);
        }

        let mut tx = self.pool.begin().await?;
        let subscription = SubscriptionRepository::add_if_none_active_tx(
            &mut tx,
            user_id,
            SubscriptionKind::Trial,
            TRIAL_MONTHS,
            None,
            true,
        )
        .await?
        .ok_or(LifecycleError::AlreadyActive)?;

        let issued = self.issue_profile_tx(&mut tx, subscription).await?;
        tx.commit().await?;

        info!(
            "Trial granted to user {} until {} ({})",
            user_id, issued.subscription.end_date, issued.address
        );
        Ok(issued)
    }

    /// Applies a confirmed payment exactly once per `payment_id`.
    pub async fn confirm_payment(
        &self,
        user_id: i64,
        months: u32,
        payment_id: &str,
        amount: i64,
    ) -> Result<PaymentOutcome, LifecycleError> {
        validate_months(months)?;
        let expected = self.pricing.price(months);
        if amount != expected {
            warn!(
                "Payment {} from user {}: paid {} for {} months, expected {}",
                payment_id, user_id, amount, months, expected
            );
        }

        self.users.add(user_id, None).await?;
        let _guard = self.locks.lock(user_id).await;

        let mut tx = self.pool.begin().await?;
        if !PaymentRepository::record_tx(&mut tx, payment_id, user_id, months, amount).await? {
            info!("Payment {} already processed, ignoring", payment_id);
            return Ok(PaymentOutcome::Duplicate);
        }

        if let Some(active) = SubscriptionRepository::get_active_tx(&mut tx, user_id).await? {
            if active.is_trial {
                let paid =
                    SubscriptionRepository::replace_trial_tx(&mut tx, &active, months, payment_id)
                        .await?;
                tx.commit().await?;

                info!(
                    "Payment {}: trial {} of user {} converted to subscription {} until {}",
                    payment_id, active.id, user_id, paid.id, paid.end_date
                );
                return Ok(PaymentOutcome::Extended(paid));
            }

            let end_date = SubscriptionRepository::extend_tx(&mut tx, active.id, months)
                .await?
                .ok_or(InvalidRequest::UnknownSubscription(active.id))?;
            tx.commit().await?;

            info!(
                "Payment {}: extended subscription {} of user {} to {}",
                payment_id, active.id, user_id, end_date
            );
            return Ok(PaymentOutcome::Extended(Subscription { end_date, ..active }));
        }

        let subscription = SubscriptionRepository::add_if_none_active_tx(
            &mut tx,
            user_id,
            SubscriptionKind::Paid,
            months,
            Some(payment_id),
            false,
        )
        .await?
        .ok_or(LifecycleError::AlreadyActive)?;

        let issued = self.issue_profile_tx(&mut tx, subscription).await?;
        tx.commit().await?;

        info!(
            "Payment {}: user {} subscribed for {} months ({})",
            payment_id, user_id, months, issued.address
        );
        Ok(PaymentOutcome::Provisioned(issued))
    }

    /// Address, key pair and profile for a subscription created in the same
    /// transaction. Any failure leaves the caller to roll everything back.
    async fn issue_profile_tx(
        &self,
        conn: &mut SqliteConnection,
        subscription: Subscription,
    ) -> Result<IssuedProfile, LifecycleError> {
        let last = AddressRepository::last_issued_tx(conn, self.wireguard.pool_start).await?;
        let address = wireguard::next_address(last).map_err(|e| {
            error!("Cannot provision user {}: {}", subscription.user_id, e);
            e
        })?;
        AddressRepository::set_last_issued_tx(conn, address).await?;

        let identity = self.keys.generate()?;
        let profile_text = wireguard::render(
            &identity.private_key,
            &self.wireguard.server_public_key,
            &self.wireguard.server_endpoint,
            address,
            &self.wireguard.dns_servers,
        );

        ConfigRepository::insert_tx(
            conn,
            subscription.user_id,
            address,
            &identity.private_key,
            &identity.public_key,
            &profile_text,
        )
        .await?;

        let issued = IssuedProfile {
            scannable: wireguard::encode_for_scan(&profile_text),
            subscription,
            address,
            public_key: identity.public_key,
            profile_text,
        };
        info!(
            "Peer {} at {} issued to user {}",
            issued.public_key, issued.address, issued.subscription.user_id
        );
        Ok(issued)
    }

    pub async fn status(&self, user_id: i64) -> Result<StatusReport, LifecycleError> {
        let active = self.subscriptions.get_active(user_id).await?;
        Ok(StatusReport {
            user_id,
            active: active.is_some(),
            end_date: active.as_ref().map(|s| s.end_date),
            is_trial: active.as_ref().map(|s| s.is_trial),
        })
    }

    /// The user's current profile, packaged for one client platform.
    pub async fn profile_for_platform(
        &self,
        user_id: i64,
        platform: &str,
    ) -> Result<PlatformProfile, LifecycleError> {
        if self.subscriptions.get_active(user_id).await?.is_none() {
            return Err(LifecycleError::NoActiveSubscription);
        }
        let platform: Platform = platform.parse()?;

        let ProvisionedConfig { config_text, .. } = self
            .configs
            .latest_for_user(user_id)
            .await?
            .ok_or(LifecycleError::NoActiveSubscription)?;

        Ok(PlatformProfile {
            platform,
            scannable: platform.is_mobile().then(|| wireguard::encode_for_scan(&config_text)),
            profile_text: config_text,
        })
    }

    pub fn quote(&self, months: u32) -> Result<i64, LifecycleError> {
        validate_months(months)?;
        Ok(self.pricing.price(months))
    }

    fn authorize(&self, caller: i64) -> Result<(), LifecycleError> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            warn!("User {} attempted an admin operation", caller);
            Err(InvalidRequest::Unauthorized.into())
        }
    }

    pub async fn admin_deactivate(&self, caller: i64, subscription_id: i64) -> Result<(), LifecycleError> {
        self.authorize(caller)?;
        if !self.subscriptions.deactivate(subscription_id).await? {
            return Err(InvalidRequest::UnknownSubscription(subscription_id).into());
        }
        info!("Admin {} deactivated subscription {}", caller, subscription_id);
        Ok(())
    }

    pub async fn admin_extend(
        &self,
        caller: i64,
        subscription_id: i64,
        months: u32,
    ) -> Result<Subscription, LifecycleError> {
        self.authorize(caller)?;
        validate_months(months)?;
        if !self.subscriptions.extend(subscription_id, months).await? {
            return Err(InvalidRequest::UnknownSubscription(subscription_id).into());
        }
        let updated = self
            .subscriptions
            .get_by_id(subscription_id)
            .await?
            .ok_or(InvalidRequest::UnknownSubscription(subscription_id))?;

        info!(
            "Admin {} extended subscription {} by {} months to {}",
            caller, subscription_id, months, updated.end_date
        );
        Ok(updated)
    }

    pub async fn admin_list_active(&self, caller: i64) -> Result<Vec<Subscription>, LifecycleError> {
        self.authorize(caller)?;
        Ok(self.subscriptions.list_active().await?)
    }

    /// Deactivates every expired-but-active subscription and queues one
    /// notice per affected user. A row that fails is logged and left for the
    /// next pass.
    pub async fn reconcile_expired(&self) -> Result<ReconcileReport, LifecycleError> {
        let expired = self.subscriptions.get_expired().await?;
        let mut report = ReconcileReport::default();
        let mut affected = BTreeSet::new();

        for item in expired {
            match self.subscriptions.expire(item.id).await {
                Ok(true) => {
                    info!("Subscription {} ({}) of user {} expired", item.id, item.kind, item.user_id);
                    report.deactivated += 1;
                    affected.insert(item.user_id);
                }
                Ok(false) => debug!("Subscription {} changed since the scan, skipping", item.id),
                Err(e) => {
                    warn!("Failed to deactivate subscription {}: {}", item.id, e);
                    report.failed += 1;
                }
            }
        }

        for user_id in affected {
            if self.notices.send(ExpiryNotice { user_id }).is_err() {
                warn!("Expiry notice channel closed, user {} not notified", user_id);
            } else {
                report.notified += 1;
            }
        }

        Ok(report)
    }
}
