use gadget_db::StoreError;
use thiserror::Error;

use crate::wireguard::{AllocationError, IdentityError};

/// Requests the core refuses outright; reported back, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("caller is not an administrator")]
    Unauthorized,

    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("unsupported subscription length: {0} months")]
    InvalidDuration(u32),

    #[error("subscription {0} not found")]
    UnknownSubscription(i64),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("user already has an active subscription")]
    AlreadyActive,

    #[error("trial period already used")]
    TrialAlreadyUsed,

    #[error("no active subscription")]
    NoActiveSubscription,

    #[error("peer identity generation failed: {0}")]
    IdentityGeneration(#[from] IdentityError),

    #[error(transparent)]
    AddressPoolExhausted(#[from] AllocationError),

    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl From<gadget_db::sqlx::Error> for LifecycleError {
    fn from(err: gadget_db::sqlx::Error) -> Self {
        LifecycleError::Storage(StoreError::from(err))
    }
}

impl LifecycleError {
    /// Plain-language text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            LifecycleError::AlreadyActive => "You already have an active subscription!".to_string(),
            LifecycleError::TrialAlreadyUsed => {
                "The free trial has already been used. Please choose a plan.".to_string()
            }
            LifecycleError::NoActiveSubscription => "You have no active subscription.".to_string(),
            LifecycleError::InvalidRequest(InvalidRequest::Unauthorized) => {
                "You do not have access to the admin panel.".to_string()
            }
            LifecycleError::InvalidRequest(InvalidRequest::UnsupportedPlatform(_)) => {
                "Unsupported operating system!".to_string()
            }
            LifecycleError::InvalidRequest(other) => format!("❌ {}", other),
            LifecycleError::IdentityGeneration(_)
            | LifecycleError::AddressPoolExhausted(_)
            | LifecycleError::Storage(_) => {
                "❌ Something went wrong. Please try again later.".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_failures_do_not_leak_details() {
        let err = LifecycleError::Storage(StoreError::InvalidUrl("postgres://secret".into()));
        assert!(!err.user_message().contains("secret"));

        let err = LifecycleError::from(IdentityError::RngUnavailable("getrandom".into()));
        assert!(!err.user_message().contains("getrandom"));
    }

    #[test]
    fn invalid_requests_explain_themselves() {
        let err = LifecycleError::from(InvalidRequest::UnknownSubscription(17));
        assert!(err.user_message().contains("17"));
        assert!(err.to_string().starts_with("invalid request"));
    }
}
