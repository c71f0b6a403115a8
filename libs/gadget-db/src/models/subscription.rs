use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Length of a "month" when a subscription is created. Extension uses real
/// calendar months instead.
pub const DAYS_PER_MONTH: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionKind {
    Trial,
    Paid,
}

impl SubscriptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionKind::Trial => "trial",
            SubscriptionKind::Paid => "paid",
        }
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[sqlx(rename = "subscription_type")]
    #[serde(rename = "subscription_type")]
    pub kind: SubscriptionKind,
    pub payment_id: Option<String>,
    pub is_trial: bool,
    pub is_active: bool,
}

/// Row shape returned by the expiry scan.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ExpiredSubscription {
    pub id: i64,
    pub user_id: i64,
    #[sqlx(rename = "subscription_type")]
    pub kind: SubscriptionKind,
}

/// Validity window for a subscription created at `start` for `duration_months`.
pub fn subscription_window(
    start: DateTime<Utc>,
    duration_months: u32,
) -> StoreResult<(DateTime<Utc>, DateTime<Utc>)> {
    let end = TimeDelta::try_days(DAYS_PER_MONTH * i64::from(duration_months))
        .and_then(|length| start.checked_add_signed(length))
        .ok_or(StoreError::DurationOverflow(duration_months))?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_uses_thirty_day_months() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        let (_, end) = subscription_window(start, 1).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());

        let (_, end) = subscription_window(start, 12).unwrap();
        assert_eq!(end - start, TimeDelta::days(360));
    }

    #[test]
    fn window_reports_overflow_instead_of_panicking() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        assert!(matches!(
            subscription_window(start, u32::MAX),
            Err(StoreError::DurationOverflow(u32::MAX))
        ));
    }

    #[test]
    fn kind_round_trips_through_display() {
        assert_eq!(SubscriptionKind::Trial.to_string(), "trial");
        assert_eq!(SubscriptionKind::Paid.as_str(), "paid");
    }
}
