use chrono::{DateTime, Months, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::models::subscription::subscription_window;
use crate::models::{ExpiredSubscription, Subscription, SubscriptionKind};

#[derive(Debug, Clone)]
pub struct SubscriptionRepository {
    pool: SqlitePool,
}

impl SubscriptionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts a subscription starting now and lasting `duration_months`
    /// thirty-day months. Does not look at existing subscriptions; callers
    /// that need the one-active-per-user guarantee use
    /// [`Self::add_if_none_active_tx`].
    pub async fn add(
        &self,
        user_id: i64,
        kind: SubscriptionKind,
        duration_months: u32,
        payment_ref: Option<&str>,
        is_trial: bool,
    ) -> StoreResult<Subscription> {
        let (start, end) = subscription_window(Utc::now(), duration_months)?;

        let sub = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (user_id, start_date, end_date, subscription_type, payment_id, is_trial, is_active)
            VALUES (?, ?, ?, ?, ?, ?, TRUE)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(kind)
        .bind(payment_ref)
        .bind(is_trial)
        .fetch_one(&self.pool)
        .await?;

        Ok(sub)
    }

    /// Same as [`Self::add`] but only inserts when the user has no active
    /// subscription. The check and the insert are a single statement, so two
    /// racing callers cannot both succeed. Returns `None` when a row already
    /// blocks the insert.
    pub async fn add_if_none_active_tx(
        conn: &mut SqliteConnection,
        user_id: i64,
        kind: SubscriptionKind,
        duration_months: u32,
        payment_ref: Option<&str>,
        is_trial: bool,
    ) -> StoreResult<Option<Subscription>> {
        let (start, end) = subscription_window(Utc::now(), duration_months)?;

        let sub = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (user_id, start_date, end_date, subscription_type, payment_id, is_trial, is_active)
            SELECT ?1, ?2, ?3, ?4, ?5, ?6, TRUE
            WHERE NOT EXISTS (
                SELECT 1 FROM subscriptions
                WHERE user_id = ?1 AND is_active = TRUE AND end_date > ?2
            )
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .bind(kind)
        .bind(payment_ref)
        .bind(is_trial)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(sub)
    }

    pub async fn get_by_id(&self, id: i64) -> StoreResult<Option<Subscription>> {
        let sub = sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sub)
    }

    pub async fn get_active(&self, user_id: i64) -> StoreResult<Option<Subscription>> {
        let mut conn = self.pool.acquire().await?;
        Self::get_active_tx(&mut conn, user_id).await
    }

    /// The user's active subscription with the latest end date, if any.
    pub async fn get_active_tx(
        conn: &mut SqliteConnection,
        user_id: i64,
    ) -> StoreResult<Option<Subscription>> {
        let sub = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions
             WHERE user_id = ? AND is_active = TRUE AND end_date > ?
             ORDER BY end_date DESC
             LIMIT 1",
        )
        .bind(user_id)
        .bind(Utc::now())
        .fetch_optional(&mut *conn)
        .await?;
        Ok(sub)
    }

    pub async fn list_active(&self) -> StoreResult<Vec<Subscription>> {
        let subs = sqlx::query_as::<_, Subscription>(
            "SELECT * FROM subscriptions
             WHERE is_active = TRUE AND end_date > ?
             ORDER BY end_date ASC",
        )
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;
        Ok(subs)
    }

    pub async fn has_used_trial(&self, user_id: i64) -> StoreResult<bool> {
        let used: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM subscriptions WHERE user_id = ? AND is_trial = TRUE)",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(used)
    }

    /// Every row still flagged active whose end date has passed, however long ago.
    pub async fn get_expired(&self) -> StoreResult<Vec<ExpiredSubscription>> {
        let expired = sqlx::query_as::<_, ExpiredSubscription>(
            "SELECT id, user_id, subscription_type FROM subscriptions
             WHERE is_active = TRUE AND end_date < ?
             ORDER BY id",
        )
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await?;
        Ok(expired)
    }

    pub async fn deactivate(&self, id: i64) -> StoreResult<bool> {
        let affected = sqlx::query("UPDATE subscriptions SET is_active = FALSE WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        debug!("Deactivate subscription {}: {} row(s)", id, affected);
        Ok(affected > 0)
    }

    /// Deactivates `id` only if it is still active and past its end date.
    /// A row extended since the expiry scan is left alone.
    pub async fn expire(&self, id: i64) -> StoreResult<bool> {
        let affected = sqlx::query(
            "UPDATE subscriptions SET is_active = FALSE
             WHERE id = ? AND is_active = TRUE AND end_date < ?",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    /// Pushes the end date of subscription `id` forward by `months` calendar
    /// months. Returns `false` if the subscription does not exist.
    pub async fn extend(&self, id: i64, months: u32) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let new_end = Self::extend_tx(&mut tx, id, months).await?;
        tx.commit().await?;
        Ok(new_end.is_some())
    }

    /// Calendar-month extension of the existing end date (Jan 31 + 1 month is
    /// the last day of February). Returns the new end date.
    pub async fn extend_tx(
        conn: &mut SqliteConnection,
        id: i64,
        months: u32,
    ) -> StoreResult<Option<DateTime<Utc>>> {
        let current: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT end_date FROM subscriptions WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        let Some(current) = current else {
            return Ok(None);
        };

        let new_end = current
            .checked_add_months(Months::new(months))
            .ok_or(StoreError::DateOverflow(id))?;

        sqlx::query("UPDATE subscriptions SET end_date = ? WHERE id = ?")
            .bind(new_end)
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(Some(new_end))
    }

    /// Closes an active trial and opens a paid row in its place. The paid row
    /// starts now and ends `months` calendar months after the trial would have
    /// ended, so unused trial days carry over. The trial row is kept (inactive)
    /// so the trial stays consumed.
    pub async fn replace_trial_tx(
        conn: &mut SqliteConnection,
        trial: &Subscription,
        months: u32,
        payment_ref: &str,
    ) -> StoreResult<Subscription> {
        let end = trial
            .end_date
            .checked_add_months(Months::new(months))
            .ok_or(StoreError::DateOverflow(trial.id))?;

        sqlx::query("UPDATE subscriptions SET is_active = FALSE WHERE id = ?")
            .bind(trial.id)
            .execute(&mut *conn)
            .await?;

        let paid = sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (user_id, start_date, end_date, subscription_type, payment_id, is_trial, is_active)
            VALUES (?, ?, ?, ?, ?, FALSE, TRUE)
            RETURNING *
            "#,
        )
        .bind(trial.user_id)
        .bind(Utc::now())
        .bind(end)
        .bind(SubscriptionKind::Paid)
        .bind(payment_ref)
        .fetch_one(&mut *conn)
        .await?;

        debug!(
            "Trial {} of user {} replaced by paid subscription {}",
            trial.id, trial.user_id, paid.id
        );
        Ok(paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::UserRepository;
    use crate::repositories::test_support::pool_with_user;
    use chrono::{Duration, TimeZone};

    async fn set_end_date(pool: &SqlitePool, id: i64, end: DateTime<Utc>) {
        sqlx::query("UPDATE subscriptions SET end_date = ? WHERE id = ?")
            .bind(end)
            .bind(id)
            .execute(pool)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_then_get_active_uses_thirty_day_months() {
        let pool = pool_with_user(1).await;
        let repo = SubscriptionRepository::new(pool);

        let created = repo
            .add(1, SubscriptionKind::Paid, 3, Some("pay-1"), false)
            .await
            .unwrap();
        let active = repo.get_active(1).await.unwrap().unwrap();

        assert_eq!(active.id, created.id);
        assert_eq!(active.kind, SubscriptionKind::Paid);
        assert_eq!(active.payment_id.as_deref(), Some("pay-1"));
        assert_eq!(active.end_date - active.start_date, Duration::days(90));
    }

    #[tokio::test]
    async fn get_active_prefers_latest_end_date() {
        let pool = pool_with_user(1).await;
        let repo = SubscriptionRepository::new(pool);

        repo.add(1, SubscriptionKind::Trial, 1, None, true).await.unwrap();
        let longer = repo
            .add(1, SubscriptionKind::Paid, 12, Some("pay-2"), false)
            .await
            .unwrap();

        assert_eq!(repo.get_active(1).await.unwrap().unwrap().id, longer.id);
    }

    #[tokio::test]
    async fn conditional_insert_refuses_second_active_row() {
        let pool = pool_with_user(1).await;
        let mut conn = pool.acquire().await.unwrap();

        let first = SubscriptionRepository::add_if_none_active_tx(
            &mut conn,
            1,
            SubscriptionKind::Trial,
            1,
            None,
            true,
        )
        .await
        .unwrap();
        assert!(first.is_some());

        let second = SubscriptionRepository::add_if_none_active_tx(
            &mut conn,
            1,
            SubscriptionKind::Paid,
            1,
            Some("pay-3"),
            false,
        )
        .await
        .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn conditional_insert_ignores_expired_rows() {
        let pool = pool_with_user(1).await;
        let repo = SubscriptionRepository::new(pool.clone());

        let old = repo.add(1, SubscriptionKind::Trial, 1, None, true).await.unwrap();
        set_end_date(&pool, old.id, Utc::now() - Duration::hours(1)).await;

        let mut conn = pool.acquire().await.unwrap();
        let fresh = SubscriptionRepository::add_if_none_active_tx(
            &mut conn,
            1,
            SubscriptionKind::Paid,
            1,
            Some("pay-4"),
            false,
        )
        .await
        .unwrap();
        assert!(fresh.is_some());
    }

    #[tokio::test]
    async fn deactivate_hides_active_subscription() {
        let pool = pool_with_user(1).await;
        let repo = SubscriptionRepository::new(pool);

        let sub = repo.add(1, SubscriptionKind::Paid, 1, Some("p"), false).await.unwrap();
        assert!(repo.deactivate(sub.id).await.unwrap());
        assert!(repo.get_active(1).await.unwrap().is_none());
        assert!(!repo.deactivate(9999).await.unwrap());
    }

    #[tokio::test]
    async fn extend_adds_calendar_months_to_end_date() {
        let pool = pool_with_user(1).await;
        let repo = SubscriptionRepository::new(pool.clone());

        let sub = repo.add(1, SubscriptionKind::Paid, 1, Some("p"), false).await.unwrap();
        let jan_31 = Utc.with_ymd_and_hms(2099, 1, 31, 10, 0, 0).unwrap();
        set_end_date(&pool, sub.id, jan_31).await;

        assert!(repo.extend(sub.id, 1).await.unwrap());
        let extended = repo.get_by_id(sub.id).await.unwrap().unwrap();
        assert_eq!(extended.end_date, Utc.with_ymd_and_hms(2099, 2, 28, 10, 0, 0).unwrap());

        assert!(repo.extend(sub.id, 12).await.unwrap());
        let extended = repo.get_by_id(sub.id).await.unwrap().unwrap();
        assert_eq!(extended.end_date, Utc.with_ymd_and_hms(2100, 2, 28, 10, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn extend_unknown_subscription_returns_false() {
        let repo = SubscriptionRepository::new(crate::memory().await.unwrap());
        assert!(!repo.extend(404, 1).await.unwrap());
    }

    #[tokio::test]
    async fn expired_scan_only_returns_active_past_rows() {
        let pool = pool_with_user(1).await;
        UserRepository::new(pool.clone()).add(2, None).await.unwrap();
        let repo = SubscriptionRepository::new(pool.clone());

        let expired = repo.add(1, SubscriptionKind::Trial, 1, None, true).await.unwrap();
        set_end_date(&pool, expired.id, Utc::now() - Duration::days(400)).await;

        let already_off = repo.add(2, SubscriptionKind::Paid, 1, Some("x"), false).await.unwrap();
        set_end_date(&pool, already_off.id, Utc::now() - Duration::days(1)).await;
        repo.deactivate(already_off.id).await.unwrap();

        repo.add(2, SubscriptionKind::Paid, 1, Some("y"), false).await.unwrap();

        let found = repo.get_expired().await.unwrap();
        assert_eq!(
            found,
            vec![ExpiredSubscription {
                id: expired.id,
                user_id: 1,
                kind: SubscriptionKind::Trial,
            }]
        );
    }

    #[tokio::test]
    async fn trial_usage_is_remembered_after_deactivation() {
        let pool = pool_with_user(1).await;
        let repo = SubscriptionRepository::new(pool);

        assert!(!repo.has_used_trial(1).await.unwrap());
        let trial = repo.add(1, SubscriptionKind::Trial, 1, None, true).await.unwrap();
        repo.deactivate(trial.id).await.unwrap();
        assert!(repo.has_used_trial(1).await.unwrap());
    }

    #[tokio::test]
    async fn expire_skips_rows_extended_after_the_scan() {
        let pool = pool_with_user(1).await;
        let repo = SubscriptionRepository::new(pool.clone());

        let sub = repo.add(1, SubscriptionKind::Paid, 1, Some("p"), false).await.unwrap();
        assert!(!repo.expire(sub.id).await.unwrap());

        set_end_date(&pool, sub.id, Utc::now() - Duration::minutes(1)).await;
        assert!(repo.expire(sub.id).await.unwrap());
        assert!(!repo.expire(sub.id).await.unwrap());
        assert!(repo.get_active(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replacing_trial_carries_remaining_days_into_paid_row() {
        let pool = pool_with_user(1).await;
        let repo = SubscriptionRepository::new(pool.clone());

        let trial = repo.add(1, SubscriptionKind::Trial, 1, None, true).await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        let paid = SubscriptionRepository::replace_trial_tx(&mut conn, &trial, 3, "charge-1")
            .await
            .unwrap();
        drop(conn);

        assert_ne!(paid.id, trial.id);
        assert_eq!(paid.kind, SubscriptionKind::Paid);
        assert!(!paid.is_trial);
        assert_eq!(paid.payment_id.as_deref(), Some("charge-1"));
        assert_eq!(
            paid.end_date,
            trial.end_date.checked_add_months(Months::new(3)).unwrap()
        );

        assert_eq!(repo.get_active(1).await.unwrap().unwrap().id, paid.id);
        assert!(!repo.get_by_id(trial.id).await.unwrap().unwrap().is_active);
        assert!(repo.has_used_trial(1).await.unwrap());
    }

    #[tokio::test]
    async fn add_rejects_out_of_range_length() {
        let pool = pool_with_user(1).await;
        let repo = SubscriptionRepository::new(pool);

        let err = repo
            .add(1, SubscriptionKind::Paid, u32::MAX, Some("p"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DurationOverflow(u32::MAX)));
        assert!(repo.get_active(1).await.unwrap().is_none());
    }
}
