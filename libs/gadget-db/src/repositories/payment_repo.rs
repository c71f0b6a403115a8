use chrono::Utc;
use sqlx::SqliteConnection;

use crate::error::StoreResult;

/// Ledger of payment ids that have already been turned into access.
#[derive(Debug, Clone, Copy)]
pub struct PaymentRepository;

impl PaymentRepository {
    /// Records a processed payment. Returns `false` when `payment_id` was
    /// recorded before.
    pub async fn record_tx(
        conn: &mut SqliteConnection,
        payment_id: &str,
        user_id: i64,
        months: u32,
        amount: i64,
    ) -> StoreResult<bool> {
        let affected = sqlx::query(
            "INSERT INTO processed_payments (payment_id, user_id, months, amount, processed_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(payment_id) DO NOTHING",
        )
        .bind(payment_id)
        .bind(user_id)
        .bind(i64::from(months))
        .bind(amount)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .rows_affected();
        Ok(affected == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::test_support::pool_with_user;

    #[tokio::test]
    async fn payment_is_recorded_once() {
        let pool = pool_with_user(8).await;
        let mut conn = pool.acquire().await.unwrap();

        assert!(PaymentRepository::record_tx(&mut conn, "ch_1", 8, 3, 113715).await.unwrap());
        assert!(!PaymentRepository::record_tx(&mut conn, "ch_1", 8, 3, 113715).await.unwrap());
        drop(conn);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_payments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }
}
