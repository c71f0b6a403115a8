use std::net::Ipv4Addr;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::StoreResult;
use crate::models::ProvisionedConfig;

#[derive(Debug, Clone)]
pub struct ConfigRepository {
    pool: SqlitePool,
}

impl ConfigRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores an issued profile without an address reservation.
    pub async fn save(
        &self,
        user_id: i64,
        private_key: &str,
        public_key: &str,
        config_text: &str,
    ) -> StoreResult<bool> {
        let affected = sqlx::query(
            "INSERT INTO provisioned_configs (user_id, private_key, public_key, config_text, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(private_key)
        .bind(public_key)
        .bind(config_text)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected == 1)
    }

    /// Stores an issued profile together with its client address. The address
    /// column is unique, so reusing an address fails the statement.
    pub async fn insert_tx(
        conn: &mut SqliteConnection,
        user_id: i64,
        address: Ipv4Addr,
        private_key: &str,
        public_key: &str,
        config_text: &str,
    ) -> StoreResult<ProvisionedConfig> {
        let config = sqlx::query_as::<_, ProvisionedConfig>(
            r#"
            INSERT INTO provisioned_configs (user_id, private_key, public_key, address, config_text, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(private_key)
        .bind(public_key)
        .bind(address.to_string())
        .bind(config_text)
        .bind(Utc::now())
        .fetch_one(&mut *conn)
        .await?;
        Ok(config)
    }

    pub async fn latest_for_user(&self, user_id: i64) -> StoreResult<Option<ProvisionedConfig>> {
        let config = sqlx::query_as::<_, ProvisionedConfig>(
            "SELECT * FROM provisioned_configs WHERE user_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(config)
    }

    pub async fn list_for_user(&self, user_id: i64) -> StoreResult<Vec<ProvisionedConfig>> {
        let configs = sqlx::query_as::<_, ProvisionedConfig>(
            "SELECT * FROM provisioned_configs WHERE user_id = ? ORDER BY id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use crate::repositories::test_support::pool_with_user;

    #[tokio::test]
    async fn configs_accumulate_per_user() {
        let pool = pool_with_user(3).await;
        let repo = ConfigRepository::new(pool.clone());

        assert!(repo.save(3, "priv-a", "pub-a", "text-a").await.unwrap());
        let mut conn = pool.acquire().await.unwrap();
        let second = ConfigRepository::insert_tx(
            &mut conn,
            3,
            Ipv4Addr::new(10, 0, 0, 1),
            "priv-b",
            "pub-b",
            "text-b",
        )
        .await
        .unwrap();
        drop(conn);

        assert_eq!(second.address.as_deref(), Some("10.0.0.1"));
        assert_eq!(repo.list_for_user(3).await.unwrap().len(), 2);
        let latest = repo.latest_for_user(3).await.unwrap().unwrap();
        assert_eq!(latest.config_text, "text-b");
    }

    #[tokio::test]
    async fn address_cannot_be_issued_twice() {
        let pool = pool_with_user(3).await;
        let mut conn = pool.acquire().await.unwrap();
        let addr = Ipv4Addr::new(10, 0, 0, 9);

        ConfigRepository::insert_tx(&mut conn, 3, addr, "k1", "p1", "t1")
            .await
            .unwrap();
        let err = ConfigRepository::insert_tx(&mut conn, 3, addr, "k2", "p2", "t2")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Database(_)));
    }
}
