use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::StoreResult;
use crate::models::User;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a user. Returns `false` when the id is already known.
    pub async fn add(&self, user_id: i64, username: Option<&str>) -> StoreResult<bool> {
        let result = sqlx::query(
            "INSERT INTO users (user_id, username, registered_at, is_active)
             VALUES (?, ?, ?, TRUE)
             ON CONFLICT(user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(username)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() == 1;
        if !inserted {
            debug!("User {} already registered", user_id);
        }
        Ok(inserted)
    }

    pub async fn get(&self, user_id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn set_active(&self, user_id: i64, active: bool) -> StoreResult<bool> {
        let affected = sqlx::query("UPDATE users SET is_active = ? WHERE user_id = ?")
            .bind(active)
            .bind(user_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_registration_is_not_an_error() {
        let repo = UserRepository::new(crate::memory().await.unwrap());

        assert!(repo.add(42, Some("alice")).await.unwrap());
        assert!(!repo.add(42, Some("someone-else")).await.unwrap());

        let user = repo.get(42).await.unwrap().unwrap();
        assert_eq!(user.username.as_deref(), Some("alice"));
        assert!(user.is_active);
    }

    #[tokio::test]
    async fn missing_user_is_none() {
        let repo = UserRepository::new(crate::memory().await.unwrap());
        assert!(repo.get(7).await.unwrap().is_none());
        assert!(!repo.set_active(7, false).await.unwrap());
    }

    #[tokio::test]
    async fn set_active_toggles_flag() {
        let repo = UserRepository::new(crate::memory().await.unwrap());
        repo.add(5, None).await.unwrap();

        assert!(repo.set_active(5, false).await.unwrap());
        assert!(!repo.get(5).await.unwrap().unwrap().is_active);
    }
}
