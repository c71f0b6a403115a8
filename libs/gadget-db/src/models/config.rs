use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A WireGuard peer profile issued to a user. Rows are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProvisionedConfig {
    pub id: i64,
    pub user_id: i64,
    pub private_key: String,
    pub public_key: String,
    pub address: Option<String>,
    pub config_text: String,
    pub created_at: DateTime<Utc>,
}
