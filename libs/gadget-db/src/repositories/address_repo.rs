use std::net::Ipv4Addr;

use sqlx::SqliteConnection;

use crate::error::{StoreError, StoreResult};

/// Persistent high-water mark of the client address pool.
pub struct AddressRepository;

impl AddressRepository {
    /// Last address handed out. The first call seeds the pool with `seed`,
    /// which is never issued itself.
    pub async fn last_issued_tx(conn: &mut SqliteConnection, seed: Ipv4Addr) -> StoreResult<Ipv4Addr> {
        sqlx::query("INSERT INTO address_pool (id, last_issued) VALUES (1, ?) ON CONFLICT(id) DO NOTHING")
            .bind(seed.to_string())
            .execute(&mut *conn)
            .await?;

        let raw: String = sqlx::query_scalar("SELECT last_issued FROM address_pool WHERE id = 1")
            .fetch_one(&mut *conn)
            .await?;

        raw.parse().map_err(|_| StoreError::Corrupt {
            column: "address_pool.last_issued",
            value: raw,
        })
    }

    pub async fn set_last_issued_tx(conn: &mut SqliteConnection, address: Ipv4Addr) -> StoreResult<()> {
        sqlx::query("UPDATE address_pool SET last_issued = ? WHERE id = 1")
            .bind(address.to_string())
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}
