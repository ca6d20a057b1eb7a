//! SQLite-backed grant persistence.
//!
//! Two tables: `acl_keys` maps API keys to users and carries the admin
//! flag (several keys may map to one user), `acl_grants` holds one JSON
//! grant list per user. Grant writes are single-statement upserts, so a
//! user's list is replaced atomically.

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row as SqlxRow;
use std::str::FromStr;
use tracing::debug;

use rowgate_core::{AclSnapshot, GrantStore, Permission, StorageError};

use crate::db_err;

const CREATE_KEYS_TABLE: &str = "CREATE TABLE IF NOT EXISTS acl_keys (\
     api_key TEXT PRIMARY KEY, \
     user_id TEXT NOT NULL, \
     is_admin INTEGER NOT NULL DEFAULT 0)";

const CREATE_GRANTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS acl_grants (\
     user_id TEXT PRIMARY KEY, \
     grants_json TEXT NOT NULL)";

/// Grant store over a SQLite database.
pub struct SqliteGrantStore {
    pool: SqlitePool,
}

impl SqliteGrantStore {
    /// Open (creating if missing) the grant database at `url`.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(db_err)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db_err)?;
        Self::with_pool(pool).await
    }

    /// Wrap an existing pool, creating the schema if missing.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(CREATE_KEYS_TABLE)
            .execute(&pool)
            .await
            .map_err(db_err)?;
        sqlx::query(CREATE_GRANTS_TABLE)
            .execute(&pool)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    /// Register or replace an API key.
    ///
    /// Bootstrap tooling only: the core materializes keys once at startup
    /// and treats them as read-only afterwards.
    pub async fn register_key(
        &self,
        api_key: &str,
        user: &str,
        is_admin: bool,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO acl_keys (api_key, user_id, is_admin) VALUES (?1, ?2, ?3) \
             ON CONFLICT(api_key) DO UPDATE SET user_id = excluded.user_id, \
             is_admin = excluded.is_admin",
        )
        .bind(api_key)
        .bind(user)
        .bind(is_admin as i64)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl GrantStore for SqliteGrantStore {
    async fn load_all(&self) -> Result<AclSnapshot, StorageError> {
        let mut snapshot = AclSnapshot::default();

        let key_rows = sqlx::query("SELECT api_key, user_id, is_admin FROM acl_keys")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        for row in key_rows {
            let api_key: String = row.get("api_key");
            let user: String = row.get("user_id");
            let is_admin: i64 = row.get("is_admin");
            if is_admin != 0 {
                snapshot.admin_keys.insert(api_key.clone());
            }
            snapshot.key_to_user.insert(api_key, user);
        }

        let grant_rows = sqlx::query("SELECT user_id, grants_json FROM acl_grants")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        for row in grant_rows {
            let user: String = row.get("user_id");
            let encoded: String = row.get("grants_json");
            let grants: Vec<Permission> = serde_json::from_str(&encoded)?;
            snapshot.grants.insert(user, grants);
        }

        debug!(
            users = snapshot.grants.len(),
            keys = snapshot.key_to_user.len(),
            "loaded grant store"
        );
        Ok(snapshot)
    }

    async fn user_grants(&self, user: &str) -> Result<Vec<Permission>, StorageError> {
        let row = sqlx::query("SELECT grants_json FROM acl_grants WHERE user_id = ?1")
            .bind(user)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(row) => {
                let encoded: String = row.get("grants_json");
                Ok(serde_json::from_str(&encoded)?)
            }
            None => Ok(Vec::new()),
        }
    }

    async fn store_user_grants(
        &self,
        user: &str,
        grants: &[Permission],
    ) -> Result<(), StorageError> {
        let encoded = serde_json::to_string(grants)?;
        sqlx::query(
            "INSERT INTO acl_grants (user_id, grants_json) VALUES (?1, ?2) \
             ON CONFLICT(user_id) DO UPDATE SET grants_json = excluded.grants_json",
        )
        .bind(user)
        .bind(&encoded)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rowgate_core::{AccessMode, CompositeKey};

    async fn store() -> SqliteGrantStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteGrantStore::with_pool(pool).await.unwrap()
    }

    fn key(parts: &[&str]) -> CompositeKey {
        parts.iter().copied().collect()
    }

    #[tokio::test]
    async fn load_all_reads_keys_and_grants() {
        let store = store().await;
        store.register_key("admin-key", "root", true).await.unwrap();
        store.register_key("user-key", "u1", false).await.unwrap();
        store.register_key("other-key", "u1", false).await.unwrap();

        let grants = vec![
            Permission::all("t1", AccessMode::Read),
            Permission::rows("t2", AccessMode::Write, vec![key(&["5", "10"])]),
        ];
        store.store_user_grants("u1", &grants).await.unwrap();

        let snapshot = store.load_all().await.unwrap();
        assert_eq!(snapshot.key_to_user.len(), 3);
        assert_eq!(snapshot.key_to_user["user-key"], "u1");
        assert_eq!(snapshot.key_to_user["other-key"], "u1");
        assert!(snapshot.admin_keys.contains("admin-key"));
        assert!(!snapshot.admin_keys.contains("user-key"));
        assert_eq!(snapshot.grants["u1"], grants);
    }

    #[tokio::test]
    async fn user_grants_round_trip() {
        let store = store().await;
        let grants = vec![Permission::rows(
            "t1",
            AccessMode::Read,
            vec![key(&["5"]), key(&["10"])],
        )];
        store.store_user_grants("u1", &grants).await.unwrap();
        assert_eq!(store.user_grants("u1").await.unwrap(), grants);
    }

    #[tokio::test]
    async fn unknown_user_has_no_grants() {
        let store = store().await;
        assert!(store.user_grants("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn store_replaces_the_whole_list() {
        let store = store().await;
        store
            .store_user_grants("u1", &[Permission::all("t1", AccessMode::Read)])
            .await
            .unwrap();
        let replacement = vec![Permission::all("t2", AccessMode::Write)];
        store.store_user_grants("u1", &replacement).await.unwrap();
        assert_eq!(store.user_grants("u1").await.unwrap(), replacement);
    }

    #[tokio::test]
    async fn register_key_upserts() {
        let store = store().await;
        store.register_key("k", "u1", false).await.unwrap();
        store.register_key("k", "u2", true).await.unwrap();

        let snapshot = store.load_all().await.unwrap();
        assert_eq!(snapshot.key_to_user["k"], "u2");
        assert!(snapshot.admin_keys.contains("k"));
    }
}
