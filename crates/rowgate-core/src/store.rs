//! Store interfaces consumed by the authorization core.
//!
//! Two external collaborators sit behind these traits: the grant store,
//! which persists per-user permission lists and the key material, and the
//! backing SQL database, which supplies the primary-key schema and
//! executes approved statements. Both are transactional per call;
//! cancellation is cooperative at their `.await` boundaries.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::permission::Permission;

/// Primary-key columns per table, in declared PK order. Composite keys
/// preserve column order.
pub type PkSchema = HashMap<String, Vec<String>>;

/// One result row: column name to JSON value.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// I/O failures from either store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("failed to decode stored grants: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Everything the grant store holds, read in one bulk load at startup.
#[derive(Debug, Clone, Default)]
pub struct AclSnapshot {
    /// Per-user grant lists.
    pub grants: HashMap<String, Vec<Permission>>,
    /// API keys flagged admin. Admin authority is key-scoped.
    pub admin_keys: HashSet<String>,
    /// API key to user mapping. Several keys may map to one user.
    pub key_to_user: HashMap<String, String>,
}

/// Persistence for grants and key material.
///
/// Keys and admin flags are read-only from the core's perspective; they
/// are materialized once via [`GrantStore::load_all`]. Grant writes are
/// full per-user replacements and must be atomic.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Bulk read of grants, admin keys, and the key-to-user mapping.
    async fn load_all(&self) -> Result<AclSnapshot, StorageError>;

    /// One user's stored grant list; empty when the user is unknown.
    async fn user_grants(&self, user: &str) -> Result<Vec<Permission>, StorageError>;

    /// Replace one user's grant list atomically.
    async fn store_user_grants(
        &self,
        user: &str,
        grants: &[Permission],
    ) -> Result<(), StorageError>;

    async fn close(&self);
}

/// The backing relational database.
#[async_trait]
pub trait SqlStore: Send + Sync {
    /// Primary-key columns for every user table.
    async fn pk_schema(&self) -> Result<PkSchema, StorageError>;

    /// Execute an approved statement and collect its rows. Statements
    /// that return no rows yield an empty list.
    async fn query(&self, sql: &str) -> Result<Vec<Row>, StorageError>;

    async fn close(&self);
}
