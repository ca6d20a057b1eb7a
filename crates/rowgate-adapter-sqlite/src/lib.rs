//! # rowgate-adapter-sqlite
//!
//! SQLite adapters for the rowgate authorization gateway, backed by
//! `sqlx`:
//!
//! - [`SqliteGrantStore`] persists per-user grant lists (as the frozen
//!   JSON permission shape) and the API key material
//! - [`SqliteDb`] is the backing database: it introspects primary keys
//!   and executes approved statements
//!
//! Both adapters accept an existing pool or connect from a URL, and both
//! keep every write to a single statement so each call is atomic.

pub mod db;
pub mod grants;

pub use db::SqliteDb;
pub use grants::SqliteGrantStore;

use rowgate_core::StorageError;

pub(crate) fn db_err(err: sqlx::Error) -> StorageError {
    StorageError::Database(err.to_string())
}
