//! # rowgate-core
//!
//! Shared types for the rowgate row-level SQL authorization gateway.
//!
//! This crate provides:
//! - The permission model (`AccessMode`, `CompositeKey`, `Scope`,
//!   `Permission`, `GrantSet`) with its merge/remove/satisfies algebra
//! - The store interfaces the core consumes (`GrantStore`, `SqlStore`)
//! - Gateway configuration loaded from YAML
//!
//! ## Permission model
//!
//! A permission grants one access mode on one table, either for every row
//! (`Scope::All`) or for an explicit set of primary-key tuples
//! (`Scope::Rows`). A user's grants are held in a [`GrantSet`], which keeps
//! at most one scope per `(table, mode)` pair and merges additions into the
//! existing entry.

pub mod config;
pub mod permission;
pub mod store;

pub use config::{AclStoreConfig, ConfigError, DatabaseConfig, GatewayConfig};
pub use permission::{AccessMode, CompositeKey, GrantError, GrantSet, Permission, Scope};
pub use store::{AclSnapshot, GrantStore, PkSchema, Row, SqlStore, StorageError};
