//! Request and response types for the gateway verbs.
//!
//! Every request carries the caller's API key; the gateway resolves the
//! key to a user and, for administration verbs, checks the admin flag.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use rowgate_core::{Permission, Row};

/// Execute a SQL batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub key: String,
    pub sql: String,
}

/// Rows produced by an authorized batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub rows: Vec<Row>,
}

/// Read one user's grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPermissionsRequest {
    pub key: String,
    pub user: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPermissionsResponse {
    pub permissions: Vec<Permission>,
}

/// Read every user's grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAllPermissionsRequest {
    pub key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetAllPermissionsResponse {
    pub permissions: BTreeMap<String, Vec<Permission>>,
}

/// Grant permissions to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPermissionsRequest {
    pub key: String,
    pub user: String,
    pub permissions: Vec<Permission>,
}

/// Revoke permissions from a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovePermissionsRequest {
    pub key: String,
    pub user: String,
    pub permissions: Vec<Permission>,
}
