//! # rowgate-server
//!
//! The transport-agnostic request surface of the rowgate authorization
//! gateway.
//!
//! [`Gateway`] composes the permission manager with the backing database:
//! a query is forwarded only after every permission it requires has been
//! checked against the caller's grants, and the grant-administration
//! verbs delegate to the admin-gated manager operations.
//!
//! | Verb | Behavior |
//! |------|----------|
//! | `query` | check, then execute on the backing store |
//! | `get_permissions` | one user's grants (admin) |
//! | `get_all_permissions` | every user's grants (admin) |
//! | `add_permissions` | merge grants, write-through (admin) |
//! | `remove_permissions` | subtract grants, write-through (admin) |
//!
//! Transport, request decoding, and authentication of the channel itself
//! are the caller's concern; this crate only defines the serde request
//! and response types.

pub mod error;
pub mod server;
pub mod types;

pub use error::GatewayError;
pub use server::Gateway;
pub use types::{
    AddPermissionsRequest, GetAllPermissionsRequest, GetAllPermissionsResponse,
    GetPermissionsRequest, GetPermissionsResponse, QueryRequest, QueryResponse,
    RemovePermissionsRequest,
};
