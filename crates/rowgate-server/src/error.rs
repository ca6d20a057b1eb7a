//! Error types for the gateway surface.

use thiserror::Error;

use rowgate_acl::AclError;
use rowgate_core::StorageError;

/// Errors surfaced by gateway verbs.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Authorization failed or a grant mutation was rejected.
    #[error(transparent)]
    Acl(#[from] AclError),

    /// The backing database or grant store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
