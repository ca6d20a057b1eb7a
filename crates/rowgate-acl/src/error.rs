//! Error types for the permission manager.

use thiserror::Error;

use rowgate_analyzer::{AnalyzerError, RequiredPermission};
use rowgate_core::{GrantError, StorageError};

/// Errors from permission checks and grant mutation.
#[derive(Debug, Error)]
pub enum AclError {
    /// The API key is unknown.
    #[error("no such API key")]
    NoSuchKey,

    /// The key is not flagged admin but attempted an admin operation.
    #[error("not an admin")]
    NotAdmin,

    /// The batch could not be analyzed.
    #[error(transparent)]
    Analyzer(#[from] AnalyzerError),

    /// One or more requirements are not covered by the user's grants.
    /// Carries every failing requirement so a caller can request the
    /// exact union of missing grants in one round-trip.
    #[error("insufficient permissions for:{}", format_failing(.0))]
    InsufficientPermissions(Vec<RequiredPermission>),

    /// A grant mutation was not representable (removing specific rows
    /// from a blanket grant).
    #[error(transparent)]
    Grant(#[from] GrantError),

    /// The grant store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

fn format_failing(failing: &[RequiredPermission]) -> String {
    failing
        .iter()
        .map(|requirement| format!("\n  {requirement}"))
        .collect()
}
