//! Error types for the analyzer crate.

use thiserror::Error;

/// Errors that can occur while analyzing a SQL batch.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// SQL parsing failed. The message carries the parser's position
    /// information for the offending token.
    #[error("failed to parse SQL: {0}")]
    Parse(String),

    /// The statement shape cannot be mapped to row-level requirements.
    #[error("unsupported statement: {reason} in \"{fragment}\"")]
    Unsupported { reason: String, fragment: String },
}
