//! SQL batch parsing.

use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::AnalyzerError;

/// Parses SQL batches into statements.
///
/// The generic dialect keeps vendor forms such as multi-table `UPDATE`
/// and `DELETE` parseable, so the analyzer can reject them with a precise
/// error instead of a parse failure.
pub struct StatementParser {
    dialect: GenericDialect,
}

impl Clone for StatementParser {
    fn clone(&self) -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }
}

impl Default for StatementParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self {
            dialect: GenericDialect {},
        }
    }

    /// Parse a batch of one or more semicolon-separated statements.
    ///
    /// A failure anywhere in the batch aborts the whole parse.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, AnalyzerError> {
        Parser::parse_sql(&self.dialect, sql).map_err(|e| AnalyzerError::Parse(e.to_string()))
    }
}
