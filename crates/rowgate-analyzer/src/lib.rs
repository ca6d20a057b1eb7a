//! # rowgate-analyzer
//!
//! Static SQL analysis for the rowgate authorization gateway.
//!
//! Given a SQL batch and the primary-key schema of the backing database,
//! the analyzer derives the minimum set of row-scoped permissions required
//! to execute every statement in the batch.
//!
//! ## Recognized shapes
//!
//! | Statement | Requirement |
//! |-----------|-------------|
//! | `SELECT` from one table | `READ`, rows inferred from `WHERE` |
//! | `SELECT` over several tables or joins | `READ` per table, all rows |
//! | `UPDATE` of one table | `WRITE`, rows inferred from `WHERE` |
//! | `DELETE` from one table | `WRITE`, rows inferred from `WHERE` |
//! | `INSERT` | `WRITE`, all rows |
//! | multi-table `UPDATE`/`DELETE` | rejected as unsupported |
//! | anything else (DDL, transaction control, ...) | rejected as unsupported |
//!
//! Nested queries (derived tables, set-operation branches, `INSERT ...
//! SELECT` sources, and subqueries inside `WHERE`) contribute their own
//! `READ` requirements.
//!
//! Row inference only decomposes equality comparisons combined with `AND`
//! and `OR`; any other predicate conservatively widens the requirement to
//! the whole table.

pub mod error;
pub mod parser;
pub mod requirement;

pub use error::AnalyzerError;
pub use parser::StatementParser;
pub use requirement::{RequiredPermission, RequirementAnalyzer};
