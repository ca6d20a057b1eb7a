//! Requirement derivation.
//!
//! The analyzer walks each parsed statement and emits one
//! [`RequiredPermission`] per recognized table reference. For single-table
//! statements it attempts to narrow the requirement to the exact rows the
//! `WHERE` clause pins down by primary key; everything it cannot decompose
//! widens to the whole table.

use serde::Serialize;
use sqlparser::ast::{
    BinaryOperator, Expr, FromTable, Query, Select, SetExpr, Statement, TableFactor, Value,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rowgate_core::{AccessMode, CompositeKey, Permission, PkSchema, Scope};

use crate::error::AnalyzerError;
use crate::parser::StatementParser;

/// A permission a statement requires, with the rendered SQL fragment it
/// was derived from. The fragment is used only for error reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredPermission {
    pub permission: Permission,
    pub fragment: String,
}

impl fmt::Display for RequiredPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (due to \"{}\")", self.permission, self.fragment)
    }
}

/// Derives required permissions from SQL batches.
#[derive(Clone, Default)]
pub struct RequirementAnalyzer {
    parser: StatementParser,
}

impl RequirementAnalyzer {
    /// Create a new analyzer.
    pub fn new() -> Self {
        Self {
            parser: StatementParser::new(),
        }
    }

    /// Analyze a batch and return its requirements in statement order.
    ///
    /// The analyzer never evaluates expressions; it only matches the
    /// syntactic shapes described at the crate level.
    pub fn analyze(
        &self,
        sql: &str,
        pk_schema: &PkSchema,
    ) -> Result<Vec<RequiredPermission>, AnalyzerError> {
        let statements = self.parser.parse(sql)?;
        let mut requirements = Vec::new();
        for statement in &statements {
            self.collect_statement(statement, pk_schema, &mut requirements)?;
        }
        Ok(requirements)
    }

    fn collect_statement(
        &self,
        statement: &Statement,
        pk_schema: &PkSchema,
        out: &mut Vec<RequiredPermission>,
    ) -> Result<(), AnalyzerError> {
        match statement {
            Statement::Query(query) => self.collect_query(query, pk_schema, out),
            Statement::Insert(insert) => {
                // Inserted PK values are not constrainable, so an INSERT
                // always demands the whole table.
                out.push(RequiredPermission {
                    permission: Permission::all(insert.table.to_string(), AccessMode::Write),
                    fragment: statement.to_string(),
                });
                if let Some(source) = &insert.source {
                    self.collect_query(source, pk_schema, out)?;
                }
                Ok(())
            }
            Statement::Update {
                table,
                from,
                selection,
                ..
            } => {
                if !table.joins.is_empty() || from.is_some() {
                    return Err(AnalyzerError::Unsupported {
                        reason: "UPDATE must target a single table".to_string(),
                        fragment: statement.to_string(),
                    });
                }
                let table_name = match &table.relation {
                    TableFactor::Table { name, .. } => name.to_string(),
                    _ => {
                        return Err(AnalyzerError::Unsupported {
                            reason: "UPDATE target is not a plain table".to_string(),
                            fragment: statement.to_string(),
                        });
                    }
                };
                let scope = where_scope(selection.as_ref(), pk_schema.get(&table_name));
                out.push(RequiredPermission {
                    permission: Permission {
                        table: table_name,
                        mode: AccessMode::Write,
                        scope,
                    },
                    fragment: statement.to_string(),
                });
                self.collect_expr_queries(selection.as_ref(), pk_schema, out)
            }
            Statement::Delete(delete) => {
                if !delete.tables.is_empty() || delete.using.is_some() {
                    return Err(AnalyzerError::Unsupported {
                        reason: "DELETE must target a single table".to_string(),
                        fragment: statement.to_string(),
                    });
                }
                let relations = match &delete.from {
                    FromTable::WithFromKeyword(relations) => relations,
                    FromTable::WithoutKeyword(relations) => relations,
                };
                let [target] = relations.as_slice() else {
                    return Err(AnalyzerError::Unsupported {
                        reason: "DELETE must target a single table".to_string(),
                        fragment: statement.to_string(),
                    });
                };
                if !target.joins.is_empty() {
                    return Err(AnalyzerError::Unsupported {
                        reason: "DELETE must target a single table".to_string(),
                        fragment: statement.to_string(),
                    });
                }
                let table = match &target.relation {
                    TableFactor::Table { name, .. } => name.to_string(),
                    _ => {
                        return Err(AnalyzerError::Unsupported {
                            reason: "DELETE target is not a plain table".to_string(),
                            fragment: statement.to_string(),
                        });
                    }
                };
                let scope = where_scope(delete.selection.as_ref(), pk_schema.get(&table));
                out.push(RequiredPermission {
                    permission: Permission {
                        table,
                        mode: AccessMode::Write,
                        scope,
                    },
                    fragment: statement.to_string(),
                });
                self.collect_expr_queries(delete.selection.as_ref(), pk_schema, out)
            }
            other => Err(AnalyzerError::Unsupported {
                reason: "statement kind cannot be authorized at row level".to_string(),
                fragment: other.to_string(),
            }),
        }
    }

    fn collect_query(
        &self,
        query: &Query,
        pk_schema: &PkSchema,
        out: &mut Vec<RequiredPermission>,
    ) -> Result<(), AnalyzerError> {
        self.collect_set_expr(&query.body, pk_schema, out)
    }

    fn collect_set_expr(
        &self,
        body: &SetExpr,
        pk_schema: &PkSchema,
        out: &mut Vec<RequiredPermission>,
    ) -> Result<(), AnalyzerError> {
        match body {
            SetExpr::Select(select) => self.collect_select(select, pk_schema, out),
            SetExpr::Query(inner) => self.collect_query(inner, pk_schema, out),
            SetExpr::SetOperation { left, right, .. } => {
                self.collect_set_expr(left, pk_schema, out)?;
                self.collect_set_expr(right, pk_schema, out)
            }
            // VALUES lists and vendor-specific bodies reference no tables.
            _ => Ok(()),
        }
    }

    fn collect_select(
        &self,
        select: &Select,
        pk_schema: &PkSchema,
        out: &mut Vec<RequiredPermission>,
    ) -> Result<(), AnalyzerError> {
        let mut tables = Vec::new();
        let mut subqueries = Vec::new();
        let mut factor_count = 0usize;
        for table_with_joins in &select.from {
            collect_factor(
                &table_with_joins.relation,
                &mut tables,
                &mut subqueries,
                &mut factor_count,
            );
            for join in &table_with_joins.joins {
                collect_factor(&join.relation, &mut tables, &mut subqueries, &mut factor_count);
            }
        }

        let fragment = select.to_string();
        if factor_count == 1 && tables.len() == 1 {
            // Exactly one plain table: the WHERE clause may narrow the
            // requirement to specific rows.
            let table = tables.remove(0);
            let scope = where_scope(select.selection.as_ref(), pk_schema.get(&table));
            out.push(RequiredPermission {
                permission: Permission {
                    table,
                    mode: AccessMode::Read,
                    scope,
                },
                fragment: fragment.clone(),
            });
        } else {
            // Several tables or joins: no cross-table inference, each
            // table demands a blanket read.
            for table in tables {
                out.push(RequiredPermission {
                    permission: Permission::all(table, AccessMode::Read),
                    fragment: fragment.clone(),
                });
            }
        }

        for subquery in subqueries {
            self.collect_query(subquery, pk_schema, out)?;
        }
        self.collect_expr_queries(select.selection.as_ref(), pk_schema, out)
    }

    fn collect_expr_queries(
        &self,
        selection: Option<&Expr>,
        pk_schema: &PkSchema,
        out: &mut Vec<RequiredPermission>,
    ) -> Result<(), AnalyzerError> {
        match selection {
            Some(expr) => self.collect_subqueries(expr, pk_schema, out),
            None => Ok(()),
        }
    }

    fn collect_subqueries(
        &self,
        expr: &Expr,
        pk_schema: &PkSchema,
        out: &mut Vec<RequiredPermission>,
    ) -> Result<(), AnalyzerError> {
        match expr {
            Expr::Subquery(query)
            | Expr::Exists {
                subquery: query, ..
            } => self.collect_query(query, pk_schema, out),
            Expr::InSubquery { expr, subquery, .. } => {
                self.collect_subqueries(expr, pk_schema, out)?;
                self.collect_query(subquery, pk_schema, out)
            }
            Expr::BinaryOp { left, right, .. } => {
                self.collect_subqueries(left, pk_schema, out)?;
                self.collect_subqueries(right, pk_schema, out)
            }
            Expr::UnaryOp { expr, .. } | Expr::Nested(expr) => {
                self.collect_subqueries(expr, pk_schema, out)
            }
            Expr::IsNull(expr) | Expr::IsNotNull(expr) => {
                self.collect_subqueries(expr, pk_schema, out)
            }
            Expr::InList { expr, list, .. } => {
                self.collect_subqueries(expr, pk_schema, out)?;
                for item in list {
                    self.collect_subqueries(item, pk_schema, out)?;
                }
                Ok(())
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                self.collect_subqueries(expr, pk_schema, out)?;
                self.collect_subqueries(low, pk_schema, out)?;
                self.collect_subqueries(high, pk_schema, out)
            }
            _ => Ok(()),
        }
    }
}

/// Record one FROM-clause factor: plain tables and derived subqueries are
/// collected, nested join parentheses are flattened.
fn collect_factor<'a>(
    factor: &'a TableFactor,
    tables: &mut Vec<String>,
    subqueries: &mut Vec<&'a Query>,
    factor_count: &mut usize,
) {
    match factor {
        TableFactor::Table { name, .. } => {
            tables.push(name.to_string());
            *factor_count += 1;
        }
        TableFactor::Derived { subquery, .. } => {
            subqueries.push(subquery);
            *factor_count += 1;
        }
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => {
            collect_factor(&table_with_joins.relation, tables, subqueries, factor_count);
            for join in &table_with_joins.joins {
                collect_factor(&join.relation, tables, subqueries, factor_count);
            }
        }
        _ => {
            *factor_count += 1;
        }
    }
}

/// Derive the scope of a single-table statement from its WHERE clause.
///
/// Returns [`Scope::Rows`] when the predicate decomposes into a finite
/// set of rows with every PK column pinned; otherwise [`Scope::All`].
fn where_scope(selection: Option<&Expr>, pk_columns: Option<&Vec<String>>) -> Scope {
    let Some(expr) = selection else {
        return Scope::All;
    };
    let Some(pk_columns) = pk_columns.filter(|columns| !columns.is_empty()) else {
        return Scope::All;
    };
    let Some(specs) = walk_where(expr) else {
        return Scope::All;
    };

    let mut keys = BTreeSet::new();
    for spec in &specs {
        let mut parts = Vec::with_capacity(pk_columns.len());
        for column in pk_columns {
            match spec.get(column) {
                Some(value) => parts.push(value.clone()),
                // A row spec that leaves any PK column open matches an
                // unbounded set of rows, so the whole statement widens.
                None => return Scope::All,
            }
        }
        keys.insert(CompositeKey::new(parts));
    }
    if keys.is_empty() {
        Scope::All
    } else {
        Scope::Rows(keys)
    }
}

/// Decompose a predicate into per-row column requirements.
///
/// Each returned map pins columns to literal values for one candidate
/// row. `None` means the predicate is not decomposable into a finite row
/// set.
fn walk_where(expr: &Expr) -> Option<Vec<BTreeMap<String, String>>> {
    match expr {
        Expr::Nested(inner) => walk_where(inner),
        Expr::BinaryOp { left, op, right } => match op {
            BinaryOperator::Eq => {
                let column = column_name(left)?;
                let value = literal_text(right)?;
                Some(vec![BTreeMap::from([(column, value)])])
            }
            BinaryOperator::And => {
                let lhs = walk_where(left)?;
                let rhs = walk_where(right)?;
                // A conjunction narrows exactly one row spec on each side;
                // AND is not distributed over OR branches.
                if lhs.len() != 1 || rhs.len() != 1 {
                    return None;
                }
                let mut merged = lhs.into_iter().next()?;
                merged.extend(rhs.into_iter().next()?);
                Some(vec![merged])
            }
            BinaryOperator::Or => {
                let mut specs = walk_where(left)?;
                specs.extend(walk_where(right)?);
                Some(specs)
            }
            _ => None,
        },
        _ => None,
    }
}

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.clone()),
        _ => None,
    }
}

fn literal_text(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Value(value) => match &value.value {
            Value::Number(text, _) => Some(text.clone()),
            Value::SingleQuotedString(text) | Value::DoubleQuotedString(text) => {
                Some(text.clone())
            }
            Value::Boolean(flag) => Some(flag.to_string()),
            _ => None,
        },
        _ => None,
    }
}
