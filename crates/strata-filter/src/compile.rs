// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filter compilation to store-side predicates.
//!
//! A filter tree is compiled once per query: normalized, type-checked, and
//! lowered to a parameterized SQL WHERE fragment for the relational store
//! plus a conjunctive tag query for the cache. The retained normalized tree
//! doubles as the in-memory evaluator, which must agree bit-for-bit with
//! the SQL predicate.
//!
//! SQL dialect is SQLite: `metadata.*` paths lower to `json_extract`, set
//! operators over array columns lower to `json_each` subqueries, and `Regex`
//! lowers to the `REGEXP` operator the store backend registers.

use chrono::{DateTime, Utc};
use serde_json::Value;

use strata_core::StrataError;

use crate::eval::evaluate;
use crate::expr::{CompareOp, FilterExpr, FilterLeaf, GroupOp};
use crate::normalize::normalize;
use crate::registry::FieldTypeRegistry;
use crate::value::FilterValue;

/// A bound SQL parameter. The store backend converts these to its native
/// parameter type.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Real(f64),
    Int(i64),
}

/// A parameterized WHERE fragment with positional `?` placeholders.
#[derive(Debug, Clone)]
pub struct SqlPredicate {
    pub where_sql: String,
    pub params: Vec<SqlParam>,
}

/// A conjunction-only predicate for cache-side tag filtering. Leaves the
/// cache cannot express are handled by post-filtering with the in-memory
/// evaluator.
#[derive(Debug, Clone, Default)]
pub struct TagQuery {
    /// `(field, allowed values)` pairs; a candidate matches when every field
    /// holds one of its allowed values.
    pub constraints: Vec<(String, Vec<String>)>,
    /// True when the tree contained nodes beyond simple top-level equality
    /// or membership, so the caller must post-filter.
    pub needs_post_filter: bool,
}

/// A filter compiled once per query.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    normalized: FilterExpr,
    sql: SqlPredicate,
    tag_query: TagQuery,
}

impl CompiledFilter {
    /// The normalized tree (temporal sugar resolved, ranges expanded).
    pub fn expr(&self) -> &FilterExpr {
        &self.normalized
    }

    /// The store-side predicate.
    pub fn sql(&self) -> &SqlPredicate {
        &self.sql
    }

    /// The cache-side tag predicate.
    pub fn tag_query(&self) -> &TagQuery {
        &self.tag_query
    }

    /// Evaluate the filter against an in-memory JSON document. Produces the
    /// same inclusion decision as the store-side predicate.
    pub fn matches(&self, doc: &Value) -> bool {
        evaluate(&self.normalized, doc)
    }

    /// Canonical JSON of the normalized tree; stable input for cache
    /// fingerprints.
    pub fn canonical_json(&self) -> String {
        self.normalized.canonical_json()
    }
}

/// Compile `expr` against the registry, resolving temporal sugar at `now`.
pub fn compile(
    expr: &FilterExpr,
    registry: &FieldTypeRegistry,
    now: DateTime<Utc>,
) -> Result<CompiledFilter, StrataError> {
    let normalized = normalize(expr, now)?;
    registry.check(&normalized)?;
    let mut params = Vec::new();
    let where_sql = lower(&normalized, &mut params)?;
    let tag_query = to_tag_query(&normalized);
    Ok(CompiledFilter {
        normalized,
        sql: SqlPredicate { where_sql, params },
        tag_query,
    })
}

/// Compile with the current clock. Callers that need reproducible temporal
/// sugar (tests) use [`compile`] with an explicit instant.
pub fn compile_now(
    expr: &FilterExpr,
    registry: &FieldTypeRegistry,
) -> Result<CompiledFilter, StrataError> {
    compile(expr, registry, Utc::now())
}

fn lower(expr: &FilterExpr, params: &mut Vec<SqlParam>) -> Result<String, StrataError> {
    match expr {
        FilterExpr::Leaf(leaf) => lower_leaf(leaf, params),
        FilterExpr::Group { op, children } => {
            let parts: Result<Vec<String>, StrataError> =
                children.iter().map(|c| lower(c, params)).collect();
            let parts = parts?;
            let sql = match op {
                GroupOp::And => parts.join(" AND "),
                GroupOp::Or => parts.join(" OR "),
                GroupOp::Not => return Ok(format!("NOT ({})", parts.join(" OR "))),
            };
            Ok(format!("({sql})"))
        }
    }
}

/// Lower a dot-notation field path to a SQL column expression.
///
/// Plain identifiers map to columns; `prefix.rest` maps to
/// `json_extract(prefix, '$.rest')`.
fn column_sql(field: &str) -> Result<String, StrataError> {
    if field.is_empty()
        || !field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        || field.starts_with('.')
        || field.ends_with('.')
    {
        return Err(StrataError::Validation(format!(
            "invalid filter field path `{field}`"
        )));
    }
    match field.split_once('.') {
        Some((root, rest)) => Ok(format!("json_extract({root}, '$.{rest}')")),
        None => Ok(field.to_string()),
    }
}

fn push_scalar(value: &FilterValue, params: &mut Vec<SqlParam>) -> Result<(), StrataError> {
    match value {
        FilterValue::Str(s) => params.push(SqlParam::Text(s.clone())),
        FilterValue::Num(n) => params.push(SqlParam::Real(*n)),
        FilterValue::Bool(b) => params.push(SqlParam::Int(i64::from(*b))),
        FilterValue::Timestamp(_) => params.push(SqlParam::Text(value.canonical_string())),
        other => {
            return Err(StrataError::Validation(format!(
                "expected a scalar filter value, got {}",
                other.shape()
            )))
        }
    }
    Ok(())
}

fn scalar_list(value: &FilterValue) -> Result<&[FilterValue], StrataError> {
    match value {
        FilterValue::Array(items) => Ok(items),
        other => Err(StrataError::Validation(format!(
            "expected an array filter value, got {}",
            other.shape()
        ))),
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn lower_leaf(leaf: &FilterLeaf, params: &mut Vec<SqlParam>) -> Result<String, StrataError> {
    let col = column_sql(&leaf.field)?;
    match leaf.op {
        CompareOp::Eq => {
            push_scalar(&leaf.value, params)?;
            Ok(format!("{col} = ?"))
        }
        CompareOp::Neq => {
            push_scalar(&leaf.value, params)?;
            // NULL != x is NULL in SQL, so a missing field stays excluded,
            // matching the in-memory missing-path rule.
            Ok(format!("{col} != ?"))
        }
        CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
            push_scalar(&leaf.value, params)?;
            let op = match leaf.op {
                CompareOp::Lt => "<",
                CompareOp::Lte => "<=",
                CompareOp::Gt => ">",
                _ => ">=",
            };
            Ok(format!("{col} {op} ?"))
        }
        CompareOp::In | CompareOp::NotIn => {
            let items = scalar_list(&leaf.value)?;
            if items.is_empty() {
                // IN () matches nothing; NOT IN () matches any present value.
                return Ok(match leaf.op {
                    CompareOp::In => "0".to_string(),
                    _ => format!("{col} IS NOT NULL"),
                });
            }
            for item in items {
                push_scalar(item, params)?;
            }
            let kw = if leaf.op == CompareOp::In {
                "IN"
            } else {
                "NOT IN"
            };
            Ok(format!("{col} {kw} ({})", placeholders(items.len())))
        }
        CompareOp::AnyOf | CompareOp::AllOf | CompareOp::NoneOf => {
            let items = scalar_list(&leaf.value)?;
            for item in items {
                push_scalar(item, params)?;
            }
            let ph = placeholders(items.len());
            match leaf.op {
                CompareOp::AnyOf => Ok(format!(
                    "({col} IS NOT NULL AND EXISTS (SELECT 1 FROM json_each({col}) \
                     WHERE json_each.value IN ({ph})))"
                )),
                CompareOp::AllOf => {
                    params.push(SqlParam::Int(items.len() as i64));
                    Ok(format!(
                        "({col} IS NOT NULL AND (SELECT COUNT(DISTINCT json_each.value) \
                         FROM json_each({col}) WHERE json_each.value IN ({ph})) = ?)"
                    ))
                }
                _ => Ok(format!(
                    "({col} IS NOT NULL AND NOT EXISTS (SELECT 1 FROM json_each({col}) \
                     WHERE json_each.value IN ({ph})))"
                )),
            }
        }
        CompareOp::Contains => {
            push_scalar(&leaf.value, params)?;
            if leaf.case_sensitive {
                Ok(format!("instr({col}, ?) > 0"))
            } else {
                Ok(format!("instr(lower({col}), lower(?)) > 0"))
            }
        }
        CompareOp::StartsWith => {
            push_scalar(&leaf.value, params)?;
            push_scalar(&leaf.value, params)?;
            if leaf.case_sensitive {
                Ok(format!("substr({col}, 1, length(?)) = ?"))
            } else {
                Ok(format!("lower(substr({col}, 1, length(?))) = lower(?)"))
            }
        }
        CompareOp::EndsWith => {
            push_scalar(&leaf.value, params)?;
            push_scalar(&leaf.value, params)?;
            if leaf.case_sensitive {
                Ok(format!("substr({col}, -length(?)) = ?"))
            } else {
                Ok(format!("lower(substr({col}, -length(?))) = lower(?)"))
            }
        }
        CompareOp::Regex => {
            let pattern = match &leaf.value {
                FilterValue::Str(p) if leaf.case_sensitive => p.clone(),
                FilterValue::Str(p) => format!("(?i){p}"),
                other => {
                    return Err(StrataError::Validation(format!(
                        "regex expects a string pattern, got {}",
                        other.shape()
                    )))
                }
            };
            params.push(SqlParam::Text(pattern));
            Ok(format!("{col} REGEXP ?"))
        }
        CompareOp::IsNull => Ok(format!("{col} IS NULL")),
        CompareOp::IsNotNull => Ok(format!("{col} IS NOT NULL")),
        CompareOp::Between | CompareOp::Within => Err(StrataError::Internal(
            "between/within must be rewritten before lowering".into(),
        )),
    }
}

/// Extract the conjunctive equality/membership constraints the cache can
/// index on. Everything else flips `needs_post_filter`.
fn to_tag_query(expr: &FilterExpr) -> TagQuery {
    let mut query = TagQuery::default();
    collect_tags(expr, true, &mut query);
    query
}

fn collect_tags(expr: &FilterExpr, conjunctive: bool, query: &mut TagQuery) {
    match expr {
        FilterExpr::Leaf(leaf) if conjunctive => match (&leaf.op, &leaf.value) {
            (CompareOp::Eq, value) if !matches!(value, FilterValue::Array(_)) => {
                query
                    .constraints
                    .push((leaf.field.clone(), vec![value.canonical_string()]));
            }
            (CompareOp::In, FilterValue::Array(items)) => {
                query.constraints.push((
                    leaf.field.clone(),
                    items.iter().map(FilterValue::canonical_string).collect(),
                ));
            }
            _ => query.needs_post_filter = true,
        },
        FilterExpr::Leaf(_) => query.needs_post_filter = true,
        FilterExpr::Group {
            op: GroupOp::And,
            children,
        } => {
            for child in children {
                collect_tags(child, conjunctive, query);
            }
        }
        FilterExpr::Group { .. } => query.needs_post_filter = true,
    }
}
