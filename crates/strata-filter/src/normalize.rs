// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filter tree normalization, run once per query ahead of compilation.
//!
//! Normalization rules:
//! 1. Single-child AND/OR groups collapse to their child.
//! 2. Nested same-operator groups flatten.
//! 3. `Between(lo, hi)` rewrites to `Gte(lo) AND Lte(hi)`.
//! 4. `Within(duration)` rewrites to `Gte(now - duration)` against the
//!    supplied clock instant, so the whole tree is temporal-sugar-free
//!    afterwards.

use chrono::{DateTime, Duration, Utc};

use strata_core::StrataError;

use crate::expr::{CompareOp, FilterExpr, FilterLeaf, GroupOp};
use crate::value::FilterValue;

/// Normalize `expr` against the clock instant `now`.
///
/// Returns `Validation` errors for malformed leaves (e.g. a `Between` whose
/// value is not a two-element array).
pub fn normalize(expr: &FilterExpr, now: DateTime<Utc>) -> Result<FilterExpr, StrataError> {
    match expr {
        FilterExpr::Leaf(leaf) => normalize_leaf(leaf, now),
        FilterExpr::Group { op, children } => {
            let mut flat = Vec::with_capacity(children.len());
            for child in children {
                let normalized = normalize(child, now)?;
                match normalized {
                    // Flatten nested same-operator AND/OR groups.
                    FilterExpr::Group {
                        op: child_op,
                        children: grand,
                    } if child_op == *op && *op != GroupOp::Not => {
                        flat.extend(grand);
                    }
                    other => flat.push(other),
                }
            }

            if flat.is_empty() {
                return Err(StrataError::Validation(
                    "filter group must have at least one child".into(),
                ));
            }

            // Collapse single-child AND/OR to the child itself.
            if flat.len() == 1 && *op != GroupOp::Not {
                return Ok(flat.into_iter().next().unwrap());
            }

            Ok(FilterExpr::Group {
                op: *op,
                children: flat,
            })
        }
    }
}

fn normalize_leaf(leaf: &FilterLeaf, now: DateTime<Utc>) -> Result<FilterExpr, StrataError> {
    match leaf.op {
        CompareOp::Between => {
            let (lo, hi) = match &leaf.value {
                FilterValue::Array(items) if items.len() == 2 => {
                    (items[0].clone(), items[1].clone())
                }
                other => {
                    return Err(StrataError::Validation(format!(
                        "between on `{}` expects a two-element array, got {}",
                        leaf.field,
                        other.shape()
                    )))
                }
            };
            Ok(FilterExpr::and(vec![
                FilterExpr::gte(leaf.field.clone(), lo),
                FilterExpr::lte(leaf.field.clone(), hi),
            ]))
        }
        CompareOp::Within => {
            let seconds = match &leaf.value {
                FilterValue::Num(n) if *n >= 0.0 => *n as i64,
                other => {
                    return Err(StrataError::Validation(format!(
                        "time_window on `{}` expects a non-negative duration, got {}",
                        leaf.field,
                        other.shape()
                    )))
                }
            };
            let cutoff = now - Duration::seconds(seconds);
            Ok(FilterExpr::gte(
                leaf.field.clone(),
                FilterValue::Timestamp(cutoff),
            ))
        }
        _ => Ok(FilterExpr::Leaf(leaf.clone())),
    }
}
