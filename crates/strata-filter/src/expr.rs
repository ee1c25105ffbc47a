// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filter expression trees and the fluent builder API.
//!
//! A filter is a tree: leaf nodes carry (field, operator, value), group
//! nodes combine children with AND / OR / NOT. Field paths use dot notation
//! (`metadata.department`); a missing intermediate key makes a leaf false
//! unless the operator is `IsNull`.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::value::FilterValue;

/// Comparison operators supported by filter leaves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    // Equality
    Eq,
    Neq,
    // Ordering
    Lt,
    Lte,
    Gt,
    Gte,
    // Range (closed interval; rewritten to Gte AND Lte at compile time)
    Between,
    // Membership
    In,
    NotIn,
    // Set operators over array-valued fields
    AnyOf,
    AllOf,
    NoneOf,
    // Text
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    // Presence
    IsNull,
    IsNotNull,
    // Sugar: value is a duration in seconds; rewritten to
    // Gte(now - duration) at compile time.
    Within,
}

/// Logical operators for group nodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GroupOp {
    And,
    Or,
    Not,
}

/// A single leaf condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterLeaf {
    /// Dot-notation field path (`category`, `metadata.project.status`).
    pub field: String,
    pub op: CompareOp,
    pub value: FilterValue,
    /// Case sensitivity for the text operators. Ignored elsewhere.
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

/// A filter expression tree. Ephemeral: built per query, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum FilterExpr {
    Leaf(FilterLeaf),
    Group {
        op: GroupOp,
        children: Vec<FilterExpr>,
    },
}

impl FilterExpr {
    fn leaf(field: impl Into<String>, op: CompareOp, value: impl Into<FilterValue>) -> Self {
        FilterExpr::Leaf(FilterLeaf {
            field: field.into(),
            op,
            value: value.into(),
            case_sensitive: true,
        })
    }

    // --- Equality ---

    pub fn eq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::Eq, value)
    }

    pub fn neq(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::Neq, value)
    }

    // --- Ordering ---

    pub fn lt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::Gte, value)
    }

    /// Closed-interval range: `lo <= field <= hi`.
    pub fn between(
        field: impl Into<String>,
        lo: impl Into<FilterValue>,
        hi: impl Into<FilterValue>,
    ) -> Self {
        Self::leaf(
            field,
            CompareOp::Between,
            FilterValue::Array(vec![lo.into(), hi.into()]),
        )
    }

    // --- Membership ---

    pub fn in_list(field: impl Into<String>, values: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::In, values)
    }

    pub fn not_in(field: impl Into<String>, values: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::NotIn, values)
    }

    // --- Set operators over array fields ---

    pub fn any_of(field: impl Into<String>, values: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::AnyOf, values)
    }

    pub fn all_of(field: impl Into<String>, values: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::AllOf, values)
    }

    pub fn none_of(field: impl Into<String>, values: impl Into<FilterValue>) -> Self {
        Self::leaf(field, CompareOp::NoneOf, values)
    }

    /// Tag filter sugar: the field's array overlaps `tags`.
    pub fn has_tags(tags: impl Into<FilterValue>) -> Self {
        Self::any_of("tags", tags)
    }

    // --- Text ---

    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(field, CompareOp::Contains, value.into())
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(field, CompareOp::StartsWith, value.into())
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(field, CompareOp::EndsWith, value.into())
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::leaf(field, CompareOp::Regex, pattern.into())
    }

    // --- Presence ---

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::leaf(field, CompareOp::IsNull, FilterValue::Null)
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self::leaf(field, CompareOp::IsNotNull, FilterValue::Null)
    }

    // --- Temporal sugar ---

    /// Items whose `field` falls within the trailing `duration`. Resolved to
    /// `Gte(now - duration)` when the filter is compiled.
    pub fn time_window(field: impl Into<String>, duration: Duration) -> Self {
        Self::leaf(
            field,
            CompareOp::Within,
            FilterValue::Num(duration.num_seconds() as f64),
        )
    }

    /// Items created within the last `days`.
    pub fn recent(field: impl Into<String>, days: i64) -> Self {
        Self::time_window(field, Duration::days(days))
    }

    // --- Groups ---

    pub fn and(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Group {
            op: GroupOp::And,
            children,
        }
    }

    pub fn or(children: Vec<FilterExpr>) -> Self {
        FilterExpr::Group {
            op: GroupOp::Or,
            children,
        }
    }

    pub fn not(child: FilterExpr) -> Self {
        FilterExpr::Group {
            op: GroupOp::Not,
            children: vec![child],
        }
    }

    /// Relax case sensitivity on a text leaf.
    pub fn case_insensitive(mut self) -> Self {
        if let FilterExpr::Leaf(ref mut leaf) = self {
            leaf.case_sensitive = false;
        }
        self
    }

    /// Iterate all leaves in the tree.
    pub fn leaves(&self) -> Vec<&FilterLeaf> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a FilterLeaf>) {
        match self {
            FilterExpr::Leaf(leaf) => out.push(leaf),
            FilterExpr::Group { children, .. } => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    /// Remove every leaf whose field equals `field`, used by retrieval scope
    /// relaxation. Groups left empty after removal disappear; a fully
    /// relaxed tree returns `None`.
    pub fn without_field(&self, field: &str) -> Option<FilterExpr> {
        match self {
            FilterExpr::Leaf(leaf) => {
                if leaf.field == field {
                    None
                } else {
                    Some(self.clone())
                }
            }
            FilterExpr::Group { op, children } => {
                let kept: Vec<FilterExpr> = children
                    .iter()
                    .filter_map(|c| c.without_field(field))
                    .collect();
                if kept.is_empty() {
                    None
                } else {
                    Some(FilterExpr::Group {
                        op: *op,
                        children: kept,
                    })
                }
            }
        }
    }

    /// Canonical JSON of the tree, used in cache fingerprints.
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).expect("filter trees always serialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_produces_expected_leaves() {
        let f = FilterExpr::and(vec![
            FilterExpr::eq("category", "knowledge"),
            FilterExpr::recent("created_at", 7),
            FilterExpr::any_of("tags", vec!["python", "rust"]),
        ]);
        let leaves = f.leaves();
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].op, CompareOp::Eq);
        assert_eq!(leaves[1].op, CompareOp::Within);
        assert_eq!(leaves[2].op, CompareOp::AnyOf);
    }

    #[test]
    fn serde_round_trip_is_identity() {
        let f = FilterExpr::or(vec![
            FilterExpr::between("importance", 0.5, 1.0),
            FilterExpr::not(FilterExpr::contains("content", "deprecated").case_insensitive()),
        ]);
        let json = f.canonical_json();
        let back: FilterExpr = serde_json::from_str(&json).unwrap();
        assert_eq!(f, back);
        // Round-tripping the parsed tree yields the same serialization.
        assert_eq!(back.canonical_json(), json);
    }

    #[test]
    fn without_field_prunes_and_collapses() {
        let f = FilterExpr::and(vec![
            FilterExpr::eq("category", "knowledge"),
            FilterExpr::recent("created_at", 7),
        ]);
        let relaxed = f.without_field("created_at").unwrap();
        assert_eq!(relaxed.leaves().len(), 1);

        let single = FilterExpr::recent("created_at", 7);
        assert!(single.without_field("created_at").is_none());
    }

    #[test]
    fn case_insensitive_marks_leaf() {
        let f = FilterExpr::contains("title", "SQL").case_insensitive();
        match f {
            FilterExpr::Leaf(leaf) => assert!(!leaf.case_sensitive),
            _ => panic!("expected leaf"),
        }
    }
}
