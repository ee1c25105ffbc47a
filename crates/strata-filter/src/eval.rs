// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory filter evaluation over JSON documents.
//!
//! This is the reference semantics: the store-side predicate produced by
//! [`crate::compile`] must make bit-identical inclusion decisions. It is
//! also used directly to post-filter cached candidate sets.
//!
//! Missing-path rule: a dot path whose intermediate or final key is absent
//! makes the leaf false, unless the operator is `IsNull`.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::expr::{CompareOp, FilterExpr, FilterLeaf, GroupOp};
use crate::value::FilterValue;

/// Evaluate a (normalized) filter tree against a JSON document.
pub fn evaluate(expr: &FilterExpr, doc: &Value) -> bool {
    match expr {
        FilterExpr::Leaf(leaf) => evaluate_leaf(leaf, doc),
        FilterExpr::Group { op, children } => match op {
            GroupOp::And => children.iter().all(|c| evaluate(c, doc)),
            GroupOp::Or => children.iter().any(|c| evaluate(c, doc)),
            GroupOp::Not => !children.iter().any(|c| evaluate(c, doc)),
        },
    }
}

fn evaluate_leaf(leaf: &FilterLeaf, doc: &Value) -> bool {
    let field_value = get_nested(doc, &leaf.field);

    match leaf.op {
        CompareOp::IsNull => return field_value.is_none() || field_value == Some(&Value::Null),
        CompareOp::IsNotNull => {
            return field_value.is_some() && field_value != Some(&Value::Null)
        }
        _ => {}
    }

    let Some(field_value) = field_value else {
        return false;
    };
    if field_value.is_null() {
        return false;
    }

    match leaf.op {
        CompareOp::Eq => values_equal(field_value, &leaf.value),
        CompareOp::Neq => !values_equal(field_value, &leaf.value),
        CompareOp::Lt => compare(field_value, &leaf.value) == Some(Ordering::Less),
        CompareOp::Lte => matches!(
            compare(field_value, &leaf.value),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::Gt => compare(field_value, &leaf.value) == Some(Ordering::Greater),
        CompareOp::Gte => matches!(
            compare(field_value, &leaf.value),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::In => match &leaf.value {
            FilterValue::Array(items) => items.iter().any(|v| values_equal(field_value, v)),
            _ => false,
        },
        CompareOp::NotIn => match &leaf.value {
            FilterValue::Array(items) => !items.iter().any(|v| values_equal(field_value, v)),
            _ => false,
        },
        CompareOp::AnyOf => match (field_value.as_array(), &leaf.value) {
            (Some(field_items), FilterValue::Array(wanted)) => field_items
                .iter()
                .any(|fi| wanted.iter().any(|w| values_equal(fi, w))),
            _ => false,
        },
        CompareOp::AllOf => match (field_value.as_array(), &leaf.value) {
            (Some(field_items), FilterValue::Array(wanted)) => wanted
                .iter()
                .all(|w| field_items.iter().any(|fi| values_equal(fi, w))),
            _ => false,
        },
        CompareOp::NoneOf => match (field_value.as_array(), &leaf.value) {
            (Some(field_items), FilterValue::Array(wanted)) => !field_items
                .iter()
                .any(|fi| wanted.iter().any(|w| values_equal(fi, w))),
            _ => false,
        },
        CompareOp::Contains => text_op(field_value, leaf, |hay, needle| hay.contains(needle)),
        CompareOp::StartsWith => {
            text_op(field_value, leaf, |hay, needle| hay.starts_with(needle))
        }
        CompareOp::EndsWith => text_op(field_value, leaf, |hay, needle| hay.ends_with(needle)),
        CompareOp::Regex => {
            let (Some(hay), FilterValue::Str(pattern)) = (field_value.as_str(), &leaf.value)
            else {
                return false;
            };
            let pattern = if leaf.case_sensitive {
                pattern.clone()
            } else {
                format!("(?i){pattern}")
            };
            match regex::Regex::new(&pattern) {
                Ok(re) => re.is_match(hay),
                Err(_) => false,
            }
        }
        // Rewritten away by normalization; unreachable on compiled filters.
        CompareOp::Between | CompareOp::Within => false,
        CompareOp::IsNull | CompareOp::IsNotNull => unreachable!("handled above"),
    }
}

fn text_op(field_value: &Value, leaf: &FilterLeaf, f: impl Fn(&str, &str) -> bool) -> bool {
    let (Some(hay), FilterValue::Str(needle)) = (field_value.as_str(), &leaf.value) else {
        return false;
    };
    if leaf.case_sensitive {
        f(hay, needle)
    } else {
        f(&hay.to_lowercase(), &needle.to_lowercase())
    }
}

/// Resolve a dot path against nested JSON maps.
fn get_nested<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for key in path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current)
}

fn values_equal(field: &Value, filter: &FilterValue) -> bool {
    match (field, filter) {
        (Value::String(s), FilterValue::Str(f)) => s == f,
        (Value::Number(n), FilterValue::Num(f)) => {
            n.as_f64().map(|v| v == *f).unwrap_or(false)
        }
        (Value::Bool(b), FilterValue::Bool(f)) => b == f,
        (Value::String(s), FilterValue::Timestamp(t)) => parse_ts(s)
            .map(|parsed| parsed == *t)
            .unwrap_or(false),
        _ => false,
    }
}

fn compare(field: &Value, filter: &FilterValue) -> Option<Ordering> {
    match (field, filter) {
        (Value::Number(n), FilterValue::Num(f)) => n.as_f64()?.partial_cmp(f),
        (Value::String(s), FilterValue::Str(f)) => Some(s.as_str().cmp(f.as_str())),
        (Value::String(s), FilterValue::Timestamp(t)) => Some(parse_ts(s)?.cmp(t)),
        _ => None,
    }
}

fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::FilterExpr;
    use crate::normalize::normalize;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_doc() -> Value {
        json!({
            "id": "k1",
            "user_id": "user_001",
            "category": "knowledge",
            "title": "Python tips",
            "content": "Python programming tips for indexing",
            "tags": ["python", "coding"],
            "importance": 0.9,
            "created_at": "2026-02-27T10:00:00.000Z",
            "metadata": {
                "department": "engineering",
                "verified": true,
                "project": { "status": "active" }
            }
        })
    }

    #[test]
    fn equality_and_ordering() {
        let doc = sample_doc();
        assert!(evaluate(&FilterExpr::eq("category", "knowledge"), &doc));
        assert!(!evaluate(&FilterExpr::eq("category", "skill"), &doc));
        assert!(evaluate(&FilterExpr::gt("importance", 0.8), &doc));
        assert!(!evaluate(&FilterExpr::gte("importance", 0.95), &doc));
        assert!(evaluate(&FilterExpr::neq("category", "skill"), &doc));
    }

    #[test]
    fn nested_metadata_paths() {
        let doc = sample_doc();
        assert!(evaluate(
            &FilterExpr::eq("metadata.department", "engineering"),
            &doc
        ));
        assert!(evaluate(
            &FilterExpr::eq("metadata.project.status", "active"),
            &doc
        ));
        assert!(evaluate(&FilterExpr::eq("metadata.verified", true), &doc));
    }

    #[test]
    fn missing_path_is_false_unless_is_null() {
        let doc = sample_doc();
        // Nonexistent nested path: no match, not an error.
        assert!(!evaluate(&FilterExpr::eq("metadata.missing.deep", "x"), &doc));
        assert!(!evaluate(&FilterExpr::gt("metadata.missing", 1_i64), &doc));
        assert!(evaluate(&FilterExpr::is_null("metadata.missing.deep"), &doc));
        assert!(!evaluate(&FilterExpr::is_not_null("metadata.missing"), &doc));
        assert!(evaluate(&FilterExpr::is_not_null("metadata.department"), &doc));
    }

    #[test]
    fn set_operators_over_tags() {
        let doc = sample_doc();
        assert!(evaluate(
            &FilterExpr::any_of("tags", vec!["python", "rust"]),
            &doc
        ));
        assert!(evaluate(
            &FilterExpr::all_of("tags", vec!["python", "coding"]),
            &doc
        ));
        assert!(!evaluate(&FilterExpr::all_of("tags", vec!["python", "go"]), &doc));
        assert!(evaluate(&FilterExpr::none_of("tags", vec!["go", "java"]), &doc));
        assert!(!evaluate(&FilterExpr::none_of("tags", vec!["python"]), &doc));
    }

    #[test]
    fn membership_over_scalars() {
        let doc = sample_doc();
        assert!(evaluate(
            &FilterExpr::in_list("category", vec!["knowledge", "skill"]),
            &doc
        ));
        assert!(evaluate(
            &FilterExpr::not_in("category", vec!["process", "other"]),
            &doc
        ));
    }

    #[test]
    fn text_operators_respect_case_flag() {
        let doc = sample_doc();
        assert!(evaluate(&FilterExpr::contains("title", "Python"), &doc));
        assert!(!evaluate(&FilterExpr::contains("title", "python"), &doc));
        assert!(evaluate(
            &FilterExpr::contains("title", "python").case_insensitive(),
            &doc
        ));
        assert!(evaluate(&FilterExpr::starts_with("title", "Py"), &doc));
        assert!(evaluate(&FilterExpr::ends_with("title", "tips"), &doc));
        assert!(evaluate(&FilterExpr::regex("content", "index(ing)?"), &doc));
        assert!(evaluate(
            &FilterExpr::regex("content", "PYTHON").case_insensitive(),
            &doc
        ));
    }

    #[test]
    fn timestamp_comparisons_after_normalization() {
        let doc = sample_doc();
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let recent = normalize(&FilterExpr::recent("created_at", 7), now).unwrap();
        assert!(evaluate(&recent, &doc));
        let stale = normalize(&FilterExpr::recent("created_at", 1), now).unwrap();
        assert!(!evaluate(&stale, &doc));
    }

    #[test]
    fn group_logic() {
        let doc = sample_doc();
        let f = FilterExpr::and(vec![
            FilterExpr::eq("category", "knowledge"),
            FilterExpr::or(vec![
                FilterExpr::gt("importance", 0.95),
                FilterExpr::any_of("tags", vec!["python"]),
            ]),
        ]);
        assert!(evaluate(&f, &doc));

        let f = FilterExpr::not(FilterExpr::eq("category", "knowledge"));
        assert!(!evaluate(&f, &doc));
    }

    #[test]
    fn between_after_normalization_is_closed_interval() {
        let doc = sample_doc();
        let now = Utc::now();
        let inside = normalize(&FilterExpr::between("importance", 0.9, 1.0), now).unwrap();
        assert!(evaluate(&inside, &doc), "closed interval includes endpoints");
        let outside = normalize(&FilterExpr::between("importance", 0.0, 0.5), now).unwrap();
        assert!(!evaluate(&outside, &doc));
    }
}
