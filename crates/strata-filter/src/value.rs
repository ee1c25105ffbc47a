// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The value sum type carried by filter leaves.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A filter comparison value.
///
/// Realized as a sum type over the small set of shapes the engine stores:
/// strings, numbers, booleans, timestamps, and flat arrays thereof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    Str(String),
    Num(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Array(Vec<FilterValue>),
    Null,
}

impl FilterValue {
    /// Short name of the value shape, used in type-error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            FilterValue::Str(_) => "string",
            FilterValue::Num(_) => "number",
            FilterValue::Bool(_) => "bool",
            FilterValue::Timestamp(_) => "timestamp",
            FilterValue::Array(_) => "array",
            FilterValue::Null => "null",
        }
    }

    /// Render a scalar value to its canonical string form for tag queries
    /// and SQL parameters. Timestamps use RFC 3339 with millisecond
    /// precision and a `Z` suffix so lexicographic order equals time order.
    pub fn canonical_string(&self) -> String {
        match self {
            FilterValue::Str(s) => s.clone(),
            FilterValue::Num(n) => format!("{n}"),
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Timestamp(t) => t.to_rfc3339_opts(SecondsFormat::Millis, true),
            FilterValue::Array(items) => items
                .iter()
                .map(FilterValue::canonical_string)
                .collect::<Vec<_>>()
                .join(","),
            FilterValue::Null => "null".to_string(),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Str(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::Str(s)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        FilterValue::Num(n)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::Num(n as f64)
    }
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(t: DateTime<Utc>) -> Self {
        FilterValue::Timestamp(t)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(items: Vec<T>) -> Self {
        FilterValue::Array(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn conversions_produce_expected_shapes() {
        assert_eq!(FilterValue::from("x").shape(), "string");
        assert_eq!(FilterValue::from(3_i64).shape(), "number");
        assert_eq!(FilterValue::from(0.5).shape(), "number");
        assert_eq!(FilterValue::from(true).shape(), "bool");
        assert_eq!(FilterValue::from(vec!["a", "b"]).shape(), "array");
    }

    #[test]
    fn timestamp_canonical_form_is_sortable() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        let a = FilterValue::Timestamp(early).canonical_string();
        let b = FilterValue::Timestamp(late).canonical_string();
        assert!(a < b, "lexicographic order must equal time order");
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn serde_round_trip_preserves_shape() {
        let v = FilterValue::Array(vec![
            FilterValue::Str("python".into()),
            FilterValue::Num(1.0),
        ]);
        let json = serde_json::to_string(&v).unwrap();
        let back: FilterValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, back);
    }
}
