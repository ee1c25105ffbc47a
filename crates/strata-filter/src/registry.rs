// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-field type registry and compile-time type checking.
//!
//! Filter leaves are duck-typed at construction; type checking happens once
//! at compile time against declared (schema) and learned field types.
//! Comparisons whose value shape does not match surface as
//! `StrataError::FilterType` to the caller.

use std::collections::HashMap;

use strata_core::StrataError;

use crate::expr::{CompareOp, FilterExpr, FilterLeaf};
use crate::value::FilterValue;

/// The declared type of a filterable field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Str,
    Num,
    Bool,
    Timestamp,
    /// Flat array of strings (tags and similar).
    StrArray,
}

impl FieldType {
    fn name(&self) -> &'static str {
        match self {
            FieldType::Str => "string",
            FieldType::Num => "number",
            FieldType::Bool => "bool",
            FieldType::Timestamp => "timestamp",
            FieldType::StrArray => "string array",
        }
    }
}

/// Registry of field types for filter compilation.
///
/// Ships with the engine schema pre-declared; `metadata.*` paths are open
/// by default and can be learned from observed writes. Unknown fields pass
/// type checking unchecked (the missing-path rule makes them `false` at
/// evaluation time anyway).
#[derive(Debug, Clone)]
pub struct FieldTypeRegistry {
    declared: HashMap<String, FieldType>,
    /// Fields backed by a store index; relevant to the regex-width check.
    indexed: Vec<String>,
    /// Whether wide regexes on unindexed fields are allowed.
    allow_unindexed_regex: bool,
}

impl FieldTypeRegistry {
    /// Registry pre-populated with the engine's storage schema.
    pub fn with_engine_schema() -> Self {
        let mut declared = HashMap::new();
        declared.insert("id".to_string(), FieldType::Str);
        declared.insert("user_id".to_string(), FieldType::Str);
        declared.insert("category".to_string(), FieldType::Str);
        declared.insert("title".to_string(), FieldType::Str);
        declared.insert("content".to_string(), FieldType::Str);
        declared.insert("tags".to_string(), FieldType::StrArray);
        declared.insert("importance".to_string(), FieldType::Num);
        declared.insert("confidence".to_string(), FieldType::Num);
        declared.insert("source_id".to_string(), FieldType::Str);
        declared.insert("source_kind".to_string(), FieldType::Str);
        declared.insert("message_count".to_string(), FieldType::Num);
        declared.insert("created_at".to_string(), FieldType::Timestamp);
        declared.insert("updated_at".to_string(), FieldType::Timestamp);
        declared.insert("last_accessed_at".to_string(), FieldType::Timestamp);
        declared.insert("date_from".to_string(), FieldType::Timestamp);
        declared.insert("date_to".to_string(), FieldType::Timestamp);
        declared.insert("compressed".to_string(), FieldType::Bool);

        Self {
            declared,
            indexed: vec![
                "user_id".to_string(),
                "category".to_string(),
                "tags".to_string(),
                "importance".to_string(),
                "created_at".to_string(),
                "title".to_string(),
                "content".to_string(),
            ],
            allow_unindexed_regex: false,
        }
    }

    /// An empty registry that checks nothing; useful in tests.
    pub fn permissive() -> Self {
        Self {
            declared: HashMap::new(),
            indexed: Vec::new(),
            allow_unindexed_regex: true,
        }
    }

    /// Declare or learn a field's type.
    pub fn learn(&mut self, field: impl Into<String>, ty: FieldType) {
        self.declared.insert(field.into(), ty);
    }

    /// Allow wide regexes against unindexed fields.
    pub fn allow_unindexed_regex(mut self, allow: bool) -> Self {
        self.allow_unindexed_regex = allow;
        self
    }

    pub fn field_type(&self, field: &str) -> Option<FieldType> {
        self.declared.get(field).copied()
    }

    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexed.iter().any(|f| f == field)
    }

    /// Type-check a whole (normalized) tree.
    pub fn check(&self, expr: &FilterExpr) -> Result<(), StrataError> {
        match expr {
            FilterExpr::Leaf(leaf) => self.check_leaf(leaf),
            FilterExpr::Group { children, .. } => {
                for child in children {
                    self.check(child)?;
                }
                Ok(())
            }
        }
    }

    fn check_leaf(&self, leaf: &FilterLeaf) -> Result<(), StrataError> {
        // Presence checks carry no comparable value.
        if matches!(leaf.op, CompareOp::IsNull | CompareOp::IsNotNull) {
            return Ok(());
        }

        // Regex width: refuse patterns with no literal anchor when the
        // target field lacks an index.
        if leaf.op == CompareOp::Regex {
            let pattern = match &leaf.value {
                FilterValue::Str(p) => p,
                other => {
                    return Err(StrataError::FilterType(format!(
                        "regex on `{}` expects a string pattern, got {}",
                        leaf.field,
                        other.shape()
                    )))
                }
            };
            regex::Regex::new(pattern).map_err(|e| {
                StrataError::FilterType(format!("invalid regex on `{}`: {e}", leaf.field))
            })?;
            if !self.allow_unindexed_regex
                && !self.is_indexed(&leaf.field)
                && is_unbounded_pattern(pattern)
            {
                return Err(StrataError::FilterType(format!(
                    "unbounded regex `{pattern}` on unindexed field `{}`",
                    leaf.field
                )));
            }
        }

        let Some(field_ty) = self.field_type(&leaf.field) else {
            // Unknown (typically metadata.*) fields are duck-typed.
            return Ok(());
        };

        match leaf.op {
            CompareOp::Eq | CompareOp::Neq => self.expect_scalar(leaf, field_ty),
            CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
                if !matches!(field_ty, FieldType::Num | FieldType::Timestamp) {
                    return Err(type_error(leaf, field_ty, "an ordered field"));
                }
                self.expect_scalar(leaf, field_ty)
            }
            CompareOp::In | CompareOp::NotIn => self.expect_array_of(leaf, field_ty),
            CompareOp::AnyOf | CompareOp::AllOf | CompareOp::NoneOf => {
                if field_ty != FieldType::StrArray {
                    return Err(StrataError::FilterType(format!(
                        "set operator `{}` requires an array field, but `{}` is {}",
                        leaf.op,
                        leaf.field,
                        field_ty.name()
                    )));
                }
                match &leaf.value {
                    FilterValue::Array(items)
                        if items.iter().all(|i| matches!(i, FilterValue::Str(_))) =>
                    {
                        Ok(())
                    }
                    other => Err(StrataError::FilterType(format!(
                        "set operator `{}` on `{}` expects a string array, got {}",
                        leaf.op,
                        leaf.field,
                        other.shape()
                    ))),
                }
            }
            CompareOp::Contains
            | CompareOp::StartsWith
            | CompareOp::EndsWith
            | CompareOp::Regex => {
                if field_ty != FieldType::Str {
                    return Err(StrataError::FilterType(format!(
                        "text operator `{}` requires a string field, but `{}` is {}",
                        leaf.op,
                        leaf.field,
                        field_ty.name()
                    )));
                }
                match &leaf.value {
                    FilterValue::Str(_) => Ok(()),
                    other => Err(type_error_got(leaf, field_ty, other)),
                }
            }
            // Normalization removed these before checking.
            CompareOp::Between | CompareOp::Within => Ok(()),
            CompareOp::IsNull | CompareOp::IsNotNull => Ok(()),
        }
    }

    fn expect_scalar(&self, leaf: &FilterLeaf, field_ty: FieldType) -> Result<(), StrataError> {
        let ok = matches!(
            (&leaf.value, field_ty),
            (FilterValue::Str(_), FieldType::Str)
                | (FilterValue::Num(_), FieldType::Num)
                | (FilterValue::Bool(_), FieldType::Bool)
                | (FilterValue::Timestamp(_), FieldType::Timestamp)
        );
        if ok {
            Ok(())
        } else {
            Err(type_error_got(leaf, field_ty, &leaf.value))
        }
    }

    fn expect_array_of(&self, leaf: &FilterLeaf, field_ty: FieldType) -> Result<(), StrataError> {
        let FilterValue::Array(items) = &leaf.value else {
            return Err(StrataError::FilterType(format!(
                "membership operator `{}` on `{}` expects an array value, got {}",
                leaf.op,
                leaf.field,
                leaf.value.shape()
            )));
        };
        for item in items {
            let ok = matches!(
                (item, field_ty),
                (FilterValue::Str(_), FieldType::Str)
                    | (FilterValue::Num(_), FieldType::Num)
                    | (FilterValue::Bool(_), FieldType::Bool)
                    | (FilterValue::Timestamp(_), FieldType::Timestamp)
            );
            if !ok {
                return Err(type_error_got(leaf, field_ty, item));
            }
        }
        Ok(())
    }
}

fn type_error(leaf: &FilterLeaf, field_ty: FieldType, expected: &str) -> StrataError {
    StrataError::FilterType(format!(
        "operator `{}` on `{}` requires {expected}; field is {}",
        leaf.op,
        leaf.field,
        field_ty.name()
    ))
}

fn type_error_got(leaf: &FilterLeaf, field_ty: FieldType, got: &FilterValue) -> StrataError {
    StrataError::FilterType(format!(
        "`{}` is {} but filter value is {}",
        leaf.field,
        field_ty.name(),
        got.shape()
    ))
}

/// A regex pattern is "unbounded" when, after stripping a leading `^`, it
/// does not begin with a literal character the store could anchor on.
fn is_unbounded_pattern(pattern: &str) -> bool {
    let stripped = pattern.strip_prefix('^').unwrap_or(pattern);
    match stripped.chars().next() {
        Some(c) if c.is_alphanumeric() || c == '_' || c == ' ' => false,
        Some('\\') => {
            // Escaped literal like `\d` is a class, `\.` is a literal dot.
            matches!(stripped.chars().nth(1), Some(c) if !c.is_alphanumeric())
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::FilterExpr;

    #[test]
    fn schema_fields_accept_matching_values() {
        let reg = FieldTypeRegistry::with_engine_schema();
        assert!(reg.check(&FilterExpr::eq("category", "knowledge")).is_ok());
        assert!(reg.check(&FilterExpr::gte("importance", 0.5)).is_ok());
        assert!(reg
            .check(&FilterExpr::any_of("tags", vec!["python", "rust"]))
            .is_ok());
    }

    #[test]
    fn mismatched_value_types_are_rejected() {
        let reg = FieldTypeRegistry::with_engine_schema();
        let err = reg
            .check(&FilterExpr::eq("importance", "high"))
            .unwrap_err();
        assert!(matches!(err, StrataError::FilterType(_)));
        assert!(err.to_string().contains("importance"));
    }

    #[test]
    fn ordering_on_string_field_is_rejected() {
        let reg = FieldTypeRegistry::with_engine_schema();
        assert!(matches!(
            reg.check(&FilterExpr::gt("category", "a")),
            Err(StrataError::FilterType(_))
        ));
    }

    #[test]
    fn set_operator_on_scalar_field_is_rejected() {
        let reg = FieldTypeRegistry::with_engine_schema();
        assert!(matches!(
            reg.check(&FilterExpr::any_of("category", vec!["a"])),
            Err(StrataError::FilterType(_))
        ));
    }

    #[test]
    fn unknown_metadata_fields_are_duck_typed() {
        let reg = FieldTypeRegistry::with_engine_schema();
        assert!(reg
            .check(&FilterExpr::eq("metadata.department", "engineering"))
            .is_ok());
    }

    #[test]
    fn learned_metadata_field_is_checked() {
        let mut reg = FieldTypeRegistry::with_engine_schema();
        reg.learn("metadata.priority", FieldType::Num);
        assert!(matches!(
            reg.check(&FilterExpr::eq("metadata.priority", "urgent")),
            Err(StrataError::FilterType(_))
        ));
        assert!(reg.check(&FilterExpr::eq("metadata.priority", 3_i64)).is_ok());
    }

    #[test]
    fn unbounded_regex_on_unindexed_field_is_refused() {
        let reg = FieldTypeRegistry::with_engine_schema();
        // source_id is not indexed; `.*` has no literal anchor.
        assert!(matches!(
            reg.check(&FilterExpr::regex("source_id", ".*chat.*")),
            Err(StrataError::FilterType(_))
        ));
        // Indexed field is fine.
        assert!(reg.check(&FilterExpr::regex("content", ".*vector.*")).is_ok());
        // Anchored literal prefix is fine anywhere.
        assert!(reg
            .check(&FilterExpr::regex("source_id", "^chat-[0-9]+"))
            .is_ok());
    }

    #[test]
    fn invalid_regex_is_a_filter_type_error() {
        let reg = FieldTypeRegistry::with_engine_schema();
        assert!(matches!(
            reg.check(&FilterExpr::regex("content", "([unclosed")),
            Err(StrataError::FilterType(_))
        ));
    }
}
