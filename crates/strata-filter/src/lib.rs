// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Composable metadata filter algebra for the Strata memory engine.
//!
//! A filter is a tree of leaf conditions (field, operator, value) combined
//! with AND / OR / NOT groups. Trees are built through the fluent
//! [`FilterExpr`] constructors, compiled once per query into a store-side
//! SQL predicate and a cache-side tag query, and evaluated in memory with
//! bit-identical semantics for cached candidate sets.
//!
//! ## Pipeline
//!
//! 1. Build: `FilterExpr::and(vec![FilterExpr::eq("category", "knowledge"), ...])`
//! 2. Normalize: collapse/flatten groups, expand `between`, resolve
//!    temporal sugar against a single clock instant
//! 3. Type-check against the [`FieldTypeRegistry`]
//! 4. Lower to [`SqlPredicate`] / [`TagQuery`]

pub mod compile;
pub mod eval;
pub mod expr;
pub mod normalize;
pub mod registry;
pub mod value;

pub use compile::{compile, compile_now, CompiledFilter, SqlParam, SqlPredicate, TagQuery};
pub use eval::evaluate;
pub use expr::{CompareOp, FilterExpr, FilterLeaf, GroupOp};
pub use normalize::normalize;
pub use registry::{FieldType, FieldTypeRegistry};
pub use value::FilterValue;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn compile_then_decompile_is_idempotent() {
        // Serializing a compiled filter's tree and parsing it back yields
        // the same tree, and recompiling yields the same predicate.
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let registry = FieldTypeRegistry::with_engine_schema();
        let f = FilterExpr::and(vec![
            FilterExpr::eq("category", "knowledge"),
            FilterExpr::between("importance", 0.5, 1.0),
            FilterExpr::recent("created_at", 7),
        ]);
        let compiled = compile(&f, &registry, now).unwrap();
        let serialized = compiled.canonical_json();
        let reparsed: FilterExpr = serde_json::from_str(&serialized).unwrap();
        assert_eq!(&reparsed, compiled.expr());

        let recompiled = compile(&reparsed, &registry, now).unwrap();
        assert_eq!(
            recompiled.sql().where_sql,
            compiled.sql().where_sql
        );
        assert_eq!(recompiled.canonical_json(), serialized);
    }

    #[test]
    fn in_memory_and_sql_lowering_cover_same_tree() {
        // Every operator the evaluator accepts must lower to SQL without
        // error once normalized.
        let now = Utc::now();
        let registry = FieldTypeRegistry::with_engine_schema();
        let exprs = vec![
            FilterExpr::eq("category", "knowledge"),
            FilterExpr::neq("category", "other"),
            FilterExpr::lt("importance", 0.9),
            FilterExpr::lte("importance", 0.9),
            FilterExpr::gt("importance", 0.1),
            FilterExpr::gte("importance", 0.1),
            FilterExpr::between("importance", 0.1, 0.9),
            FilterExpr::in_list("category", vec!["knowledge", "skill"]),
            FilterExpr::not_in("category", vec!["other"]),
            FilterExpr::any_of("tags", vec!["a"]),
            FilterExpr::all_of("tags", vec!["a", "b"]),
            FilterExpr::none_of("tags", vec!["c"]),
            FilterExpr::contains("content", "x"),
            FilterExpr::starts_with("title", "x"),
            FilterExpr::ends_with("title", "x"),
            FilterExpr::regex("content", "^x"),
            FilterExpr::is_null("metadata.absent"),
            FilterExpr::is_not_null("category"),
            FilterExpr::recent("created_at", 1),
        ];
        for expr in exprs {
            compile(&expr, &registry, now).unwrap_or_else(|e| {
                panic!("failed to compile {expr:?}: {e}");
            });
        }
    }
}
