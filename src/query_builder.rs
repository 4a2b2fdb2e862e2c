//! Query builder that converts a FilterSpec into a parameterized query for the
//! document store's SQL dialect.
//!
//! Field paths are always rendered in bracket form (`r["a"]["b"]`) because bare
//! dotted identifiers clash with reserved words such as `Value`.

use crate::ast::{Condition, FieldFilter, FieldPath, FilterExpr, FilterSpec, ParsedValue, QueryOptions, SortOrder};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Alias of the root document in every generated query
pub const ROOT_ALIAS: &str = "r";

/// A named query parameter, e.g. `{"name": "@foo", "value": "bar"}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlParameter {
    pub name: String,
    pub value: Value,
}

/// Query text plus its parameters, in the shape the store client expects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuerySpec {
    pub query: String,
    pub parameters: Vec<SqlParameter>,
}

/// Transforms `a.b.c` into `["a"]["b"]["c"]`.
pub fn keyify(path: &str) -> String {
    keyify_segments(path.split('.'))
}

fn keyify_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for segment in segments {
        out.push_str("[\"");
        for c in segment.chars() {
            if c == '"' || c == '\\' {
                out.push('\\');
            }
            out.push(c);
        }
        out.push_str("\"]");
    }
    out
}

/// Lookup of a single document by one top-level property, bound as `@id`.
pub fn query_by_property(property: &str, value: impl Into<Value>) -> SqlQuerySpec {
    SqlQuerySpec {
        query: format!(
            "SELECT * FROM root {alias} WHERE {alias}{} = @id",
            keyify(property),
            alias = ROOT_ALIAS
        ),
        parameters: vec![SqlParameter {
            name: "@id".to_string(),
            value: value.into(),
        }],
    }
}

/// The SELECT statement shape the store supports.
struct SelectStatement {
    top: Option<u64>,
    conditions: Vec<String>,
    order_by: Option<(String, Option<SortOrder>)>,
}

impl SelectStatement {
    fn new() -> Self {
        Self {
            top: None,
            conditions: Vec::new(),
            order_by: None,
        }
    }

    fn top(&mut self, n: u64) -> &mut Self {
        if n > 0 {
            self.top = Some(n);
        }
        self
    }

    fn and_where(&mut self, condition: String) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    fn order_by(&mut self, column: String, order: Option<SortOrder>) -> &mut Self {
        self.order_by = Some((column, order));
        self
    }
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if let Some(top) = self.top {
            write!(f, "TOP {} ", top)?;
        }
        write!(f, "* FROM root {}", ROOT_ALIAS)?;
        if !self.conditions.is_empty() {
            write!(f, " WHERE {}", self.conditions.join(" AND "))?;
        }
        if let Some((column, order)) = &self.order_by {
            write!(f, " ORDER BY {}", column)?;
            if let Some(order) = order {
                write!(f, " {}", order.as_sql())?;
            }
        }
        Ok(())
    }
}

/// Hands out parameter name bases that never collide within one query.
#[derive(Default)]
struct ParamNames {
    used: HashSet<String>,
}

impl ParamNames {
    /// Reserves `@<base>` (scalar) or `@<base>_0..@<base>_{n-1}` (list).
    ///
    /// Paths that strip to an identifier already in use get a `__<n>` suffix.
    fn reserve(&mut self, stem: &str, list_len: Option<usize>) -> String {
        let mut base = stem.to_string();
        let mut n = 1;
        loop {
            let names = Self::names_for(&base, list_len);
            if names.iter().all(|name| !self.used.contains(name)) {
                self.used.extend(names);
                return base;
            }
            base = format!("{}__{}", stem, n);
            n += 1;
        }
    }

    fn names_for(base: &str, list_len: Option<usize>) -> Vec<String> {
        match list_len {
            None => vec![format!("@{}", base)],
            Some(len) => (0..len).map(|i| format!("@{}_{}", base, i)).collect(),
        }
    }
}

/// Builds parameterized queries from filter specs.
///
/// Pure and deterministic: no I/O and no shared state, so one builder can be
/// used from any number of threads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuilder {
    /// Attribute that wraps user fields in stored documents, e.g. `data`
    data_attribute: Option<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor every filter and ORDER BY path under `attribute`.
    pub fn with_data_attribute(attribute: impl Into<String>) -> Self {
        let attribute = attribute.into();
        Self {
            data_attribute: (!attribute.is_empty()).then_some(attribute),
        }
    }

    pub fn data_attribute(&self) -> Option<&str> {
        self.data_attribute.as_deref()
    }

    /// Compile a FilterSpec and QueryOptions into query text and parameters.
    pub fn build(&self, spec: &FilterSpec, options: &QueryOptions) -> SqlQuerySpec {
        let mut select = SelectStatement::new();
        select.top(options.top());

        let mut parameters = Vec::new();
        let mut names = ParamNames::default();
        for filter in &spec.fields {
            if let Some(condition) = self.compile_field_filter(filter, &mut names, &mut parameters) {
                select.and_where(condition);
            }
        }

        if let Some(order_by) = options.order_by() {
            let order = options.sort_order();
            if order.is_none() {
                if let Some(sort_by) = options.sort_by.as_deref() {
                    tracing::debug!(sort_by, "ignoring unrecognized SORTBY value");
                }
            }
            select.order_by(self.column(&FieldPath::from(order_by)), order);
        }

        let query = select.to_string();
        tracing::trace!(query = %query, parameters = parameters.len(), "built query");

        SqlQuerySpec { query, parameters }
    }

    /// Compile one field's condition: a bare comparison for scalars, a
    /// parenthesized group for lists. An empty list contributes nothing.
    fn compile_field_filter(
        &self,
        filter: &FieldFilter,
        names: &mut ParamNames,
        parameters: &mut Vec<SqlParameter>,
    ) -> Option<String> {
        let column = self.column(&filter.field);
        let stem = filter.field.identifier();

        match &filter.condition {
            Condition::Single(expr) => {
                let name = format!("@{}", names.reserve(&stem, None));
                Some(self.compile_comparison(&column, expr.parsed(), name, parameters))
            }
            Condition::List(exprs) if exprs.is_empty() => {
                tracing::debug!(field = filter.field.as_str(), "skipping empty condition list");
                None
            }
            Condition::List(exprs) => {
                let base = names.reserve(&stem, Some(exprs.len()));
                let conjunction = conjunction(exprs);
                let conditions: Vec<String> = exprs
                    .iter()
                    .enumerate()
                    .map(|(i, expr)| {
                        let name = format!("@{}_{}", base, i);
                        self.compile_comparison(&column, expr.parsed(), name, parameters)
                    })
                    .collect();
                Some(format!("({})", conditions.join(&format!(" {} ", conjunction))))
            }
        }
    }

    /// Compile a comparison and record its parameter
    fn compile_comparison(
        &self,
        column: &str,
        parsed: ParsedValue,
        name: String,
        parameters: &mut Vec<SqlParameter>,
    ) -> String {
        let condition = format!("{} {} {}", column, parsed.op.as_sql(), name);
        parameters.push(SqlParameter {
            name,
            value: parsed.literal.to_json(),
        });
        condition
    }

    /// `r` followed by the bracketed path, anchored under the data attribute
    fn column(&self, path: &FieldPath) -> String {
        let prefix = self.data_attribute.iter().flat_map(|attr| attr.split('.'));
        format!("{}{}", ROOT_ALIAS, keyify_segments(prefix.chain(path.segments())))
    }
}

/// `OR` when every expression is an equality, otherwise `AND` for the whole list
fn conjunction(exprs: &[FilterExpr]) -> &'static str {
    if exprs.iter().any(|e| e.op().is_relational()) {
        "AND"
    } else {
        "OR"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use serde_json::json;

    fn build_json(filter: Value, options: Value) -> SqlQuerySpec {
        let spec = FilterSpec::from_json(&filter).unwrap();
        let options = QueryOptions::from_json(&options).unwrap();
        QueryBuilder::new().build(&spec, &options)
    }

    fn param(name: &str, value: Value) -> SqlParameter {
        SqlParameter {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn test_keyify() {
        assert_eq!(keyify("a.b.c"), r#"["a"]["b"]["c"]"#);
        assert_eq!(keyify("Value"), r#"["Value"]"#);
    }

    #[test]
    fn test_keyify_escapes_quotes() {
        assert_eq!(keyify(r#"we"ird"#), r#"["we\"ird"]"#);
        assert_eq!(keyify(r"back\slash"), r#"["back\\slash"]"#);
    }

    #[test]
    fn test_empty_filter() {
        let result = build_json(json!({}), json!({}));
        assert_eq!(result.query, "SELECT * FROM root r");
        assert!(result.parameters.is_empty());
    }

    #[test]
    fn test_scalar_equality() {
        let result = build_json(json!({"foo": "bar"}), json!({}));
        assert_eq!(result.query, r#"SELECT * FROM root r WHERE r["foo"] = @foo"#);
        assert_eq!(result.parameters, vec![param("@foo", json!("bar"))]);
    }

    #[test]
    fn test_nested_path() {
        let result = build_json(json!({"a.b.c": "baz"}), json!({}));
        assert_eq!(result.query, r#"SELECT * FROM root r WHERE r["a"]["b"]["c"] = @abc"#);
        assert_eq!(result.parameters, vec![param("@abc", json!("baz"))]);
    }

    #[test]
    fn test_list_of_equals_uses_or() {
        let result = build_json(json!({"foo": ["bar", "baz"]}), json!({}));
        assert_eq!(
            result.query,
            r#"SELECT * FROM root r WHERE (r["foo"] = @foo_0 OR r["foo"] = @foo_1)"#
        );
        assert_eq!(
            result.parameters,
            vec![param("@foo_0", json!("bar")), param("@foo_1", json!("baz"))]
        );
    }

    #[test]
    fn test_range_pair_uses_and() {
        let result = build_json(json!({"ts": ["gt(314)", "lt(666)"]}), json!({}));
        assert_eq!(
            result.query,
            r#"SELECT * FROM root r WHERE (r["ts"] > @ts_0 AND r["ts"] < @ts_1)"#
        );
        assert_eq!(
            result.parameters,
            vec![param("@ts_0", json!(314)), param("@ts_1", json!(666))]
        );
    }

    #[test]
    fn test_one_range_makes_whole_list_and() {
        let result = build_json(json!({"n": [1, "gte(2)", 3]}), json!({}));
        assert_eq!(
            result.query,
            r#"SELECT * FROM root r WHERE (r["n"] = @n_0 AND r["n"] >= @n_1 AND r["n"] = @n_2)"#
        );
    }

    #[test]
    fn test_scalar_range() {
        let result = build_json(json!({"age": "lte(30)"}), json!({}));
        assert_eq!(result.query, r#"SELECT * FROM root r WHERE r["age"] <= @age"#);
        assert_eq!(result.parameters, vec![param("@age", json!(30))]);
    }

    #[test]
    fn test_malformed_range_degrades_to_string_equality() {
        let result = build_json(json!({"x": "lt(abc)"}), json!({}));
        assert_eq!(result.query, r#"SELECT * FROM root r WHERE r["x"] = @x"#);
        assert_eq!(result.parameters, vec![param("@x", json!("lt(abc)"))]);
    }

    #[test]
    fn test_multiple_fields_joined_with_and() {
        let result = build_json(
            json!({"type": "user", "age": ["gte(18)", "lt(65)"], "active": true}),
            json!({}),
        );
        assert_eq!(
            result.query,
            r#"SELECT * FROM root r WHERE r["type"] = @type AND (r["age"] >= @age_0 AND r["age"] < @age_1) AND r["active"] = @active"#
        );
        let names: Vec<_> = result.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@type", "@age_0", "@age_1", "@active"]);
        assert_eq!(result.parameters[3].value, json!(true));
    }

    #[test]
    fn test_limit_and_offset_combine() {
        let result = build_json(json!({}), json!({"LIMIT": 10, "OFFSET": 5}));
        assert!(result.query.starts_with("SELECT TOP 15 *"));

        let only_offset = build_json(json!({}), json!({"OFFSET": 3}));
        assert_eq!(only_offset.query, "SELECT TOP 3 * FROM root r");

        let zero = build_json(json!({}), json!({"LIMIT": 0}));
        assert_eq!(zero.query, "SELECT * FROM root r");
    }

    #[test]
    fn test_order_by_with_direction() {
        let result = build_json(
            json!({"foo": "bar"}),
            json!({"LIMIT": 10, "OFFSET": 10, "ORDERBY": "foo", "SORTBY": "DESC"}),
        );
        assert_eq!(
            result.query,
            r#"SELECT TOP 20 * FROM root r WHERE r["foo"] = @foo ORDER BY r["foo"] DESC"#
        );
    }

    #[test]
    fn test_order_by_with_invalid_sort() {
        let result = build_json(
            json!({"foo": "bar"}),
            json!({"ORDERBY": "foo", "SORTBY": "invalid"}),
        );
        assert!(result.query.ends_with(r#"ORDER BY r["foo"]"#));

        let lowercase = build_json(json!({}), json!({"ORDERBY": "a.b", "SORTBY": "asc"}));
        assert_eq!(lowercase.query, r#"SELECT * FROM root r ORDER BY r["a"]["b"]"#);
    }

    #[test]
    fn test_non_string_sort_options_are_ignored() {
        let result = build_json(json!({"foo": "bar"}), json!({"ORDERBY": "foo", "SORTBY": 1}));
        assert_eq!(
            result.query,
            r#"SELECT * FROM root r WHERE r["foo"] = @foo ORDER BY r["foo"]"#
        );

        let result = build_json(json!({}), json!({"ORDERBY": 5, "SORTBY": "ASC"}));
        assert_eq!(result.query, "SELECT * FROM root r");
    }

    #[test]
    fn test_empty_list_condition_is_skipped() {
        let spec = FilterSpec::new()
            .with("x", Vec::<FilterExpr>::new())
            .with("y", "z");
        let result = QueryBuilder::new().build(&spec, &QueryOptions::default());
        assert_eq!(result.query, r#"SELECT * FROM root r WHERE r["y"] = @y"#);
        assert_eq!(result.parameters, vec![param("@y", json!("z"))]);

        let only_empty = FilterSpec::new().with("x", Vec::<FilterExpr>::new());
        let result = QueryBuilder::new().build(&only_empty, &QueryOptions::default());
        assert_eq!(result.query, "SELECT * FROM root r");
        assert!(result.parameters.is_empty());
    }

    #[test]
    fn test_sort_without_order_by_is_ignored() {
        let result = build_json(json!({}), json!({"ORDERBY": "", "SORTBY": "ASC"}));
        assert_eq!(result.query, "SELECT * FROM root r");
    }

    #[test]
    fn test_data_attribute_anchors_paths() {
        let builder = QueryBuilder::with_data_attribute("data");
        let spec = FilterSpec::new().with("foo.bar", "x");
        let options = QueryOptions {
            order_by: Some("foo".to_string()),
            sort_by: Some("ASC".to_string()),
            ..Default::default()
        };
        let result = builder.build(&spec, &options);
        assert_eq!(
            result.query,
            r#"SELECT * FROM root r WHERE r["data"]["foo"]["bar"] = @foobar ORDER BY r["data"]["foo"] ASC"#
        );
    }

    #[test]
    fn test_empty_data_attribute_is_none() {
        assert_eq!(QueryBuilder::with_data_attribute("").data_attribute(), None);
    }

    #[test]
    fn test_colliding_identifiers_get_suffix() {
        let result = build_json(json!({"ab.c": 1, "a.bc": 2}), json!({}));
        assert_eq!(
            result.query,
            r#"SELECT * FROM root r WHERE r["ab"]["c"] = @abc AND r["a"]["bc"] = @abc__1"#
        );
        let names: Vec<_> = result.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@abc", "@abc__1"]);
    }

    #[test]
    fn test_scalar_name_does_not_collide_with_list_names() {
        let result = build_json(json!({"foo": ["a", "b"], "foo_1": "c"}), json!({}));
        let names: Vec<_> = result.parameters.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["@foo_0", "@foo_1", "@foo_1__1"]);
    }

    #[test]
    fn test_typed_equals_keeps_range_looking_string() {
        let spec = FilterSpec::new().with("x", FilterExpr::Equals(Literal::from("lt(5)")));
        let result = QueryBuilder::new().build(&spec, &QueryOptions::default());
        assert_eq!(result.query, r#"SELECT * FROM root r WHERE r["x"] = @x"#);
        assert_eq!(result.parameters, vec![param("@x", json!("lt(5)"))]);
    }

    #[test]
    fn test_build_is_deterministic() {
        let spec = FilterSpec::from_json(&json!({"b": [1, 2], "a.z": "gt(3)"})).unwrap();
        let options = QueryOptions::from_json(&json!({"LIMIT": 2, "ORDERBY": "a.z"})).unwrap();
        let builder = QueryBuilder::new();
        assert_eq!(builder.build(&spec, &options), builder.build(&spec, &options));
    }

    #[test]
    fn test_query_by_property() {
        let result = query_by_property("id", "db-id");
        assert_eq!(result.query, r#"SELECT * FROM root r WHERE r["id"] = @id"#);
        assert_eq!(result.parameters, vec![param("@id", json!("db-id"))]);
    }

    #[test]
    fn test_query_spec_serializes_for_the_wire() {
        let result = build_json(json!({"foo": "bar"}), json!({}));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "query": "SELECT * FROM root r WHERE r[\"foo\"] = @foo",
                "parameters": [{"name": "@foo", "value": "bar"}]
            })
        );
    }
}
