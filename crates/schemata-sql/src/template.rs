//! SQL template rendering.
//!
//! A template is SQL text with placeholders, rendered together with a
//! parallel list of [`Value`]s into a [`Query`]: SQL with `:1`, `:2`, ... or
//! `:name` bind markers plus the flat list of [`BaseValue`]s to bind.
//!
//! ## Placeholder syntax
//!
//! | Placeholder | Meaning |
//! |---|---|
//! | `{{` | a literal `{` |
//! | `{}` | the next anonymous value, left to right |
//! | `{3}` | the third value (1-based); scalars reuse one slot per ordinal |
//! | `{name}` | the value passed as `Value::parameter("name", ..)` |
//! | `{*}` | the column expressions a row decoder reads (see [`Query::with_fetch_expressions`]) |
//!
//! Referenced values expand recursively: a named scalar becomes `:name`, an
//! expression is rendered in place with its own values, and a list expands
//! each element joined by `", "`.
//!
//! ```
//! use schemata_sql::template::Query;
//! use schemata_sql::value::{BaseValue, Value};
//!
//! let query = Query::new(
//!     "SELECT * FROM users WHERE age > {} AND id IN ({})",
//!     &[Value::from(18), Value::list([1, 2])],
//! )
//! .unwrap();
//! assert_eq!(query.base_sql, "SELECT * FROM users WHERE age > :1 AND id IN (:2, :3)");
//! assert_eq!(query.base_values[0], BaseValue::Int(18));
//! ```

use std::collections::HashMap;

use thiserror::Error;

use crate::value::{BaseValue, Value};

/// A template could not be rendered.
///
/// Always raised before any I/O; carries the offending SQL fragment and the
/// values that were passed with it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} (sql: {sql:?})")]
pub struct QueryBuildingError {
    pub message: String,
    pub sql: String,
    pub values: Vec<Value>,
}

impl QueryBuildingError {
    fn new(message: impl Into<String>, sql: &str, values: &[Value]) -> Self {
        Self {
            message: message.into(),
            sql: sql.to_string(),
            values: values.to_vec(),
        }
    }
}

impl From<QueryBuildingError> for schemata_core::SchemaError {
    fn from(err: QueryBuildingError) -> Self {
        let values: Vec<String> = err.values.iter().map(ToString::to_string).collect();
        Self::QueryBuilding(format!(
            "{} (sql: {:?}, values: [{}])",
            err.message,
            err.sql,
            values.join(", ")
        ))
    }
}

/// A rendered, bindable statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Query {
    /// The SQL with bind markers.
    pub base_sql: String,
    /// Values for each marker, in marker order.
    pub base_values: Vec<BaseValue>,
    /// Slots in `base_values` bound through each named parameter.
    pub parameter_indices: HashMap<String, Vec<usize>>,
}

impl Query {
    /// Renders `sql` against `values`.
    pub fn new(sql: &str, values: &[Value]) -> Result<Self, QueryBuildingError> {
        Self::with_fetch_expressions(sql, values, &[])
    }

    /// Renders `sql`, substituting the first `{*}` with `fetch_expressions`
    /// joined by `", "`.
    ///
    /// The text before and after `{*}` shares one anonymous cursor and one
    /// ordinal memo, so `{}` and `{N}` behave as though `{*}` were not there.
    pub fn with_fetch_expressions(
        sql: &str,
        values: &[Value],
        fetch_expressions: &[Value],
    ) -> Result<Self, QueryBuildingError> {
        let mut builder = Builder::default();
        match split_star(sql) {
            None => builder.append_sql(sql, values)?,
            Some((head, tail)) => {
                let mut cursors = Cursors::default();
                builder.append_template(head, values, &mut cursors)?;
                for (i, expression) in fetch_expressions.iter().enumerate() {
                    if i > 0 {
                        builder.sql.push_str(", ");
                    }
                    builder.append_value(expression)?;
                }
                builder.append_template(tail, values, &mut cursors)?;
            }
        }
        Ok(builder.finish())
    }

    /// Returns the bind values with each named parameter in `parameters`
    /// replaced at every slot it was bound to.
    ///
    /// Names the query does not use are ignored. Slots keep their
    /// `Parameter` wrapper so the driver still binds them by name.
    pub fn rebind(&self, parameters: &HashMap<String, BaseValue>) -> Vec<BaseValue> {
        let mut values = self.base_values.clone();
        for (name, value) in parameters {
            let Some(indices) = self.parameter_indices.get(name) else {
                continue;
            };
            for &index in indices {
                if let Some(slot) = values.get_mut(index) {
                    *slot = match &*slot {
                        BaseValue::Parameter(slot_name, _) => {
                            BaseValue::parameter(slot_name.clone(), value.clone())
                        }
                        _ => value.clone(),
                    };
                }
            }
        }
        values
    }

    /// Wraps this query as `SELECT EXISTS (<query>)`.
    #[must_use]
    pub fn exists(self) -> Self {
        Self {
            base_sql: format!("SELECT EXISTS ({})", self.base_sql),
            ..self
        }
    }
}

/// Finds the first `{*}` that is not part of an escaped `{{`.
fn split_star(sql: &str) -> Option<(&str, &str)> {
    let mut from = 0;
    while let Some(pos) = sql[from..].find("{*}") {
        let at = from + pos;
        if !sql[..at].ends_with('{') {
            return Some((&sql[..at], &sql[at + 3..]));
        }
        from = at + 1;
    }
    None
}

fn is_valid_parameter_name(name: &str) -> bool {
    name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Per-template cursor state. Nested expressions get their own.
#[derive(Debug, Default)]
struct Cursors {
    anonymous: usize,
    /// Ordinal (1-based) to slot in the output values.
    ordinals: HashMap<usize, usize>,
}

/// Output state shared by a template and every expression nested in it.
#[derive(Debug, Default)]
struct Builder {
    sql: String,
    values: Vec<BaseValue>,
    parameter_indices: HashMap<String, Vec<usize>>,
}

impl Builder {
    fn finish(self) -> Query {
        Query {
            base_sql: self.sql,
            base_values: self.values,
            parameter_indices: self.parameter_indices,
        }
    }

    fn push_slot(&mut self, value: BaseValue) -> usize {
        self.values.push(value);
        let slot = self.values.len();
        self.sql.push(':');
        self.sql.push_str(&slot.to_string());
        slot - 1
    }

    fn append_sql(&mut self, sql: &str, values: &[Value]) -> Result<(), QueryBuildingError> {
        self.append_template(sql, values, &mut Cursors::default())
    }

    fn append_value(&mut self, value: &Value) -> Result<(), QueryBuildingError> {
        if let Some(base) = value.to_base_value() {
            self.push_slot(base);
            return Ok(());
        }
        match value {
            Value::Parameter(name, inner) => match inner.to_base_value() {
                Some(base) => {
                    self.sql.push(':');
                    self.sql.push_str(name);
                    if let Some(indices) = self.parameter_indices.get(name) {
                        for &index in indices {
                            self.values[index] = BaseValue::parameter(name.clone(), base.clone());
                        }
                    } else {
                        self.values.push(BaseValue::parameter(name.clone(), base));
                        self.parameter_indices
                            .insert(name.clone(), vec![self.values.len() - 1]);
                    }
                    Ok(())
                }
                None => self.append_value(inner),
            },
            Value::Expression(sql, values) => self.append_sql(sql, values),
            Value::List(values) => {
                for (i, item) in values.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.append_value(item)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn append_template(
        &mut self,
        sql: &str,
        values: &[Value],
        cursors: &mut Cursors,
    ) -> Result<(), QueryBuildingError> {
        let named = named_values(sql, values)?;

        let mut rest = sql;
        while let Some(open) = rest.find('{') {
            self.sql.push_str(&rest[..open]);
            rest = &rest[open + 1..];

            if let Some(after) = rest.strip_prefix('{') {
                self.sql.push('{');
                rest = after;
                continue;
            }

            let Some(close) = rest.find('}') else {
                return Err(QueryBuildingError::new("no matching '}' found", sql, values));
            };
            let name = &rest[..close];
            rest = &rest[close + 1..];

            if !is_valid_parameter_name(name) {
                return Err(QueryBuildingError::new(
                    format!(
                        "{name} is not a valid parameter name (only letters, digits and '_' are allowed)"
                    ),
                    sql,
                    values,
                ));
            }

            // {}
            if name.is_empty() {
                let Some(value) = values.get(cursors.anonymous) else {
                    return Err(QueryBuildingError::new(
                        format!(
                            "too few values passed in, expected more than {}",
                            cursors.anonymous
                        ),
                        sql,
                        values,
                    ));
                };
                cursors.anonymous += 1;
                self.append_value(value)?;
                continue;
            }

            // {1}, {2}, ...
            if let Ok(ordinal) = name.parse::<usize>() {
                let Some(value) = ordinal.checked_sub(1).and_then(|i| values.get(i)) else {
                    return Err(QueryBuildingError::new(
                        format!("ordinal parameter {{{ordinal}}} is out of bounds"),
                        sql,
                        values,
                    ));
                };
                match value.to_base_value() {
                    Some(base) => {
                        if let Some(&slot) = cursors.ordinals.get(&ordinal) {
                            self.sql.push(':');
                            self.sql.push_str(&(slot + 1).to_string());
                        } else {
                            let slot = self.push_slot(base);
                            cursors.ordinals.insert(ordinal, slot);
                        }
                    }
                    None => self.append_value(value)?,
                }
                continue;
            }

            // {name}
            if let Some(&index) = named.get(name) {
                self.append_value(&values[index])?;
                continue;
            }
            return Err(missing_name_error(name, sql, values));
        }
        self.sql.push_str(rest);
        Ok(())
    }
}

/// Indexes the named values passed with a template, rejecting empty and
/// duplicate names.
fn named_values<'a>(
    sql: &str,
    values: &'a [Value],
) -> Result<HashMap<&'a str, usize>, QueryBuildingError> {
    let mut named = HashMap::new();
    for (i, value) in values.iter().enumerate() {
        let Value::Parameter(name, _) = value else {
            continue;
        };
        if name.is_empty() {
            return Err(QueryBuildingError::new(
                "parameter name cannot be empty",
                sql,
                values,
            ));
        }
        if named.insert(name.as_str(), i).is_some() {
            return Err(QueryBuildingError::new(
                format!("parameter name {{{name}}} provided more than once"),
                sql,
                values,
            ));
        }
    }
    Ok(named)
}

fn missing_name_error(name: &str, sql: &str, values: &[Value]) -> QueryBuildingError {
    let available: Vec<&str> = values
        .iter()
        .filter_map(|v| match v {
            Value::Parameter(n, _) => Some(n.as_str()),
            _ => None,
        })
        .collect();
    let message = if available.is_empty() {
        format!("parameter name {{{name}}} not provided")
    } else {
        format!(
            "parameter name {{{name}}} not provided (available names: {})",
            available.join(", ")
        )
    };
    QueryBuildingError::new(message, sql, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sql: &str, values: &[Value]) -> Query {
        Query::new(sql, values).unwrap()
    }

    fn error(sql: &str, values: &[Value]) -> String {
        Query::new(sql, values).unwrap_err().message
    }

    // ── Anonymous placeholders ──────────────────────────────────────

    #[test]
    fn test_no_placeholders() {
        let q = query("SELECT 1", &[]);
        assert_eq!(q.base_sql, "SELECT 1");
        assert!(q.base_values.is_empty());
        assert!(q.parameter_indices.is_empty());
    }

    #[test]
    fn test_escaped_brace() {
        let q = query("SELECT {} = '{{}'", &[Value::from("{}")]);
        assert_eq!(q.base_sql, "SELECT :1 = '{}'");
        assert_eq!(q.base_values, vec![BaseValue::String("{}".into())]);
    }

    #[test]
    fn test_anonymous_in_order() {
        let q = query(
            "INSERT INTO t (a, b, c) VALUES ({}, {}, {})",
            &[Value::from(1), Value::Null, Value::from(true)],
        );
        assert_eq!(q.base_sql, "INSERT INTO t (a, b, c) VALUES (:1, :2, :3)");
        assert_eq!(
            q.base_values,
            vec![BaseValue::Int(1), BaseValue::Null, BaseValue::Bool(true)]
        );
    }

    #[test]
    fn test_anonymous_list_expands() {
        let q = query("SELECT * FROM t WHERE id IN ({})", &[Value::list([5, 6, 7])]);
        assert_eq!(q.base_sql, "SELECT * FROM t WHERE id IN (:1, :2, :3)");
        assert_eq!(q.base_values.len(), 3);
    }

    #[test]
    fn test_empty_list_expands_to_nothing() {
        let q = query("SELECT ({})", &[Value::list(Vec::<i32>::new())]);
        assert_eq!(q.base_sql, "SELECT ()");
    }

    #[test]
    fn test_too_few_values() {
        let msg = error("SELECT {}, {}", &[Value::from(1)]);
        assert_eq!(msg, "too few values passed in, expected more than 1");
    }

    #[test]
    fn test_extra_values_are_ignored() {
        let q = query("SELECT {}", &[Value::from(1), Value::from(2)]);
        assert_eq!(q.base_sql, "SELECT :1");
        assert_eq!(q.base_values.len(), 1);
    }

    // ── Ordinal placeholders ────────────────────────────────────────

    #[test]
    fn test_ordinal_reuses_slot() {
        let q = query("SELECT {1}, {1}, {1}", &[Value::from("x")]);
        assert_eq!(q.base_sql, "SELECT :1, :1, :1");
        assert_eq!(q.base_values.len(), 1);
    }

    #[test]
    fn test_ordinal_out_of_bounds() {
        assert_eq!(
            error("SELECT {2}", &[Value::from(1)]),
            "ordinal parameter {2} is out of bounds"
        );
        assert_eq!(
            error("SELECT {0}", &[Value::from(1)]),
            "ordinal parameter {0} is out of bounds"
        );
    }

    #[test]
    fn test_ordinal_mixed_with_lists() {
        let values = [
            Value::from(1),
            Value::from(2),
            Value::from(3),
            Value::from(4),
            Value::from(5),
            Value::list([10, 20, 30]),
        ];
        let q = query("SELECT {5} WHERE {5} AND a IN ({6}) OR b IN ({6})", &values);
        assert_eq!(
            q.base_sql,
            "SELECT :1 WHERE :1 AND a IN (:2, :3, :4) OR b IN (:5, :6, :7)"
        );
        assert_eq!(q.base_values.len(), 7);
        assert_eq!(q.base_values[0], BaseValue::Int(5));
        assert_eq!(q.base_values[4], BaseValue::Int(10));
    }

    #[test]
    fn test_ordinal_and_anonymous_are_independent() {
        let q = query("SELECT {}, {1}, {}", &[Value::from(1), Value::from(2)]);
        assert_eq!(q.base_sql, "SELECT :1, :2, :3");
        assert_eq!(
            q.base_values,
            vec![BaseValue::Int(1), BaseValue::Int(1), BaseValue::Int(2)]
        );
    }

    // ── Named placeholders ──────────────────────────────────────────

    #[test]
    fn test_named_twice_shares_one_slot() {
        let q = query(
            "SELECT * FROM t WHERE a > {age} OR b > {age}",
            &[Value::parameter("age", 30)],
        );
        assert_eq!(q.base_sql, "SELECT * FROM t WHERE a > :age OR b > :age");
        assert_eq!(
            q.base_values,
            vec![BaseValue::parameter("age", BaseValue::Int(30))]
        );
        assert_eq!(q.parameter_indices.get("age"), Some(&vec![0]));
    }

    #[test]
    fn test_named_with_lists() {
        let values = [
            Value::parameter("age", 21),
            Value::parameter("ids", Value::list([1, 2, 3])),
            Value::parameter("names", Value::list(["a", "b", "c"])),
        ];
        let q = query(
            "SELECT {age}, {age} WHERE id IN ({ids}) AND name IN ({names})",
            &values,
        );
        assert_eq!(
            q.base_sql,
            "SELECT :age, :age WHERE id IN (:2, :3, :4) AND name IN (:5, :6, :7)"
        );
        assert_eq!(q.base_values.len(), 7);
    }

    #[test]
    fn test_named_expression_nesting() {
        let values = [
            Value::parameter("one", Value::expression("user_id", vec![])),
            Value::parameter("two", Value::expression("age", vec![])),
            Value::parameter("three", Value::expression("age", vec![])),
            Value::parameter("incr", 1),
            Value::parameter("list", Value::list([1, 2, 3])),
        ];
        let q = query(
            "(MAX(AVG({one}), AVG({two}), SUM({three})) + {incr}) IN ({list})",
            &values,
        );
        assert_eq!(
            q.base_sql,
            "(MAX(AVG(user_id), AVG(age), SUM(age)) + :incr) IN (:2, :3, :4)"
        );
        assert_eq!(
            q.base_values,
            vec![
                BaseValue::parameter("incr", BaseValue::Int(1)),
                BaseValue::Int(1),
                BaseValue::Int(2),
                BaseValue::Int(3),
            ]
        );
        assert_eq!(q.parameter_indices.len(), 1);
        assert_eq!(q.parameter_indices["incr"], vec![0]);
    }

    #[test]
    fn test_expression_with_own_values() {
        let filter = Value::expression("age BETWEEN {} AND {}", vec![Value::from(18), Value::from(65)]);
        let q = query("SELECT * FROM t WHERE {} AND id = {}", &[filter, Value::from(9)]);
        assert_eq!(q.base_sql, "SELECT * FROM t WHERE age BETWEEN :1 AND :2 AND id = :3");
        assert_eq!(
            q.base_values,
            vec![BaseValue::Int(18), BaseValue::Int(65), BaseValue::Int(9)]
        );
    }

    #[test]
    fn test_named_scalar_inside_expression_shares_slot_with_outer() {
        let inner = Value::expression("x = {lim}", vec![Value::parameter("lim", 5)]);
        let q = query("SELECT {} AND y = {lim}", &[inner, Value::parameter("lim", 5)]);
        assert_eq!(q.base_sql, "SELECT x = :lim AND y = :lim");
        assert_eq!(q.base_values.len(), 1);
    }

    #[test]
    fn test_empty_parameter_name() {
        assert_eq!(
            error("SELECT 1", &[Value::parameter("", 1)]),
            "parameter name cannot be empty"
        );
    }

    #[test]
    fn test_duplicate_parameter_name() {
        assert_eq!(
            error("SELECT {a}", &[Value::parameter("a", 1), Value::parameter("a", 2)]),
            "parameter name {a} provided more than once"
        );
    }

    #[test]
    fn test_missing_name_without_named_values() {
        assert_eq!(
            error("SELECT {nope}", &[Value::from(1)]),
            "parameter name {nope} not provided"
        );
    }

    #[test]
    fn test_missing_name_lists_available() {
        assert_eq!(
            error(
                "SELECT {nope}",
                &[Value::parameter("a", 1), Value::parameter("b", 2)]
            ),
            "parameter name {nope} not provided (available names: a, b)"
        );
    }

    #[test]
    fn test_unclosed_brace() {
        assert_eq!(error("SELECT {", &[]), "no matching '}' found");
    }

    #[test]
    fn test_invalid_name_characters() {
        let err = Query::new("SELECT {a-b}", &[Value::from(1)]).unwrap_err();
        assert_eq!(
            err.message,
            "a-b is not a valid parameter name (only letters, digits and '_' are allowed)"
        );
        assert_eq!(err.sql, "SELECT {a-b}");
        assert_eq!(err.values, vec![Value::from(1)]);
    }

    #[test]
    fn test_error_from_nested_expression_carries_nested_sql() {
        let inner = Value::expression("a = {}", vec![]);
        let err = Query::new("SELECT {}", &[inner]).unwrap_err();
        assert_eq!(err.sql, "a = {}");
    }

    #[test]
    fn test_error_converts_to_schema_error() {
        let err = Query::new("SELECT {", &[]).unwrap_err();
        let schema_err: schemata_core::SchemaError = err.into();
        assert!(schema_err.to_string().contains("no matching '}' found"));
    }

    // ── Fetch expressions ───────────────────────────────────────────

    #[test]
    fn test_star_substitution() {
        let exprs = [
            Value::expression("id", vec![]),
            Value::expression("name", vec![]),
            Value::expression("age + {}", vec![Value::from(1)]),
        ];
        let q = Query::with_fetch_expressions(
            "SELECT {*} FROM users WHERE id = {}",
            &[Value::from(3)],
            &exprs,
        )
        .unwrap();
        assert_eq!(q.base_sql, "SELECT id, name, age + :1 FROM users WHERE id = :2");
        assert_eq!(q.base_values, vec![BaseValue::Int(1), BaseValue::Int(3)]);
    }

    #[test]
    fn test_star_head_and_tail_share_cursor() {
        let q = Query::with_fetch_expressions(
            "SELECT {}, {*} FROM t WHERE a = {} AND b = {1}",
            &[Value::from(1), Value::from(2)],
            &[Value::expression("c", vec![])],
        )
        .unwrap();
        assert_eq!(q.base_sql, "SELECT :1, c FROM t WHERE a = :2 AND b = :3");
    }

    #[test]
    fn test_escaped_star_is_not_substituted() {
        let q = Query::with_fetch_expressions(
            "SELECT '{{*}', {*}",
            &[],
            &[Value::expression("x", vec![])],
        )
        .unwrap();
        assert_eq!(q.base_sql, "SELECT '{*}', x");
    }

    #[test]
    fn test_star_without_expressions_renders_empty() {
        let q = Query::new("SELECT {*} FROM t", &[]).unwrap();
        assert_eq!(q.base_sql, "SELECT  FROM t");
    }

    #[test]
    fn test_second_star_is_rejected() {
        let err = Query::with_fetch_expressions(
            "SELECT {*}, {*}",
            &[],
            &[Value::expression("a", vec![])],
        )
        .unwrap_err();
        assert!(err.message.starts_with("* is not a valid parameter name"));
    }

    // ── Rebinding ───────────────────────────────────────────────────

    #[test]
    fn test_rebind_updates_every_site() {
        let q = query(
            "SELECT {n} WHERE x = {n} AND y = {}",
            &[Value::from(9), Value::parameter("n", 1)],
        );
        assert_eq!(q.base_sql, "SELECT :n WHERE x = :n AND y = :2");
        let mut params = HashMap::new();
        params.insert("n".to_string(), BaseValue::Int(42));
        params.insert("unused".to_string(), BaseValue::Null);
        let values = q.rebind(&params);
        assert_eq!(
            values,
            vec![
                BaseValue::parameter("n", BaseValue::Int(42)),
                BaseValue::Int(9),
            ]
        );
        assert_eq!(q.base_values[0], BaseValue::parameter("n", BaseValue::Int(1)));
    }

    #[test]
    fn test_exists_wraps_sql() {
        let q = query("SELECT 1 FROM t WHERE id = {}", &[Value::from(1)]).exists();
        assert_eq!(q.base_sql, "SELECT EXISTS (SELECT 1 FROM t WHERE id = :1)");
        assert_eq!(q.base_values.len(), 1);
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let values = [Value::parameter("a", 1), Value::list([1, 2]), Value::from("s")];
        let sql = "SELECT {a}, ({2}), {3}, {a}";
        assert_eq!(query(sql, &values), query(sql, &values));
    }
}
