//! Name generation and normalization helpers.
//!
//! These are pure string functions shared by the introspector (which stores
//! column defaults in a canonical shape) and the migration planner (which
//! names anonymous constraints and compares column definitions).

use std::cmp::Ordering;

use crate::model::{ConstraintType, INDEX};

/// Builds a deterministic name for a constraint or index.
///
/// The table and column names are joined with `_` (spaces become `_`) and a
/// kind-specific suffix is appended: `_pkey`, `_fkey`, `_key`, `_idx` or
/// `_check`. Unknown kinds get no suffix.
///
/// ```
/// use schemata_catalog::naming::generate_name;
///
/// assert_eq!(generate_name("PRIMARY KEY", "users", &["id"]), "users_id_pkey");
/// assert_eq!(generate_name("INDEX", "order items", &["sku", "batch no"]), "order_items_sku_batch_no_idx");
/// ```
pub fn generate_name<S: AsRef<str>>(kind: &str, table_name: &str, column_names: &[S]) -> String {
    let mut name = table_name.replace(' ', "_");
    for column_name in column_names {
        name.push('_');
        name.push_str(&column_name.as_ref().replace(' ', "_"));
    }
    let suffix = match kind {
        k if k == ConstraintType::PrimaryKey.as_str() => "_pkey",
        k if k == ConstraintType::ForeignKey.as_str() => "_fkey",
        k if k == ConstraintType::Unique.as_str() => "_key",
        k if k == ConstraintType::Check.as_str() => "_check",
        k if k == INDEX => "_idx",
        _ => "",
    };
    name.push_str(suffix);
    name
}

/// Returns `true` if `s` is a SQL literal: a quoted string, a keyword
/// constant, or a number.
pub fn is_literal(s: &str) -> bool {
    const KEYWORDS: [&str; 6] = [
        "TRUE",
        "FALSE",
        "CURRENT_DATE",
        "CURRENT_TIME",
        "CURRENT_TIMESTAMP",
        "NULL",
    ];
    if s.len() >= 2 && s.starts_with('\'') && s.ends_with('\'') {
        return true;
    }
    if KEYWORDS.iter().any(|k| s.eq_ignore_ascii_case(k)) {
        return true;
    }
    s.parse::<i64>().is_ok() || s.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Wraps `s` in brackets unless it is empty or already wrapped.
pub fn wrap_brackets(s: &str) -> String {
    if s.is_empty() || wrapped_in_brackets(s) {
        return s.to_string();
    }
    format!("({s})")
}

/// Strips one pair of surrounding brackets, if present.
pub fn unwrap_brackets(s: &str) -> &str {
    if wrapped_in_brackets(s) {
        &s[1..s.len() - 1]
    } else {
        s
    }
}

pub fn wrapped_in_brackets(s: &str) -> bool {
    s.starts_with('(') && s.ends_with(')') && s.len() >= 2
}

/// Splits a column type into its uppercased name and up to two arguments.
///
/// `"varchar(255)"` becomes `("VARCHAR", "255", "")` and
/// `"numeric( 10 , 2 )"` becomes `("NUMERIC", "10", "2")`. Anything after the
/// closing bracket is dropped.
pub fn normalize_column_type(column_type: &str) -> (String, String, String) {
    let column_type = column_type.trim().to_uppercase();
    let (Some(open), Some(close)) = (column_type.find('('), column_type.rfind(')')) else {
        return (column_type, String::new(), String::new());
    };
    if close <= open {
        return (column_type, String::new(), String::new());
    }
    let name = column_type[..open].trim().to_string();
    let args = column_type[open + 1..close].trim();
    match args.split_once(',') {
        Some((arg1, arg2)) => (name, arg1.trim().to_string(), arg2.trim().to_string()),
        None => (name, args.to_string(), String::new()),
    }
}

/// Canonicalizes a column default so equivalent spellings compare equal.
///
/// Booleans become `'1'`/`'0'`, keyword constants are uppercased, and
/// SQLite's `DATETIME()` / `DATETIME('NOW')` become `CURRENT_TIMESTAMP`.
pub fn normalize_column_default(column_default: &str) -> String {
    let column_default = column_default.trim();
    if column_default.is_empty() {
        return String::new();
    }
    let upper = column_default.to_uppercase();
    match upper.as_str() {
        "1" | "TRUE" => "'1'".to_string(),
        "0" | "FALSE" => "'0'".to_string(),
        "CURRENT_DATE" | "CURRENT_TIME" | "CURRENT_TIMESTAMP" | "NULL" => upper,
        "DATETIME()" | "DATETIME('NOW')" => "CURRENT_TIMESTAMP".to_string(),
        _ => column_default.to_string(),
    }
}

/// Compares two version number lists component by component.
///
/// An extra trailing component on `lhs` counts as greater; an extra trailing
/// component on `rhs` counts as less.
pub fn compare_version_nums(lhs: &[i64], rhs: &[i64]) -> Ordering {
    if lhs == rhs {
        return Ordering::Equal;
    }
    for (i, &l) in lhs.iter().enumerate() {
        match rhs.get(i) {
            None => return Ordering::Greater,
            Some(&r) if l > r => return Ordering::Greater,
            Some(&r) if l < r => return Ordering::Less,
            Some(_) => {}
        }
    }
    Ordering::Less
}
