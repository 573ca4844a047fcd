//! Value types for building parameterized SQL.
//!
//! A [`Value`] is what callers hand to the template engine: a scalar, a named
//! parameter, a nested SQL expression with its own values, or a list. The
//! engine flattens every value down to [`BaseValue`]s, the closed set of
//! scalars a driver can bind directly.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A scalar that can be bound to a prepared statement.
///
/// `Parameter` marks a slot that was bound through a named placeholder; the
/// driver binds it to `:name` instead of its positional marker, and prepared
/// statements can rebind it by name.
#[derive(Debug, Clone, PartialEq)]
pub enum BaseValue {
    /// SQL NULL.
    Null,
    /// Raw binary data.
    Bytes(Vec<u8>),
    Bool(bool),
    Double(f64),
    /// A 32-bit signed integer.
    Int(i32),
    /// A 64-bit signed integer.
    Int64(i64),
    String(String),
    /// A UTC timestamp, bound as Unix seconds.
    Date(DateTime<Utc>),
    /// A UUID, bound as its 16 raw bytes.
    Uuid(Uuid),
    /// A scalar bound to the named marker `:name`.
    Parameter(String, Box<BaseValue>),
}

impl BaseValue {
    /// Wraps a scalar as a named parameter.
    pub fn parameter(name: impl Into<String>, value: Self) -> Self {
        Self::Parameter(name.into(), Box::new(value))
    }

    /// Returns the parameter name, if this value was bound by name.
    pub fn parameter_name(&self) -> Option<&str> {
        match self {
            Self::Parameter(name, _) => Some(name),
            _ => None,
        }
    }

    /// Strips any `Parameter` wrappers and returns the underlying scalar.
    pub fn scalar(&self) -> &Self {
        match self {
            Self::Parameter(_, inner) => inner.scalar(),
            other => other,
        }
    }
}

impl fmt::Display for BaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Self::Uuid(u) => write!(f, "{u}"),
            Self::Parameter(name, inner) => write!(f, ":{name}={inner}"),
        }
    }
}

/// A value passed alongside a SQL template.
///
/// Build values with the `From` implementations (scalars, `Option<T>` for
/// nullable scalars) or with [`Value::list`], [`Value::expression`] and
/// [`Value::parameter`].
///
/// # Examples
///
/// ```
/// use schemata_sql::value::Value;
///
/// let v = Value::from(42_i64);
/// assert_eq!(v, Value::Int64(42));
///
/// let v = Value::from(None::<String>);
/// assert_eq!(v, Value::Null);
///
/// let ids = Value::list([1, 2, 3]);
/// assert!(matches!(ids, Value::List(ref items) if items.len() == 3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bytes(Vec<u8>),
    Bool(bool),
    Double(f64),
    Int(i32),
    Int64(i64),
    String(String),
    Date(DateTime<Utc>),
    Uuid(Uuid),
    /// A named value, referenced from templates as `{name}`.
    Parameter(String, Box<Value>),
    /// A raw SQL fragment with its own placeholders and values.
    Expression(String, Vec<Value>),
    /// A comma-separated list of values.
    List(Vec<Value>),
}

impl Value {
    /// Creates a SQL fragment with its own placeholders and values.
    pub fn expression(sql: impl Into<String>, values: Vec<Self>) -> Self {
        Self::Expression(sql.into(), values)
    }

    /// Creates a named value for `{name}` placeholders.
    pub fn parameter(name: impl Into<String>, value: impl Into<Self>) -> Self {
        Self::Parameter(name.into(), Box::new(value.into()))
    }

    /// Creates a list from any iterator of convertible items.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Self>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Returns `true` for values that map to exactly one [`BaseValue`].
    pub const fn is_scalar(&self) -> bool {
        !matches!(
            self,
            Self::Parameter(..) | Self::Expression(..) | Self::List(_)
        )
    }

    /// Converts a scalar into its bindable form. Structured values return `None`.
    pub fn to_base_value(&self) -> Option<BaseValue> {
        let base = match self {
            Self::Null => BaseValue::Null,
            Self::Bytes(b) => BaseValue::Bytes(b.clone()),
            Self::Bool(b) => BaseValue::Bool(*b),
            Self::Double(v) => BaseValue::Double(*v),
            Self::Int(v) => BaseValue::Int(*v),
            Self::Int64(v) => BaseValue::Int64(*v),
            Self::String(s) => BaseValue::String(s.clone()),
            Self::Date(d) => BaseValue::Date(*d),
            Self::Uuid(u) => BaseValue::Uuid(*u),
            Self::Parameter(..) | Self::Expression(..) | Self::List(_) => return None,
        };
        Some(base)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(base) = self.to_base_value() {
            return write!(f, "{base}");
        }
        match self {
            Self::Parameter(name, inner) => write!(f, "{name}={inner}"),
            Self::Expression(sql, values) if values.is_empty() => write!(f, "{sql}"),
            Self::Expression(sql, values) => {
                write!(f, "{sql} [")?;
                write_joined(f, values)?;
                write!(f, "]")
            }
            Self::List(values) => {
                write!(f, "(")?;
                write_joined(f, values)?;
                write!(f, ")")
            }
            _ => Ok(()),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, values: &[Value]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{v}")?;
    }
    Ok(())
}

// ── From implementations ───────────────────────────────────────────────

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Self::String(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Date(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
