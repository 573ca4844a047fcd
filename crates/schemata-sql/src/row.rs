//! Row decoding.
//!
//! Fetch operations take a decode callback `FnMut(&mut Row) -> SchemaResult<T>`.
//! The callback reads columns in order through the typed getters, naming the
//! SQL expression for each column as it goes:
//!
//! ```
//! use schemata_sql::row::Row;
//!
//! fn decode(row: &mut Row) -> schemata_core::SchemaResult<(i64, String)> {
//!     let id = row.get_or_default::<i64>("id")?;
//!     let name = row.get_or_default::<String>("upper(name) AS name")?;
//!     Ok((id, name))
//! }
//!
//! let mut probe = Row::probe();
//! decode(&mut probe).unwrap();
//! assert_eq!(probe.fetch_expressions().len(), 2);
//! ```
//!
//! Before the statement runs, the callback is invoked once against a probe
//! row. Probe getters record the expressions and return empty values; the
//! recorded list replaces `{*}` in the query text. The decoder and the
//! column list therefore cannot drift apart.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use schemata_core::{SchemaError, SchemaResult};
use uuid::Uuid;

use crate::value::Value;

/// A raw column value, by SQLite storage class.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl ColumnValue {
    /// Returns the storage class name used in conversion errors.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Real(_) => "REAL",
            Self::Text(_) => "TEXT",
            Self::Blob(_) => "BLOB",
        }
    }
}

/// Timestamp layouts accepted for TEXT columns read as dates, most specific
/// first. A trailing `Z` is stripped before parsing.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Converts a [`ColumnValue`] into a Rust type.
///
/// `Ok(None)` means SQL NULL. On a type mismatch the offending value is handed
/// back so the caller can report it.
pub trait FromColumn: Sized {
    /// The type name used in conversion errors.
    const TYPE_NAME: &'static str;

    fn from_column(value: ColumnValue) -> Result<Option<Self>, ColumnValue>;
}

impl FromColumn for Vec<u8> {
    const TYPE_NAME: &'static str = "bytes";

    fn from_column(value: ColumnValue) -> Result<Option<Self>, ColumnValue> {
        match value {
            ColumnValue::Null => Ok(None),
            ColumnValue::Blob(b) => Ok(Some(b)),
            ColumnValue::Text(s) => Ok(Some(s.into_bytes())),
            other => Err(other),
        }
    }
}

impl FromColumn for bool {
    const TYPE_NAME: &'static str = "bool";

    fn from_column(value: ColumnValue) -> Result<Option<Self>, ColumnValue> {
        match value {
            ColumnValue::Null => Ok(None),
            ColumnValue::Integer(i) => Ok(Some(i != 0)),
            ColumnValue::Real(f) => Ok(Some(f != 0.0)),
            other => Err(other),
        }
    }
}

impl FromColumn for f64 {
    const TYPE_NAME: &'static str = "double";

    fn from_column(value: ColumnValue) -> Result<Option<Self>, ColumnValue> {
        match value {
            ColumnValue::Null => Ok(None),
            ColumnValue::Real(f) => Ok(Some(f)),
            ColumnValue::Integer(i) => Ok(Some(i as f64)),
            other => Err(other),
        }
    }
}

impl FromColumn for i32 {
    const TYPE_NAME: &'static str = "int";

    fn from_column(value: ColumnValue) -> Result<Option<Self>, ColumnValue> {
        match value {
            ColumnValue::Null => Ok(None),
            ColumnValue::Integer(i) => i32::try_from(i)
                .map(Some)
                .map_err(|_| ColumnValue::Integer(i)),
            ColumnValue::Real(f) => Ok(Some(f as i32)),
            other => Err(other),
        }
    }
}

impl FromColumn for i64 {
    const TYPE_NAME: &'static str = "int64";

    fn from_column(value: ColumnValue) -> Result<Option<Self>, ColumnValue> {
        match value {
            ColumnValue::Null => Ok(None),
            ColumnValue::Integer(i) => Ok(Some(i)),
            ColumnValue::Real(f) => Ok(Some(f as i64)),
            other => Err(other),
        }
    }
}

impl FromColumn for String {
    const TYPE_NAME: &'static str = "string";

    fn from_column(value: ColumnValue) -> Result<Option<Self>, ColumnValue> {
        match value {
            ColumnValue::Null => Ok(None),
            ColumnValue::Text(s) => Ok(Some(s)),
            ColumnValue::Blob(b) => String::from_utf8(b)
                .map(Some)
                .map_err(|e| ColumnValue::Blob(e.into_bytes())),
            ColumnValue::Integer(i) => Ok(Some(i.to_string())),
            ColumnValue::Real(f) => Ok(Some(f.to_string())),
        }
    }
}

impl FromColumn for DateTime<Utc> {
    const TYPE_NAME: &'static str = "date";

    fn from_column(value: ColumnValue) -> Result<Option<Self>, ColumnValue> {
        match value {
            ColumnValue::Null => Ok(None),
            ColumnValue::Integer(secs) => Utc
                .timestamp_opt(secs, 0)
                .single()
                .map(Some)
                .ok_or(ColumnValue::Integer(secs)),
            ColumnValue::Real(secs) => {
                let whole = secs.floor();
                let nanos = ((secs - whole) * 1e9) as u32;
                Utc.timestamp_opt(whole as i64, nanos)
                    .single()
                    .map(Some)
                    .ok_or(ColumnValue::Real(secs))
            }
            ColumnValue::Text(s) => parse_timestamp(&s)
                .map(Some)
                .ok_or(ColumnValue::Text(s)),
            other => Err(other),
        }
    }
}

impl FromColumn for Uuid {
    const TYPE_NAME: &'static str = "uuid";

    fn from_column(value: ColumnValue) -> Result<Option<Self>, ColumnValue> {
        match value {
            ColumnValue::Null => Ok(None),
            ColumnValue::Blob(b) => match Uuid::from_slice(&b) {
                Ok(u) => Ok(Some(u)),
                Err(_) => Err(ColumnValue::Blob(b)),
            },
            ColumnValue::Text(s) => match Uuid::parse_str(&s) {
                Ok(u) => Ok(Some(u)),
                Err(_) => Err(ColumnValue::Text(s)),
            },
            other => Err(other),
        }
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.strip_suffix('Z').unwrap_or(text);
    for format in TIMESTAMP_FORMATS {
        if format.ends_with("%:z") {
            if let Ok(dt) = DateTime::parse_from_str(text, format) {
                return Some(dt.with_timezone(&Utc));
            }
        } else if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// A result row as seen by a decode callback.
///
/// A probe row (see [`Row::probe`]) records the expressions its getters are
/// called with. A loaded row returns the column values in order.
#[derive(Debug, Default)]
pub struct Row {
    columns: Option<Vec<ColumnValue>>,
    index: usize,
    fetch_expressions: Vec<Value>,
}

impl Row {
    /// Creates a probe row that records fetch expressions.
    pub fn probe() -> Self {
        Self::default()
    }

    /// Creates a row for reading results; `fetch_expressions` are the
    /// expressions recorded while probing, used in error messages.
    pub fn for_results(fetch_expressions: Vec<Value>) -> Self {
        Self {
            columns: Some(Vec::new()),
            index: 0,
            fetch_expressions,
        }
    }

    /// Loads the next result row and rewinds the column cursor.
    pub fn load(&mut self, columns: Vec<ColumnValue>) {
        self.columns = Some(columns);
        self.index = 0;
    }

    /// Returns `true` while probing.
    pub const fn is_probe(&self) -> bool {
        self.columns.is_none()
    }

    /// The expressions recorded so far, in call order.
    pub fn fetch_expressions(&self) -> &[Value] {
        &self.fetch_expressions
    }

    pub fn into_fetch_expressions(self) -> Vec<Value> {
        self.fetch_expressions
    }

    /// Reads the next column as `T`, or `None` for NULL (and while probing).
    pub fn get<T: FromColumn>(&mut self, sql: &str) -> SchemaResult<Option<T>> {
        self.get_expr(sql, Vec::new())
    }

    /// Like [`Row::get`], for an expression that carries its own values.
    pub fn get_expr<T: FromColumn>(
        &mut self,
        sql: &str,
        values: Vec<Value>,
    ) -> SchemaResult<Option<T>> {
        let Some(columns) = self.columns.as_mut() else {
            self.fetch_expressions.push(Value::expression(sql, values));
            return Ok(None);
        };
        let index = self.index;
        self.index += 1;
        let Some(slot) = columns.get_mut(index) else {
            return Err(SchemaError::DatabaseError(format!(
                "column index {index} out of bounds (row has {} columns)",
                columns.len()
            )));
        };
        let value = std::mem::replace(slot, ColumnValue::Null);
        T::from_column(value).map_err(|got| {
            let expression = self
                .fetch_expressions
                .get(index)
                .map_or_else(|| sql.to_string(), ToString::to_string);
            SchemaError::ConversionError(format!(
                "cannot read {} {got:?} as {} (expression: {expression})",
                got.type_name(),
                T::TYPE_NAME,
            ))
        })
    }

    /// Reads the next column, substituting `T::default()` for NULL.
    pub fn get_or_default<T: FromColumn + Default>(&mut self, sql: &str) -> SchemaResult<T> {
        Ok(self.get(sql)?.unwrap_or_default())
    }
}
