//! The database executor trait.
//!
//! [`Executor`] is the seam between the template engine and a concrete
//! driver. Drivers (for example `schemata-sqlite`) render the template with
//! [`prepare_fetch`] or [`Query::new`], bind the resulting base values, and
//! feed each result row through the caller's decode callback.

use schemata_core::SchemaResult;

use crate::row::Row;
use crate::template::Query;
use crate::value::Value;

/// The outcome of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteResult {
    /// The rowid of the most recent successful INSERT on the connection.
    pub last_insert_id: i64,
    /// Rows changed by the statement.
    pub rows_affected: i64,
}

/// Minimal async database executor.
///
/// The decode callback is invoked once against a probe row before the
/// statement runs (to resolve `{*}`), then once per result row.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// Runs a query and decodes every result row.
    async fn fetch_all<T, F>(&self, sql: &str, values: Vec<Value>, decode: F) -> SchemaResult<Vec<T>>
    where
        T: Send + 'static,
        F: FnMut(&mut Row) -> SchemaResult<T> + Send + 'static;

    /// Runs a query and decodes the first result row, if any.
    async fn fetch_one<T, F>(&self, sql: &str, values: Vec<Value>, decode: F) -> SchemaResult<Option<T>>
    where
        T: Send + 'static,
        F: FnMut(&mut Row) -> SchemaResult<T> + Send + 'static,
    {
        Ok(self.fetch_all(sql, values, decode).await?.into_iter().next())
    }

    /// Returns whether the query yields at least one row.
    async fn fetch_exists(&self, sql: &str, values: Vec<Value>) -> SchemaResult<bool>;

    /// Runs a statement that does not return rows.
    async fn execute(&self, sql: &str, values: Vec<Value>) -> SchemaResult<ExecuteResult>;
}

/// Probes `decode` and renders `sql` with the recorded fetch expressions.
///
/// Returns the rendered query together with the expressions, which drivers
/// hand to [`Row::for_results`] for error reporting.
pub fn prepare_fetch<T, F>(
    sql: &str,
    values: &[Value],
    decode: &mut F,
) -> SchemaResult<(Query, Vec<Value>)>
where
    F: FnMut(&mut Row) -> SchemaResult<T>,
{
    let mut probe = Row::probe();
    decode(&mut probe)?;
    let fetch_expressions = probe.into_fetch_expressions();
    let query = Query::with_fetch_expressions(sql, values, &fetch_expressions)?;
    Ok((query, fetch_expressions))
}
