//! Prepared fetch and execute statements.
//!
//! A prepared statement renders its template once. Every call rebinds the
//! named parameters through [`Query::rebind`] and runs through rusqlite's
//! per-connection statement cache, so the SQL text is only parsed once per
//! connection.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use schemata_core::SchemaResult;
use schemata_sql::executor::{prepare_fetch, ExecuteResult};
use schemata_sql::row::Row;
use schemata_sql::template::Query;
use schemata_sql::value::{BaseValue, Value};
use tracing::debug;

use crate::sqlite::{run_execute, run_fetch, SqliteDatabase};

/// A rendered query with its row decoder.
pub struct PreparedFetch<T, F> {
    db: SqliteDatabase,
    query: Query,
    fetch_expressions: Vec<Value>,
    decode: Arc<F>,
    _row: PhantomData<fn() -> T>,
}

impl<T, F> PreparedFetch<T, F>
where
    T: Send + 'static,
    F: Fn(&mut Row) -> SchemaResult<T> + Send + Sync + 'static,
{
    /// The rendered query.
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Runs the query with `parameters` rebound and decodes every row.
    pub async fn fetch_all(&self, parameters: &HashMap<String, BaseValue>) -> SchemaResult<Vec<T>> {
        let sql = self.query.base_sql.clone();
        let values = self.query.rebind(parameters);
        let fetch_expressions = self.fetch_expressions.clone();
        let decode = Arc::clone(&self.decode);
        debug!(sql = %sql, "prepared fetch");
        self.db
            .read(move |conn| {
                run_fetch(conn, &sql, &values, fetch_expressions, &mut |row: &mut Row| {
                    (*decode)(row)
                })
            })
            .await
    }

    /// Runs the query and decodes the first row, if any.
    pub async fn fetch_one(&self, parameters: &HashMap<String, BaseValue>) -> SchemaResult<Option<T>> {
        Ok(self.fetch_all(parameters).await?.into_iter().next())
    }
}

/// A rendered statement that does not return rows.
#[derive(Debug, Clone)]
pub struct PreparedExecute {
    db: SqliteDatabase,
    query: Query,
}

impl PreparedExecute {
    /// The rendered statement.
    pub const fn query(&self) -> &Query {
        &self.query
    }

    /// Runs the statement with `parameters` rebound.
    pub async fn execute(&self, parameters: &HashMap<String, BaseValue>) -> SchemaResult<ExecuteResult> {
        let sql = self.query.base_sql.clone();
        let values = self.query.rebind(parameters);
        debug!(sql = %sql, "prepared execute");
        self.db
            .write(move |conn| run_execute(conn, &sql, &values))
            .await
    }
}

impl SqliteDatabase {
    /// Renders a fetch template once for repeated execution.
    ///
    /// The decoder is shared by concurrent calls, so it must be `Fn`.
    /// Only values passed as [`Value::parameter`] scalars can be rebound
    /// later; everything else is fixed at prepare time.
    pub fn prepare_fetch<T, F>(
        &self,
        sql: &str,
        values: &[Value],
        mut decode: F,
    ) -> SchemaResult<PreparedFetch<T, F>>
    where
        T: Send + 'static,
        F: Fn(&mut Row) -> SchemaResult<T> + Send + Sync + 'static,
    {
        let (query, fetch_expressions) = prepare_fetch(sql, values, &mut decode)?;
        Ok(PreparedFetch {
            db: self.clone(),
            query,
            fetch_expressions,
            decode: Arc::new(decode),
            _row: PhantomData,
        })
    }

    /// Renders a statement template once for repeated execution.
    ///
    /// The statement must be a single statement; multi-statement scripts go
    /// through [`Executor::execute`](schemata_sql::Executor::execute).
    pub fn prepare_execute(&self, sql: &str, values: &[Value]) -> SchemaResult<PreparedExecute> {
        let query = Query::new(sql, values)?;
        Ok(PreparedExecute {
            db: self.clone(),
            query,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use schemata_core::SchemaError;
    use schemata_sql::Executor;

    use super::*;

    fn params(pairs: &[(&str, BaseValue)]) -> HashMap<String, BaseValue> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    async fn items_db() -> SqliteDatabase {
        let db = SqliteDatabase::memory().unwrap();
        db.execute(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, qty INTEGER)",
            vec![],
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_prepared_execute_rebinds() {
        let db = items_db().await;
        let insert = db
            .prepare_execute(
                "INSERT INTO items (name, qty) VALUES ({name}, {qty})",
                &[Value::parameter("name", ""), Value::parameter("qty", 0)],
            )
            .unwrap();
        assert_eq!(
            insert.query().base_sql,
            "INSERT INTO items (name, qty) VALUES (:name, :qty)"
        );

        for (i, name) in ["bolt", "nut", "washer"].into_iter().enumerate() {
            let result = insert
                .execute(&params(&[
                    ("name", BaseValue::String(name.into())),
                    ("qty", BaseValue::Int64(i64::try_from(i).unwrap() * 10)),
                ]))
                .await
                .unwrap();
            assert_eq!(result.rows_affected, 1);
            assert_eq!(result.last_insert_id, i64::try_from(i).unwrap() + 1);
        }
    }

    #[tokio::test]
    async fn test_prepared_fetch_rebinds() {
        let db = items_db().await;
        db.execute(
            "INSERT INTO items (name, qty) VALUES ('a', 1), ('b', 5), ('c', 9)",
            vec![],
        )
        .await
        .unwrap();

        let select = db
            .prepare_fetch(
                "SELECT {*} FROM items WHERE qty >= {min} ORDER BY id",
                &[Value::parameter("min", 0)],
                |row| row.get_or_default::<String>("name"),
            )
            .unwrap();
        assert_eq!(
            select.query().base_sql,
            "SELECT name FROM items WHERE qty >= :min ORDER BY id"
        );

        let all = select.fetch_all(&HashMap::new()).await.unwrap();
        assert_eq!(all, vec!["a", "b", "c"]);

        let some = select
            .fetch_all(&params(&[("min", BaseValue::Int(5))]))
            .await
            .unwrap();
        assert_eq!(some, vec!["b", "c"]);

        let first = select
            .fetch_one(&params(&[("min", BaseValue::Int(9))]))
            .await
            .unwrap();
        assert_eq!(first.as_deref(), Some("c"));

        let none = select
            .fetch_one(&params(&[("min", BaseValue::Int(100))]))
            .await
            .unwrap();
        assert_eq!(none, None);
    }

    async fn pooled_items_db(dir: &tempfile::TempDir) -> SqliteDatabase {
        let db = SqliteDatabase::open(dir.path().join("items.db"), 2, Duration::from_secs(5)).unwrap();
        db.execute(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, qty INTEGER);
             INSERT INTO items (name, qty) VALUES ('a', 1), ('b', 5), ('c', 9);",
            vec![],
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_prepared_fetch_runs_concurrently() {
        let dir = tempfile::tempdir().unwrap();
        let db = pooled_items_db(&dir).await;
        let select = db
            .prepare_fetch(
                "SELECT {*} FROM items WHERE qty >= {min} ORDER BY id",
                &[Value::parameter("min", 0)],
                |row| row.get_or_default::<String>("name"),
            )
            .unwrap();

        let low = params(&[("min", BaseValue::Int(0))]);
        let high = params(&[("min", BaseValue::Int(5))]);
        let (all, some) = tokio::join!(select.fetch_all(&low), select.fetch_all(&high));
        assert_eq!(all.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(some.unwrap(), vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_prepared_fetch_usable_after_decoder_panic() {
        let dir = tempfile::tempdir().unwrap();
        let db = pooled_items_db(&dir).await;
        let select = db
            .prepare_fetch(
                "SELECT {*} FROM items WHERE qty <= {max} ORDER BY id",
                &[Value::parameter("max", 0)],
                |row| {
                    let qty = row.get_or_default::<i64>("qty")?;
                    assert!(qty < 9, "unexpected quantity {qty}");
                    Ok(qty)
                },
            )
            .unwrap();

        let failed = select.fetch_all(&params(&[("max", BaseValue::Int(9))])).await;
        assert!(matches!(failed, Err(SchemaError::DatabaseError(_))));

        let small = select
            .fetch_all(&params(&[("max", BaseValue::Int(5))]))
            .await
            .unwrap();
        assert_eq!(small, vec![1, 5]);
    }

    #[tokio::test]
    async fn test_prepare_reports_template_errors() {
        let db = items_db().await;
        let result = db.prepare_execute("DELETE FROM items WHERE id = {id}", &[]);
        assert!(matches!(result, Err(SchemaError::QueryBuilding(_))));
    }
}
