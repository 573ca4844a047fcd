//! SQLite database driver using `rusqlite` and `deadpool-sqlite`.
//!
//! [`SqliteDatabase`] implements [`Executor`] with one read-write connection
//! behind an async mutex and a `deadpool-sqlite` pool of query-only
//! connections. All blocking work runs off the async runtime.
//!
//! Features:
//! - WAL mode for file databases, so readers do not block the writer
//! - `PRAGMA foreign_keys=ON` and a busy timeout on every connection
//! - In-memory databases via `:memory:` (reads share the writer)
//! - Named and positional bind markers from the template engine

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use deadpool_sqlite::{Hook, HookError, Pool, Runtime};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, Statement};
use schemata_core::settings::DatabaseSettings;
use schemata_core::{SchemaError, SchemaResult};
use schemata_sql::executor::{prepare_fetch, ExecuteResult, Executor};
use schemata_sql::row::{ColumnValue, Row};
use schemata_sql::template::Query;
use schemata_sql::value::{BaseValue, Value};
use tokio::sync::Mutex;
use tracing::debug;

const READER_PRAGMAS: &str = "PRAGMA foreign_keys=ON; PRAGMA query_only=ON;";

pub(crate) fn db_err(e: rusqlite::Error) -> SchemaError {
    SchemaError::DatabaseError(format!("{e}"))
}

fn join_err(e: tokio::task::JoinError) -> SchemaError {
    SchemaError::DatabaseError(format!("Task join error: {e}"))
}

/// A SQLite database with a single writer and a read pool.
///
/// Cloning is cheap and shares the underlying connections.
#[derive(Clone)]
pub struct SqliteDatabase {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The read-write connection, guarded by an async mutex.
    writer: Arc<Mutex<Connection>>,
    /// Query-only connections; `None` for in-memory databases.
    readers: Option<Pool>,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDatabase")
            .field("path", &self.path)
            .field("pooled", &self.readers.is_some())
            .finish_non_exhaustive()
    }
}

impl SqliteDatabase {
    /// Opens a database at `path` with up to `pool_size` read connections,
    /// creating the file if it does not exist.
    ///
    /// If the path is `:memory:`, an in-memory database is created and no
    /// read pool is opened.
    pub fn open(
        path: impl Into<PathBuf>,
        pool_size: usize,
        busy_timeout: Duration,
    ) -> SchemaResult<Self> {
        Self::open_with(path.into(), pool_size, busy_timeout, true)
    }

    /// Like [`SqliteDatabase::open`], but fails instead of creating a
    /// missing database file.
    pub fn open_existing(
        path: impl Into<PathBuf>,
        pool_size: usize,
        busy_timeout: Duration,
    ) -> SchemaResult<Self> {
        Self::open_with(path.into(), pool_size, busy_timeout, false)
    }

    fn open_with(
        path: PathBuf,
        pool_size: usize,
        busy_timeout: Duration,
        create: bool,
    ) -> SchemaResult<Self> {
        let memory = is_memory(&path);

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if create || memory {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        let writer = Connection::open_with_flags(&path, flags).map_err(|e| {
            SchemaError::OperationalError(format!("SQLite open failed for '{}': {e}", path.display()))
        })?;
        let pragmas = if memory {
            "PRAGMA foreign_keys=ON;"
        } else {
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;"
        };
        configure(&writer, pragmas, busy_timeout)?;

        let readers = if memory || pool_size == 0 {
            None
        } else {
            Some(read_pool(&path, pool_size, busy_timeout)?)
        };

        debug!(path = %path.display(), pool_size, "opened sqlite database");
        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(writer)),
            readers,
        })
    }

    /// Opens a database from the `[database]` settings table.
    pub fn from_settings(settings: &DatabaseSettings) -> SchemaResult<Self> {
        Self::open(
            settings.path.clone(),
            settings.pool_size,
            Duration::from_millis(settings.busy_timeout_ms),
        )
    }

    /// Opens an in-memory database (convenience constructor).
    pub fn memory() -> SchemaResult<Self> {
        Self::open(":memory:", 0, Duration::from_secs(5))
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `f` on the writer connection.
    pub async fn write<T, F>(&self, f: F) -> SchemaResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> SchemaResult<T> + Send + 'static,
    {
        let conn = self.writer.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn)
        })
        .await
        .map_err(join_err)?
    }

    /// Runs `f` on a pooled read connection, waiting for one if all are in
    /// use. Falls back to the writer when there is no pool.
    pub async fn read<T, F>(&self, f: F) -> SchemaResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> SchemaResult<T> + Send + 'static,
    {
        let Some(pool) = &self.readers else {
            return self.write(f).await;
        };
        let conn = pool
            .get()
            .await
            .map_err(|e| SchemaError::OperationalError(format!("Pool error: {e}")))?;
        conn.interact(move |conn| f(conn))
            .await
            .map_err(|e| SchemaError::DatabaseError(format!("Read task failed: {e}")))?
    }
}

/// Builds the read pool. Connections are opened lazily and configured as
/// query-only by a post-create hook; a connection whose task panicked is
/// discarded on recycle.
fn read_pool(path: &Path, pool_size: usize, busy_timeout: Duration) -> SchemaResult<Pool> {
    deadpool_sqlite::Config::new(path.to_path_buf())
        .builder(Runtime::Tokio1)
        .map_err(|e| SchemaError::OperationalError(format!("Failed to configure pool: {e}")))?
        .max_size(pool_size)
        .post_create(Hook::async_fn(move |conn, _| {
            Box::pin(async move {
                conn.interact(move |conn| configure(conn, READER_PRAGMAS, busy_timeout))
                    .await
                    .map_err(|e| HookError::Message(e.to_string().into()))?
                    .map_err(|e| HookError::Message(e.to_string().into()))
            })
        }))
        .build()
        .map_err(|e| SchemaError::OperationalError(format!("Failed to create pool: {e}")))
}

fn is_memory(path: &Path) -> bool {
    path.to_str() == Some(":memory:")
}

fn configure(conn: &Connection, pragmas: &str, busy_timeout: Duration) -> SchemaResult<()> {
    conn.execute_batch(pragmas)
        .map_err(|e| SchemaError::OperationalError(format!("Failed to set pragmas: {e}")))?;
    conn.busy_timeout(busy_timeout)
        .map_err(|e| SchemaError::OperationalError(format!("Failed to set busy timeout: {e}")))
}

// ── Binding and decoding ───────────────────────────────────────────────

/// Binds each value to its marker: `:name` for named parameters, `:{i+1}`
/// for the value in slot `i` otherwise.
pub(crate) fn bind_values(stmt: &mut Statement<'_>, values: &[BaseValue]) -> SchemaResult<()> {
    for (i, value) in values.iter().enumerate() {
        let marker = match value.parameter_name() {
            Some(name) => format!(":{name}"),
            None => format!(":{}", i + 1),
        };
        let index = stmt
            .parameter_index(&marker)
            .map_err(db_err)?
            .ok_or_else(|| SchemaError::DatabaseError(format!("no bind marker {marker} in statement")))?;
        bind_scalar(stmt, index, value.scalar())?;
    }
    Ok(())
}

fn bind_scalar(stmt: &mut Statement<'_>, index: usize, value: &BaseValue) -> SchemaResult<()> {
    match value {
        BaseValue::Null => stmt.raw_bind_parameter(index, rusqlite::types::Null),
        BaseValue::Bytes(b) => stmt.raw_bind_parameter(index, b.as_slice()),
        BaseValue::Bool(b) => stmt.raw_bind_parameter(index, i64::from(*b)),
        BaseValue::Double(v) => stmt.raw_bind_parameter(index, *v),
        BaseValue::Int(v) => stmt.raw_bind_parameter(index, i64::from(*v)),
        BaseValue::Int64(v) => stmt.raw_bind_parameter(index, *v),
        BaseValue::String(s) => stmt.raw_bind_parameter(index, s.as_str()),
        BaseValue::Date(d) => stmt.raw_bind_parameter(index, d.timestamp()),
        BaseValue::Uuid(u) => stmt.raw_bind_parameter(index, u.as_bytes().as_slice()),
        BaseValue::Parameter(_, inner) => return bind_scalar(stmt, index, inner),
    }
    .map_err(db_err)
}

fn column_value(value: ValueRef<'_>) -> ColumnValue {
    match value {
        ValueRef::Null => ColumnValue::Null,
        ValueRef::Integer(v) => ColumnValue::Integer(v),
        ValueRef::Real(v) => ColumnValue::Real(v),
        ValueRef::Text(b) => ColumnValue::Text(String::from_utf8_lossy(b).into_owned()),
        ValueRef::Blob(b) => ColumnValue::Blob(b.to_vec()),
    }
}

/// Runs a rendered query and decodes every row.
pub(crate) fn run_fetch<T, F>(
    conn: &Connection,
    sql: &str,
    values: &[BaseValue],
    fetch_expressions: Vec<Value>,
    decode: &mut F,
) -> SchemaResult<Vec<T>>
where
    F: FnMut(&mut Row) -> SchemaResult<T>,
{
    let mut stmt = conn.prepare_cached(sql).map_err(db_err)?;
    bind_values(&mut stmt, values)?;
    let column_count = stmt.column_count();

    let mut rows = stmt.raw_query();
    let mut row = Row::for_results(fetch_expressions);
    let mut results = Vec::new();
    while let Some(sqlite_row) = rows.next().map_err(db_err)? {
        let mut columns = Vec::with_capacity(column_count);
        for i in 0..column_count {
            columns.push(column_value(sqlite_row.get_ref(i).map_err(db_err)?));
        }
        row.load(columns);
        results.push(decode(&mut row)?);
    }
    Ok(results)
}

/// Runs a rendered statement.
///
/// Without bind values the SQL may hold several statements.
pub(crate) fn run_execute(
    conn: &Connection,
    sql: &str,
    values: &[BaseValue],
) -> SchemaResult<ExecuteResult> {
    let rows_affected = if values.is_empty() {
        conn.execute_batch(sql).map_err(db_err)?;
        i64::try_from(conn.changes()).unwrap_or(i64::MAX)
    } else {
        let mut stmt = conn.prepare_cached(sql).map_err(db_err)?;
        bind_values(&mut stmt, values)?;
        let count = stmt.raw_execute().map_err(db_err)?;
        i64::try_from(count).unwrap_or(i64::MAX)
    };
    Ok(ExecuteResult {
        last_insert_id: conn.last_insert_rowid(),
        rows_affected,
    })
}

#[async_trait::async_trait]
impl Executor for SqliteDatabase {
    async fn fetch_all<T, F>(&self, sql: &str, values: Vec<Value>, mut decode: F) -> SchemaResult<Vec<T>>
    where
        T: Send + 'static,
        F: FnMut(&mut Row) -> SchemaResult<T> + Send + 'static,
    {
        let (query, fetch_expressions) = prepare_fetch(sql, &values, &mut decode)?;
        debug!(sql = %query.base_sql, "fetch_all");
        self.read(move |conn| {
            run_fetch(
                conn,
                &query.base_sql,
                &query.base_values,
                fetch_expressions,
                &mut decode,
            )
        })
        .await
    }

    async fn fetch_exists(&self, sql: &str, values: Vec<Value>) -> SchemaResult<bool> {
        let query = Query::new(sql, &values)?.exists();
        debug!(sql = %query.base_sql, "fetch_exists");
        self.read(move |conn| {
            let mut stmt = conn.prepare_cached(&query.base_sql).map_err(db_err)?;
            bind_values(&mut stmt, &query.base_values)?;
            let mut rows = stmt.raw_query();
            match rows.next().map_err(db_err)? {
                Some(row) => Ok(row.get::<_, i64>(0).map_err(db_err)? != 0),
                None => Ok(false),
            }
        })
        .await
    }

    async fn execute(&self, sql: &str, values: Vec<Value>) -> SchemaResult<ExecuteResult> {
        let query = Query::new(sql, &values)?;
        debug!(sql = %query.base_sql, "execute");
        self.write(move |conn| run_execute(conn, &query.base_sql, &query.base_values))
            .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    use super::*;

    async fn users_db() -> SqliteDatabase {
        let db = SqliteDatabase::memory().unwrap();
        db.execute(
            "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER, bio TEXT)",
            vec![],
        )
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_sqlite_memory_open() {
        let db = SqliteDatabase::memory().unwrap();
        assert_eq!(db.path(), Path::new(":memory:"));
        let fk = db
            .fetch_one("PRAGMA foreign_keys", vec![], |row| row.get_or_default::<bool>("fk"))
            .await;
        assert_eq!(fk.unwrap(), Some(true));
    }

    #[tokio::test]
    async fn test_sqlite_insert_and_fetch() {
        let db = users_db().await;
        let result = db
            .execute(
                "INSERT INTO users (name, age) VALUES ({}, {})",
                vec![Value::from("Alice"), Value::from(30)],
            )
            .await
            .unwrap();
        assert_eq!(result.last_insert_id, 1);
        assert_eq!(result.rows_affected, 1);

        let rows = db
            .fetch_all("SELECT {*} FROM users", vec![], |row| {
                Ok((
                    row.get_or_default::<String>("name")?,
                    row.get_or_default::<i64>("age")?,
                    row.get::<String>("bio")?,
                ))
            })
            .await
            .unwrap();
        assert_eq!(rows, vec![("Alice".to_string(), 30, None)]);
    }

    #[tokio::test]
    async fn test_sqlite_multi_statement_execute() {
        let db = SqliteDatabase::memory().unwrap();
        db.execute(
            "CREATE TABLE a (id INTEGER); CREATE TABLE b (id INTEGER); INSERT INTO a VALUES (1);",
            vec![],
        )
        .await
        .unwrap();
        let exists = db.fetch_exists("SELECT 1 FROM a", vec![]).await.unwrap();
        assert!(exists);
        let empty = db.fetch_exists("SELECT 1 FROM b", vec![]).await.unwrap();
        assert!(!empty);
    }

    #[tokio::test]
    async fn test_sqlite_named_parameters() {
        let db = users_db().await;
        db.execute(
            "INSERT INTO users (name, age) VALUES ({name}, {age}), ({name} || '2', {age} + 1)",
            vec![Value::parameter("name", "bob"), Value::parameter("age", 40)],
        )
        .await
        .unwrap();
        let names = db
            .fetch_all(
                "SELECT {*} FROM users WHERE age >= {} ORDER BY id",
                vec![Value::from(40)],
                |row| row.get_or_default::<String>("name"),
            )
            .await
            .unwrap();
        assert_eq!(names, vec!["bob", "bob2"]);
    }

    #[tokio::test]
    async fn test_sqlite_list_and_ordinals() {
        let db = users_db().await;
        for name in ["a", "b", "c"] {
            db.execute("INSERT INTO users (name) VALUES ({})", vec![Value::from(name)])
                .await
                .unwrap();
        }
        let ids = db
            .fetch_all(
                "SELECT {*} FROM users WHERE name IN ({1}) OR name = {2} ORDER BY id",
                vec![Value::list(["a", "c"]), Value::from("b")],
                |row| row.get_or_default::<i64>("id"),
            )
            .await
            .unwrap();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_sqlite_update_rows_affected() {
        let db = users_db().await;
        for name in ["a", "b"] {
            db.execute("INSERT INTO users (name) VALUES ({})", vec![Value::from(name)])
                .await
                .unwrap();
        }
        let result = db
            .execute("UPDATE users SET age = {}", vec![Value::from(5)])
            .await
            .unwrap();
        assert_eq!(result.rows_affected, 2);
    }

    #[tokio::test]
    async fn test_sqlite_bind_conversions() {
        let db = SqliteDatabase::memory().unwrap();
        db.execute(
            "CREATE TABLE t (flag INTEGER, at INTEGER, id BLOB, data BLOB, price REAL)",
            vec![],
        )
        .await
        .unwrap();
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let id = Uuid::from_u128(42);
        db.execute(
            "INSERT INTO t VALUES ({}, {}, {}, {}, {})",
            vec![
                Value::from(true),
                Value::from(at),
                Value::from(id),
                Value::from(vec![0xDE_u8, 0xAD]),
                Value::from(19.99),
            ],
        )
        .await
        .unwrap();

        let row = db
            .fetch_one("SELECT {*} FROM t", vec![], |row| {
                Ok((
                    row.get_or_default::<bool>("flag")?,
                    row.get_or_default::<i64>("at")?,
                    row.get::<chrono::DateTime<Utc>>("at")?,
                    row.get::<Uuid>("id")?,
                    row.get_or_default::<Vec<u8>>("data")?,
                    row.get_or_default::<f64>("price")?,
                ))
            })
            .await
            .unwrap()
            .unwrap();
        assert!(row.0);
        assert_eq!(row.1, at.timestamp());
        assert_eq!(row.2, Some(at));
        assert_eq!(row.3, Some(id));
        assert_eq!(row.4, vec![0xDE, 0xAD]);
        assert!((row.5 - 19.99).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_sqlite_conversion_error() {
        let db = users_db().await;
        db.execute("INSERT INTO users (name) VALUES ('x')", vec![])
            .await
            .unwrap();
        let result = db
            .fetch_all("SELECT {*} FROM users", vec![], |row| row.get_or_default::<f64>("name"))
            .await;
        assert!(matches!(result, Err(SchemaError::ConversionError(_))));
    }

    #[tokio::test]
    async fn test_sqlite_template_error_before_io() {
        let db = users_db().await;
        let result = db.execute("DELETE FROM users WHERE id = {}", vec![]).await;
        assert!(matches!(result, Err(SchemaError::QueryBuilding(_))));
    }

    #[tokio::test]
    async fn test_sqlite_database_error() {
        let db = SqliteDatabase::memory().unwrap();
        let result = db.execute("SELECT * FROM missing_table", vec![]).await;
        assert!(matches!(result, Err(SchemaError::DatabaseError(_))));
    }

    // ── Read pool ───────────────────────────────────────────────────

    async fn pooled_items_db(dir: &tempfile::TempDir, pool_size: usize) -> SqliteDatabase {
        let db = SqliteDatabase::open(dir.path().join("items.db"), pool_size, Duration::from_secs(5)).unwrap();
        db.execute(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT);
             INSERT INTO items (name) VALUES ('a'), ('b'), ('c');",
            vec![],
        )
        .await
        .unwrap();
        db
    }

    async fn item_ids(db: &SqliteDatabase) -> SchemaResult<Vec<i64>> {
        db.fetch_all("SELECT {*} FROM items ORDER BY id", vec![], |row| {
            row.get_or_default::<i64>("id")
        })
        .await
    }

    #[tokio::test]
    async fn test_read_pool_survives_decoder_panic() {
        let dir = tempfile::tempdir().unwrap();
        let db = pooled_items_db(&dir, 1).await;

        let failed = db
            .fetch_all("SELECT {*} FROM items", vec![], |row| {
                let id = row.get_or_default::<i64>("id")?;
                assert!(row.is_probe(), "decoder failed on row {id}");
                Ok(id)
            })
            .await;
        assert!(matches!(failed, Err(SchemaError::DatabaseError(_))));

        assert_eq!(item_ids(&db).await.unwrap(), vec![1, 2, 3]);
        assert_eq!(item_ids(&db).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_pool_waits_for_free_connection() {
        let dir = tempfile::tempdir().unwrap();
        let db = pooled_items_db(&dir, 1).await;

        let (a, b, c) = tokio::join!(item_ids(&db), item_ids(&db), item_ids(&db));
        assert_eq!(a.unwrap(), vec![1, 2, 3]);
        assert_eq!(b.unwrap(), vec![1, 2, 3]);
        assert_eq!(c.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_read_connections_are_query_only() {
        let dir = tempfile::tempdir().unwrap();
        let db = pooled_items_db(&dir, 2).await;

        let result = db
            .read(|conn| conn.execute_batch("DELETE FROM items").map_err(db_err))
            .await;
        assert!(matches!(result, Err(SchemaError::DatabaseError(_))));
        assert_eq!(item_ids(&db).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_open_existing_does_not_create() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("typo.db");

        let result = SqliteDatabase::open_existing(&missing, 1, Duration::from_secs(5));
        assert!(matches!(result, Err(SchemaError::OperationalError(_))));
        assert!(!missing.exists());

        let db = pooled_items_db(&dir, 1).await;
        drop(db);
        let reopened =
            SqliteDatabase::open_existing(dir.path().join("items.db"), 1, Duration::from_secs(5)).unwrap();
        assert_eq!(item_ids(&reopened).await.unwrap(), vec![1, 2, 3]);
        assert!(SqliteDatabase::open_existing(":memory:", 0, Duration::from_secs(5)).is_ok());
    }

    #[tokio::test]
    async fn test_sqlite_foreign_keys_enforced() {
        let db = SqliteDatabase::memory().unwrap();
        db.execute(
            "CREATE TABLE p (id INTEGER PRIMARY KEY); CREATE TABLE c (p_id INTEGER REFERENCES p(id));",
            vec![],
        )
        .await
        .unwrap();
        let result = db
            .execute("INSERT INTO c VALUES ({})", vec![Value::from(7)])
            .await;
        assert!(result.is_err());
    }
}
