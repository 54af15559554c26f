//! SQLite database backend using `rusqlite`.
//!
//! Provides the [`SqliteBackend`] which implements the
//! [`DbExecutor`](formforge_db::DbExecutor) trait using `rusqlite` wrapped
//! in `tokio::task::spawn_blocking` for async compatibility.
//!
//! Features:
//! - WAL mode enabled by default for better concurrent read performance
//! - Foreign keys enabled so `ON DELETE CASCADE` actually fires
//! - In-memory database support via `:memory:` path (great for testing)
//! - Constraint violations surface as `IntegrityError`, which the sequence
//!   ledger inspects to detect seq-number collisions under concurrency

use std::path::PathBuf;
use std::sync::Arc;

use formforge_core::{ForgeError, ForgeResult};
use formforge_db::{DatabaseBackendType, DbExecutor, Row, Value};
use tokio::sync::Mutex;

/// A SQLite database backend.
///
/// Uses `rusqlite` for database access with a `Mutex`-based concurrency
/// model. All operations are run via `tokio::task::spawn_blocking` to
/// avoid blocking the async runtime.
pub struct SqliteBackend {
    /// The path to the database file (or ":memory:").
    path: PathBuf,
    /// The connection, guarded by an async mutex.
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteBackend {
    /// Opens a new SQLite database at the given path.
    ///
    /// If the path is `:memory:`, an in-memory database is created.
    /// WAL journal mode is enabled by default for file-based databases.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> ForgeResult<Self> {
        let path = path.into();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| ForgeError::OperationalError(format!("SQLite open failed: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| ForgeError::OperationalError(format!("Failed to set pragmas: {e}")))?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory database (convenience constructor).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created.
    pub fn memory() -> ForgeResult<Self> {
        Self::open(":memory:")
    }

    /// Returns the database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Maps a `rusqlite` error into the formforge error taxonomy.
    ///
    /// Constraint violations become `IntegrityError` so callers can tell a
    /// unique-constraint race apart from a broken connection; everything
    /// else becomes `DatabaseError`.
    fn map_err(e: &rusqlite::Error) -> ForgeError {
        match e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                ForgeError::IntegrityError(
                    msg.clone().unwrap_or_else(|| e.to_string()),
                )
            }
            _ => ForgeError::DatabaseError(format!("{e}")),
        }
    }

    /// Binds `Value` parameters to a `rusqlite` statement.
    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> ForgeResult<()> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, b),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                // Stored as RFC 3339 text so FromValue can parse it back.
                Value::DateTime(dt) => {
                    stmt.raw_bind_parameter(idx, dt.to_rfc3339().as_str())
                }
            }
            .map_err(|e| ForgeError::DatabaseError(format!("Bind error: {e}")))?;
        }
        Ok(())
    }

    /// Converts a `rusqlite::Row` to our generic `Row`.
    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
        let values: Vec<Value> = column_names
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let val_ref = sqlite_row
                    .get_ref(i)
                    .unwrap_or(rusqlite::types::ValueRef::Null);
                match val_ref {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
                    rusqlite::types::ValueRef::Real(v) => Value::Float(v),
                    rusqlite::types::ValueRef::Text(b) => {
                        Value::String(String::from_utf8_lossy(b).to_string())
                    }
                    // No blob columns exist in the ff_ schema; decode as text.
                    rusqlite::types::ValueRef::Blob(b) => {
                        Value::String(String::from_utf8_lossy(b).to_string())
                    }
                }
            })
            .collect();

        Row::new(column_names.to_vec(), values)
    }
}

#[async_trait::async_trait]
impl DbExecutor for SqliteBackend {
    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> ForgeResult<u64> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&sql).map_err(|e| Self::map_err(&e))?;
            Self::bind_params(&mut stmt, &params)?;
            let count = stmt.raw_execute().map_err(|e| Self::map_err(&e))?;
            Ok(count as u64)
        })
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Task join error: {e}")))?
    }

    async fn query(&self, sql: &str, params: &[Value]) -> ForgeResult<Vec<Row>> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&sql).map_err(|e| Self::map_err(&e))?;

            let column_names: Vec<String> =
                stmt.column_names().into_iter().map(String::from).collect();

            Self::bind_params(&mut stmt, &params)?;

            let mut raw_rows = stmt.raw_query();

            let mut rows = Vec::new();
            while let Some(row) = raw_rows.next().map_err(|e| Self::map_err(&e))? {
                rows.push(Self::convert_row(row, &column_names));
            }

            Ok(rows)
        })
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Task join error: {e}")))?
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> ForgeResult<Value> {
        let conn = self.conn.clone();
        let sql = sql.to_string();
        let params = params.to_vec();

        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare(&sql).map_err(|e| Self::map_err(&e))?;
            Self::bind_params(&mut stmt, &params)?;
            stmt.raw_execute().map_err(|e| Self::map_err(&e))?;
            let id = conn.last_insert_rowid();
            Ok(Value::Int(id))
        })
        .await
        .map_err(|e| ForgeError::DatabaseError(format!("Task join error: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_sqlite_memory_open() {
        let backend = SqliteBackend::memory().unwrap();
        assert_eq!(backend.backend_type(), DatabaseBackendType::SQLite);
        assert_eq!(backend.path().to_str().unwrap(), ":memory:");
    }

    #[tokio::test]
    async fn test_sqlite_insert_and_query() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)",
                &[],
            )
            .await
            .unwrap();

        backend
            .execute_sql(
                "INSERT INTO users (name, age) VALUES (?, ?)",
                &[Value::from("Alice"), Value::from(30)],
            )
            .await
            .unwrap();

        let rows = backend
            .query("SELECT id, name, age FROM users", &[])
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[0].get::<i64>("age").unwrap(), 30);
    }

    #[tokio::test]
    async fn test_sqlite_insert_returning_id() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql("CREATE TABLE t (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();

        let id = backend
            .insert_returning_id("INSERT INTO t (val) VALUES (?)", &[Value::from("a")])
            .await
            .unwrap();
        assert_eq!(id, Value::Int(1));

        let id = backend
            .insert_returning_id("INSERT INTO t (val) VALUES (?)", &[Value::from("b")])
            .await
            .unwrap();
        assert_eq!(id, Value::Int(2));
    }

    #[tokio::test]
    async fn test_sqlite_query_one_not_found() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql("CREATE TABLE test (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();

        let result = backend
            .query_one("SELECT id FROM test WHERE id = ?", &[Value::from(999)])
            .await;

        assert!(matches!(result, Err(ForgeError::DoesNotExist(_))));
    }

    #[tokio::test]
    async fn test_sqlite_query_one_multiple() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql("CREATE TABLE test (id INTEGER PRIMARY KEY, val TEXT)", &[])
            .await
            .unwrap();

        backend
            .execute_sql("INSERT INTO test (val) VALUES (?)", &[Value::from("a")])
            .await
            .unwrap();
        backend
            .execute_sql("INSERT INTO test (val) VALUES (?)", &[Value::from("b")])
            .await
            .unwrap();

        let result = backend.query_one("SELECT val FROM test", &[]).await;
        assert!(matches!(result, Err(ForgeError::MultipleObjectsReturned(_))));
    }

    #[tokio::test]
    async fn test_sqlite_null_handling() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql(
                "CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, bio TEXT)",
                &[],
            )
            .await
            .unwrap();

        backend
            .execute_sql(
                "INSERT INTO test (name, bio) VALUES (?, ?)",
                &[Value::from("Alice"), Value::Null],
            )
            .await
            .unwrap();

        let row = backend
            .query_one("SELECT name, bio FROM test WHERE id = ?", &[Value::from(1)])
            .await
            .unwrap();

        assert_eq!(row.get::<String>("name").unwrap(), "Alice");
        let bio: Option<String> = row.get("bio").unwrap();
        assert_eq!(bio, None);
    }

    #[tokio::test]
    async fn test_sqlite_datetime_round_trip() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql("CREATE TABLE test (id INTEGER PRIMARY KEY, at TEXT)", &[])
            .await
            .unwrap();

        let at = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        backend
            .execute_sql("INSERT INTO test (at) VALUES (?)", &[Value::from(at)])
            .await
            .unwrap();

        let row = backend.query_one("SELECT at FROM test", &[]).await.unwrap();
        assert_eq!(row.get::<chrono::DateTime<Utc>>("at").unwrap(), at);
    }

    #[tokio::test]
    async fn test_sqlite_boolean_values() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql(
                "CREATE TABLE flags (id INTEGER PRIMARY KEY, active INTEGER)",
                &[],
            )
            .await
            .unwrap();

        backend
            .execute_sql(
                "INSERT INTO flags (active) VALUES (?)",
                &[Value::Bool(true)],
            )
            .await
            .unwrap();

        let row = backend
            .query_one("SELECT active FROM flags WHERE id = ?", &[Value::from(1)])
            .await
            .unwrap();
        // SQLite stores booleans as integers.
        assert_eq!(row.get::<i64>("active").unwrap(), 1);
        assert!(row.get::<bool>("active").unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_update_and_delete_counts() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[])
            .await
            .unwrap();

        backend
            .execute_sql("INSERT INTO users (name) VALUES (?)", &[Value::from("Alice")])
            .await
            .unwrap();

        let affected = backend
            .execute_sql(
                "UPDATE users SET name = ? WHERE id = ?",
                &[Value::from("Alice Updated"), Value::from(1)],
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let affected = backend
            .execute_sql("DELETE FROM users WHERE id = ?", &[Value::from(1)])
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let rows = backend.query("SELECT * FROM users", &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_sqlite_unique_violation_is_integrity_error() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql(
                "CREATE TABLE slots (id INTEGER PRIMARY KEY, seq INTEGER, UNIQUE (seq))",
                &[],
            )
            .await
            .unwrap();

        backend
            .execute_sql("INSERT INTO slots (seq) VALUES (?)", &[Value::from(10)])
            .await
            .unwrap();

        let result = backend
            .execute_sql("INSERT INTO slots (seq) VALUES (?)", &[Value::from(10)])
            .await;

        match result {
            Err(ForgeError::IntegrityError(msg)) => {
                assert!(msg.contains("UNIQUE"), "unexpected message: {msg}");
            }
            other => panic!("expected IntegrityError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sqlite_foreign_keys_cascade() {
        let backend = SqliteBackend::memory().unwrap();
        backend
            .execute_sql("CREATE TABLE parent (id INTEGER PRIMARY KEY)", &[])
            .await
            .unwrap();
        backend
            .execute_sql(
                "CREATE TABLE child (id INTEGER PRIMARY KEY, \
                 parent_id INTEGER NOT NULL REFERENCES parent (id) ON DELETE CASCADE)",
                &[],
            )
            .await
            .unwrap();

        backend
            .execute_sql("INSERT INTO parent (id) VALUES (1)", &[])
            .await
            .unwrap();
        backend
            .execute_sql("INSERT INTO child (parent_id) VALUES (1)", &[])
            .await
            .unwrap();

        backend
            .execute_sql("DELETE FROM parent WHERE id = 1", &[])
            .await
            .unwrap();

        let rows = backend.query("SELECT * FROM child", &[]).await.unwrap();
        assert!(rows.is_empty());
    }
}
