//! The database executor trait.
//!
//! [`DbExecutor`] is the minimal async interface the repository layer
//! requires from a relational store. Concrete backends implement it in
//! `formforge-db-backends`; [`TransactionManager`](crate::transactions::TransactionManager)
//! implements it too, so repositories run unchanged inside or outside a
//! transaction.

use formforge_core::{ForgeError, ForgeResult};

use crate::value::{Row, Value};

/// The kind of database backend, for dialect-specific SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackendType {
    /// SQLite (the backend this build ships with).
    SQLite,
    /// PostgreSQL (reserved; `$n` placeholders).
    PostgreSQL,
}

impl DatabaseBackendType {
    /// Returns a parameter placeholder for the given 1-based index.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Self::SQLite => "?".to_string(),
            Self::PostgreSQL => format!("${index}"),
        }
    }
}

/// Minimal async database executor trait.
///
/// This is the bridge between the repository layer and concrete database
/// backends. Repositories accept `&dyn DbExecutor`, which both backends
/// and transaction managers implement.
#[async_trait::async_trait]
pub trait DbExecutor: Send + Sync {
    /// Returns the backend type for dialect-specific SQL.
    fn backend_type(&self) -> DatabaseBackendType;

    /// Runs a SQL statement that does not return rows.
    /// Returns the number of rows affected.
    async fn execute_sql(&self, sql: &str, params: &[Value]) -> ForgeResult<u64>;

    /// Runs a SQL query and returns all result rows.
    async fn query(&self, sql: &str, params: &[Value]) -> ForgeResult<Vec<Row>>;

    /// Runs a SQL query and returns exactly one row.
    /// Returns `DoesNotExist` if no rows, `MultipleObjectsReturned` if more than one.
    async fn query_one(&self, sql: &str, params: &[Value]) -> ForgeResult<Row> {
        let rows = self.query(sql, params).await?;
        match rows.len() {
            0 => Err(ForgeError::DoesNotExist("No rows returned".to_string())),
            1 => Ok(rows.into_iter().next().unwrap()),
            n => Err(ForgeError::MultipleObjectsReturned(format!(
                "Expected 1 row, got {n}"
            ))),
        }
    }

    /// Executes an INSERT and returns the last inserted row ID.
    ///
    /// Backends get a default implementation using `execute_sql` plus a
    /// follow-up query, but should override it for correctness under
    /// concurrent use.
    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> ForgeResult<Value> {
        self.execute_sql(sql, params).await?;
        let rows = self.query("SELECT last_insert_rowid() AS id", &[]).await?;
        rows.into_iter().next().map_or_else(
            || {
                Err(ForgeError::DatabaseError(
                    "Failed to retrieve last inserted ID".to_string(),
                ))
            },
            |r| r.get::<Value>("id"),
        )
    }
}
