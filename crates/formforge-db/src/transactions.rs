//! Transaction support.
//!
//! Every multi-row mutation in formforge (element create/update plus its
//! ledger write, form-with-elements creation, response submission) runs
//! inside a single database transaction; the transaction, not a lock, is
//! the correctness unit.
//!
//! # Architecture
//!
//! Transactions are managed through the [`TransactionManager`], which wraps
//! a [`DbExecutor`] and tracks nesting depth. The [`atomic()`] function is
//! the primary entry point, accepting a closure that runs within a
//! transaction context: commit on `Ok`, rollback on `Err`. Re-entrant
//! `begin()` calls on the same manager create savepoints rather than nested
//! transactions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use formforge_core::{ForgeError, ForgeResult};
use tokio::sync::Mutex;

use crate::executor::{DatabaseBackendType, DbExecutor};
use crate::value::{Row, Value};

/// Counter for generating unique savepoint names.
static SAVEPOINT_COUNTER: AtomicU64 = AtomicU64::new(0);

/// State of a savepoint within a transaction.
#[derive(Debug, Clone)]
pub struct Savepoint {
    /// The unique name of this savepoint.
    pub name: String,
    /// Whether this savepoint has been released.
    pub released: bool,
    /// Whether this savepoint has been rolled back.
    pub rolled_back: bool,
}

impl Savepoint {
    /// Creates a new savepoint with an auto-generated unique name.
    pub fn new() -> Self {
        let id = SAVEPOINT_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            name: format!("sp_{id}"),
            released: false,
            rolled_back: false,
        }
    }
}

impl Default for Savepoint {
    fn default() -> Self {
        Self::new()
    }
}

/// A list of callbacks to be executed after a transaction commits.
type OnCommitCallbacks = Vec<Box<dyn FnOnce() + Send + 'static>>;

/// Manages transaction state for a database connection.
///
/// `TransactionManager` wraps a `DbExecutor` and tracks the current
/// transaction nesting depth, savepoints, and `on_commit` callbacks.
pub struct TransactionManager<'a> {
    /// The underlying database executor.
    db: &'a dyn DbExecutor,
    /// Current nesting depth (0 = no transaction, 1 = outermost, 2+ = savepoint).
    depth: Arc<Mutex<u32>>,
    /// Stack of active savepoints.
    savepoints: Arc<Mutex<Vec<Savepoint>>>,
    /// Callbacks registered to run after the outermost transaction commits.
    on_commit_callbacks: Arc<Mutex<OnCommitCallbacks>>,
}

impl<'a> TransactionManager<'a> {
    /// Creates a new transaction manager for the given executor.
    pub fn new(db: &'a dyn DbExecutor) -> Self {
        Self {
            db,
            depth: Arc::new(Mutex::new(0)),
            savepoints: Arc::new(Mutex::new(Vec::new())),
            on_commit_callbacks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the current transaction nesting depth.
    pub async fn depth(&self) -> u32 {
        *self.depth.lock().await
    }

    /// Returns a reference to the underlying executor.
    pub fn executor(&self) -> &dyn DbExecutor {
        self.db
    }

    /// Begins a new transaction, or creates a savepoint if already in one.
    ///
    /// Called automatically by [`atomic()`]; call it directly only when
    /// managing transaction boundaries by hand.
    pub async fn begin(&self) -> ForgeResult<()> {
        let mut depth = self.depth.lock().await;
        if *depth == 0 {
            self.db.execute_sql("BEGIN", &[]).await?;
        } else {
            let sp = Savepoint::new();
            let sql = format!("SAVEPOINT {}", sp.name);
            self.db.execute_sql(&sql, &[]).await?;
            self.savepoints.lock().await.push(sp);
        }
        *depth += 1;
        Ok(())
    }

    /// Commits the current transaction or releases the current savepoint.
    pub async fn commit(&self) -> ForgeResult<()> {
        let mut depth = self.depth.lock().await;
        if *depth == 0 {
            return Err(ForgeError::DatabaseError(
                "Cannot commit: not in a transaction".to_string(),
            ));
        }

        if *depth == 1 {
            self.db.execute_sql("COMMIT", &[]).await?;
            *depth = 0;

            let callbacks: OnCommitCallbacks = {
                let mut cbs = self.on_commit_callbacks.lock().await;
                std::mem::take(&mut *cbs)
            };
            for cb in callbacks {
                cb();
            }
        } else {
            let mut savepoints = self.savepoints.lock().await;
            if let Some(mut sp) = savepoints.pop() {
                let sql = format!("RELEASE SAVEPOINT {}", sp.name);
                self.db.execute_sql(&sql, &[]).await?;
                sp.released = true;
            }
            *depth -= 1;
        }

        Ok(())
    }

    /// Rolls back the current transaction or savepoint.
    pub async fn rollback(&self) -> ForgeResult<()> {
        let mut depth = self.depth.lock().await;
        if *depth == 0 {
            return Err(ForgeError::DatabaseError(
                "Cannot rollback: not in a transaction".to_string(),
            ));
        }

        if *depth == 1 {
            self.db.execute_sql("ROLLBACK", &[]).await?;
            *depth = 0;
            // Callbacks never run for a rolled-back transaction.
            self.on_commit_callbacks.lock().await.clear();
        } else {
            let mut savepoints = self.savepoints.lock().await;
            if let Some(mut sp) = savepoints.pop() {
                let sql = format!("ROLLBACK TO SAVEPOINT {}", sp.name);
                self.db.execute_sql(&sql, &[]).await?;
                sp.rolled_back = true;
            }
            *depth -= 1;
        }

        Ok(())
    }

    /// Registers a callback to run after the outermost transaction commits.
    ///
    /// If no transaction is active, the callback is executed immediately.
    /// If the transaction is rolled back, the callback is discarded.
    pub async fn on_commit<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let depth = self.depth.lock().await;
        if *depth == 0 {
            drop(depth);
            callback();
        } else {
            self.on_commit_callbacks.lock().await.push(Box::new(callback));
        }
    }

    /// Returns the number of pending `on_commit` callbacks.
    pub async fn pending_callbacks(&self) -> usize {
        self.on_commit_callbacks.lock().await.len()
    }
}

#[async_trait::async_trait]
impl DbExecutor for TransactionManager<'_> {
    fn backend_type(&self) -> DatabaseBackendType {
        self.db.backend_type()
    }

    async fn execute_sql(&self, sql: &str, params: &[Value]) -> ForgeResult<u64> {
        self.db.execute_sql(sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> ForgeResult<Vec<Row>> {
        self.db.query(sql, params).await
    }

    async fn query_one(&self, sql: &str, params: &[Value]) -> ForgeResult<Row> {
        self.db.query_one(sql, params).await
    }

    async fn insert_returning_id(&self, sql: &str, params: &[Value]) -> ForgeResult<Value> {
        self.db.insert_returning_id(sql, params).await
    }
}

/// Executes a closure within a database transaction.
///
/// If the closure returns `Ok`, the transaction is committed. If it returns
/// `Err`, the transaction is rolled back and the error is passed through.
///
/// # Examples
///
/// ```ignore
/// use formforge_db::transactions::atomic;
///
/// let responder = atomic(db, |txn| async move {
///     let id = txn.insert_returning_id("INSERT INTO ...", &params).await?;
///     // more statements sharing the same transaction
///     Ok(id)
/// }).await?;
/// ```
pub async fn atomic<'a, F, Fut, T>(db: &'a dyn DbExecutor, f: F) -> ForgeResult<T>
where
    F: FnOnce(Arc<TransactionManager<'a>>) -> Fut,
    Fut: std::future::Future<Output = ForgeResult<T>>,
{
    let txn = Arc::new(TransactionManager::new(db));
    txn.begin().await?;

    match f(Arc::clone(&txn)).await {
        Ok(result) => {
            txn.commit().await?;
            Ok(result)
        }
        Err(e) => {
            // Keep the original error even if the rollback itself fails.
            let _ = txn.rollback().await;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    /// A mock database executor that records SQL statements.
    struct MockDb {
        statements: TokioMutex<Vec<String>>,
    }

    impl MockDb {
        fn new() -> Self {
            Self {
                statements: TokioMutex::new(Vec::new()),
            }
        }

        async fn statements(&self) -> Vec<String> {
            self.statements.lock().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl DbExecutor for MockDb {
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::SQLite
        }

        async fn execute_sql(&self, sql: &str, _params: &[Value]) -> ForgeResult<u64> {
            self.statements.lock().await.push(sql.to_string());
            Ok(1)
        }

        async fn query(&self, sql: &str, _params: &[Value]) -> ForgeResult<Vec<Row>> {
            self.statements.lock().await.push(sql.to_string());
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_atomic_commits_on_ok() {
        let db = MockDb::new();
        let result = atomic(&db, |txn| async move {
            txn.execute_sql("INSERT INTO t VALUES (1)", &[]).await?;
            Ok(42)
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(
            db.statements().await,
            vec!["BEGIN", "INSERT INTO t VALUES (1)", "COMMIT"]
        );
    }

    #[tokio::test]
    async fn test_atomic_rolls_back_on_err() {
        let db = MockDb::new();
        let result: ForgeResult<()> = atomic(&db, |txn| async move {
            txn.execute_sql("INSERT INTO t VALUES (1)", &[]).await?;
            Err(ForgeError::DatabaseError("boom".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(
            db.statements().await,
            vec!["BEGIN", "INSERT INTO t VALUES (1)", "ROLLBACK"]
        );
    }

    #[tokio::test]
    async fn test_nested_begin_creates_savepoint() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);

        txn.begin().await.unwrap();
        txn.begin().await.unwrap();
        assert_eq!(txn.depth().await, 2);

        txn.commit().await.unwrap(); // releases the savepoint
        txn.commit().await.unwrap(); // commits

        let statements = db.statements().await;
        assert_eq!(statements[0], "BEGIN");
        assert!(statements[1].starts_with("SAVEPOINT sp_"));
        assert!(statements[2].starts_with("RELEASE SAVEPOINT sp_"));
        assert_eq!(statements[3], "COMMIT");
    }

    #[tokio::test]
    async fn test_nested_rollback_to_savepoint() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);

        txn.begin().await.unwrap();
        txn.begin().await.unwrap();
        txn.rollback().await.unwrap(); // rolls back to the savepoint
        assert_eq!(txn.depth().await, 1);
        txn.commit().await.unwrap();

        let statements = db.statements().await;
        assert!(statements[2].starts_with("ROLLBACK TO SAVEPOINT sp_"));
        assert_eq!(statements[3], "COMMIT");
    }

    #[tokio::test]
    async fn test_commit_outside_transaction_fails() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);
        assert!(txn.commit().await.is_err());
        assert!(txn.rollback().await.is_err());
    }

    #[tokio::test]
    async fn test_on_commit_runs_after_commit() {
        let db = MockDb::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        atomic(&db, |txn| async move {
            txn.on_commit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
            assert_eq!(txn.pending_callbacks().await, 1);
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_on_commit_discarded_on_rollback() {
        let db = MockDb::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        let result: ForgeResult<()> = atomic(&db, |txn| async move {
            txn.on_commit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .await;
            Err(ForgeError::DatabaseError("boom".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_on_commit_immediate_without_transaction() {
        let db = MockDb::new();
        let txn = TransactionManager::new(&db);
        let counter = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&counter);
        txn.on_commit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
