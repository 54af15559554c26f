//! # formforge-db-backends
//!
//! Database backend implementations for formforge. Each backend implements
//! the [`DbExecutor`](formforge_db::DbExecutor) trait from `formforge-db`,
//! so repositories and the transaction layer stay backend-agnostic.
//!
//! Supported backends:
//! - `SQLite` (behind the `sqlite` feature)

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
