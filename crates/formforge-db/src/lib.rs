//! # formforge-db
//!
//! The database seam for formforge. This crate defines everything the
//! domain layer needs from a relational store without committing to a
//! driver: the backend-agnostic [`Value`](value::Value) enum, typed
//! [`Row`](value::Row) access, the [`DbExecutor`](executor::DbExecutor)
//! trait implemented by concrete backends (`formforge-db-backends`),
//! transaction management via [`atomic`](transactions::atomic), and the
//! schema DDL in [`schema`].
//!
//! ## Module Overview
//!
//! - [`value`] - The [`Value`](value::Value) enum, [`Row`](value::Row),
//!   and [`FromValue`](value::FromValue) conversions
//! - [`executor`] - The [`DbExecutor`](executor::DbExecutor) trait
//! - [`transactions`] - [`TransactionManager`](transactions::TransactionManager)
//!   and [`atomic`](transactions::atomic)
//! - [`schema`] - Table DDL and [`create_all`](schema::create_all)

// result_large_err: ForgeError is the workspace error type and is used consistently.
// significant_drop_tightening: false positives with async Mutex guards.
#![allow(clippy::result_large_err)]
#![allow(clippy::significant_drop_tightening)]

pub mod executor;
pub mod schema;
pub mod transactions;
pub mod value;

pub use executor::{DatabaseBackendType, DbExecutor};
pub use transactions::{atomic, TransactionManager};
pub use value::{FromValue, Row, Value};
