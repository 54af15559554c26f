//! # formforge
//!
//! A form-builder backend: polymorphic ordered form elements and a
//! dynamic response-capture engine.
//!
//! This is the meta-crate that re-exports all sub-crates for convenient
//! access. You can depend on `formforge` to get the whole stack, or
//! depend on individual crates for finer-grained control.

/// Settings, error types, and logging setup.
pub use formforge_core as core;

/// Database abstraction: executor trait, values, transactions, schema.
pub use formforge_db as db;

/// Database backends: `SQLite`.
pub use formforge_db_backends as db_backends;

/// Domain models: forms, questions, components, and the sequence ledger.
pub use formforge_models as models;

/// Element composition and the form editing surface.
pub use formforge_api as api;

/// Field contracts, submission validation, and response capture.
pub use formforge_responses as responses;

/// Third-party re-exports so callers don't need to pin them separately.
pub use {chrono, serde, serde_json, tokio, tracing};
