//! Response capture for published forms.
//!
//! This crate turns a form's ordered questions into field contracts a
//! client can render, validates raw answers against them, and persists
//! accepted submissions atomically. It sits on top of `formforge-models`
//! and never touches element ordering itself; the ledger is read-only
//! here.
//!
//! The flow is the one [`capture_response`] composes:
//!
//! 1. [`build_field_contracts`] reads the ledger and emits one
//!    [`FieldContract`] per question, in form order.
//! 2. [`ResponseForm::validate`] cleans every raw answer by its input
//!    kind and aggregates field errors.
//! 3. [`ResponseForm::submit`] writes the completion record and one
//!    response row per question in a single transaction.

pub mod capture;
pub mod contract;

pub use capture::{capture_response, ResponseForm, SubmissionMeta, ValidatedAnswer};
pub use contract::{build_field_contracts, FieldContract};
