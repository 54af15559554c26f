//! # formforge-models
//!
//! The domain models of the form builder: forms, their orderable elements
//! (questions and HTML blocks), the sequence ledger that holds per-form
//! display order, and the submission records.
//!
//! Element ordering is kept consistent by construction. Element
//! repositories call the lifecycle hooks ([`element_saved`],
//! [`element_deleted`]) inside the same transaction as the element write,
//! so an element row and its ledger entry commit or roll back together.
//!
//! ## Modules
//!
//! - [`registry`] - The closed set of orderable element kinds
//! - [`ledger`] - The per-form sequence ledger
//! - [`lifecycle`] - The [`Orderable`] trait and save/delete hooks
//! - [`form`] - Forms, status, live windows, and permissions
//! - [`question`] - The question element and its field kinds
//! - [`html_component`] - The raw-HTML element
//! - [`responder`] - Completion records and answers

pub mod form;
pub mod html_component;
pub mod ledger;
pub mod lifecycle;
pub mod question;
pub mod registry;
pub mod responder;

// Re-export the most commonly used types at the crate root.
pub use form::{Form, FormPatch, FormRepository, FormStatus, NewForm};
pub use html_component::{HtmlComponent, HtmlComponentRepository, NewHtmlComponent};
pub use ledger::{LedgerEntry, SequenceLedger, SEQ_GAP};
pub use lifecycle::{element_deleted, element_saved, Orderable};
pub use question::{FieldKind, NewQuestion, Question, QuestionRepository, CHOICE_SEPARATOR};
pub use registry::{ElementKind, ElementType, APP_LABEL};
pub use responder::{FormResponder, FormResponse, NewResponder, ResponderRepository};
