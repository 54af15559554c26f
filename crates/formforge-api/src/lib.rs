//! # formforge-api
//!
//! The wire layer of the form builder: serializer types for the element
//! envelope `{id?, element, element_type, seq_no?}` and the polymorphic
//! composer that translates between envelopes and stored elements.
//!
//! The composer is the single dispatch point over element variants.
//! Reads assemble a form's elements in ledger order, tolerating dangling
//! references; writes resolve the variant via the registry and run each
//! mutation in one transaction, including form-with-elements creation.
//!
//! ## Modules
//!
//! - [`serializers`] - Request and response shapes
//! - [`composer`] - Read assembly and write dispatch

pub mod composer;
pub mod serializers;

// Re-export the most commonly used types at the crate root.
pub use composer::{
    compose, create_element, create_form, delete_element, form_detail, update_element,
    update_form,
};
pub use serializers::{
    ElementEnvelope, ElementOrderView, ElementTypeRef, FormCreateRequest, FormDetail,
    FormPatchRequest, HtmlComponentBody, QuestionBody,
};
