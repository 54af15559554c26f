//! Wire-level request and response shapes.
//!
//! Every orderable element travels in the same envelope,
//! `{id?, element, element_type, seq_no?}`: `element_type` names the
//! variant, `element` carries the variant's own fields, and `seq_no`
//! requests a position in the form. The composer resolves the envelope
//! against the element registry; these types only define the shapes and
//! the typed accessors for the variant payloads.

use chrono::{DateTime, Utc};
use formforge_core::{ForgeError, ForgeResult, ValidationError};
use formforge_models::form::{Form, FormPatch, FormStatus, NewForm};
use formforge_models::html_component::NewHtmlComponent;
use formforge_models::question::{FieldKind, NewQuestion};
use formforge_models::registry::{self, ElementType};
use formforge_models::ElementKind;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;

/// A client-supplied reference to an element variant.
///
/// Accepts the bare discriminator string (`"formquestion"`) or a
/// descriptor object carrying a numeric `id` or an `app_label`/`model`
/// pair, matching the shape the composer emits on reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ElementTypeRef {
    Name(String),
    Descriptor {
        #[serde(default)]
        id: Option<i64>,
        #[serde(default)]
        app_label: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
}

impl ElementTypeRef {
    /// Resolves the reference against the element registry.
    ///
    /// # Errors
    ///
    /// [`ForgeError::UnknownElementType`] when the reference names no
    /// registered variant or carries neither an id nor a model.
    pub fn resolve(&self) -> ForgeResult<ElementKind> {
        match self {
            Self::Name(name) => registry::resolve(name),
            Self::Descriptor { id: Some(id), .. } => registry::resolve_id(*id),
            Self::Descriptor {
                model: Some(model),
                app_label,
                ..
            } => {
                let app_label = app_label.as_deref().unwrap_or(registry::APP_LABEL);
                registry::resolve_natural_key(app_label, model)
            }
            Self::Descriptor { .. } => Err(ForgeError::UnknownElementType(
                "element_type requires an id or a model".to_string(),
            )),
        }
    }
}

/// The wire envelope for one orderable element.
#[derive(Debug, Clone, Deserialize)]
pub struct ElementEnvelope {
    /// Ledger entry id; set on update payloads, ignored on create.
    #[serde(default)]
    pub id: Option<i64>,
    /// The variant's own fields, typed only after `element_type` resolves.
    pub element: JsonValue,
    pub element_type: ElementTypeRef,
    /// Requested position; allocated when absent.
    #[serde(default)]
    pub seq_no: Option<i64>,
}

impl ElementEnvelope {
    /// The payload typed as a question body.
    pub fn question_body(&self) -> ForgeResult<QuestionBody> {
        parse_body(&self.element)
    }

    /// The payload typed as an HTML component body.
    pub fn component_body(&self) -> ForgeResult<HtmlComponentBody> {
        parse_body(&self.element)
    }
}

/// Variant fields for a question, as supplied by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionBody {
    pub question: String,
    pub field_type: FieldKind,
    #[serde(default)]
    pub choices: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub help_text: String,
    #[serde(default)]
    pub related_question_id: Option<i64>,
}

impl QuestionBody {
    /// Binds the body to a form and a requested position.
    pub fn into_new(self, form_id: i64, seq_no: Option<i64>) -> NewQuestion {
        NewQuestion {
            form_id,
            question: self.question,
            field_type: self.field_type,
            choices: self.choices,
            required: self.required,
            help_text: self.help_text,
            related_question_id: self.related_question_id,
            seq_no,
        }
    }
}

/// Variant fields for an HTML component, as supplied by clients.
#[derive(Debug, Clone, Deserialize)]
pub struct HtmlComponentBody {
    pub html: String,
}

impl HtmlComponentBody {
    /// Binds the body to a form and a requested position.
    pub fn into_new(self, form_id: i64, seq_no: Option<i64>) -> NewHtmlComponent {
        NewHtmlComponent {
            form_id,
            html: self.html,
            seq_no,
        }
    }
}

/// One composed element in display order.
#[derive(Debug, Clone, Serialize)]
pub struct ElementOrderView {
    /// The ledger entry id; the handle for element update and delete.
    pub id: i64,
    pub seq_no: i64,
    pub element_type: ElementType,
    /// The serialized element; `null` when the target row is missing.
    pub element: Option<JsonValue>,
}

/// A form plus its composed elements.
#[derive(Debug, Clone, Serialize)]
pub struct FormDetail {
    #[serde(flatten)]
    pub form: Form,
    pub form_elements: Vec<ElementOrderView>,
}

/// Payload for creating a form, optionally with its initial elements.
#[derive(Debug, Clone, Deserialize)]
pub struct FormCreateRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_status")]
    pub status: FormStatus,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    pub owner_id: i64,
    #[serde(default)]
    pub editors: Vec<i64>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub form_elements: Vec<ElementEnvelope>,
}

fn default_status() -> FormStatus {
    FormStatus::Draft
}

impl FormCreateRequest {
    /// Splits the request into the form fields and the element envelopes.
    pub fn into_parts(self) -> (NewForm, Vec<ElementEnvelope>) {
        let new = NewForm {
            title: self.title,
            description: self.description,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            owner_id: self.owner_id,
            editors: self.editors,
            slug: self.slug,
        };
        (new, self.form_elements)
    }
}

/// Partial update payload for a form's own fields.
///
/// Omitted fields are left unchanged. `end_date` distinguishes an absent
/// key from an explicit `null`, which clears the window end.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormPatchRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<FormStatus>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    #[serde(default)]
    pub editors: Option<Vec<i64>>,
}

impl FormPatchRequest {
    pub fn into_patch(self) -> FormPatch {
        FormPatch {
            title: self.title,
            description: self.description,
            status: self.status,
            start_date: self.start_date,
            end_date: self.end_date,
            editors: self.editors,
        }
    }
}

/// Maps a present key to `Some(value)` so that, combined with
/// `#[serde(default)]`, an absent key stays `None` while `null` becomes
/// `Some(None)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn parse_body<T: serde::de::DeserializeOwned>(value: &JsonValue) -> ForgeResult<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| ForgeError::ValidationError(ValidationError::new(e.to_string(), "invalid")))
}
