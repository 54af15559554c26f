//! The dynamic response form: typed validation and atomic submission.
//!
//! A [`ResponseForm`] is built per request from a form's field contracts.
//! `validate` cleans every raw answer by its input kind, collecting field
//! errors across the whole submission instead of stopping at the first,
//! so a respondent can fix everything in one round trip. `submit` writes
//! the completion record and one response row per question in a single
//! transaction; the unique constraint on (form, user) turns a repeat
//! submission into [`ForgeError::AlreadyCompleted`] and rolls the
//! answers back with it.

use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use formforge_core::logging::form_span;
use formforge_core::{ForgeError, ForgeResult, ValidationError};
use formforge_db::transactions::atomic;
use formforge_db::DbExecutor;
use formforge_models::form::{Form, FormRepository};
use formforge_models::question::FieldKind;
use formforge_models::responder::{FormResponder, NewResponder, ResponderRepository};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::contract::{build_field_contracts, FieldContract};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$").expect("valid regex")
});
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").expect("valid regex"));

/// Client metadata recorded alongside a submission.
#[derive(Debug, Clone, Default)]
pub struct SubmissionMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// An answer that passed validation, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedAnswer {
    pub question_id: i64,
    /// The cleaned answer text; empty for skipped optional questions.
    pub answer: String,
}

/// A response form for one stored form, built from its field contracts.
#[derive(Debug, Clone)]
pub struct ResponseForm {
    form: Form,
    contracts: Vec<FieldContract>,
}

impl ResponseForm {
    /// Builds the response form for a form's current questions.
    pub async fn for_form(db: &dyn DbExecutor, form_id: i64) -> ForgeResult<Self> {
        let form = FormRepository::get(db, form_id).await?;
        let contracts = build_field_contracts(db, form_id).await?;
        Ok(Self { form, contracts })
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn contracts(&self) -> &[FieldContract] {
        &self.contracts
    }

    /// Validates raw answers against the contracts.
    ///
    /// Raw answers are keyed by question id; ids that match no contract
    /// are ignored. Every contract yields exactly one validated answer on
    /// success, with skipped optional questions validating to the empty
    /// string. Errors are collected across all fields and returned as one
    /// aggregated [`ForgeError::ValidationError`] keyed by field name.
    pub fn validate(&self, raw: &HashMap<i64, String>) -> ForgeResult<Vec<ValidatedAnswer>> {
        let span = form_span("validate_submission", self.form.id);
        let _guard = span.enter();

        let mut field_errors: HashMap<String, Vec<ValidationError>> = HashMap::new();
        let mut answers = Vec::with_capacity(self.contracts.len());

        for contract in &self.contracts {
            let raw_value = raw.get(&contract.question_id).map(String::as_str);
            match clean_answer(contract, raw_value) {
                Ok(answer) => answers.push(ValidatedAnswer {
                    question_id: contract.question_id,
                    answer,
                }),
                Err(errors) => {
                    field_errors.insert(contract.name.clone(), errors);
                }
            }
        }

        if field_errors.is_empty() {
            debug!(answers = answers.len(), "submission validated");
            Ok(answers)
        } else {
            debug!(fields = field_errors.len(), "submission failed validation");
            Err(ForgeError::ValidationError(
                ValidationError::with_field_errors(field_errors),
            ))
        }
    }

    /// Persists a validated submission in one transaction.
    ///
    /// Creates the completion record, then one response row per answer,
    /// empty answers included. A completion record already existing for
    /// (form, user) fails the whole transaction with
    /// [`ForgeError::AlreadyCompleted`]; nothing is written.
    pub async fn submit(
        &self,
        db: &dyn DbExecutor,
        user_id: i64,
        answers: &[ValidatedAnswer],
        meta: SubmissionMeta,
    ) -> ForgeResult<FormResponder> {
        let form_id = self.form.id;
        atomic(db, |txn| async move {
            let responder = ResponderRepository::create_within(
                &*txn,
                NewResponder {
                    form_id,
                    user_id,
                    ip_address: meta.ip_address,
                    user_agent: meta.user_agent,
                },
            )
            .await?;

            for answer in answers {
                ResponderRepository::record_response_within(
                    &*txn,
                    responder.id,
                    answer.question_id,
                    answer.answer.clone(),
                )
                .await?;
            }

            let responder_id = responder.id;
            let count = answers.len();
            txn.on_commit(move || {
                info!(form_id, user_id, responder_id, count, "form response captured");
            })
            .await;

            Ok(responder)
        })
        .await
    }
}

/// Validates and submits a raw answer set in one call.
pub async fn capture_response(
    db: &dyn DbExecutor,
    form_id: i64,
    user_id: i64,
    raw: &HashMap<i64, String>,
    meta: SubmissionMeta,
) -> ForgeResult<FormResponder> {
    let form = ResponseForm::for_form(db, form_id).await?;
    let answers = form.validate(raw)?;
    form.submit(db, user_id, &answers, meta).await
}

/// Cleans one raw value by the contract's input kind.
///
/// Mirrors the usual form-field cleaning order: required check first,
/// empty optional values short-circuit to an empty answer, then the kind
/// decides coercion and membership checks. Errors for one field
/// accumulate, so a multi-select reports every bad option.
fn clean_answer(
    contract: &FieldContract,
    raw: Option<&str>,
) -> Result<String, Vec<ValidationError>> {
    let value = raw.unwrap_or("").trim();

    if value.is_empty() {
        if contract.required {
            return Err(vec![ValidationError::new(
                "This field is required.",
                "required",
            )]);
        }
        return Ok(String::new());
    }

    let mut errors = Vec::new();
    let cleaned = match contract.input_kind {
        FieldKind::Text | FieldKind::Textarea => value.to_string(),

        FieldKind::Integer => {
            if value.parse::<i64>().is_err() {
                errors.push(ValidationError::new("Enter a whole number.", "invalid"));
            }
            value.to_string()
        }

        FieldKind::Decimal | FieldKind::Float => {
            if value.parse::<f64>().is_err() {
                errors.push(ValidationError::new("Enter a number.", "invalid"));
            }
            value.to_string()
        }

        FieldKind::Boolean => {
            // Checkbox semantics: any non-truthy value is false, never
            // an error.
            if matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on") {
                "true".to_string()
            } else {
                "false".to_string()
            }
        }

        FieldKind::Date => {
            if NaiveDate::parse_from_str(value, "%Y-%m-%d").is_err() {
                errors.push(ValidationError::new(
                    "Enter a valid date (YYYY-MM-DD).",
                    "invalid",
                ));
            }
            value.to_string()
        }

        FieldKind::DateTime => {
            let parsed = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
                .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
                .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M"));
            if parsed.is_err() {
                errors.push(ValidationError::new("Enter a valid date/time.", "invalid"));
            }
            value.to_string()
        }

        FieldKind::Time => {
            let parsed = NaiveTime::parse_from_str(value, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"));
            if parsed.is_err() {
                errors.push(ValidationError::new(
                    "Enter a valid time (HH:MM or HH:MM:SS).",
                    "invalid",
                ));
            }
            value.to_string()
        }

        FieldKind::Email => {
            if !EMAIL_RE.is_match(value) {
                errors.push(ValidationError::new(
                    "Enter a valid email address.",
                    "invalid",
                ));
            }
            value.to_string()
        }

        FieldKind::Url => {
            if !URL_RE.is_match(value) {
                errors.push(ValidationError::new("Enter a valid URL.", "invalid"));
            }
            value.to_string()
        }

        FieldKind::Choice => {
            if !contract.choice_options.iter().any(|option| option == value) {
                errors.push(ValidationError::new(
                    format!(
                        "Select a valid choice. {value} is not one of the available choices."
                    ),
                    "invalid_choice",
                ));
            }
            value.to_string()
        }

        FieldKind::MultipleChoice => {
            let mut selected = Vec::new();
            for part in value.split(',') {
                let part = part.trim();
                if contract.choice_options.iter().any(|option| option == part) {
                    selected.push(part);
                } else {
                    errors.push(ValidationError::new(
                        format!(
                            "Select a valid choice. {part} is not one of the available choices."
                        ),
                        "invalid_choice",
                    ));
                }
            }
            selected.join(",")
        }
    };

    if errors.is_empty() {
        Ok(cleaned)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formforge_db::schema;
    use formforge_db::Value;
    use formforge_db_backends::SqliteBackend;
    use formforge_models::form::{FormStatus, NewForm};
    use formforge_models::question::{NewQuestion, QuestionRepository};

    async fn setup() -> (SqliteBackend, i64) {
        let db = SqliteBackend::memory().unwrap();
        schema::create_all(&db).await.unwrap();
        let form = FormRepository::create(
            &db,
            NewForm::new("Capture test", 1).with_status(FormStatus::Active),
        )
        .await
        .unwrap();
        (db, form.id)
    }

    async fn add_question(
        db: &SqliteBackend,
        form_id: i64,
        prompt: &str,
        kind: FieldKind,
        required: bool,
        choices: &str,
    ) -> i64 {
        let mut new = NewQuestion::new(form_id, prompt, kind).with_choices(choices);
        if required {
            new = new.required();
        }
        QuestionRepository::create(db, new).await.unwrap().id
    }

    fn raw(pairs: &[(i64, &str)]) -> HashMap<i64, String> {
        pairs
            .iter()
            .map(|(id, value)| (*id, (*value).to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_submit_creates_responder_and_all_response_rows() {
        let (db, form_id) = setup().await;
        let name = add_question(&db, form_id, "Name?", FieldKind::Text, true, "").await;
        let colour = add_question(
            &db,
            form_id,
            "Colour?",
            FieldKind::Choice,
            false,
            "Red|Green",
        )
        .await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();
        let answers = form.validate(&raw(&[(name, "Ada")])).unwrap();
        assert_eq!(answers.len(), 2);

        let responder = form
            .submit(&db, 7, &answers, SubmissionMeta::default())
            .await
            .unwrap();

        let responses = ResponderRepository::responses_for(&db, responder.id)
            .await
            .unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].question_id, name);
        assert_eq!(responses[0].answer, "Ada");
        // The skipped optional question still gets a row, empty.
        assert_eq!(responses[1].question_id, colour);
        assert_eq!(responses[1].answer, "");
    }

    #[tokio::test]
    async fn test_required_empty_fails_and_writes_nothing() {
        let (db, form_id) = setup().await;
        let name = add_question(&db, form_id, "Name?", FieldKind::Text, true, "").await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();
        let err = form.validate(&raw(&[])).unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                assert_eq!(
                    e.field_messages(&format!("question_{name}")),
                    vec!["This field is required."]
                );
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }

        assert!(ResponderRepository::completed_by(&db, form_id, 7)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_errors_collected_across_fields() {
        let (db, form_id) = setup().await;
        let name = add_question(&db, form_id, "Name?", FieldKind::Text, true, "").await;
        let age = add_question(&db, form_id, "Age?", FieldKind::Integer, false, "").await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();
        let err = form.validate(&raw(&[(age, "twelve")])).unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                assert_eq!(e.field_errors.len(), 2);
                assert!(e.field_errors.contains_key(&format!("question_{name}")));
                assert_eq!(
                    e.field_messages(&format!("question_{age}")),
                    vec!["Enter a whole number."]
                );
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_question_ids_ignored() {
        let (db, form_id) = setup().await;
        let name = add_question(&db, form_id, "Name?", FieldKind::Text, true, "").await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();
        let answers = form
            .validate(&raw(&[(name, "Ada"), (9999, "noise")]))
            .unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].question_id, name);
    }

    #[tokio::test]
    async fn test_numeric_coercion() {
        let (db, form_id) = setup().await;
        let age = add_question(&db, form_id, "Age?", FieldKind::Integer, true, "").await;
        let score = add_question(&db, form_id, "Score?", FieldKind::Float, true, "").await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();

        let answers = form
            .validate(&raw(&[(age, "42"), (score, "3.5")]))
            .unwrap();
        assert_eq!(answers[0].answer, "42");
        assert_eq!(answers[1].answer, "3.5");

        let err = form
            .validate(&raw(&[(age, "42.5"), (score, "high")]))
            .unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                assert_eq!(
                    e.field_messages(&format!("question_{age}")),
                    vec!["Enter a whole number."]
                );
                assert_eq!(
                    e.field_messages(&format!("question_{score}")),
                    vec!["Enter a number."]
                );
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_email_and_url_validation() {
        let (db, form_id) = setup().await;
        let email = add_question(&db, form_id, "Email?", FieldKind::Email, true, "").await;
        let site = add_question(&db, form_id, "Site?", FieldKind::Url, true, "").await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();

        form.validate(&raw(&[
            (email, "ada@example.com"),
            (site, "https://example.com/about"),
        ]))
        .unwrap();

        let err = form
            .validate(&raw(&[(email, "not-an-email"), (site, "example.com")]))
            .unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                assert_eq!(
                    e.field_messages(&format!("question_{email}")),
                    vec!["Enter a valid email address."]
                );
                assert_eq!(
                    e.field_messages(&format!("question_{site}")),
                    vec!["Enter a valid URL."]
                );
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_date_and_time_validation() {
        let (db, form_id) = setup().await;
        let day = add_question(&db, form_id, "Day?", FieldKind::Date, true, "").await;
        let when = add_question(&db, form_id, "When?", FieldKind::DateTime, true, "").await;
        let at = add_question(&db, form_id, "At?", FieldKind::Time, true, "").await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();

        // Minute precision is what datetime-local inputs send.
        form.validate(&raw(&[
            (day, "2026-08-01"),
            (when, "2026-08-01T10:30"),
            (at, "10:30"),
        ]))
        .unwrap();
        form.validate(&raw(&[
            (day, "2026-08-01"),
            (when, "2026-08-01 10:30:15"),
            (at, "10:30:15"),
        ]))
        .unwrap();

        let err = form
            .validate(&raw(&[
                (day, "01/08/2026"),
                (when, "tomorrow"),
                (at, "half past ten"),
            ]))
            .unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                assert_eq!(e.field_errors.len(), 3);
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_boolean_normalization() {
        let (db, form_id) = setup().await;
        let codes = add_question(&db, form_id, "Codes?", FieldKind::Boolean, false, "").await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();

        for truthy in ["true", "1", "yes", "on", "YES"] {
            let answers = form.validate(&raw(&[(codes, truthy)])).unwrap();
            assert_eq!(answers[0].answer, "true", "{truthy} should be true");
        }
        // Anything else is a plain false, never an error.
        for falsy in ["false", "0", "off", "maybe"] {
            let answers = form.validate(&raw(&[(codes, falsy)])).unwrap();
            assert_eq!(answers[0].answer, "false", "{falsy} should be false");
        }
    }

    #[tokio::test]
    async fn test_choice_membership() {
        let (db, form_id) = setup().await;
        let colour = add_question(
            &db,
            form_id,
            "Colour?",
            FieldKind::Choice,
            true,
            "Red|Green|Blue",
        )
        .await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();
        form.validate(&raw(&[(colour, "Green")])).unwrap();

        let err = form.validate(&raw(&[(colour, "Purple")])).unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                assert_eq!(
                    e.field_messages(&format!("question_{colour}")),
                    vec!["Select a valid choice. Purple is not one of the available choices."]
                );
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_multiple_choice_membership() {
        let (db, form_id) = setup().await;
        let langs = add_question(
            &db,
            form_id,
            "Languages?",
            FieldKind::MultipleChoice,
            false,
            "Rust|Python|Go",
        )
        .await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();

        let answers = form.validate(&raw(&[(langs, "Rust, Go")])).unwrap();
        assert_eq!(answers[0].answer, "Rust,Go");

        // Skipping the optional multi-select yields an empty answer.
        let answers = form.validate(&raw(&[])).unwrap();
        assert_eq!(answers[0].answer, "");

        let err = form
            .validate(&raw(&[(langs, "Rust,COBOL,Fortran")]))
            .unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                let messages = e.field_messages(&format!("question_{langs}"));
                assert_eq!(messages.len(), 2);
                assert!(messages[0].contains("COBOL"));
                assert!(messages[1].contains("Fortran"));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resubmission_rejected_without_new_rows() {
        let (db, form_id) = setup().await;
        let name = add_question(&db, form_id, "Name?", FieldKind::Text, true, "").await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();
        let answers = form.validate(&raw(&[(name, "Ada")])).unwrap();
        let responder = form
            .submit(&db, 7, &answers, SubmissionMeta::default())
            .await
            .unwrap();

        let err = form
            .submit(&db, 7, &answers, SubmissionMeta::default())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(matches!(err, ForgeError::AlreadyCompleted { .. }));

        // Still exactly one submission's worth of rows.
        let responses = ResponderRepository::responses_for(&db, responder.id)
            .await
            .unwrap();
        assert_eq!(responses.len(), 1);
        let all = db
            .query("SELECT id FROM ff_form_response", &[])
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_rolls_back_when_response_insert_fails() {
        let (db, form_id) = setup().await;
        let name = add_question(&db, form_id, "Name?", FieldKind::Text, true, "").await;

        let form = ResponseForm::for_form(&db, form_id).await.unwrap();
        let answers = form.validate(&raw(&[(name, "Ada")])).unwrap();

        // Remove the question out of band so the response insert hits a
        // foreign key failure after the responder row is written.
        db.execute_sql(
            "DELETE FROM ff_form_question WHERE id = ?",
            &[Value::Int(name)],
        )
        .await
        .unwrap();

        let err = form
            .submit(&db, 7, &answers, SubmissionMeta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::IntegrityError(_)));

        // The responder row rolled back with the failed response insert.
        assert!(ResponderRepository::completed_by(&db, form_id, 7)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_capture_response_end_to_end() {
        let (db, form_id) = setup().await;
        let name = add_question(&db, form_id, "Name?", FieldKind::Text, true, "").await;

        let responder = capture_response(
            &db,
            form_id,
            7,
            &raw(&[(name, "Ada")]),
            SubmissionMeta {
                ip_address: Some("203.0.113.9".to_string()),
                user_agent: Some("Mozilla/5.0".to_string()),
            },
        )
        .await
        .unwrap();

        assert_eq!(responder.form_id, form_id);
        assert_eq!(responder.user_id, 7);
        assert_eq!(responder.ip_address.as_deref(), Some("203.0.113.9"));

        let responses = ResponderRepository::responses_for(&db, responder.id)
            .await
            .unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].answer, "Ada");
    }
}
