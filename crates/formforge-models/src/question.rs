//! The `FormQuestion` element and its repository.
//!
//! Questions are the orderable element variant that captures answers. Each
//! question carries a field kind that drives rendering and answer coercion
//! downstream, and choice kinds store their options as a single
//! pipe-delimited column. Saving or deleting a question updates the form's
//! ordering ledger inside the same transaction, so a question row and its
//! ledger entry never drift apart.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use formforge_core::{ForgeError, ForgeResult, ValidationError};
use formforge_db::transactions::atomic;
use formforge_db::{DbExecutor, Row, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lifecycle::{element_deleted, element_saved, Orderable};
use crate::registry::ElementKind;

/// Separator between options in the stored `choices` column.
pub const CHOICE_SEPARATOR: char = '|';

/// Maximum length of a question prompt.
const QUESTION_MAX_LEN: usize = 150;

/// The input kind of a question.
///
/// Serialized in `snake_case`; `datetime` keeps its undelimited spelling
/// for compatibility with stored rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Integer,
    Decimal,
    Float,
    Boolean,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Time,
    Url,
    Choice,
    MultipleChoice,
}

impl FieldKind {
    /// Every supported kind, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Text,
        Self::Textarea,
        Self::Email,
        Self::Integer,
        Self::Decimal,
        Self::Float,
        Self::Boolean,
        Self::Date,
        Self::DateTime,
        Self::Time,
        Self::Url,
        Self::Choice,
        Self::MultipleChoice,
    ];

    /// The stored wire value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Textarea => "textarea",
            Self::Email => "email",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Time => "time",
            Self::Url => "url",
            Self::Choice => "choice",
            Self::MultipleChoice => "multiple_choice",
        }
    }

    /// Parses a stored or submitted field type value.
    pub fn parse(value: &str) -> ForgeResult<Self> {
        match value {
            "text" => Ok(Self::Text),
            "textarea" => Ok(Self::Textarea),
            "email" => Ok(Self::Email),
            "integer" => Ok(Self::Integer),
            "decimal" => Ok(Self::Decimal),
            "float" => Ok(Self::Float),
            "boolean" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            "datetime" => Ok(Self::DateTime),
            "time" => Ok(Self::Time),
            "url" => Ok(Self::Url),
            "choice" => Ok(Self::Choice),
            "multiple_choice" => Ok(Self::MultipleChoice),
            other => Err(ForgeError::field_error(
                "field_type",
                format!("'{other}' is not a valid field type."),
            )),
        }
    }

    /// Whether the kind selects from a fixed option list.
    pub const fn is_choice(self) -> bool {
        matches!(self, Self::Choice | Self::MultipleChoice)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    pub id: i64,
    pub form_id: i64,
    /// The prompt shown to respondents.
    pub question: String,
    pub field_type: FieldKind,
    /// Pipe-delimited options; empty for non-choice kinds.
    pub choices: String,
    pub required: bool,
    pub help_text: String,
    /// Another question this one depends on, shown for context only.
    pub related_question_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Question {
    /// The stored options in stored order. Empty options and duplicates are
    /// preserved as written.
    pub fn choice_list(&self) -> Vec<&str> {
        if self.choices.is_empty() {
            Vec::new()
        } else {
            self.choices.split(CHOICE_SEPARATOR).collect()
        }
    }
}

impl Orderable for Question {
    fn element_kind(&self) -> ElementKind {
        ElementKind::FormQuestion
    }

    fn element_id(&self) -> i64 {
        self.id
    }

    fn form_id(&self) -> i64 {
        self.form_id
    }
}

/// Fields for creating or replacing a question.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub form_id: i64,
    pub question: String,
    pub field_type: FieldKind,
    pub choices: String,
    pub required: bool,
    pub help_text: String,
    pub related_question_id: Option<i64>,
    /// Explicit position in the form; allocated when absent.
    pub seq_no: Option<i64>,
}

impl NewQuestion {
    /// An optional question of the given kind with no choices.
    pub fn new(form_id: i64, question: impl Into<String>, field_type: FieldKind) -> Self {
        Self {
            form_id,
            question: question.into(),
            field_type,
            choices: String::new(),
            required: false,
            help_text: String::new(),
            related_question_id: None,
            seq_no: None,
        }
    }

    #[must_use]
    pub fn with_choices(mut self, choices: impl Into<String>) -> Self {
        self.choices = choices.into();
        self
    }

    #[must_use]
    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    #[must_use]
    pub fn with_help_text(mut self, help_text: impl Into<String>) -> Self {
        self.help_text = help_text.into();
        self
    }

    #[must_use]
    pub const fn with_related(mut self, question_id: i64) -> Self {
        self.related_question_id = Some(question_id);
        self
    }

    #[must_use]
    pub const fn with_seq_no(mut self, seq_no: i64) -> Self {
        self.seq_no = Some(seq_no);
        self
    }
}

fn validate(new: &NewQuestion) -> ForgeResult<()> {
    let mut field_errors: HashMap<String, Vec<ValidationError>> = HashMap::new();

    if new.question.trim().is_empty() {
        field_errors
            .entry("question".to_string())
            .or_default()
            .push(ValidationError::new("This field is required.", "required"));
    } else if new.question.chars().count() > QUESTION_MAX_LEN {
        field_errors.entry("question".to_string()).or_default().push(
            ValidationError::new(
                format!("Ensure this value has at most {QUESTION_MAX_LEN} characters."),
                "max_length",
            ),
        );
    }

    if new.field_type.is_choice() {
        if new.choices.trim().is_empty() {
            field_errors.entry("choices".to_string()).or_default().push(
                ValidationError::new(
                    "This field is required for choice field types.",
                    "required",
                ),
            );
        }
    } else if !new.choices.is_empty() {
        field_errors.entry("choices".to_string()).or_default().push(
            ValidationError::new(
                "Choices are only allowed for choice field types.",
                "invalid",
            ),
        );
    }

    if field_errors.is_empty() {
        Ok(())
    } else {
        Err(ForgeError::ValidationError(
            ValidationError::with_field_errors(field_errors),
        ))
    }
}

/// Persistence operations for questions.
pub struct QuestionRepository;

impl QuestionRepository {
    /// Creates a question and places it in the form's ordering ledger.
    /// Both writes happen in one transaction; a sequence-number conflict
    /// rolls back the question row as well.
    pub async fn create(db: &dyn DbExecutor, new: NewQuestion) -> ForgeResult<Question> {
        atomic(db, |txn| async move { Self::create_within(&*txn, new).await }).await
    }

    /// Creates a question as part of an existing transaction.
    pub async fn create_within(db: &dyn DbExecutor, new: NewQuestion) -> ForgeResult<Question> {
        validate(&new)?;

        let now = Utc::now();
        let id = db
            .insert_returning_id(
                "INSERT INTO ff_form_question \
                 (form_id, question, field_type, choices, required, help_text, \
                  related_question_id, created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    Value::Int(new.form_id),
                    Value::from(new.question.clone()),
                    Value::from(new.field_type.as_str()),
                    Value::from(new.choices.clone()),
                    Value::Bool(new.required),
                    Value::from(new.help_text.clone()),
                    Value::from(new.related_question_id),
                    Value::from(now),
                    Value::from(now),
                ],
            )
            .await?;
        let id = id.as_int().ok_or_else(|| {
            ForgeError::DatabaseError("insert did not return an integer id".to_string())
        })?;

        let question = Question {
            id,
            form_id: new.form_id,
            question: new.question,
            field_type: new.field_type,
            choices: new.choices,
            required: new.required,
            help_text: new.help_text,
            related_question_id: new.related_question_id,
            created_at: now,
            updated_at: now,
        };
        element_saved(db, &question, new.seq_no).await?;

        debug!(question_id = id, form_id = question.form_id, "created question");
        Ok(question)
    }

    /// Replaces a question's fields and repositions it when a sequence
    /// number is given.
    pub async fn update(db: &dyn DbExecutor, id: i64, new: NewQuestion) -> ForgeResult<Question> {
        atomic(db, |txn| async move { Self::update_within(&*txn, id, new).await }).await
    }

    /// Replaces a question's fields as part of an existing transaction.
    pub async fn update_within(
        db: &dyn DbExecutor,
        id: i64,
        new: NewQuestion,
    ) -> ForgeResult<Question> {
        let current = Self::get(db, id).await?;
        if new.form_id != current.form_id {
            return Err(ForgeError::field_error(
                "form",
                "Cannot move an element to another form.",
            ));
        }
        validate(&new)?;

        db.execute_sql(
            "UPDATE ff_form_question SET question = ?, field_type = ?, choices = ?, \
             required = ?, help_text = ?, related_question_id = ?, updated_at = ? \
             WHERE id = ?",
            &[
                Value::from(new.question),
                Value::from(new.field_type.as_str()),
                Value::from(new.choices),
                Value::Bool(new.required),
                Value::from(new.help_text),
                Value::from(new.related_question_id),
                Value::from(Utc::now()),
                Value::Int(id),
            ],
        )
        .await?;

        let question = Self::get(db, id).await?;
        element_saved(db, &question, new.seq_no).await?;
        Ok(question)
    }

    /// Deletes a question and its ledger entry in one transaction.
    /// Responses referencing the question cascade away with it.
    pub async fn delete(db: &dyn DbExecutor, id: i64) -> ForgeResult<u64> {
        atomic(db, |txn| async move {
            let question = Self::get(&*txn, id).await?;
            let removed = txn
                .execute_sql(
                    "DELETE FROM ff_form_question WHERE id = ?",
                    &[Value::Int(id)],
                )
                .await?;
            element_deleted(&*txn, &question).await?;
            debug!(question_id = id, form_id = question.form_id, "deleted question");
            Ok(removed)
        })
        .await
    }

    /// Fetches a question by id.
    pub async fn get(db: &dyn DbExecutor, id: i64) -> ForgeResult<Question> {
        let row = db
            .query_one(
                "SELECT id, form_id, question, field_type, choices, required, help_text, \
                 related_question_id, created_at, updated_at \
                 FROM ff_form_question WHERE id = ?",
                &[Value::Int(id)],
            )
            .await
            .map_err(|e| match e {
                ForgeError::DoesNotExist(_) => {
                    ForgeError::DoesNotExist(format!("Question {id} does not exist"))
                }
                other => other,
            })?;
        Self::question_from_row(&row)
    }

    /// All questions belonging to a form, oldest first. Form-level display
    /// order lives in the ordering ledger, not here.
    pub async fn for_form(db: &dyn DbExecutor, form_id: i64) -> ForgeResult<Vec<Question>> {
        let rows = db
            .query(
                "SELECT id, form_id, question, field_type, choices, required, help_text, \
                 related_question_id, created_at, updated_at \
                 FROM ff_form_question WHERE form_id = ? ORDER BY id ASC",
                &[Value::Int(form_id)],
            )
            .await?;
        rows.iter().map(Self::question_from_row).collect()
    }

    fn question_from_row(row: &Row) -> ForgeResult<Question> {
        let field_type: String = row.get("field_type")?;
        Ok(Question {
            id: row.get("id")?,
            form_id: row.get("form_id")?,
            question: row.get("question")?,
            field_type: FieldKind::parse(&field_type)?,
            choices: row.get("choices")?,
            required: row.get("required")?,
            help_text: row.get("help_text")?,
            related_question_id: row.get("related_question_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FormRepository, NewForm};
    use crate::ledger::SequenceLedger;
    use formforge_db::schema;
    use formforge_db_backends::SqliteBackend;

    async fn setup() -> (SqliteBackend, i64) {
        let db = SqliteBackend::memory().unwrap();
        schema::create_all(&db).await.unwrap();
        let form = FormRepository::create(&db, NewForm::new("Question test", 1))
            .await
            .unwrap();
        (db, form.id)
    }

    #[tokio::test]
    async fn test_create_places_in_ledger() {
        let (db, form_id) = setup().await;

        let first = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "What is your name?", FieldKind::Text),
        )
        .await
        .unwrap();
        let second = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Anything else?", FieldKind::Textarea),
        )
        .await
        .unwrap();

        let entry = SequenceLedger::entry_for_element(
            &db,
            form_id,
            ElementKind::FormQuestion,
            first.id,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(entry.seq_no, 10);

        let entry = SequenceLedger::entry_for_element(
            &db,
            form_id,
            ElementKind::FormQuestion,
            second.id,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(entry.seq_no, 20);
    }

    #[tokio::test]
    async fn test_create_with_explicit_seq_no() {
        let (db, form_id) = setup().await;
        let question = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Placed", FieldKind::Text).with_seq_no(40),
        )
        .await
        .unwrap();

        let entry = SequenceLedger::entry_for_element(
            &db,
            form_id,
            ElementKind::FormQuestion,
            question.id,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(entry.seq_no, 40);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_question() {
        let (db, form_id) = setup().await;
        let err = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "   ", FieldKind::Text),
        )
        .await
        .unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                assert_eq!(e.field_messages("question"), vec!["This field is required."]);
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_rejects_overlong_question() {
        let (db, form_id) = setup().await;
        let err = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "x".repeat(151), FieldKind::Text),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[tokio::test]
    async fn test_choice_kinds_require_choices() {
        let (db, form_id) = setup().await;
        for kind in [FieldKind::Choice, FieldKind::MultipleChoice] {
            let err = QuestionRepository::create(
                &db,
                NewQuestion::new(form_id, "Pick one", kind),
            )
            .await
            .unwrap_err();
            match err {
                ForgeError::ValidationError(e) => {
                    assert_eq!(
                        e.field_messages("choices"),
                        vec!["This field is required for choice field types."]
                    );
                }
                other => panic!("expected ValidationError, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_non_choice_kinds_reject_choices() {
        let (db, form_id) = setup().await;
        let err = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Free text", FieldKind::Text).with_choices("a|b"),
        )
        .await
        .unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                assert_eq!(
                    e.field_messages("choices"),
                    vec!["Choices are only allowed for choice field types."]
                );
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_collects_all_errors() {
        let (db, form_id) = setup().await;
        let err = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "", FieldKind::Choice),
        )
        .await
        .unwrap_err();
        match err {
            ForgeError::ValidationError(e) => {
                assert!(e.field_errors.contains_key("question"));
                assert!(e.field_errors.contains_key("choices"));
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_seq_no_rolls_back_question_row() {
        let (db, form_id) = setup().await;
        QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "First", FieldKind::Text).with_seq_no(10),
        )
        .await
        .unwrap();

        let err = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Second", FieldKind::Text).with_seq_no(10),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status_code(), 409);
        assert!(matches!(err, ForgeError::DuplicateSequenceNumber { seq_no: 10, .. }));

        // The conflicting question row must not survive the rollback.
        let questions = QuestionRepository::for_form(&db, form_id).await.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question, "First");
    }

    #[tokio::test]
    async fn test_update_replaces_fields_and_moves() {
        let (db, form_id) = setup().await;
        let question = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Old prompt", FieldKind::Text),
        )
        .await
        .unwrap();

        let mut replacement =
            NewQuestion::new(form_id, "New prompt", FieldKind::Choice).with_choices("Yes|No");
        replacement = replacement.required().with_seq_no(35);
        let updated = QuestionRepository::update(&db, question.id, replacement)
            .await
            .unwrap();

        assert_eq!(updated.question, "New prompt");
        assert_eq!(updated.field_type, FieldKind::Choice);
        assert_eq!(updated.choices, "Yes|No");
        assert!(updated.required);

        let entry = SequenceLedger::entry_for_element(
            &db,
            form_id,
            ElementKind::FormQuestion,
            question.id,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(entry.seq_no, 35);
    }

    #[tokio::test]
    async fn test_update_without_seq_no_keeps_position() {
        let (db, form_id) = setup().await;
        let question = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Stays put", FieldKind::Text).with_seq_no(70),
        )
        .await
        .unwrap();

        QuestionRepository::update(
            &db,
            question.id,
            NewQuestion::new(form_id, "Stays put, renamed", FieldKind::Text),
        )
        .await
        .unwrap();

        let entry = SequenceLedger::entry_for_element(
            &db,
            form_id,
            ElementKind::FormQuestion,
            question.id,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(entry.seq_no, 70);
    }

    #[tokio::test]
    async fn test_update_rejects_form_move() {
        let (db, form_id) = setup().await;
        let other = FormRepository::create(&db, NewForm::new("Other", 1))
            .await
            .unwrap();
        let question = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Anchored", FieldKind::Text),
        )
        .await
        .unwrap();

        let err = QuestionRepository::update(
            &db,
            question.id,
            NewQuestion::new(other.id, "Anchored", FieldKind::Text),
        )
        .await
        .unwrap_err();
        match err {
            ForgeError::ValidationError(e) => assert!(e.field_errors.contains_key("form")),
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_missing_question() {
        let (db, form_id) = setup().await;
        let err = QuestionRepository::update(
            &db,
            404,
            NewQuestion::new(form_id, "Ghost", FieldKind::Text),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ForgeError::DoesNotExist(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_ledger_entry() {
        let (db, form_id) = setup().await;
        let question = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Doomed", FieldKind::Text),
        )
        .await
        .unwrap();

        assert_eq!(QuestionRepository::delete(&db, question.id).await.unwrap(), 1);

        let entry = SequenceLedger::entry_for_element(
            &db,
            form_id,
            ElementKind::FormQuestion,
            question.id,
        )
        .await
        .unwrap();
        assert!(entry.is_none());

        let err = QuestionRepository::get(&db, question.id).await.unwrap_err();
        assert!(matches!(err, ForgeError::DoesNotExist(_)));
    }

    #[tokio::test]
    async fn test_round_trip_with_related_question() {
        let (db, form_id) = setup().await;
        let first = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Do you code?", FieldKind::Boolean),
        )
        .await
        .unwrap();
        let second = QuestionRepository::create(
            &db,
            NewQuestion::new(form_id, "Which languages?", FieldKind::Text)
                .required()
                .with_help_text("Comma separated is fine")
                .with_related(first.id),
        )
        .await
        .unwrap();

        let fetched = QuestionRepository::get(&db, second.id).await.unwrap();
        assert!(fetched.required);
        assert_eq!(fetched.help_text, "Comma separated is fine");
        assert_eq!(fetched.related_question_id, Some(first.id));

        let first_fetched = QuestionRepository::get(&db, first.id).await.unwrap();
        assert!(!first_fetched.required);
        assert!(first_fetched.related_question_id.is_none());
    }

    #[tokio::test]
    async fn test_for_form_lists_in_creation_order() {
        let (db, form_id) = setup().await;
        QuestionRepository::create(&db, NewQuestion::new(form_id, "A", FieldKind::Text))
            .await
            .unwrap();
        QuestionRepository::create(&db, NewQuestion::new(form_id, "B", FieldKind::Text))
            .await
            .unwrap();

        let questions = QuestionRepository::for_form(&db, form_id).await.unwrap();
        let prompts: Vec<&str> = questions.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(prompts, vec!["A", "B"]);
    }

    #[test]
    fn test_choice_list() {
        let mut question = Question {
            id: 1,
            form_id: 1,
            question: "Pick".to_string(),
            field_type: FieldKind::Choice,
            choices: "Red|Green|Blue".to_string(),
            required: false,
            help_text: String::new(),
            related_question_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(question.choice_list(), vec!["Red", "Green", "Blue"]);

        // Empty options and duplicates are preserved, never collapsed.
        question.choices = "a||b|a".to_string();
        assert_eq!(question.choice_list(), vec!["a", "", "b", "a"]);

        question.choices = String::new();
        assert!(question.choice_list().is_empty());
    }

    #[test]
    fn test_field_kind_round_trip() {
        for kind in FieldKind::ALL {
            assert_eq!(FieldKind::parse(kind.as_str()).unwrap(), kind);
        }
        assert!(FieldKind::Choice.is_choice());
        assert!(FieldKind::MultipleChoice.is_choice());
        for kind in FieldKind::ALL {
            if !matches!(kind, FieldKind::Choice | FieldKind::MultipleChoice) {
                assert!(!kind.is_choice());
            }
        }

        let err = FieldKind::parse("password").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_field_kind_serde_spelling() {
        assert_eq!(
            serde_json::to_string(&FieldKind::DateTime).unwrap(),
            "\"datetime\""
        );
        assert_eq!(
            serde_json::to_string(&FieldKind::MultipleChoice).unwrap(),
            "\"multiple_choice\""
        );
        let kind: FieldKind = serde_json::from_str("\"datetime\"").unwrap();
        assert_eq!(kind, FieldKind::DateTime);
    }
}
