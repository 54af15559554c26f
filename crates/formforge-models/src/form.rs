//! The `Form` model and its repository.
//!
//! A form owns its elements, its ledger entries, and its responders;
//! deleting a form cascades all of them away. Permission checks are pure
//! functions of a loaded [`Form`] and a [`RequestUser`]: the editor set
//! is loaded with the form so no query is needed at check time.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use formforge_core::utils::text::slugify;
use formforge_core::{ForgeError, ForgeResult, RequestUser};
use formforge_db::transactions::atomic;
use formforge_db::{DbExecutor, Row, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fallback slug when the title slugifies to nothing.
const DEFAULT_SLUG: &str = "form";

/// Maximum length of a form title.
const TITLE_MAX_LEN: usize = 150;

/// Publication status of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormStatus {
    /// Being edited; never live.
    Draft,
    /// Live while the current time is inside the start/end window.
    Active,
    /// Taken down by its owner; never live.
    Inactive,
}

impl FormStatus {
    /// The stored wire value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parses a stored or submitted status value.
    pub fn parse(value: &str) -> ForgeResult<Self> {
        match value {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(ForgeError::field_error(
                "status",
                format!("'{other}' is not a valid status."),
            )),
        }
    }
}

impl std::fmt::Display for FormStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Form {
    pub id: i64,
    pub title: String,
    /// Derived from the title at creation time; non-empty once persisted.
    pub slug: String,
    pub description: String,
    pub status: FormStatus,
    /// Start of the live window.
    pub start_date: DateTime<Utc>,
    /// End of the live window; absent means unbounded.
    pub end_date: Option<DateTime<Utc>>,
    pub owner_id: i64,
    /// User ids allowed to edit alongside the owner.
    pub editors: Vec<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Form {
    /// Whether the form accepts responses at `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.status == FormStatus::Active
            && self.start_date <= now
            && self.end_date.map_or(true, |end| end >= now)
    }

    /// Whether the user may edit the form: the owner, a listed editor, or
    /// staff.
    pub fn can_edit(&self, user: &RequestUser) -> bool {
        if !user.is_authenticated {
            return false;
        }
        user.is_staff
            || user.id == Some(self.owner_id)
            || user.id.is_some_and(|id| self.editors.contains(&id))
    }

    /// Whether the user may delete the form: the owner or staff. Editors
    /// may not.
    pub fn can_delete(&self, user: &RequestUser) -> bool {
        user.is_authenticated && (user.is_staff || user.id == Some(self.owner_id))
    }

    /// Whether the user may submit a response at `now`: any authenticated
    /// user while the form is live. One-submission-per-user is enforced
    /// separately at submission time.
    pub fn can_complete_form(&self, user: &RequestUser, now: DateTime<Utc>) -> bool {
        user.is_authenticated && self.is_live_at(now)
    }
}

/// Fields for creating a form.
#[derive(Debug, Clone)]
pub struct NewForm {
    pub title: String,
    pub description: String,
    pub status: FormStatus,
    /// Defaults to the creation time when absent.
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub owner_id: i64,
    pub editors: Vec<i64>,
    /// Derived from the title when absent.
    pub slug: Option<String>,
}

impl NewForm {
    /// A draft form with the given title and owner.
    pub fn new(title: impl Into<String>, owner_id: i64) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: FormStatus::Draft,
            start_date: None,
            end_date: None,
            owner_id,
            editors: Vec::new(),
            slug: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: FormStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub const fn with_start(mut self, start: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self
    }

    #[must_use]
    pub const fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end_date = Some(end);
        self
    }

    #[must_use]
    pub fn with_editors(mut self, editors: Vec<i64>) -> Self {
        self.editors = editors;
        self
    }

    #[must_use]
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

/// A partial update to a form's own fields. `None` leaves a field
/// untouched; `end_date` uses a nested `Option` so the window end can be
/// cleared.
#[derive(Debug, Clone, Default)]
pub struct FormPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<FormStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub editors: Option<Vec<i64>>,
}

impl FormPatch {
    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.editors.is_none()
    }
}

fn validate_title(title: &str) -> ForgeResult<()> {
    if title.trim().is_empty() {
        return Err(ForgeError::field_error("title", "This field is required."));
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(ForgeError::field_error(
            "title",
            format!("Ensure this value has at most {TITLE_MAX_LEN} characters."),
        ));
    }
    Ok(())
}

/// Persistence operations for forms.
pub struct FormRepository;

impl FormRepository {
    /// Creates a form, deriving the slug from the title when absent.
    pub async fn create(db: &dyn DbExecutor, new: NewForm) -> ForgeResult<Form> {
        atomic(db, |txn| async move { Self::create_within(&*txn, new).await }).await
    }

    /// Creates a form as part of an existing transaction.
    pub async fn create_within(db: &dyn DbExecutor, new: NewForm) -> ForgeResult<Form> {
        validate_title(&new.title)?;

        let slug = match new.slug {
            Some(slug) if !slug.is_empty() => slug,
            _ => {
                let derived = slugify(&new.title);
                if derived.is_empty() {
                    DEFAULT_SLUG.to_string()
                } else {
                    derived
                }
            }
        };

        let now = Utc::now();
        let start = new.start_date.unwrap_or(now);
        let mut editors = new.editors;
        editors.sort_unstable();
        editors.dedup();

        let id = db
            .insert_returning_id(
                "INSERT INTO ff_form \
                 (title, slug, description, status, start_date, end_date, owner_id, \
                  created_at, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                &[
                    Value::from(new.title.clone()),
                    Value::from(slug.clone()),
                    Value::from(new.description.clone()),
                    Value::from(new.status.as_str()),
                    Value::from(start),
                    Value::from(new.end_date),
                    Value::Int(new.owner_id),
                    Value::from(now),
                    Value::from(now),
                ],
            )
            .await?;
        let id = id.as_int().ok_or_else(|| {
            ForgeError::DatabaseError("insert did not return an integer id".to_string())
        })?;

        Self::set_editors(db, id, &editors).await?;

        debug!(form_id = id, slug = %slug, "created form");
        Ok(Form {
            id,
            title: new.title,
            slug,
            description: new.description,
            status: new.status,
            start_date: start,
            end_date: new.end_date,
            owner_id: new.owner_id,
            editors,
            created_at: now,
            updated_at: now,
        })
    }

    /// Fetches a form by id, editor set included.
    pub async fn get(db: &dyn DbExecutor, id: i64) -> ForgeResult<Form> {
        let row = db
            .query_one(
                "SELECT id, title, slug, description, status, start_date, end_date, \
                 owner_id, created_at, updated_at FROM ff_form WHERE id = ?",
                &[Value::Int(id)],
            )
            .await
            .map_err(|e| match e {
                ForgeError::DoesNotExist(_) => {
                    ForgeError::DoesNotExist(format!("Form {id} does not exist"))
                }
                other => other,
            })?;
        let editors = Self::editors(db, id).await?;
        Self::form_from_row(&row, editors)
    }

    /// Applies a partial update and returns the refreshed form.
    pub async fn update(db: &dyn DbExecutor, id: i64, patch: FormPatch) -> ForgeResult<Form> {
        atomic(db, |txn| async move { Self::update_within(&*txn, id, patch).await }).await
    }

    /// Applies a partial update as part of an existing transaction.
    pub async fn update_within(
        db: &dyn DbExecutor,
        id: i64,
        patch: FormPatch,
    ) -> ForgeResult<Form> {
        // Existence check up front so an empty patch still 404s properly.
        let current = Self::get(db, id).await?;
        if patch.is_empty() {
            return Ok(current);
        }

        if let Some(ref title) = patch.title {
            validate_title(title)?;
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        if let Some(title) = patch.title {
            assignments.push("title = ?");
            params.push(Value::from(title));
        }
        if let Some(description) = patch.description {
            assignments.push("description = ?");
            params.push(Value::from(description));
        }
        if let Some(status) = patch.status {
            assignments.push("status = ?");
            params.push(Value::from(status.as_str()));
        }
        if let Some(start) = patch.start_date {
            assignments.push("start_date = ?");
            params.push(Value::from(start));
        }
        if let Some(end) = patch.end_date {
            assignments.push("end_date = ?");
            params.push(Value::from(end));
        }
        assignments.push("updated_at = ?");
        params.push(Value::from(Utc::now()));
        params.push(Value::Int(id));

        let sql = format!(
            "UPDATE ff_form SET {} WHERE id = ?",
            assignments.join(", ")
        );
        db.execute_sql(&sql, &params).await?;

        if let Some(editors) = patch.editors {
            Self::set_editors(db, id, &editors).await?;
        }

        Self::get(db, id).await
    }

    /// Deletes a form. Elements, ledger entries, responders, and responses
    /// cascade away with it. Returns the number of form rows removed.
    pub async fn delete(db: &dyn DbExecutor, id: i64) -> ForgeResult<u64> {
        let removed = db
            .execute_sql("DELETE FROM ff_form WHERE id = ?", &[Value::Int(id)])
            .await?;
        debug!(form_id = id, removed, "deleted form");
        Ok(removed)
    }

    /// Forms currently accepting responses: status active, started, and
    /// not yet past their end.
    pub async fn live(db: &dyn DbExecutor, now: DateTime<Utc>) -> ForgeResult<Vec<Form>> {
        let rows = db
            .query(
                "SELECT id, title, slug, description, status, start_date, end_date, \
                 owner_id, created_at, updated_at FROM ff_form \
                 WHERE status = ? AND start_date <= ? \
                 AND (end_date IS NULL OR end_date >= ?) \
                 ORDER BY created_at DESC",
                &[
                    Value::from(FormStatus::Active.as_str()),
                    Value::from(now),
                    Value::from(now),
                ],
            )
            .await?;
        Self::forms_with_editors(db, &rows).await
    }

    /// Forms the user may edit: all of them for staff, owned plus listed-
    /// as-editor otherwise, none for anonymous users. Newest first.
    pub async fn editable_by(db: &dyn DbExecutor, user: &RequestUser) -> ForgeResult<Vec<Form>> {
        let Some(user_id) = user.id.filter(|_| user.is_authenticated) else {
            return Ok(Vec::new());
        };

        let rows = if user.is_staff {
            db.query(
                "SELECT id, title, slug, description, status, start_date, end_date, \
                 owner_id, created_at, updated_at FROM ff_form \
                 ORDER BY created_at DESC",
                &[],
            )
            .await?
        } else {
            db.query(
                "SELECT DISTINCT f.id, f.title, f.slug, f.description, f.status, \
                 f.start_date, f.end_date, f.owner_id, f.created_at, f.updated_at \
                 FROM ff_form f \
                 LEFT JOIN ff_form_editor e ON e.form_id = f.id \
                 WHERE f.owner_id = ? OR e.user_id = ? \
                 ORDER BY f.created_at DESC",
                &[Value::Int(user_id), Value::Int(user_id)],
            )
            .await?
        };
        Self::forms_with_editors(db, &rows).await
    }

    /// Returns the editor user ids for a form, ascending.
    pub async fn editors(db: &dyn DbExecutor, form_id: i64) -> ForgeResult<Vec<i64>> {
        let rows = db
            .query(
                "SELECT user_id FROM ff_form_editor WHERE form_id = ? ORDER BY user_id ASC",
                &[Value::Int(form_id)],
            )
            .await?;
        rows.iter().map(|row| row.get("user_id")).collect()
    }

    /// Replaces the editor set for a form.
    pub async fn set_editors(
        db: &dyn DbExecutor,
        form_id: i64,
        editors: &[i64],
    ) -> ForgeResult<()> {
        db.execute_sql(
            "DELETE FROM ff_form_editor WHERE form_id = ?",
            &[Value::Int(form_id)],
        )
        .await?;
        // The table is unique on (form_id, user_id); tolerate repeated ids.
        for user_id in editors.iter().copied().collect::<BTreeSet<i64>>() {
            db.execute_sql(
                "INSERT INTO ff_form_editor (form_id, user_id) VALUES (?, ?)",
                &[Value::Int(form_id), Value::Int(user_id)],
            )
            .await?;
        }
        Ok(())
    }

    async fn forms_with_editors(db: &dyn DbExecutor, rows: &[Row]) -> ForgeResult<Vec<Form>> {
        let mut forms = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.get("id")?;
            let editors = Self::editors(db, id).await?;
            forms.push(Self::form_from_row(row, editors)?);
        }
        Ok(forms)
    }

    fn form_from_row(row: &Row, editors: Vec<i64>) -> ForgeResult<Form> {
        let status: String = row.get("status")?;
        Ok(Form {
            id: row.get("id")?,
            title: row.get("title")?,
            slug: row.get("slug")?,
            description: row.get("description")?,
            status: FormStatus::parse(&status)?,
            start_date: row.get("start_date")?,
            end_date: row.get("end_date")?,
            owner_id: row.get("owner_id")?,
            editors,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}
