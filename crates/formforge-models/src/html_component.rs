//! The `HtmlComponent` element and its repository.
//!
//! A block of raw HTML interleaved between questions. It captures nothing,
//! it only renders, so the repository is a slimmer sibling of the question
//! one with the same ledger integration.

use chrono::{DateTime, Utc};
use formforge_core::{ForgeError, ForgeResult};
use formforge_db::transactions::atomic;
use formforge_db::{DbExecutor, Row, Value};
use serde::Serialize;
use tracing::debug;

use crate::lifecycle::{element_deleted, element_saved, Orderable};
use crate::registry::ElementKind;

/// A persisted HTML block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HtmlComponent {
    pub id: i64,
    pub form_id: i64,
    /// Raw markup, rendered verbatim between questions.
    pub html: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Orderable for HtmlComponent {
    fn element_kind(&self) -> ElementKind {
        ElementKind::HtmlComponent
    }

    fn element_id(&self) -> i64 {
        self.id
    }

    fn form_id(&self) -> i64 {
        self.form_id
    }
}

/// Fields for creating or replacing an HTML block.
#[derive(Debug, Clone)]
pub struct NewHtmlComponent {
    pub form_id: i64,
    pub html: String,
    /// Explicit position in the form; allocated when absent.
    pub seq_no: Option<i64>,
}

impl NewHtmlComponent {
    pub fn new(form_id: i64, html: impl Into<String>) -> Self {
        Self {
            form_id,
            html: html.into(),
            seq_no: None,
        }
    }

    #[must_use]
    pub const fn with_seq_no(mut self, seq_no: i64) -> Self {
        self.seq_no = Some(seq_no);
        self
    }
}

fn validate(new: &NewHtmlComponent) -> ForgeResult<()> {
    if new.html.trim().is_empty() {
        return Err(ForgeError::field_error("html", "This field is required."));
    }
    Ok(())
}

/// Persistence operations for HTML blocks.
pub struct HtmlComponentRepository;

impl HtmlComponentRepository {
    /// Creates an HTML block and places it in the form's ordering ledger.
    pub async fn create(db: &dyn DbExecutor, new: NewHtmlComponent) -> ForgeResult<HtmlComponent> {
        atomic(db, |txn| async move { Self::create_within(&*txn, new).await }).await
    }

    /// Creates an HTML block as part of an existing transaction.
    pub async fn create_within(
        db: &dyn DbExecutor,
        new: NewHtmlComponent,
    ) -> ForgeResult<HtmlComponent> {
        validate(&new)?;

        let now = Utc::now();
        let id = db
            .insert_returning_id(
                "INSERT INTO ff_html_component (form_id, html, created_at, updated_at) \
                 VALUES (?, ?, ?, ?)",
                &[
                    Value::Int(new.form_id),
                    Value::from(new.html.clone()),
                    Value::from(now),
                    Value::from(now),
                ],
            )
            .await?;
        let id = id.as_int().ok_or_else(|| {
            ForgeError::DatabaseError("insert did not return an integer id".to_string())
        })?;

        let component = HtmlComponent {
            id,
            form_id: new.form_id,
            html: new.html,
            created_at: now,
            updated_at: now,
        };
        element_saved(db, &component, new.seq_no).await?;

        debug!(component_id = id, form_id = component.form_id, "created html component");
        Ok(component)
    }

    /// Replaces an HTML block's markup and repositions it when a sequence
    /// number is given.
    pub async fn update(
        db: &dyn DbExecutor,
        id: i64,
        new: NewHtmlComponent,
    ) -> ForgeResult<HtmlComponent> {
        atomic(db, |txn| async move { Self::update_within(&*txn, id, new).await }).await
    }

    /// Replaces an HTML block as part of an existing transaction.
    pub async fn update_within(
        db: &dyn DbExecutor,
        id: i64,
        new: NewHtmlComponent,
    ) -> ForgeResult<HtmlComponent> {
        let current = Self::get(db, id).await?;
        if new.form_id != current.form_id {
            return Err(ForgeError::field_error(
                "form",
                "Cannot move an element to another form.",
            ));
        }
        validate(&new)?;

        db.execute_sql(
            "UPDATE ff_html_component SET html = ?, updated_at = ? WHERE id = ?",
            &[
                Value::from(new.html),
                Value::from(Utc::now()),
                Value::Int(id),
            ],
        )
        .await?;

        let component = Self::get(db, id).await?;
        element_saved(db, &component, new.seq_no).await?;
        Ok(component)
    }

    /// Deletes an HTML block and its ledger entry in one transaction.
    pub async fn delete(db: &dyn DbExecutor, id: i64) -> ForgeResult<u64> {
        atomic(db, |txn| async move {
            let component = Self::get(&*txn, id).await?;
            let removed = txn
                .execute_sql(
                    "DELETE FROM ff_html_component WHERE id = ?",
                    &[Value::Int(id)],
                )
                .await?;
            element_deleted(&*txn, &component).await?;
            debug!(component_id = id, "deleted html component");
            Ok(removed)
        })
        .await
    }

    /// Fetches an HTML block by id.
    pub async fn get(db: &dyn DbExecutor, id: i64) -> ForgeResult<HtmlComponent> {
        let row = db
            .query_one(
                "SELECT id, form_id, html, created_at, updated_at \
                 FROM ff_html_component WHERE id = ?",
                &[Value::Int(id)],
            )
            .await
            .map_err(|e| match e {
                ForgeError::DoesNotExist(_) => {
                    ForgeError::DoesNotExist(format!("HtmlComponent {id} does not exist"))
                }
                other => other,
            })?;
        Self::component_from_row(&row)
    }

    /// All HTML blocks belonging to a form, oldest first.
    pub async fn for_form(db: &dyn DbExecutor, form_id: i64) -> ForgeResult<Vec<HtmlComponent>> {
        let rows = db
            .query(
                "SELECT id, form_id, html, created_at, updated_at \
                 FROM ff_html_component WHERE form_id = ? ORDER BY id ASC",
                &[Value::Int(form_id)],
            )
            .await?;
        rows.iter().map(Self::component_from_row).collect()
    }

    fn component_from_row(row: &Row) -> ForgeResult<HtmlComponent> {
        Ok(HtmlComponent {
            id: row.get("id")?,
            form_id: row.get("form_id")?,
            html: row.get("html")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}
