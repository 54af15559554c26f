//! Submission records: who completed a form and what they answered.
//!
//! A [`FormResponder`] row marks one user's single completion of a form;
//! the unique constraint on (form, user) makes repeat submissions lose
//! cleanly even when two arrive at once. Each answer lands in its own
//! [`FormResponse`] row, empty answers included, so a submission always
//! yields one response per question asked.

use chrono::{DateTime, Utc};
use formforge_core::{ForgeError, ForgeResult};
use formforge_db::{DbExecutor, Row, Value};
use serde::Serialize;
use tracing::debug;

/// One user's completion record for a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormResponder {
    pub id: i64,
    pub form_id: i64,
    pub user_id: i64,
    /// Client address captured at submission time, when known.
    pub ip_address: Option<String>,
    /// Client user agent captured at submission time, when known.
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A single answer within a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormResponse {
    pub id: i64,
    pub responder_id: i64,
    pub question_id: i64,
    /// The answer as submitted; empty when the question was skipped.
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a completion record.
#[derive(Debug, Clone)]
pub struct NewResponder {
    pub form_id: i64,
    pub user_id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewResponder {
    pub const fn new(form_id: i64, user_id: i64) -> Self {
        Self {
            form_id,
            user_id,
            ip_address: None,
            user_agent: None,
        }
    }

    #[must_use]
    pub fn with_ip(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// Persistence operations for completion records and their answers.
pub struct ResponderRepository;

impl ResponderRepository {
    /// Returns the user's completion record for a form, `None` when the
    /// user has not submitted yet.
    pub async fn completed_by(
        db: &dyn DbExecutor,
        form_id: i64,
        user_id: i64,
    ) -> ForgeResult<Option<FormResponder>> {
        let rows = db
            .query(
                "SELECT id, form_id, user_id, ip_address, user_agent, created_at \
                 FROM ff_form_responder WHERE form_id = ? AND user_id = ?",
                &[Value::Int(form_id), Value::Int(user_id)],
            )
            .await?;
        rows.first().map(Self::responder_from_row).transpose()
    }

    /// Creates a completion record inside the caller's transaction.
    ///
    /// The unique constraint on (form, user) settles concurrent
    /// submissions: the loser's constraint violation surfaces as
    /// [`ForgeError::AlreadyCompleted`].
    pub async fn create_within(
        db: &dyn DbExecutor,
        new: NewResponder,
    ) -> ForgeResult<FormResponder> {
        let now = Utc::now();
        let id = db
            .insert_returning_id(
                "INSERT INTO ff_form_responder \
                 (form_id, user_id, ip_address, user_agent, created_at) \
                 VALUES (?, ?, ?, ?, ?)",
                &[
                    Value::Int(new.form_id),
                    Value::Int(new.user_id),
                    Value::from(new.ip_address.clone()),
                    Value::from(new.user_agent.clone()),
                    Value::from(now),
                ],
            )
            .await
            .map_err(|e| match e {
                ForgeError::IntegrityError(msg) if msg.contains("ff_form_responder") => {
                    ForgeError::AlreadyCompleted {
                        form_id: new.form_id,
                        user_id: new.user_id,
                    }
                }
                other => other,
            })?;
        let id = id.as_int().ok_or_else(|| {
            ForgeError::DatabaseError("insert did not return an integer id".to_string())
        })?;

        debug!(
            responder_id = id,
            form_id = new.form_id,
            user_id = new.user_id,
            "created responder"
        );
        Ok(FormResponder {
            id,
            form_id: new.form_id,
            user_id: new.user_id,
            ip_address: new.ip_address,
            user_agent: new.user_agent,
            created_at: now,
        })
    }

    /// Records one answer inside the caller's transaction.
    pub async fn record_response_within(
        db: &dyn DbExecutor,
        responder_id: i64,
        question_id: i64,
        answer: impl Into<String>,
    ) -> ForgeResult<FormResponse> {
        let answer = answer.into();
        let now = Utc::now();
        let id = db
            .insert_returning_id(
                "INSERT INTO ff_form_response \
                 (responder_id, question_id, answer, created_at) VALUES (?, ?, ?, ?)",
                &[
                    Value::Int(responder_id),
                    Value::Int(question_id),
                    Value::from(answer.clone()),
                    Value::from(now),
                ],
            )
            .await?;
        let id = id.as_int().ok_or_else(|| {
            ForgeError::DatabaseError("insert did not return an integer id".to_string())
        })?;

        Ok(FormResponse {
            id,
            responder_id,
            question_id,
            answer,
            created_at: now,
        })
    }

    /// The answers recorded for one completion, in the order they were
    /// written.
    pub async fn responses_for(
        db: &dyn DbExecutor,
        responder_id: i64,
    ) -> ForgeResult<Vec<FormResponse>> {
        let rows = db
            .query(
                "SELECT id, responder_id, question_id, answer, created_at \
                 FROM ff_form_response WHERE responder_id = ? ORDER BY id ASC",
                &[Value::Int(responder_id)],
            )
            .await?;
        rows.iter().map(Self::response_from_row).collect()
    }

    /// Everyone who completed a form, oldest submission first.
    pub async fn responders_for_form(
        db: &dyn DbExecutor,
        form_id: i64,
    ) -> ForgeResult<Vec<FormResponder>> {
        let rows = db
            .query(
                "SELECT id, form_id, user_id, ip_address, user_agent, created_at \
                 FROM ff_form_responder WHERE form_id = ? ORDER BY id ASC",
                &[Value::Int(form_id)],
            )
            .await?;
        rows.iter().map(Self::responder_from_row).collect()
    }

    fn responder_from_row(row: &Row) -> ForgeResult<FormResponder> {
        Ok(FormResponder {
            id: row.get("id")?,
            form_id: row.get("form_id")?,
            user_id: row.get("user_id")?,
            ip_address: row.get("ip_address")?,
            user_agent: row.get("user_agent")?,
            created_at: row.get("created_at")?,
        })
    }

    fn response_from_row(row: &Row) -> ForgeResult<FormResponse> {
        Ok(FormResponse {
            id: row.get("id")?,
            responder_id: row.get("responder_id")?,
            question_id: row.get("question_id")?,
            answer: row.get("answer")?,
            created_at: row.get("created_at")?,
        })
    }
}
