//! The per-form sequence ledger.
//!
//! One ledger row per placed element, keyed by
//! `(form, element_type, element_id)`. The `seq_no` column is unique per
//! form and defines the canonical display order. Allocation is gap-based:
//! the next number is `max + 10`, leaving room to reorder elements by hand
//! without renumbering everything.
//!
//! Concurrent writers racing for the same slot are settled by the
//! database unique constraint on `(form_id, seq_no)`: the loser observes
//! [`ForgeError::DuplicateSequenceNumber`] and may retry with a freshly
//! allocated number.

use formforge_core::{ForgeError, ForgeResult};
use formforge_db::{DbExecutor, Row, Value};
use serde::Serialize;
use tracing::debug;

use crate::registry::{self, ElementKind};

/// Gap between consecutively allocated sequence numbers.
pub const SEQ_GAP: i64 = 10;

/// One row of the sequence ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Primary key of the ledger row itself.
    pub id: i64,
    /// The form this entry belongs to.
    pub form_id: i64,
    /// The element variant.
    pub kind: ElementKind,
    /// Primary key of the concrete element row.
    pub element_id: i64,
    /// Position of the element within the form. Positive, unique per form.
    pub seq_no: i64,
}

impl LedgerEntry {
    fn from_row(row: &Row) -> ForgeResult<Self> {
        let discriminator: String = row.get("element_type")?;
        Ok(Self {
            id: row.get("id")?,
            form_id: row.get("form_id")?,
            kind: registry::resolve(&discriminator)?,
            element_id: row.get("element_id")?,
            seq_no: row.get("seq_no")?,
        })
    }
}

/// Operations over the sequence ledger.
///
/// All operations take a [`DbExecutor`] so they run equally well against a
/// backend or inside an open transaction.
pub struct SequenceLedger;

impl SequenceLedger {
    /// Returns the highest sequence number placed on the form, 0 if the
    /// form has no ledger entries.
    pub async fn max_seq_no(db: &dyn DbExecutor, form_id: i64) -> ForgeResult<i64> {
        let row = db
            .query_one(
                "SELECT COALESCE(MAX(seq_no), 0) AS max_seq \
                 FROM ff_form_element_order WHERE form_id = ?",
                &[Value::Int(form_id)],
            )
            .await?;
        row.get("max_seq")
    }

    /// Returns the next free sequence number for the form.
    ///
    /// `max + 10`, so the first element on an empty form gets 10.
    pub async fn next_seq_no(db: &dyn DbExecutor, form_id: i64) -> ForgeResult<i64> {
        Ok(Self::max_seq_no(db, form_id).await? + SEQ_GAP)
    }

    /// Returns every ledger entry for the form, ascending by sequence
    /// number. This is the canonical display order.
    pub async fn entries_for_form(
        db: &dyn DbExecutor,
        form_id: i64,
    ) -> ForgeResult<Vec<LedgerEntry>> {
        let rows = db
            .query(
                "SELECT id, form_id, element_type, element_id, seq_no \
                 FROM ff_form_element_order WHERE form_id = ? ORDER BY seq_no ASC",
                &[Value::Int(form_id)],
            )
            .await?;
        rows.iter().map(LedgerEntry::from_row).collect()
    }

    /// Fetches a ledger entry by its own id.
    pub async fn entry(db: &dyn DbExecutor, id: i64) -> ForgeResult<LedgerEntry> {
        let row = db
            .query_one(
                "SELECT id, form_id, element_type, element_id, seq_no \
                 FROM ff_form_element_order WHERE id = ?",
                &[Value::Int(id)],
            )
            .await
            .map_err(|e| match e {
                ForgeError::DoesNotExist(_) => {
                    ForgeError::DoesNotExist(format!("Form element {id} does not exist"))
                }
                other => other,
            })?;
        LedgerEntry::from_row(&row)
    }

    /// Returns the entry for one specific element, if it has been placed.
    pub async fn entry_for_element(
        db: &dyn DbExecutor,
        form_id: i64,
        kind: ElementKind,
        element_id: i64,
    ) -> ForgeResult<Option<LedgerEntry>> {
        let rows = db
            .query(
                "SELECT id, form_id, element_type, element_id, seq_no \
                 FROM ff_form_element_order \
                 WHERE form_id = ? AND element_type = ? AND element_id = ?",
                &[
                    Value::Int(form_id),
                    Value::from(kind.discriminator()),
                    Value::Int(element_id),
                ],
            )
            .await?;
        rows.first().map(LedgerEntry::from_row).transpose()
    }

    /// Returns the entry currently occupying `(form_id, seq_no)`, if any.
    pub async fn holder_of(
        db: &dyn DbExecutor,
        form_id: i64,
        seq_no: i64,
    ) -> ForgeResult<Option<LedgerEntry>> {
        let rows = db
            .query(
                "SELECT id, form_id, element_type, element_id, seq_no \
                 FROM ff_form_element_order WHERE form_id = ? AND seq_no = ?",
                &[Value::Int(form_id), Value::Int(seq_no)],
            )
            .await?;
        rows.first().map(LedgerEntry::from_row).transpose()
    }

    /// Creates or updates the ledger entry for an element.
    ///
    /// Keyed by `(form_id, kind, element_id)`, so re-saving an element is
    /// idempotent: without a requested number the element keeps its slot,
    /// and re-requesting its current number is a no-op. A fresh placement
    /// without a requested number gets [`Self::next_seq_no`].
    ///
    /// # Errors
    ///
    /// [`ForgeError::DuplicateSequenceNumber`] if the requested number is
    /// held by a different element of the same form, whether detected by
    /// the pre-check or by the database unique constraint under
    /// concurrency. A non-positive requested number fails with a field
    /// validation error.
    pub async fn upsert_for_element(
        db: &dyn DbExecutor,
        form_id: i64,
        kind: ElementKind,
        element_id: i64,
        requested: Option<i64>,
    ) -> ForgeResult<LedgerEntry> {
        if let Some(seq) = requested {
            if seq <= 0 {
                return Err(ForgeError::field_error(
                    "seq_no",
                    "Sequence number must be a positive integer.",
                ));
            }
        }

        let existing = Self::entry_for_element(db, form_id, kind, element_id).await?;

        match (existing, requested) {
            (Some(entry), None) => Ok(entry),
            (Some(entry), Some(seq)) if entry.seq_no == seq => Ok(entry),
            (Some(entry), Some(seq)) => {
                if Self::holder_of(db, form_id, seq).await?.is_some() {
                    return Err(ForgeError::DuplicateSequenceNumber { form_id, seq_no: seq });
                }
                db.execute_sql(
                    "UPDATE ff_form_element_order SET seq_no = ? WHERE id = ?",
                    &[Value::Int(seq), Value::Int(entry.id)],
                )
                .await
                .map_err(|e| Self::map_constraint(e, form_id, seq))?;
                debug!(form_id, element_id, kind = %kind, seq_no = seq, "moved ledger entry");
                Ok(LedgerEntry { seq_no: seq, ..entry })
            }
            (None, requested) => {
                let seq = match requested {
                    Some(seq) => {
                        if Self::holder_of(db, form_id, seq).await?.is_some() {
                            return Err(ForgeError::DuplicateSequenceNumber {
                                form_id,
                                seq_no: seq,
                            });
                        }
                        seq
                    }
                    None => Self::next_seq_no(db, form_id).await?,
                };
                let id = db
                    .insert_returning_id(
                        "INSERT INTO ff_form_element_order \
                         (form_id, element_type, element_id, seq_no) \
                         VALUES (?, ?, ?, ?)",
                        &[
                            Value::Int(form_id),
                            Value::from(kind.discriminator()),
                            Value::Int(element_id),
                            Value::Int(seq),
                        ],
                    )
                    .await
                    .map_err(|e| Self::map_constraint(e, form_id, seq))?;
                let id = id.as_int().ok_or_else(|| {
                    ForgeError::DatabaseError("insert did not return an integer id".to_string())
                })?;
                debug!(form_id, element_id, kind = %kind, seq_no = seq, "placed ledger entry");
                Ok(LedgerEntry {
                    id,
                    form_id,
                    kind,
                    element_id,
                    seq_no: seq,
                })
            }
        }
    }

    /// Removes the ledger entry for an element. Returns the number of rows
    /// removed (0 or 1).
    pub async fn remove_for_element(
        db: &dyn DbExecutor,
        form_id: i64,
        kind: ElementKind,
        element_id: i64,
    ) -> ForgeResult<u64> {
        let removed = db
            .execute_sql(
                "DELETE FROM ff_form_element_order \
                 WHERE form_id = ? AND element_type = ? AND element_id = ?",
                &[
                    Value::Int(form_id),
                    Value::from(kind.discriminator()),
                    Value::Int(element_id),
                ],
            )
            .await?;
        debug!(form_id, element_id, kind = %kind, removed, "removed ledger entry");
        Ok(removed)
    }

    /// Rewrites a unique-constraint failure on `seq_no` as the typed
    /// duplicate error; the loser of a concurrent allocation race lands
    /// here instead of in the pre-check.
    fn map_constraint(err: ForgeError, form_id: i64, seq_no: i64) -> ForgeError {
        match err {
            ForgeError::IntegrityError(msg) if msg.contains("seq_no") => {
                ForgeError::DuplicateSequenceNumber { form_id, seq_no }
            }
            other => other,
        }
    }
}
