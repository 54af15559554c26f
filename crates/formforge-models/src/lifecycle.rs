//! Element lifecycle synchronizer.
//!
//! Keeps the sequence ledger consistent with element saves and deletes.
//! Every orderable variant implements [`Orderable`], and its repository
//! calls [`element_saved`] / [`element_deleted`] from inside the same
//! transaction as the element write itself, so a failure partway rolls
//! back both the element and the ledger row together.
//!
//! This replaces implicit save/delete signals with one explicit dispatch
//! point: there is exactly one way a ledger row comes into existence.

use formforge_core::ForgeResult;
use formforge_db::DbExecutor;
use tracing::debug;

use crate::ledger::{LedgerEntry, SequenceLedger};
use crate::registry::ElementKind;

/// The capability shared by every element that participates in form
/// ordering.
pub trait Orderable: Send + Sync {
    /// The registered variant of this element.
    fn element_kind(&self) -> ElementKind;

    /// Primary key of the element row.
    fn element_id(&self) -> i64;

    /// The form the element belongs to.
    fn form_id(&self) -> i64;
}

/// Dispatched after an orderable element is created or updated.
///
/// Upserts the element's ledger entry. `requested_seq` carries an explicit
/// caller-supplied position; `None` keeps the element's current slot, or
/// allocates the next free number for a fresh element.
///
/// Must run inside the transaction that wrote the element.
pub async fn element_saved(
    db: &dyn DbExecutor,
    element: &dyn Orderable,
    requested_seq: Option<i64>,
) -> ForgeResult<LedgerEntry> {
    let entry = SequenceLedger::upsert_for_element(
        db,
        element.form_id(),
        element.element_kind(),
        element.element_id(),
        requested_seq,
    )
    .await?;
    debug!(
        form_id = element.form_id(),
        kind = %element.element_kind(),
        element_id = element.element_id(),
        seq_no = entry.seq_no,
        "element saved"
    );
    Ok(entry)
}

/// Dispatched after an orderable element is deleted.
///
/// Removes the element's ledger entry and returns the number of rows
/// removed. Must run inside the transaction that deleted the element.
pub async fn element_deleted(db: &dyn DbExecutor, element: &dyn Orderable) -> ForgeResult<u64> {
    let removed = SequenceLedger::remove_for_element(
        db,
        element.form_id(),
        element.element_kind(),
        element.element_id(),
    )
    .await?;
    debug!(
        form_id = element.form_id(),
        kind = %element.element_kind(),
        element_id = element.element_id(),
        removed,
        "element deleted"
    );
    Ok(removed)
}
