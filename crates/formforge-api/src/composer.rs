//! The polymorphic element composer.
//!
//! The one place wire envelopes meet concrete storage. Reads walk the
//! sequence ledger and fetch each element through its repository,
//! emitting `null` bodies for dangling references instead of failing the
//! whole form. Writes resolve the envelope's `element_type` against the
//! registry and dispatch to the matching repository, which keeps the
//! ledger in step inside its own transaction. Creating a form together
//! with its elements runs in a single transaction: any element failing
//! validation rolls back the form row and every element before it.

use formforge_core::{ForgeError, ForgeResult};
use formforge_db::transactions::atomic;
use formforge_db::DbExecutor;
use formforge_models::form::FormRepository;
use formforge_models::html_component::HtmlComponentRepository;
use formforge_models::ledger::{LedgerEntry, SequenceLedger};
use formforge_models::lifecycle::Orderable;
use formforge_models::question::QuestionRepository;
use formforge_models::ElementKind;
use serde::Serialize;
use tracing::warn;

use crate::serializers::{
    ElementEnvelope, ElementOrderView, FormCreateRequest, FormDetail, FormPatchRequest,
};

/// Assembles a form's elements in display order.
///
/// Ledger entries whose target row is missing yield a view with a `null`
/// element body and a warning log event; the read itself never fails for
/// a dangling reference.
pub async fn compose(db: &dyn DbExecutor, form_id: i64) -> ForgeResult<Vec<ElementOrderView>> {
    let entries = SequenceLedger::entries_for_form(db, form_id).await?;
    let mut views = Vec::with_capacity(entries.len());
    for entry in entries {
        views.push(compose_entry(db, &entry).await?);
    }
    Ok(views)
}

async fn compose_entry(db: &dyn DbExecutor, entry: &LedgerEntry) -> ForgeResult<ElementOrderView> {
    let element = match entry.kind {
        ElementKind::FormQuestion => {
            match QuestionRepository::get(db, entry.element_id).await {
                Ok(question) => Some(to_json(&question)?),
                Err(ForgeError::DoesNotExist(_)) => None,
                Err(other) => return Err(other),
            }
        }
        ElementKind::HtmlComponent => {
            match HtmlComponentRepository::get(db, entry.element_id).await {
                Ok(component) => Some(to_json(&component)?),
                Err(ForgeError::DoesNotExist(_)) => None,
                Err(other) => return Err(other),
            }
        }
    };
    if element.is_none() {
        warn!(
            form_id = entry.form_id,
            element_type = %entry.kind,
            element_id = entry.element_id,
            "ledger entry references a missing element"
        );
    }
    Ok(ElementOrderView {
        id: entry.id,
        seq_no: entry.seq_no,
        element_type: entry.kind.descriptor(),
        element,
    })
}

/// Fetches a form with its composed elements.
pub async fn form_detail(db: &dyn DbExecutor, form_id: i64) -> ForgeResult<FormDetail> {
    let form = FormRepository::get(db, form_id).await?;
    let form_elements = compose(db, form_id).await?;
    Ok(FormDetail {
        form,
        form_elements,
    })
}

/// Creates one element on an existing form and returns its composed view.
///
/// The variant is resolved from the envelope's `element_type`; the
/// element row and its ledger entry are written in one transaction.
pub async fn create_element(
    db: &dyn DbExecutor,
    form_id: i64,
    envelope: &ElementEnvelope,
) -> ForgeResult<ElementOrderView> {
    let kind = envelope.element_type.resolve()?;
    FormRepository::get(db, form_id).await?;

    match kind {
        ElementKind::FormQuestion => {
            let body = envelope.question_body()?;
            let question =
                QuestionRepository::create(db, body.into_new(form_id, envelope.seq_no)).await?;
            view_for_element(db, &question).await
        }
        ElementKind::HtmlComponent => {
            let body = envelope.component_body()?;
            let component =
                HtmlComponentRepository::create(db, body.into_new(form_id, envelope.seq_no))
                    .await?;
            view_for_element(db, &component).await
        }
    }
}

/// Replaces the element behind a ledger entry and returns the refreshed
/// view. The envelope's `element_type` must match the stored entry.
pub async fn update_element(
    db: &dyn DbExecutor,
    entry_id: i64,
    envelope: &ElementEnvelope,
) -> ForgeResult<ElementOrderView> {
    let entry = SequenceLedger::entry(db, entry_id).await?;
    let kind = envelope.element_type.resolve()?;
    if kind != entry.kind {
        return Err(ForgeError::field_error(
            "element_type",
            "Element type does not match the stored element.",
        ));
    }

    match kind {
        ElementKind::FormQuestion => {
            let body = envelope.question_body()?;
            let question = QuestionRepository::update(
                db,
                entry.element_id,
                body.into_new(entry.form_id, envelope.seq_no),
            )
            .await?;
            view_for_element(db, &question).await
        }
        ElementKind::HtmlComponent => {
            let body = envelope.component_body()?;
            let component = HtmlComponentRepository::update(
                db,
                entry.element_id,
                body.into_new(entry.form_id, envelope.seq_no),
            )
            .await?;
            view_for_element(db, &component).await
        }
    }
}

/// Deletes the element behind a ledger entry, entry included.
pub async fn delete_element(db: &dyn DbExecutor, entry_id: i64) -> ForgeResult<()> {
    let entry = SequenceLedger::entry(db, entry_id).await?;
    match entry.kind {
        ElementKind::FormQuestion => {
            QuestionRepository::delete(db, entry.element_id).await?;
        }
        ElementKind::HtmlComponent => {
            HtmlComponentRepository::delete(db, entry.element_id).await?;
        }
    }
    Ok(())
}

/// Creates a form together with its elements in one transaction.
///
/// Elements are created in payload order, so explicit sequence numbers
/// are honored and allocated ones follow the payload ordering. Any
/// failure rolls back the form and every element.
pub async fn create_form(
    db: &dyn DbExecutor,
    request: FormCreateRequest,
) -> ForgeResult<FormDetail> {
    let (new_form, elements) = request.into_parts();
    atomic(db, |txn| async move {
        let form = FormRepository::create_within(&*txn, new_form).await?;
        for envelope in &elements {
            create_element_within(&*txn, form.id, envelope).await?;
        }
        let form_elements = compose(&*txn, form.id).await?;
        Ok(FormDetail {
            form,
            form_elements,
        })
    })
    .await
}

/// Applies a partial update to a form and returns the refreshed detail.
pub async fn update_form(
    db: &dyn DbExecutor,
    form_id: i64,
    request: FormPatchRequest,
) -> ForgeResult<FormDetail> {
    let form = FormRepository::update(db, form_id, request.into_patch()).await?;
    let form_elements = compose(db, form_id).await?;
    Ok(FormDetail {
        form,
        form_elements,
    })
}

async fn create_element_within(
    db: &dyn DbExecutor,
    form_id: i64,
    envelope: &ElementEnvelope,
) -> ForgeResult<()> {
    match envelope.element_type.resolve()? {
        ElementKind::FormQuestion => {
            let body = envelope.question_body()?;
            QuestionRepository::create_within(db, body.into_new(form_id, envelope.seq_no)).await?;
        }
        ElementKind::HtmlComponent => {
            let body = envelope.component_body()?;
            HtmlComponentRepository::create_within(db, body.into_new(form_id, envelope.seq_no))
                .await?;
        }
    }
    Ok(())
}

async fn view_for_element<E>(db: &dyn DbExecutor, element: &E) -> ForgeResult<ElementOrderView>
where
    E: Orderable + Serialize,
{
    let entry = SequenceLedger::entry_for_element(
        db,
        element.form_id(),
        element.element_kind(),
        element.element_id(),
    )
    .await?
    .ok_or_else(|| {
        ForgeError::DatabaseError("element is missing its ledger entry".to_string())
    })?;
    Ok(ElementOrderView {
        id: entry.id,
        seq_no: entry.seq_no,
        element_type: entry.kind.descriptor(),
        element: Some(to_json(element)?),
    })
}

fn to_json<T: Serialize>(value: &T) -> ForgeResult<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| ForgeError::SerializationError(e.to_string()))
}
