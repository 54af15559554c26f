//! Field contracts: the renderable description of a form's questions.
//!
//! A contract is everything a host needs to render one input and to
//! validate its raw value: a stable field name, the label and help text,
//! the input kind, and the materialized option list for choice kinds.
//! Contracts are built in ledger order, so the capture form always shows
//! questions the way the composer orders them.

use formforge_core::{ForgeError, ForgeResult};
use formforge_db::DbExecutor;
use formforge_models::ledger::SequenceLedger;
use formforge_models::question::{FieldKind, Question, QuestionRepository};
use formforge_models::ElementKind;
use serde::Serialize;
use tracing::warn;

/// A renderable, validatable description of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldContract {
    pub question_id: i64,
    /// Stable field name for host rendering: `question_{id}`.
    pub name: String,
    /// The question prompt.
    pub label: String,
    pub required: bool,
    pub help_text: String,
    pub input_kind: FieldKind,
    /// Options for choice kinds, in stored order, empties and duplicates
    /// preserved. Empty for every other kind.
    pub choice_options: Vec<String>,
}

impl FieldContract {
    /// Builds the contract for one question.
    pub fn for_question(question: &Question) -> Self {
        let choice_options = if question.field_type.is_choice() {
            question.choice_list().iter().map(|s| (*s).to_string()).collect()
        } else {
            Vec::new()
        };
        Self {
            question_id: question.id,
            name: format!("question_{}", question.id),
            label: question.question.clone(),
            required: question.required,
            help_text: question.help_text.clone(),
            input_kind: question.field_type,
            choice_options,
        }
    }
}

/// Builds contracts for a form's questions in ledger order.
///
/// HTML components capture nothing so they contribute no contract, and a
/// ledger entry whose question row is missing is skipped with a warning,
/// the same way composed reads tolerate dangling references.
pub async fn build_field_contracts(
    db: &dyn DbExecutor,
    form_id: i64,
) -> ForgeResult<Vec<FieldContract>> {
    let entries = SequenceLedger::entries_for_form(db, form_id).await?;
    let mut contracts = Vec::new();
    for entry in entries {
        if entry.kind != ElementKind::FormQuestion {
            continue;
        }
        match QuestionRepository::get(db, entry.element_id).await {
            Ok(question) => contracts.push(FieldContract::for_question(&question)),
            Err(ForgeError::DoesNotExist(_)) => {
                warn!(
                    form_id,
                    element_id = entry.element_id,
                    "ledger entry references a missing question; no contract built"
                );
            }
            Err(other) => return Err(other),
        }
    }
    Ok(contracts)
}
