//! Element type registry.
//!
//! Maps type discriminators to the concrete orderable element variants.
//! The registry is a closed set known at compile time. There is no
//! runtime type discovery, so an unrelated entity can never be mistaken
//! for an orderable element.

use formforge_core::checks::CheckMessage;
use formforge_core::{ForgeError, ForgeResult, Settings};
use serde::{Deserialize, Serialize};

/// The application label shared by every registered element type.
pub const APP_LABEL: &str = "formforge";

/// The closed set of orderable element variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// A block of raw HTML displayed between questions.
    HtmlComponent,
    /// A question a respondent answers.
    FormQuestion,
}

impl ElementKind {
    /// Every registered variant, in registration order.
    pub const ALL: [Self; 2] = [Self::HtmlComponent, Self::FormQuestion];

    /// Returns the type discriminator (the lowercased model name).
    pub const fn discriminator(self) -> &'static str {
        match self {
            Self::HtmlComponent => "htmlcomponent",
            Self::FormQuestion => "formquestion",
        }
    }

    /// Returns the stable numeric id for this variant.
    pub const fn type_id(self) -> i64 {
        match self {
            Self::HtmlComponent => 1,
            Self::FormQuestion => 2,
        }
    }

    /// Whether this variant participates in sequence ordering.
    ///
    /// Always true today; the registry being closed is what keeps
    /// non-orderable entities out, not this flag.
    pub const fn is_orderable(self) -> bool {
        true
    }

    /// Returns the full type descriptor for this variant.
    pub const fn descriptor(self) -> ElementType {
        ElementType {
            id: self.type_id(),
            app_label: APP_LABEL,
            model: self.discriminator(),
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.discriminator())
    }
}

/// A full element type descriptor as exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ElementType {
    /// Stable numeric id.
    pub id: i64,
    /// Owning application label.
    pub app_label: &'static str,
    /// Lowercased model name; doubles as the discriminator.
    pub model: &'static str,
}

/// Resolves a discriminator to its element variant.
///
/// # Errors
///
/// Returns [`ForgeError::UnknownElementType`] if the discriminator does not
/// name a registered orderable variant.
pub fn resolve(discriminator: &str) -> ForgeResult<ElementKind> {
    ElementKind::ALL
        .into_iter()
        .find(|kind| kind.discriminator() == discriminator)
        .ok_or_else(|| ForgeError::UnknownElementType(discriminator.to_string()))
}

/// Resolves a numeric type id to its element variant.
///
/// # Errors
///
/// Returns [`ForgeError::UnknownElementType`] if no variant has this id.
pub fn resolve_id(type_id: i64) -> ForgeResult<ElementKind> {
    ElementKind::ALL
        .into_iter()
        .find(|kind| kind.type_id() == type_id)
        .ok_or_else(|| ForgeError::UnknownElementType(format!("type id {type_id}")))
}

/// Resolves an `(app_label, model)` pair to its element variant.
///
/// # Errors
///
/// Returns [`ForgeError::UnknownElementType`] if the pair does not name a
/// registered variant.
pub fn resolve_natural_key(app_label: &str, model: &str) -> ForgeResult<ElementKind> {
    if app_label != APP_LABEL {
        return Err(ForgeError::UnknownElementType(format!(
            "{app_label}.{model}"
        )));
    }
    resolve(model)
}

/// Whether the discriminator names a registered orderable variant.
pub fn is_orderable(discriminator: &str) -> bool {
    resolve(discriminator).is_ok_and(ElementKind::is_orderable)
}

/// System check verifying registry integrity.
///
/// Flags duplicate discriminators or ids, which would make ledger rows
/// ambiguous. With a closed enum this can only fire after a bad edit to
/// the registry itself, which is exactly when it should.
pub fn check_element_registry(_settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    for (i, a) in ElementKind::ALL.iter().enumerate() {
        for b in &ElementKind::ALL[i + 1..] {
            if a.discriminator() == b.discriminator() {
                messages.push(CheckMessage::error(
                    format!("Duplicate element discriminator '{}'.", a.discriminator()),
                    None,
                    Some("ElementKind"),
                    Some("registry.E001"),
                ));
            }
            if a.type_id() == b.type_id() {
                messages.push(CheckMessage::error(
                    format!("Duplicate element type id {}.", a.type_id()),
                    None,
                    Some("ElementKind"),
                    Some("registry.E002"),
                ));
            }
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_discriminators() {
        assert_eq!(resolve("htmlcomponent").unwrap(), ElementKind::HtmlComponent);
        assert_eq!(resolve("formquestion").unwrap(), ElementKind::FormQuestion);
    }

    #[test]
    fn test_resolve_unknown_discriminator() {
        let err = resolve("form").unwrap_err();
        assert!(matches!(err, ForgeError::UnknownElementType(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        assert!(resolve("HtmlComponent").is_err());
    }

    #[test]
    fn test_resolve_id() {
        assert_eq!(resolve_id(1).unwrap(), ElementKind::HtmlComponent);
        assert_eq!(resolve_id(2).unwrap(), ElementKind::FormQuestion);
        assert!(resolve_id(99).is_err());
    }

    #[test]
    fn test_resolve_natural_key() {
        assert_eq!(
            resolve_natural_key("formforge", "formquestion").unwrap(),
            ElementKind::FormQuestion
        );
        assert!(resolve_natural_key("blog", "formquestion").is_err());
    }

    #[test]
    fn test_descriptor_round_trip() {
        for kind in ElementKind::ALL {
            let descriptor = kind.descriptor();
            assert_eq!(resolve(descriptor.model).unwrap(), kind);
            assert_eq!(resolve_id(descriptor.id).unwrap(), kind);
            assert_eq!(descriptor.app_label, APP_LABEL);
        }
    }

    #[test]
    fn test_all_variants_orderable() {
        for kind in ElementKind::ALL {
            assert!(kind.is_orderable());
            assert!(is_orderable(kind.discriminator()));
        }
        assert!(!is_orderable("form"));
    }

    #[test]
    fn test_registry_check_passes() {
        let messages = check_element_registry(&Settings::default());
        assert!(messages.is_empty());
    }

    #[test]
    fn test_discriminator_display() {
        assert_eq!(ElementKind::FormQuestion.to_string(), "formquestion");
    }
}
