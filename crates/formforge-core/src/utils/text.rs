//! String utility functions.

use regex::Regex;
use std::sync::OnceLock;

/// Converts a string to a URL-friendly slug.
///
/// Converts to lowercase, removes non-alphanumeric characters (except hyphens
/// and spaces), replaces spaces with hyphens, and collapses consecutive
/// hyphens. Form slugs are derived from titles this way when the caller does
/// not supply one.
///
/// # Examples
///
/// ```
/// use formforge_core::utils::text::slugify;
///
/// assert_eq!(slugify("Customer Survey 2024!"), "customer-survey-2024");
/// assert_eq!(slugify("  Spaced  Out  "), "spaced-out");
/// assert_eq!(slugify("already-slugged"), "already-slugged");
/// ```
pub fn slugify(s: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    static MULTI_HYPHEN: OnceLock<Regex> = OnceLock::new();

    let non_alnum = NON_ALNUM.get_or_init(|| Regex::new(r"[^\w\s-]").unwrap());
    let multi_hyphen = MULTI_HYPHEN.get_or_init(|| Regex::new(r"[-\s]+").unwrap());

    let s = s.to_lowercase();
    let s = non_alnum.replace_all(&s, "");
    let s = multi_hyphen.replace_all(&s, "-");
    let s = s.trim_matches('-');
    s.to_string()
}
