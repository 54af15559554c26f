//! System check framework for formforge.
//!
//! Provides a small framework for registering and running startup checks
//! on project configuration, plus built-in checks for the settings every
//! deployment needs (a usable default database, a valid log level).
//! Domain crates register their own checks; the element registry exposes
//! one verifying the orderable-variant table is coherent.
//!
//! ## Overview
//!
//! - [`CheckMessage`]: A diagnostic message from a check (level, message, hint).
//! - [`CheckLevel`]: Severity level (Debug, Info, Warning, Error, Critical).
//! - [`CheckRegistry`]: Registry for check functions with tag-based filtering.
//!
//! ## Examples
//!
//! ```
//! use formforge_core::checks::{CheckMessage, CheckLevel, CheckRegistry};
//!
//! let mut registry = CheckRegistry::with_builtins();
//! registry.register(
//!     |_settings| {
//!         vec![CheckMessage::warning(
//!             "Custom check warning",
//!             Some("Consider fixing this."),
//!             None,
//!             Some("myapp.W001"),
//!         )]
//!     },
//!     &["myapp"],
//! );
//!
//! let settings = formforge_core::settings::Settings::default();
//! let messages = registry.run_checks(Some(&["myapp"]), &settings);
//! assert_eq!(messages.len(), 1);
//! ```

use crate::settings::Settings;

/// Severity level for a check message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckLevel {
    /// Debugging information.
    Debug = 0,
    /// Informational message.
    Info = 1,
    /// A potential problem.
    Warning = 2,
    /// A definite problem that should be fixed.
    Error = 3,
    /// A critical error that prevents the application from running.
    Critical = 4,
}

impl std::fmt::Display for CheckLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "DEBUG"),
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARNING"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A diagnostic message produced by a system check.
#[derive(Debug, Clone)]
pub struct CheckMessage {
    /// The severity level.
    pub level: CheckLevel,
    /// The human-readable message describing the issue.
    pub msg: String,
    /// An optional hint on how to fix the issue.
    pub hint: Option<String>,
    /// The object (setting, registry entry, etc.) that has the issue.
    pub obj: Option<String>,
    /// A unique identifier for this check message (e.g. "database.E001").
    pub id: Option<String>,
}

impl CheckMessage {
    /// Creates a new `CheckMessage` with the given level and details.
    pub fn new(
        level: CheckLevel,
        msg: impl Into<String>,
        hint: Option<&str>,
        obj: Option<&str>,
        id: Option<&str>,
    ) -> Self {
        Self {
            level,
            msg: msg.into(),
            hint: hint.map(String::from),
            obj: obj.map(String::from),
            id: id.map(String::from),
        }
    }

    /// Creates a warning-level message.
    pub fn warning(
        msg: impl Into<String>,
        hint: Option<&str>,
        obj: Option<&str>,
        id: Option<&str>,
    ) -> Self {
        Self::new(CheckLevel::Warning, msg, hint, obj, id)
    }

    /// Creates an error-level message.
    pub fn error(
        msg: impl Into<String>,
        hint: Option<&str>,
        obj: Option<&str>,
        id: Option<&str>,
    ) -> Self {
        Self::new(CheckLevel::Error, msg, hint, obj, id)
    }

    /// Returns `true` if this is a warning or higher severity.
    pub fn is_serious(&self) -> bool {
        self.level >= CheckLevel::Warning
    }
}

impl std::fmt::Display for CheckMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.id {
            write!(f, "({id}) ")?;
        }
        write!(f, "{}: {}", self.level, self.msg)?;
        if let Some(ref hint) = self.hint {
            write!(f, "\n\tHINT: {hint}")?;
        }
        if let Some(ref obj) = self.obj {
            write!(f, "\n\tObject: {obj}")?;
        }
        Ok(())
    }
}

/// A check function that receives settings and returns diagnostic messages.
pub type CheckFn = fn(&Settings) -> Vec<CheckMessage>;

/// A registered check with associated tags.
struct RegisteredCheck {
    func: CheckFn,
    tags: Vec<String>,
}

/// Registry for system check functions.
///
/// Check functions can be registered with tags, and then run all at once
/// or filtered by tag.
pub struct CheckRegistry {
    checks: Vec<RegisteredCheck>,
}

impl CheckRegistry {
    /// Creates a new empty check registry.
    pub const fn new() -> Self {
        Self { checks: Vec::new() }
    }

    /// Creates a new check registry pre-loaded with built-in checks.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(check_default_database, &["database"]);
        registry.register(check_log_level, &["logging"]);
        registry
    }

    /// Registers a check function with the given tags.
    pub fn register(&mut self, func: CheckFn, tags: &[&str]) {
        self.checks.push(RegisteredCheck {
            func,
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
        });
    }

    /// Runs all registered checks (or only those matching the given tags)
    /// and collects all resulting messages.
    ///
    /// If `tags` is `None`, all checks are run.
    pub fn run_checks(&self, tags: Option<&[&str]>, settings: &Settings) -> Vec<CheckMessage> {
        let mut messages = Vec::new();

        for check in &self.checks {
            let should_run = tags.map_or(true, |filter_tags| {
                filter_tags
                    .iter()
                    .any(|t| check.tags.contains(&(*t).to_string()))
            });

            if should_run {
                messages.extend((check.func)(settings));
            }
        }

        messages
    }

    /// Returns the number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Returns `true` if no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// Built-in checks
// ============================================================

/// Checks that a "default" database is configured with a supported engine.
fn check_default_database(settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    match settings.default_database() {
        None => messages.push(CheckMessage::error(
            "No 'default' database is configured.",
            Some("Add a [databases.default] table to your settings file."),
            Some("settings.databases"),
            Some("database.E001"),
        )),
        Some(db) => {
            if db.name.is_empty() {
                messages.push(CheckMessage::error(
                    "The default database has an empty name.",
                    Some("Set databases.default.name to a file path or ':memory:'."),
                    Some("settings.databases.default"),
                    Some("database.E002"),
                ));
            }
            if !db.is_sqlite() {
                messages.push(CheckMessage::error(
                    format!("Unsupported database engine '{}'.", db.engine),
                    Some("Only the SQLite backend ships with this build."),
                    Some("settings.databases.default"),
                    Some("database.E003"),
                ));
            }
        }
    }

    messages
}

/// Checks that the configured log level parses as a tracing filter.
fn check_log_level(settings: &Settings) -> Vec<CheckMessage> {
    let mut messages = Vec::new();

    if tracing_subscriber::EnvFilter::try_new(&settings.log_level).is_err() {
        messages.push(CheckMessage::warning(
            format!(
                "Log level '{}' is not a valid filter directive; falling back to 'info'.",
                settings.log_level
            ),
            Some("Use a level name (e.g. 'debug') or a directive like 'formforge=debug'."),
            Some("settings.log_level"),
            Some("logging.W001"),
        ));
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_level_ordering() {
        assert!(CheckLevel::Critical > CheckLevel::Error);
        assert!(CheckLevel::Error > CheckLevel::Warning);
        assert!(CheckLevel::Warning > CheckLevel::Info);
    }

    #[test]
    fn test_check_message_display() {
        let msg = CheckMessage::error(
            "Something broke",
            Some("Fix it"),
            Some("settings.databases"),
            Some("database.E001"),
        );
        let rendered = msg.to_string();
        assert!(rendered.contains("(database.E001)"));
        assert!(rendered.contains("ERROR: Something broke"));
        assert!(rendered.contains("HINT: Fix it"));
    }

    #[test]
    fn test_builtins_pass_on_defaults() {
        let registry = CheckRegistry::with_builtins();
        let settings = Settings::default();
        let messages = registry.run_checks(None, &settings);
        assert!(messages.iter().all(|m| !m.is_serious()), "{messages:?}");
    }

    #[test]
    fn test_missing_default_database() {
        let registry = CheckRegistry::with_builtins();
        let mut settings = Settings::default();
        settings.databases.clear();
        let messages = registry.run_checks(Some(&["database"]), &settings);
        assert!(messages.iter().any(|m| m.id.as_deref() == Some("database.E001")));
    }

    #[test]
    fn test_unsupported_engine() {
        let registry = CheckRegistry::with_builtins();
        let mut settings = Settings::default();
        settings
            .databases
            .get_mut("default")
            .unwrap()
            .engine = "formforge.db.backends.postgresql".to_string();
        let messages = registry.run_checks(Some(&["database"]), &settings);
        assert!(messages.iter().any(|m| m.id.as_deref() == Some("database.E003")));
    }

    #[test]
    fn test_bad_log_level_warns() {
        let registry = CheckRegistry::with_builtins();
        let mut settings = Settings::default();
        settings.log_level = "===".to_string();
        let messages = registry.run_checks(Some(&["logging"]), &settings);
        assert!(messages.iter().any(|m| m.id.as_deref() == Some("logging.W001")));
    }

    #[test]
    fn test_tag_filtering() {
        let registry = CheckRegistry::with_builtins();
        let settings = Settings::default();
        let database_only = registry.run_checks(Some(&["database"]), &settings);
        let none_matching = registry.run_checks(Some(&["nonexistent"]), &settings);
        assert!(database_only.len() <= registry.len());
        assert!(none_matching.is_empty());
    }
}
