//! Settings for formforge.
//!
//! This module provides the [`Settings`] struct, which holds all runtime
//! configuration the core consumes, and [`LazySettings`], a globally
//! accessible, lazily-initialized settings instance. Settings are usually
//! loaded from a TOML file via [`settings_loader`](crate::settings_loader)
//! with `FORMFORGE_*` environment overrides.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

/// Database connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// The database engine (e.g. `formforge.db.backends.sqlite3`).
    pub engine: String,
    /// The database name (the file path for `SQLite`, `:memory:` for tests).
    pub name: String,
    /// Additional engine-specific options.
    #[serde(default)]
    pub options: HashMap<String, String>,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: "formforge.db.backends.sqlite3".to_string(),
            name: "formforge.sqlite3".to_string(),
            options: HashMap::new(),
        }
    }
}

impl DatabaseSettings {
    /// Returns `true` if this configuration names the SQLite engine.
    pub fn is_sqlite(&self) -> bool {
        self.engine.ends_with("sqlite3")
    }
}

/// The complete set of formforge settings.
///
/// # Examples
///
/// ```
/// use formforge_core::settings::Settings;
///
/// let settings = Settings::default();
/// assert!(settings.debug);
/// assert_eq!(settings.time_zone, "UTC");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // ── Core ─────────────────────────────────────────────────────────

    /// Whether debug mode is enabled. Debug mode selects human-readable
    /// log output; production uses structured JSON.
    pub debug: bool,

    // ── Database ─────────────────────────────────────────────────────

    /// Database configurations, keyed by alias (e.g. "default").
    pub databases: HashMap<String, DatabaseSettings>,

    // ── Internationalization ─────────────────────────────────────────

    /// The default time zone (e.g. "UTC"). Timestamps are stored in UTC;
    /// this names the zone the host layer renders them in.
    pub time_zone: String,

    // ── Logging ──────────────────────────────────────────────────────

    /// The log level or filter directive (e.g. "info", "formforge=debug").
    pub log_level: String,

    // ── Escape hatch ─────────────────────────────────────────────────

    /// Custom settings that don't fit into the above categories.
    pub extra: HashMap<String, serde_json::Value>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut databases = HashMap::new();
        databases.insert("default".to_string(), DatabaseSettings::default());

        Self {
            debug: true,
            databases,
            time_zone: "UTC".to_string(),
            log_level: "info".to_string(),
            extra: HashMap::new(),
        }
    }
}

impl Settings {
    /// Returns the "default" database configuration, if one is present.
    pub fn default_database(&self) -> Option<&DatabaseSettings> {
        self.databases.get("default")
    }
}

/// A lazily-initialized, globally-accessible settings container.
///
/// Call [`configure`](LazySettings::configure) once at startup to set the
/// settings, then use [`get`](LazySettings::get) to access them.
///
/// # Panics
///
/// [`get`](LazySettings::get) panics if settings have not been configured.
/// [`configure`](LazySettings::configure) panics if called more than once.
pub struct LazySettings {
    inner: OnceLock<Settings>,
}

impl Default for LazySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl LazySettings {
    /// Creates a new, unconfigured `LazySettings`.
    pub const fn new() -> Self {
        Self {
            inner: OnceLock::new(),
        }
    }

    /// Configures the global settings. Must be called exactly once.
    ///
    /// # Panics
    ///
    /// Panics if settings have already been configured.
    pub fn configure(&self, settings: Settings) {
        self.inner
            .set(settings)
            .expect("Settings have already been configured");
    }

    /// Returns a reference to the configured settings.
    ///
    /// # Panics
    ///
    /// Panics if settings have not been configured.
    pub fn get(&self) -> &Settings {
        self.inner
            .get()
            .expect("Settings have not been configured. Call SETTINGS.configure() first.")
    }

    /// Returns `true` if settings have been configured.
    pub fn is_configured(&self) -> bool {
        self.inner.get().is_some()
    }
}

/// The global settings instance.
///
/// Call `SETTINGS.configure(settings)` once at application startup, then
/// access settings via `SETTINGS.get()` anywhere in the workspace.
pub static SETTINGS: LazySettings = LazySettings::new();
