//! Settings loading from configuration files.
//!
//! This module provides functions to load [`Settings`] from TOML files, JSON
//! files, and to apply environment variable overrides.
//!
//! ## Loading Order
//!
//! 1. Start with default settings.
//! 2. Load from a TOML or JSON file (overriding defaults).
//! 3. Apply environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `FORMFORGE_DEBUG` | `debug` |
//! | `FORMFORGE_LOG_LEVEL` | `log_level` |
//! | `FORMFORGE_TIME_ZONE` | `time_zone` |
//! | `FORMFORGE_DATABASE_NAME` | `databases["default"].name` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use formforge_core::settings_loader;
//!
//! // Load from TOML
//! let settings = settings_loader::from_toml_file("config/formforge.toml").unwrap();
//!
//! // Load from TOML with environment overrides
//! let settings = settings_loader::from_toml_file_with_env("config/formforge.toml").unwrap();
//! ```

use std::path::Path;

use crate::error::ForgeError;
use crate::settings::Settings;

/// Loads settings from a TOML string.
///
/// The TOML is deserialized directly into a [`Settings`] struct. Any fields
/// not present in the TOML will use the default values.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or cannot be deserialized.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, ForgeError> {
    // Two-step approach: deserialize the TOML into a serde_json::Value,
    // then merge it with the default settings. This keeps defaults for
    // any settings not specified in the TOML.
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| ForgeError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;

    let json_value = toml_to_json(toml_value);
    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        ForgeError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, json_value);
    serde_json::from_value(merged).map_err(|e| {
        ForgeError::ConfigurationError(format!("Failed to deserialize settings from TOML: {e}"))
    })
}

/// Loads settings from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, ForgeError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        ForgeError::ConfigurationError(format!(
            "Failed to read TOML file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_toml_str(&content)
}

/// Loads settings from a TOML file and then applies environment variable overrides.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the TOML is malformed.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, ForgeError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string.
///
/// # Errors
///
/// Returns an error if the JSON is malformed or cannot be deserialized.
pub fn from_json_str(json_str: &str) -> Result<Settings, ForgeError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| ForgeError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;

    let default_json = serde_json::to_value(Settings::default()).map_err(|e| {
        ForgeError::ConfigurationError(format!("Failed to serialize default settings: {e}"))
    })?;

    let merged = merge_json(default_json, json_value);
    serde_json::from_value(merged).map_err(|e| {
        ForgeError::ConfigurationError(format!("Failed to deserialize settings from JSON: {e}"))
    })
}

/// Loads settings from a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the JSON is malformed.
pub fn from_json_file(path: impl AsRef<Path>) -> Result<Settings, ForgeError> {
    let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        ForgeError::ConfigurationError(format!(
            "Failed to read JSON file '{}': {e}",
            path.as_ref().display()
        ))
    })?;
    from_json_str(&content)
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies environment variable overrides to a settings struct.
///
/// Supported environment variables:
///
/// - `FORMFORGE_DEBUG` -> `debug` (values: "true"/"1"/"yes" => true, anything else => false)
/// - `FORMFORGE_LOG_LEVEL` -> `log_level`
/// - `FORMFORGE_TIME_ZONE` -> `time_zone`
/// - `FORMFORGE_DATABASE_NAME` -> `databases["default"].name`
pub fn apply_env_overrides(settings: &mut Settings) {
    if let Ok(val) = std::env::var("FORMFORGE_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Ok(val) = std::env::var("FORMFORGE_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Ok(val) = std::env::var("FORMFORGE_TIME_ZONE") {
        settings.time_zone = val;
    }

    if let Ok(val) = std::env::var("FORMFORGE_DATABASE_NAME") {
        if let Some(db) = settings.databases.get_mut("default") {
            db.name = val;
        }
    }
}

// ============================================================
// Helpers
// ============================================================

/// Converts a TOML value to a `serde_json::Value`.
fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => {
            let map: serde_json::Map<String, serde_json::Value> = table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

/// Deep-merges two JSON values. The `override_val` takes precedence.
fn merge_json(base: serde_json::Value, override_val: serde_json::Value) -> serde_json::Value {
    match (base, override_val) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(override_map)) => {
            for (key, override_v) in override_map {
                let merged = if let Some(base_v) = base_map.remove(&key) {
                    merge_json(base_v, override_v)
                } else {
                    override_v
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, override_val) => override_val,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── TOML loading ────────────────────────────────────────────────

    #[test]
    fn test_from_toml_str_basic() {
        let toml = r#"
            debug = false
            log_level = "debug"
        "#;

        let settings = from_toml_str(toml).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.log_level, "debug");
        // Defaults preserved
        assert_eq!(settings.time_zone, "UTC");
        assert!(settings.default_database().is_some());
    }

    #[test]
    fn test_from_toml_str_database_table() {
        let toml = r#"
            [databases.default]
            engine = "formforge.db.backends.sqlite3"
            name = ":memory:"
        "#;

        let settings = from_toml_str(toml).unwrap();
        let db = settings.default_database().unwrap();
        assert_eq!(db.name, ":memory:");
        assert!(db.is_sqlite());
    }

    #[test]
    fn test_from_toml_str_malformed() {
        let result = from_toml_str("debug = [not toml");
        assert!(matches!(result, Err(ForgeError::ConfigurationError(_))));
    }

    // ── JSON loading ────────────────────────────────────────────────

    #[test]
    fn test_from_json_str_basic() {
        let json = r#"{"debug": false, "time_zone": "Europe/London"}"#;
        let settings = from_json_str(json).unwrap();
        assert!(!settings.debug);
        assert_eq!(settings.time_zone, "Europe/London");
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_from_json_str_malformed() {
        let result = from_json_str("{nope");
        assert!(matches!(result, Err(ForgeError::ConfigurationError(_))));
    }

    // ── Merge helpers ───────────────────────────────────────────────

    #[test]
    fn test_merge_json_nested_tables() {
        let base = serde_json::json!({"a": {"x": 1, "y": 2}, "b": 3});
        let over = serde_json::json!({"a": {"y": 9}});
        let merged = merge_json(base, over);
        assert_eq!(merged["a"]["x"], 1);
        assert_eq!(merged["a"]["y"], 9);
        assert_eq!(merged["b"], 3);
    }

    #[test]
    fn test_toml_to_json_scalars() {
        let toml_value: toml::Value = toml::from_str("x = 1\ny = \"s\"\nz = true").unwrap();
        let json = toml_to_json(toml_value);
        assert_eq!(json["x"], 1);
        assert_eq!(json["y"], "s");
        assert_eq!(json["z"], true);
    }
}
