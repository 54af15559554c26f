//! # formforge-core
//!
//! Core types for the formforge form-builder: error taxonomy, settings,
//! the identity contract used by permission checks, system checks, and
//! text utilities. This crate has no database or domain dependencies and
//! provides the foundation for all other crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`auth`] - The resolved-user identity contract
//! - [`settings`] - Settings and global configuration
//! - [`settings_loader`] - TOML/JSON settings files and env overrides
//! - [`checks`] - System check framework
//! - [`logging`] - Tracing-based logging integration
//! - [`utils`] - Text helpers (`slugify`)

pub mod auth;
pub mod checks;
pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;
pub mod utils;

// Re-export the most commonly used types at the crate root.
pub use auth::RequestUser;
pub use error::{ForgeError, ForgeResult, ValidationError};
pub use settings::{Settings, SETTINGS};
