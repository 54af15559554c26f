//! Utility functions for formforge.
//!
//! - [`text`]: String helpers (`slugify`).

pub mod text;
