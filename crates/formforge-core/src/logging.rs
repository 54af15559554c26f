//! Logging integration for formforge.
//!
//! Provides helpers for configuring [`tracing`]-based logging from
//! [`Settings`](crate::settings::Settings) and for creating spans around
//! form operations.

use crate::settings::Settings;

/// Sets up the global tracing subscriber based on the given settings.
///
/// The log level is read from `settings.log_level` (e.g. "debug", "info",
/// "warn", or a full filter directive like "formforge=debug"). In debug mode
/// a pretty, human-readable format is used; in production a structured JSON
/// format is used.
pub fn setup_logging(settings: &Settings) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if settings.debug {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(true)
            .with_line_number(true)
            .pretty()
            .try_init()
            .ok();
    } else {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .try_init()
            .ok();
    }
}

/// Creates a tracing span for a single form operation.
///
/// Attach this span around composer writes or response submissions so that
/// all log entries emitted inside include the form id.
///
/// # Examples
///
/// ```
/// use formforge_core::logging::form_span;
///
/// let span = form_span("capture_response", 42);
/// let _guard = span.enter();
/// tracing::info!("validating submission");
/// ```
pub fn form_span(operation: &str, form_id: i64) -> tracing::Span {
    tracing::info_span!("form_op", op = operation, form_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_span_construction() {
        let span = form_span("compose", 7);
        let _guard = span.enter();
        tracing::debug!("inside span");
    }
}
