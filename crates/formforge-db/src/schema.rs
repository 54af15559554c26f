//! Database schema for the formforge tables.
//!
//! All tables live in the `ff_` namespace. The schema is static: formforge
//! does not ship a migration framework, so [`create_all()`] is the single
//! entry point for provisioning a database, and every statement is written
//! with `IF NOT EXISTS` so it is safe to call repeatedly.
//!
//! Uses SQLite-compatible syntax (INTEGER PRIMARY KEY AUTOINCREMENT, TEXT
//! timestamps). Timestamps are stored as RFC 3339 text.

use formforge_core::ForgeResult;

use crate::executor::DbExecutor;

/// DDL for the `ff_form` table.
pub fn form_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS \"ff_form\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"title\" TEXT NOT NULL, \
        \"slug\" TEXT NOT NULL, \
        \"description\" TEXT NOT NULL DEFAULT '', \
        \"status\" TEXT NOT NULL DEFAULT 'draft', \
        \"start_date\" TEXT NOT NULL, \
        \"end_date\" TEXT NULL, \
        \"owner_id\" INTEGER NOT NULL, \
        \"created_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP, \
        \"updated_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP\
    )"
}

/// DDL for the `ff_form_editor` table (form <-> user many-to-many).
pub fn form_editor_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS \"ff_form_editor\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"form_id\" INTEGER NOT NULL REFERENCES \"ff_form\" (\"id\") ON DELETE CASCADE, \
        \"user_id\" INTEGER NOT NULL, \
        UNIQUE (\"form_id\", \"user_id\")\
    )"
}

/// DDL for the `ff_form_question` table.
pub fn form_question_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS \"ff_form_question\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"form_id\" INTEGER NOT NULL REFERENCES \"ff_form\" (\"id\") ON DELETE CASCADE, \
        \"question\" TEXT NOT NULL, \
        \"field_type\" TEXT NOT NULL, \
        \"choices\" TEXT NOT NULL DEFAULT '', \
        \"required\" INTEGER NOT NULL DEFAULT 0, \
        \"help_text\" TEXT NOT NULL DEFAULT '', \
        \"related_question_id\" INTEGER NULL \
            REFERENCES \"ff_form_question\" (\"id\") ON DELETE CASCADE, \
        \"created_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP, \
        \"updated_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP\
    )"
}

/// DDL for the `ff_html_component` table.
pub fn html_component_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS \"ff_html_component\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"form_id\" INTEGER NOT NULL REFERENCES \"ff_form\" (\"id\") ON DELETE CASCADE, \
        \"html\" TEXT NOT NULL, \
        \"created_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP, \
        \"updated_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP\
    )"
}

/// DDL for the `ff_form_element_order` table.
///
/// One row per placed element. The `(form_id, seq_no)` constraint is what
/// settles concurrent writers racing for the same slot; the
/// `(form_id, element_type, element_id)` constraint guarantees an element
/// appears at most once per form.
pub fn element_order_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS \"ff_form_element_order\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"form_id\" INTEGER NOT NULL REFERENCES \"ff_form\" (\"id\") ON DELETE CASCADE, \
        \"element_type\" TEXT NOT NULL, \
        \"element_id\" INTEGER NOT NULL, \
        \"seq_no\" INTEGER NOT NULL, \
        UNIQUE (\"form_id\", \"seq_no\"), \
        UNIQUE (\"form_id\", \"element_type\", \"element_id\")\
    )"
}

/// DDL for the `ff_form_responder` table.
///
/// The `(form_id, user_id)` constraint enforces one submission per user.
pub fn form_responder_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS \"ff_form_responder\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"form_id\" INTEGER NOT NULL REFERENCES \"ff_form\" (\"id\") ON DELETE CASCADE, \
        \"user_id\" INTEGER NOT NULL, \
        \"ip_address\" TEXT NULL, \
        \"user_agent\" TEXT NULL, \
        \"created_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP, \
        UNIQUE (\"form_id\", \"user_id\")\
    )"
}

/// DDL for the `ff_form_response` table (one row per answered question).
pub fn form_response_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS \"ff_form_response\" (\
        \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
        \"responder_id\" INTEGER NOT NULL \
            REFERENCES \"ff_form_responder\" (\"id\") ON DELETE CASCADE, \
        \"question_id\" INTEGER NOT NULL \
            REFERENCES \"ff_form_question\" (\"id\") ON DELETE CASCADE, \
        \"answer\" TEXT NOT NULL DEFAULT '', \
        \"created_at\" TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP\
    )"
}

/// Secondary indexes.
pub fn index_sql() -> Vec<&'static str> {
    vec![
        "CREATE INDEX IF NOT EXISTS \"ff_form_slug_idx\" ON \"ff_form\" (\"slug\")",
        "CREATE INDEX IF NOT EXISTS \"ff_element_order_form_idx\" \
            ON \"ff_form_element_order\" (\"form_id\", \"seq_no\")",
        "CREATE INDEX IF NOT EXISTS \"ff_form_response_responder_idx\" \
            ON \"ff_form_response\" (\"responder_id\")",
    ]
}

/// Returns every DDL statement in dependency order.
pub fn all_sql() -> Vec<&'static str> {
    let mut statements = vec![
        form_sql(),
        form_editor_sql(),
        form_question_sql(),
        html_component_sql(),
        element_order_sql(),
        form_responder_sql(),
        form_response_sql(),
    ];
    statements.extend(index_sql());
    statements
}

/// Creates every formforge table and index on the given database.
pub async fn create_all(db: &dyn DbExecutor) -> ForgeResult<()> {
    for sql in all_sql() {
        db.execute_sql(sql, &[]).await?;
    }
    Ok(())
}
