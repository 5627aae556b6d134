use std::path::Path;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;

use crate::error::{AppError, DB_OPEN_FAILED, DB_SCHEMA_FAILED};

/// Every statement is idempotent; the bootstrap runs on each open.
const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS incidents (
      id INTEGER PRIMARY KEY AUTOINCREMENT,
      title TEXT NOT NULL,
      description TEXT NOT NULL,
      category TEXT NOT NULL,
      status TEXT NOT NULL,
      priority TEXT NOT NULL,
      created_at_us INTEGER NOT NULL,
      updated_at_us INTEGER NOT NULL,
      reporter_id INTEGER NOT NULL,
      resolver_id INTEGER
    );
    CREATE INDEX IF NOT EXISTS idx_incidents_created_at ON incidents(created_at_us);
    CREATE INDEX IF NOT EXISTS idx_incidents_reporter ON incidents(reporter_id);
    CREATE INDEX IF NOT EXISTS idx_incidents_resolver_category ON incidents(resolver_id, category);
"#;

pub fn open(path: &Path) -> Result<Connection, AppError> {
    Connection::open(path).map_err(|e| {
        AppError::new(DB_OPEN_FAILED, "Failed to open SQLite database")
            .with_details(format!("path={}; {e}", path.display()))
    })
}

pub fn open_in_memory() -> Result<Connection, AppError> {
    Connection::open_in_memory().map_err(|e| {
        AppError::new(DB_OPEN_FAILED, "Failed to open in-memory SQLite database")
            .with_details(e.to_string())
    })
}

/// Unicode-aware lowercase used by free-text search; SQLite's built-in `lower()` folds ASCII only.
pub const LOWER_FUNCTION: &str = "itd_lower";

pub fn register_functions(conn: &Connection) -> Result<(), AppError> {
    conn.create_scalar_function(
        LOWER_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|text| text.to_lowercase())),
    )
    .map_err(|e| {
        AppError::new(DB_OPEN_FAILED, "Failed to register SQL functions")
            .with_details(format!("function={LOWER_FUNCTION}; {e}"))
    })
}

pub fn ensure_schema(conn: &mut Connection) -> Result<(), AppError> {
    let tx = conn.transaction().map_err(|e| {
        AppError::new(DB_SCHEMA_FAILED, "Failed to start schema transaction")
            .with_details(e.to_string())
    })?;

    tx.execute_batch(SCHEMA_SQL).map_err(|e| {
        AppError::new(DB_SCHEMA_FAILED, "Failed to create incidents schema")
            .with_details(e.to_string())
    })?;

    tx.commit().map_err(|e| {
        AppError::new(DB_SCHEMA_FAILED, "Failed to commit schema transaction")
            .with_details(e.to_string())
    })?;
    tracing::debug!("incidents schema ready");
    Ok(())
}
