//! Database schema initialization.

use rusqlite::Connection;

use crate::error::{DatabaseResultExt, Result};

/// Initializes the database schema using the embedded SQL file.
pub(super) fn initialize_schema(connection: &Connection) -> Result<()> {
    // Enable foreign keys for this connection
    connection
        .execute("PRAGMA foreign_keys = ON", [])
        .db_context("Failed to enable foreign keys")?;

    let schema_sql = include_str!("../../assets/schema.sql");
    connection
        .execute_batch(schema_sql)
        .db_context("Failed to initialize database schema")?;

    Ok(())
}
