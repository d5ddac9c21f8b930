//! Database schema migrations for SQLite stores.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1. Every store file carries
//! its own `schema_migrations` table.

use rusqlite::{Connection, OptionalExtension};

use crate::error::{EngineError, Result};
use crate::now_millis;

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the store schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current = current_version(conn)?;
    if current > CURRENT_VERSION {
        return Err(EngineError::Migration(format!(
            "store schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated store schema");
    }

    Ok(())
}

/// The schema version recorded in the store (0 for a fresh file).
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get::<_, Option<u32>>(0)
        })
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(EngineError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: soup catalog.
///
/// Soup entries live in one `TABLE_<id>` per soup, created on registration.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per registered soup
        CREATE TABLE soup_names (
            id INTEGER PRIMARY KEY AUTOINCREMENT,  -- suffix of the soup's entry table
            soup_name TEXT NOT NULL UNIQUE,
            features BLOB NOT NULL,                -- CBOR array of feature names
            created_at INTEGER NOT NULL
        );

        -- Index specs per soup, in registration order
        CREATE TABLE soup_index_map (
            soup_name TEXT NOT NULL,
            position INTEGER NOT NULL,
            path TEXT NOT NULL,
            column_type TEXT NOT NULL,
            PRIMARY KEY (soup_name, position)
        );
        "#,
    )?;

    Ok(())
}
