use crate::app_error::{AppError, AppResult};
use rusqlite::Connection;
use std::fs;
use std::path::Path;

const LATEST_SCHEMA_VERSION: i64 = 1;

pub fn open_db(db_path: &Path) -> AppResult<Connection> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::new(
                "ND_DB_OPEN_FAILED",
                "db",
                "failed to create database parent directory",
                serde_json::json!({ "error": e.to_string(), "path": parent }),
            )
        })?;
    }

    let conn = Connection::open(db_path).map_err(|e| {
        AppError::new(
            "ND_DB_OPEN_FAILED",
            "db",
            "failed to open sqlite database",
            serde_json::json!({ "error": e.to_string(), "path": db_path }),
        )
    })?;

    conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
        AppError::new(
            "ND_DB_OPEN_FAILED",
            "db",
            "failed to enable foreign_keys pragma",
            serde_json::json!({ "error": e.to_string() }),
        )
    })?;

    apply_migrations(&conn)?;
    Ok(conn)
}

pub fn apply_migrations(conn: &Connection) -> AppResult<()> {
    let current = schema_version(conn)?;
    if current > LATEST_SCHEMA_VERSION {
        return Err(AppError::new(
            "ND_DB_SCHEMA_INCOMPATIBLE",
            "db",
            "database schema version is newer than supported",
            serde_json::json!({ "current": current, "latest": LATEST_SCHEMA_VERSION }),
        ));
    }

    if current < 1 {
        let tx = conn.unchecked_transaction().map_err(|e| {
            AppError::new(
                "ND_DB_MIGRATION_FAILED",
                "db",
                "failed to begin migration transaction",
                serde_json::json!({ "error": e.to_string() }),
            )
        })?;

        tx.execute_batch(include_str!("../migrations/0001_init.sql"))
            .map_err(|e| {
                AppError::new(
                    "ND_DB_MIGRATION_FAILED",
                    "db",
                    "failed to apply migration 0001",
                    serde_json::json!({ "error": e.to_string() }),
                )
            })?;

        tx.pragma_update(None, "user_version", 1i64).map_err(|e| {
            AppError::new(
                "ND_DB_MIGRATION_FAILED",
                "db",
                "failed to set schema user_version",
                serde_json::json!({ "error": e.to_string() }),
            )
        })?;

        tx.commit().map_err(|e| {
            AppError::new(
                "ND_DB_MIGRATION_FAILED",
                "db",
                "failed to commit migration transaction",
                serde_json::json!({ "error": e.to_string() }),
            )
        })?;
    }

    Ok(())
}

pub fn schema_version(conn: &Connection) -> AppResult<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| {
            AppError::new(
                "ND_DB_SCHEMA_INCOMPATIBLE",
                "db",
                "failed to read schema version",
                serde_json::json!({ "error": e.to_string() }),
            )
        })
}
