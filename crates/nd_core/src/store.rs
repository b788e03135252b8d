use crate::app_error::{AppError, AppResult};
use crate::records::{Book, Note};
use rusqlite::{params, Connection, Row};
use serde_json::Value;

pub const SYSTEM_LAST_SYNC_AT: &str = "last_sync_at";
pub const SYSTEM_LAST_MAX_USN: &str = "last_max_usn";

const BOOK_COLUMNS: &str = "uuid, label, usn, added_on, dirty, deleted";
const NOTE_COLUMNS: &str = "uuid, book_uuid, usn, added_on, edited_on, body, public, dirty, deleted";

fn store_error(message: &str, details: Value) -> AppError {
    AppError::new("ND_STORE_FAILED", "store", message, details)
}

fn book_from_row(row: &Row) -> rusqlite::Result<Book> {
    Ok(Book {
        uuid: row.get(0)?,
        label: row.get(1)?,
        usn: row.get(2)?,
        added_on: row.get(3)?,
        dirty: row.get(4)?,
        deleted: row.get(5)?,
    })
}

fn note_from_row(row: &Row) -> rusqlite::Result<Note> {
    Ok(Note {
        uuid: row.get(0)?,
        book_uuid: row.get(1)?,
        usn: row.get(2)?,
        added_on: row.get(3)?,
        edited_on: row.get(4)?,
        body: row.get(5)?,
        public: row.get(6)?,
        dirty: row.get(7)?,
        deleted: row.get(8)?,
    })
}

pub fn get_system_int(conn: &Connection, key: &str) -> AppResult<Option<i64>> {
    let mut stmt = conn
        .prepare("SELECT value FROM system WHERE key = ?1")
        .map_err(|e| {
            store_error(
                "failed preparing system query",
                serde_json::json!({ "error": e.to_string(), "key": key }),
            )
        })?;
    let mut rows = stmt.query([key]).map_err(|e| {
        store_error(
            "failed querying system row",
            serde_json::json!({ "error": e.to_string(), "key": key }),
        )
    })?;
    let row = rows.next().map_err(|e| {
        store_error(
            "failed iterating system row",
            serde_json::json!({ "error": e.to_string(), "key": key }),
        )
    })?;
    row.map(|r| r.get(0)).transpose().map_err(|e| {
        store_error(
            "failed decoding system row",
            serde_json::json!({ "error": e.to_string(), "key": key }),
        )
    })
}

pub fn set_system_int(conn: &Connection, key: &str, value: i64) -> AppResult<()> {
    conn.execute(
        "INSERT INTO system (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .map_err(|e| {
        store_error(
            "failed writing system row",
            serde_json::json!({ "error": e.to_string(), "key": key }),
        )
    })?;
    Ok(())
}

pub fn get_last_sync_at(conn: &Connection) -> AppResult<i64> {
    Ok(get_system_int(conn, SYSTEM_LAST_SYNC_AT)?.unwrap_or(0))
}

pub fn get_last_max_usn(conn: &Connection) -> AppResult<i64> {
    Ok(get_system_int(conn, SYSTEM_LAST_MAX_USN)?.unwrap_or(0))
}

/// Watermarks never move backwards, even when the server reports a smaller
/// value than what a previous run recorded.
pub fn save_sync_state(conn: &Connection, server_time: i64, server_max_usn: i64) -> AppResult<()> {
    let last_sync_at = get_last_sync_at(conn)?;
    let last_max_usn = get_last_max_usn(conn)?;
    set_system_int(conn, SYSTEM_LAST_SYNC_AT, server_time.max(last_sync_at))?;
    set_system_int(conn, SYSTEM_LAST_MAX_USN, server_max_usn.max(last_max_usn))?;
    Ok(())
}

pub fn get_book(conn: &Connection, uuid: &str) -> AppResult<Option<Book>> {
    let sql = format!("SELECT {} FROM books WHERE uuid = ?1", BOOK_COLUMNS);
    let mut stmt = conn.prepare(&sql).map_err(|e| {
        store_error(
            "failed preparing book query",
            serde_json::json!({ "error": e.to_string(), "uuid": uuid }),
        )
    })?;
    let mut rows = stmt
        .query_map([uuid], book_from_row)
        .map_err(|e| {
            store_error(
                "failed querying book",
                serde_json::json!({ "error": e.to_string(), "uuid": uuid }),
            )
        })?;
    rows.next().transpose().map_err(|e| {
        store_error(
            "failed decoding book row",
            serde_json::json!({ "error": e.to_string(), "uuid": uuid }),
        )
    })
}

pub fn get_note(conn: &Connection, uuid: &str) -> AppResult<Option<Note>> {
    let sql = format!("SELECT {} FROM notes WHERE uuid = ?1", NOTE_COLUMNS);
    let mut stmt = conn.prepare(&sql).map_err(|e| {
        store_error(
            "failed preparing note query",
            serde_json::json!({ "error": e.to_string(), "uuid": uuid }),
        )
    })?;
    let mut rows = stmt
        .query_map([uuid], note_from_row)
        .map_err(|e| {
            store_error(
                "failed querying note",
                serde_json::json!({ "error": e.to_string(), "uuid": uuid }),
            )
        })?;
    rows.next().transpose().map_err(|e| {
        store_error(
            "failed decoding note row",
            serde_json::json!({ "error": e.to_string(), "uuid": uuid }),
        )
    })
}

/// Looks up the non-deleted book carrying a label. Label uniqueness among
/// non-deleted books makes the result unambiguous.
pub fn get_book_by_label(conn: &Connection, label: &str) -> AppResult<Option<Book>> {
    let sql = format!(
        "SELECT {} FROM books WHERE label = ?1 AND deleted = 0",
        BOOK_COLUMNS
    );
    let mut stmt = conn.prepare(&sql).map_err(|e| {
        store_error(
            "failed preparing book label query",
            serde_json::json!({ "error": e.to_string(), "label": label }),
        )
    })?;
    let mut rows = stmt
        .query_map([label], book_from_row)
        .map_err(|e| {
            store_error(
                "failed querying book by label",
                serde_json::json!({ "error": e.to_string(), "label": label }),
            )
        })?;
    rows.next().transpose().map_err(|e| {
        store_error(
            "failed decoding book row",
            serde_json::json!({ "error": e.to_string(), "label": label }),
        )
    })
}

pub fn insert_book(conn: &Connection, book: &Book) -> AppResult<()> {
    conn.execute(
        "INSERT INTO books (uuid, label, usn, added_on, dirty, deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            book.uuid,
            book.label,
            book.usn,
            book.added_on,
            book.dirty,
            book.deleted
        ],
    )
    .map_err(|e| {
        store_error(
            "failed inserting book",
            serde_json::json!({ "error": e.to_string(), "uuid": book.uuid }),
        )
    })?;
    Ok(())
}

pub fn update_book(conn: &Connection, book: &Book) -> AppResult<()> {
    conn.execute(
        "UPDATE books SET label = ?2, usn = ?3, added_on = ?4, dirty = ?5, deleted = ?6
         WHERE uuid = ?1",
        params![
            book.uuid,
            book.label,
            book.usn,
            book.added_on,
            book.dirty,
            book.deleted
        ],
    )
    .map_err(|e| {
        store_error(
            "failed updating book",
            serde_json::json!({ "error": e.to_string(), "uuid": book.uuid }),
        )
    })?;
    Ok(())
}

pub fn insert_note(conn: &Connection, note: &Note) -> AppResult<()> {
    conn.execute(
        "INSERT INTO notes (uuid, book_uuid, usn, added_on, edited_on, body, public, dirty, deleted)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            note.uuid,
            note.book_uuid,
            note.usn,
            note.added_on,
            note.edited_on,
            note.body,
            note.public,
            note.dirty,
            note.deleted
        ],
    )
    .map_err(|e| {
        store_error(
            "failed inserting note",
            serde_json::json!({ "error": e.to_string(), "uuid": note.uuid }),
        )
    })?;
    Ok(())
}

pub fn update_note(conn: &Connection, note: &Note) -> AppResult<()> {
    conn.execute(
        "UPDATE notes SET book_uuid = ?2, usn = ?3, added_on = ?4, edited_on = ?5,
           body = ?6, public = ?7, dirty = ?8, deleted = ?9
         WHERE uuid = ?1",
        params![
            note.uuid,
            note.book_uuid,
            note.usn,
            note.added_on,
            note.edited_on,
            note.body,
            note.public,
            note.dirty,
            note.deleted
        ],
    )
    .map_err(|e| {
        store_error(
            "failed updating note",
            serde_json::json!({ "error": e.to_string(), "uuid": note.uuid }),
        )
    })?;
    Ok(())
}

pub fn delete_book_row(conn: &Connection, uuid: &str) -> AppResult<()> {
    conn.execute("DELETE FROM books WHERE uuid = ?1", [uuid])
        .map_err(|e| {
            store_error(
                "failed deleting book row",
                serde_json::json!({ "error": e.to_string(), "uuid": uuid }),
            )
        })?;
    Ok(())
}

pub fn delete_note_row(conn: &Connection, uuid: &str) -> AppResult<()> {
    conn.execute("DELETE FROM notes WHERE uuid = ?1", [uuid])
        .map_err(|e| {
            store_error(
                "failed deleting note row",
                serde_json::json!({ "error": e.to_string(), "uuid": uuid }),
            )
        })?;
    Ok(())
}

fn collect_books(conn: &Connection, sql: &str) -> AppResult<Vec<Book>> {
    let mut stmt = conn.prepare(sql).map_err(|e| {
        store_error(
            "failed preparing book list query",
            serde_json::json!({ "error": e.to_string() }),
        )
    })?;
    let rows = stmt.query_map([], book_from_row).map_err(|e| {
        store_error(
            "failed querying book list",
            serde_json::json!({ "error": e.to_string() }),
        )
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|e| {
        store_error(
            "failed decoding book list",
            serde_json::json!({ "error": e.to_string() }),
        )
    })
}

fn collect_notes(conn: &Connection, sql: &str, args: &[&dyn rusqlite::ToSql]) -> AppResult<Vec<Note>> {
    let mut stmt = conn.prepare(sql).map_err(|e| {
        store_error(
            "failed preparing note list query",
            serde_json::json!({ "error": e.to_string() }),
        )
    })?;
    let rows = stmt.query_map(args, note_from_row).map_err(|e| {
        store_error(
            "failed querying note list",
            serde_json::json!({ "error": e.to_string() }),
        )
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|e| {
        store_error(
            "failed decoding note list",
            serde_json::json!({ "error": e.to_string() }),
        )
    })
}

pub fn list_dirty_books(conn: &Connection) -> AppResult<Vec<Book>> {
    collect_books(
        conn,
        &format!(
            "SELECT {} FROM books WHERE dirty = 1 ORDER BY rowid",
            BOOK_COLUMNS
        ),
    )
}

pub fn list_dirty_notes(conn: &Connection) -> AppResult<Vec<Note>> {
    collect_notes(
        conn,
        &format!(
            "SELECT {} FROM notes WHERE dirty = 1 ORDER BY rowid",
            NOTE_COLUMNS
        ),
        &[],
    )
}

pub fn list_all_books(conn: &Connection) -> AppResult<Vec<Book>> {
    collect_books(
        conn,
        &format!("SELECT {} FROM books ORDER BY rowid", BOOK_COLUMNS),
    )
}

pub fn list_all_notes(conn: &Connection) -> AppResult<Vec<Note>> {
    collect_notes(
        conn,
        &format!("SELECT {} FROM notes ORDER BY rowid", NOTE_COLUMNS),
        &[],
    )
}

/// Non-deleted books ordered by label, for display.
pub fn list_books(conn: &Connection) -> AppResult<Vec<Book>> {
    collect_books(
        conn,
        &format!(
            "SELECT {} FROM books WHERE deleted = 0 ORDER BY label",
            BOOK_COLUMNS
        ),
    )
}

/// Non-deleted notes of a book, oldest first, for display.
pub fn list_book_notes(conn: &Connection, book_uuid: &str) -> AppResult<Vec<Note>> {
    collect_notes(
        conn,
        &format!(
            "SELECT {} FROM notes WHERE book_uuid = ?1 AND deleted = 0 ORDER BY added_on, rowid",
            NOTE_COLUMNS
        ),
        &[&book_uuid],
    )
}

/// Every note row of a book, tombstones included.
pub fn list_notes_in_book(conn: &Connection, book_uuid: &str) -> AppResult<Vec<Note>> {
    collect_notes(
        conn,
        &format!(
            "SELECT {} FROM notes WHERE book_uuid = ?1 ORDER BY rowid",
            NOTE_COLUMNS
        ),
        &[&book_uuid],
    )
}

pub fn has_dirty_notes_in_book(conn: &Connection, book_uuid: &str) -> AppResult<bool> {
    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM notes WHERE book_uuid = ?1 AND dirty = 1",
            [book_uuid],
            |row| row.get(0),
        )
        .map_err(|e| {
            store_error(
                "failed counting dirty notes in book",
                serde_json::json!({ "error": e.to_string(), "book_uuid": book_uuid }),
            )
        })?;
    Ok(count > 0)
}

pub fn delete_clean_notes_in_book(conn: &Connection, book_uuid: &str) -> AppResult<()> {
    conn.execute(
        "DELETE FROM notes WHERE book_uuid = ?1 AND dirty = 0",
        [book_uuid],
    )
    .map_err(|e| {
        store_error(
            "failed deleting clean notes in book",
            serde_json::json!({ "error": e.to_string(), "book_uuid": book_uuid }),
        )
    })?;
    Ok(())
}

/// Replaces a book's placeholder uuid with the server-assigned one and
/// rewrites the foreign reference on every child note in the same step.
pub fn rewrite_book_uuid(conn: &Connection, old_uuid: &str, new_uuid: &str) -> AppResult<()> {
    conn.execute(
        "UPDATE books SET uuid = ?2 WHERE uuid = ?1",
        params![old_uuid, new_uuid],
    )
    .map_err(|e| {
        store_error(
            "failed rewriting book uuid",
            serde_json::json!({ "error": e.to_string(), "old": old_uuid, "new": new_uuid }),
        )
    })?;
    conn.execute(
        "UPDATE notes SET book_uuid = ?2 WHERE book_uuid = ?1",
        params![old_uuid, new_uuid],
    )
    .map_err(|e| {
        store_error(
            "failed rewriting note book references",
            serde_json::json!({ "error": e.to_string(), "old": old_uuid, "new": new_uuid }),
        )
    })?;
    Ok(())
}
