use crate::app_error::{AppError, AppResult};
use crate::records::{Book, Note};
use crate::store;
use rusqlite::Connection;
use serde_json::Value;
use tracing::debug;

fn notes_error(code: &str, message: &str, details: Value) -> AppError {
    AppError::new(code, "notes", message, details)
}

/// Returns the non-deleted book carrying `label`, creating a local-only one
/// (placeholder uuid, usn 0, dirty) when none exists yet.
pub fn find_or_create_book(conn: &Connection, label: &str, now: i64) -> AppResult<Book> {
    if label.trim().is_empty() {
        return Err(notes_error(
            "ND_INVALID_LABEL",
            "book label must not be empty",
            serde_json::json!({ "label": label }),
        ));
    }
    if let Some(book) = store::get_book_by_label(conn, label)? {
        return Ok(book);
    }
    let book = Book::new_local(label, now);
    debug!(book_uuid = %book.uuid, label = %label, "creating local book");
    store::insert_book(conn, &book)?;
    Ok(book)
}

pub fn add_note(conn: &Connection, book_label: &str, body: &str, now: i64) -> AppResult<Note> {
    let book = find_or_create_book(conn, book_label, now)?;
    let note = Note::new_local(&book.uuid, body, false, now);
    store::insert_note(conn, &note)?;
    Ok(note)
}

pub fn edit_note(conn: &Connection, uuid: &str, body: &str, now: i64) -> AppResult<Note> {
    let Some(mut note) = store::get_note(conn, uuid)?.filter(|n| !n.deleted) else {
        return Err(notes_error(
            "ND_NOT_FOUND",
            "note not found",
            serde_json::json!({ "uuid": uuid }),
        ));
    };
    note.body = body.to_string();
    note.edited_on = now;
    note.dirty = true;
    store::update_note(conn, &note)?;
    Ok(note)
}

/// Tombstones a note. The row survives with an empty body until the server
/// acknowledges the deletion on the next send.
pub fn remove_note(conn: &Connection, uuid: &str) -> AppResult<()> {
    let Some(mut note) = store::get_note(conn, uuid)?.filter(|n| !n.deleted) else {
        return Err(notes_error(
            "ND_NOT_FOUND",
            "note not found",
            serde_json::json!({ "uuid": uuid }),
        ));
    };
    note.body = String::new();
    note.deleted = true;
    note.dirty = true;
    store::update_note(conn, &note)
}

/// Tombstones a book and every live note in it.
pub fn remove_book(conn: &Connection, label: &str) -> AppResult<()> {
    let Some(mut book) = store::get_book_by_label(conn, label)? else {
        return Err(notes_error(
            "ND_NOT_FOUND",
            "book not found",
            serde_json::json!({ "label": label }),
        ));
    };
    for note in store::list_notes_in_book(conn, &book.uuid)? {
        if note.deleted {
            continue;
        }
        let mut tombstone = note;
        tombstone.body = String::new();
        tombstone.deleted = true;
        tombstone.dirty = true;
        store::update_note(conn, &tombstone)?;
    }
    book.deleted = true;
    book.dirty = true;
    store::update_book(conn, &book)
}
