use crate::app_error::AppResult;
use crate::remote::RemoteApi;
use crate::store;
use crate::sync::CancelToken;
use rusqlite::Connection;
use tracing::debug;

/// A mutation response carrying a usn more than one ahead of the last pulled
/// watermark means other writes landed on the server that this client has not
/// seen yet.
fn response_is_behind(response_usn: i64, last_max_usn: i64) -> bool {
    response_usn > last_max_usn + 1
}

/// Uploads every dirty book. Runs before any note upload so that a freshly
/// created book's permanent uuid exists before notes referring to it go up.
pub fn send_books(
    conn: &Connection,
    remote: &dyn RemoteApi,
    last_max_usn: i64,
    cancel: &CancelToken,
) -> AppResult<bool> {
    let mut is_behind = false;

    for book in store::list_dirty_books(conn)? {
        cancel.check()?;
        match (book.usn, book.deleted) {
            (0, true) => {
                // Tombstone for a book the server never saw.
                debug!(book_uuid = %book.uuid, "purging local-only book tombstone");
                store::delete_book_row(conn, &book.uuid)?;
            }
            (0, false) => {
                let resp = remote.create_book(&book.label)?;
                is_behind |= response_is_behind(resp.usn, last_max_usn);
                store::rewrite_book_uuid(conn, &book.uuid, &resp.uuid)?;
                let mut sent = book;
                sent.uuid = resp.uuid;
                sent.usn = resp.usn;
                sent.dirty = false;
                store::update_book(conn, &sent)?;
            }
            (_, true) => {
                let resp = remote.delete_book(&book.uuid)?;
                is_behind |= response_is_behind(resp.usn, last_max_usn);
                store::delete_book_row(conn, &book.uuid)?;
            }
            (_, false) => {
                let resp = remote.update_book(&book.uuid, &book.label)?;
                is_behind |= response_is_behind(resp.usn, last_max_usn);
                let mut sent = book;
                sent.usn = resp.usn;
                sent.dirty = false;
                store::update_book(conn, &sent)?;
            }
        }
    }

    Ok(is_behind)
}

pub fn send_notes(
    conn: &Connection,
    remote: &dyn RemoteApi,
    last_max_usn: i64,
    cancel: &CancelToken,
) -> AppResult<bool> {
    let mut is_behind = false;

    for note in store::list_dirty_notes(conn)? {
        cancel.check()?;
        match (note.usn, note.deleted) {
            (0, true) => {
                debug!(note_uuid = %note.uuid, "purging local-only note tombstone");
                store::delete_note_row(conn, &note.uuid)?;
            }
            (0, false) => {
                let resp =
                    remote.create_note(&note.book_uuid, &note.body, note.added_on, note.public)?;
                is_behind |= response_is_behind(resp.usn, last_max_usn);
                store::delete_note_row(conn, &note.uuid)?;
                let mut sent = note;
                sent.uuid = resp.uuid;
                sent.usn = resp.usn;
                sent.dirty = false;
                store::insert_note(conn, &sent)?;
            }
            (_, true) => {
                let resp = remote.delete_note(&note.uuid)?;
                is_behind |= response_is_behind(resp.usn, last_max_usn);
                store::delete_note_row(conn, &note.uuid)?;
            }
            (_, false) => {
                let resp = remote.update_note(
                    &note.uuid,
                    &note.book_uuid,
                    &note.body,
                    note.public,
                    note.edited_on,
                )?;
                is_behind |= response_is_behind(resp.usn, last_max_usn);
                let mut sent = note;
                sent.usn = resp.usn;
                sent.dirty = false;
                store::update_note(conn, &sent)?;
            }
        }
    }

    Ok(is_behind)
}
