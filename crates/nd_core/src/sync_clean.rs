use crate::app_error::AppResult;
use crate::remote::{FragBook, FragNote, SyncFragment};
use crate::store;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// The union of every fragment pulled during a full run, keyed by uuid. The
/// janitor consults it to decide which local rows the server no longer knows.
#[derive(Debug, Default)]
pub struct SyncList {
    pub books: HashMap<String, FragBook>,
    pub notes: HashMap<String, FragNote>,
    pub expunged_books: HashSet<String>,
    pub expunged_notes: HashSet<String>,
    pub max_usn: i64,
    pub max_current_time: i64,
}

impl SyncList {
    pub fn absorb(&mut self, frag: &SyncFragment) {
        for book in &frag.books {
            self.books.insert(book.uuid.clone(), book.clone());
        }
        for note in &frag.notes {
            self.notes.insert(note.uuid.clone(), note.clone());
        }
        for uuid in &frag.expunged_books {
            self.expunged_books.insert(uuid.clone());
        }
        for uuid in &frag.expunged_notes {
            self.expunged_notes.insert(uuid.clone());
        }
        self.max_usn = self.max_usn.max(frag.frag_max_usn);
        self.max_current_time = self.max_current_time.max(frag.server_current_time);
    }

    pub fn contains_book(&self, uuid: &str) -> bool {
        self.books.contains_key(uuid) || self.expunged_books.contains(uuid)
    }

    pub fn contains_note(&self, uuid: &str) -> bool {
        self.notes.contains_key(uuid) || self.expunged_notes.contains(uuid)
    }
}

/// A row the server does not mention is kept only when it is legitimately
/// local-only: never uploaded, carrying pending changes, and not a tombstone.
fn row_is_local_only(usn: i64, dirty: bool, deleted: bool) -> bool {
    usn == 0 && dirty && !deleted
}

pub fn clean_local_notes(conn: &Connection, list: &SyncList) -> AppResult<()> {
    for note in store::list_all_notes(conn)? {
        if list.contains_note(&note.uuid) {
            continue;
        }
        if row_is_local_only(note.usn, note.dirty, note.deleted) {
            continue;
        }
        debug!(note_uuid = %note.uuid, usn = note.usn, "dropping stale local note");
        store::delete_note_row(conn, &note.uuid)?;
    }
    Ok(())
}

pub fn clean_local_books(conn: &Connection, list: &SyncList) -> AppResult<()> {
    for book in store::list_all_books(conn)? {
        if list.contains_book(&book.uuid) {
            continue;
        }
        if row_is_local_only(book.usn, book.dirty, book.deleted) {
            continue;
        }
        debug!(book_uuid = %book.uuid, usn = book.usn, "dropping stale local book");
        store::delete_book_row(conn, &book.uuid)?;
    }
    Ok(())
}
