use crate::app_error::{AppError, AppResult};
use crate::records::{Book, Note};
use crate::remote::{FragBook, FragNote};
use crate::store;
use rusqlite::Connection;
use tracing::debug;

/// Finds the smallest unused `" (n)"` suffix (n >= 2) for a label among
/// non-deleted books.
pub fn resolve_label(conn: &Connection, base: &str) -> AppResult<String> {
    let mut n: i64 = 2;
    loop {
        let candidate = format!("{} ({})", base, n);
        if store::get_book_by_label(conn, &candidate)?.is_none() {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// The incoming row is authoritative on the bare label; a pre-existing local
/// holder is renamed to the next free suffix and marked dirty so the rename
/// reaches the server on the next send.
fn displace_label_holder(conn: &Connection, label: &str, incoming_uuid: &str) -> AppResult<()> {
    let Some(mut holder) = store::get_book_by_label(conn, label)? else {
        return Ok(());
    };
    if holder.uuid == incoming_uuid {
        return Ok(());
    }
    let renamed = resolve_label(conn, label)?;
    debug!(
        book_uuid = %holder.uuid,
        from = %holder.label,
        to = %renamed,
        "displacing local label holder"
    );
    holder.label = renamed;
    holder.dirty = true;
    store::update_book(conn, &holder)
}

/// Applies a pulled book fragment to the local store. Books use the same
/// decision table in step and full runs.
pub fn merge_book_fragment(conn: &Connection, frag: &FragBook) -> AppResult<()> {
    let Some(local) = store::get_book(conn, &frag.uuid)? else {
        if !frag.deleted {
            displace_label_holder(conn, &frag.label, &frag.uuid)?;
        }
        return store::insert_book(
            conn,
            &Book {
                uuid: frag.uuid.clone(),
                label: frag.label.clone(),
                usn: frag.usn,
                added_on: frag.added_on,
                dirty: false,
                deleted: frag.deleted,
            },
        );
    };

    if !local.dirty {
        if frag.usn < local.usn {
            return Ok(());
        }
        if frag.label != local.label && !frag.deleted {
            displace_label_holder(conn, &frag.label, &frag.uuid)?;
        }
        return store::update_book(
            conn,
            &Book {
                uuid: local.uuid,
                label: frag.label.clone(),
                usn: frag.usn,
                added_on: local.added_on,
                dirty: false,
                deleted: frag.deleted,
            },
        );
    }

    if frag.usn > local.usn {
        // Server wins the label; the dirty flag survives so local non-label
        // edits are still sent up.
        if frag.label != local.label && !frag.deleted {
            displace_label_holder(conn, &frag.label, &frag.uuid)?;
        }
        return store::update_book(
            conn,
            &Book {
                uuid: local.uuid,
                label: frag.label.clone(),
                usn: frag.usn,
                added_on: local.added_on,
                dirty: true,
                deleted: frag.deleted,
            },
        );
    }

    // Equal or lower fragment usn: the client is ahead on this row.
    Ok(())
}

fn insert_note_fragment(conn: &Connection, frag: &FragNote) -> AppResult<()> {
    if store::get_book(conn, &frag.book_uuid)?.is_none() {
        return Err(AppError::new(
            "ND_MISSING_BOOK",
            "sync",
            "pulled note references a book that does not exist locally",
            serde_json::json!({ "note_uuid": frag.uuid, "book_uuid": frag.book_uuid }),
        ));
    }
    store::insert_note(
        conn,
        &Note {
            uuid: frag.uuid.clone(),
            book_uuid: frag.book_uuid.clone(),
            usn: frag.usn,
            added_on: frag.added_on,
            edited_on: frag.edited_on,
            body: frag.body.clone(),
            public: frag.public,
            dirty: false,
            deleted: frag.deleted,
        },
    )
}

fn overwrite_note_fragment(
    conn: &Connection,
    local: &Note,
    frag: &FragNote,
    dirty: bool,
) -> AppResult<()> {
    store::update_note(
        conn,
        &Note {
            uuid: local.uuid.clone(),
            book_uuid: frag.book_uuid.clone(),
            usn: frag.usn,
            added_on: local.added_on,
            edited_on: frag.edited_on,
            body: frag.body.clone(),
            public: frag.public,
            dirty,
            deleted: frag.deleted,
        },
    )
}

fn merge_note_fragment(
    conn: &Connection,
    frag: &FragNote,
    preserve_dirty_delete: bool,
) -> AppResult<()> {
    let Some(local) = store::get_note(conn, &frag.uuid)? else {
        return insert_note_fragment(conn, frag);
    };

    if !local.dirty {
        if frag.usn < local.usn {
            return Ok(());
        }
        // Overwrite everything; this also resurrects a clean tombstone.
        return overwrite_note_fragment(conn, &local, frag, false);
    }

    if frag.usn <= local.usn {
        // Equal usn with pending local changes: the local copy wins and will
        // be uploaded as-is on the next send.
        return Ok(());
    }

    if local.deleted {
        // Delete-local vs edit-server. A step run resurrects the note clean;
        // a full run is a reanchor, so the dirty flag survives for the next
        // step run to resolve.
        debug!(note_uuid = %local.uuid, "server edit overrides pending local deletion");
        return overwrite_note_fragment(conn, &local, frag, preserve_dirty_delete);
    }

    // Edit-local vs edit-server: the higher-usn server copy wins the content
    // while the dirty flag survives so local edits are still sent up.
    overwrite_note_fragment(conn, &local, frag, true)
}

/// Applies a pulled note fragment during an incremental run.
pub fn step_merge_note(conn: &Connection, frag: &FragNote) -> AppResult<()> {
    merge_note_fragment(conn, frag, false)
}

/// Applies a pulled note fragment during a full run.
pub fn full_merge_note(conn: &Connection, frag: &FragNote) -> AppResult<()> {
    merge_note_fragment(conn, frag, true)
}

/// Removes a note the server has expunged. A dirty local copy is kept; the
/// next send cycle re-establishes it on the server.
pub fn expunge_note(conn: &Connection, uuid: &str) -> AppResult<()> {
    let Some(local) = store::get_note(conn, uuid)? else {
        return Ok(());
    };
    if local.dirty {
        debug!(note_uuid = %uuid, "keeping dirty note despite server expunge");
        return Ok(());
    }
    store::delete_note_row(conn, uuid)
}

/// Removes a book the server has expunged, cascading into its clean notes.
/// Any dirty content defers the deletion: the book row is retained and marked
/// dirty so the next send cycle re-establishes it.
pub fn expunge_book(conn: &Connection, uuid: &str) -> AppResult<()> {
    let Some(local) = store::get_book(conn, uuid)? else {
        return Ok(());
    };
    if local.dirty {
        debug!(book_uuid = %uuid, "keeping dirty book despite server expunge");
        return Ok(());
    }

    let deferred = store::has_dirty_notes_in_book(conn, uuid)?;
    store::delete_clean_notes_in_book(conn, uuid)?;

    if deferred {
        debug!(book_uuid = %uuid, "deferring book expunge; a child note is dirty");
        let mut kept = local;
        kept.dirty = true;
        return store::update_book(conn, &kept);
    }
    store::delete_book_row(conn, uuid)
}
