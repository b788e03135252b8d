use crate::app_error::{AppError, AppResult};
use crate::remote::{RemoteApi, SyncFragment};
use crate::store;
use crate::sync_clean::{clean_local_books, clean_local_notes, SyncList};
use crate::sync_merge;
use crate::sync_send;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Step,
    Full,
}

/// External cancellation signal. Checked between per-entity operations and
/// between the send and pull phases; a cancelled run rolls back and leaves
/// every dirty flag intact.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> AppResult<()> {
        if self.is_cancelled() {
            return Err(AppError::new(
                "ND_SYNC_CANCELLED",
                "sync",
                "sync run was cancelled",
                serde_json::json!({}),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncOutcome {
    pub mode: SyncMode,
    pub is_behind: bool,
    pub fragments_pulled: usize,
    pub last_max_usn: i64,
    pub last_sync_at: i64,
}

fn sync_error(message: &str, details: serde_json::Value) -> AppError {
    AppError::new("ND_STORE_FAILED", "sync", message, details)
}

static ACTIVE_SYNCS: OnceLock<Mutex<HashSet<PathBuf>>> = OnceLock::new();

fn active_syncs() -> &'static Mutex<HashSet<PathBuf>> {
    ACTIVE_SYNCS.get_or_init(|| Mutex::new(HashSet::new()))
}

fn main_db_path(conn: &Connection) -> AppResult<PathBuf> {
    let path: String = conn
        .query_row(
            "SELECT file FROM pragma_database_list WHERE name='main'",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            sync_error(
                "failed resolving main database path",
                serde_json::json!({ "error": e.to_string() }),
            )
        })?;
    Ok(PathBuf::from(path))
}

/// Holds the per-store sync slot for the duration of a run. Only one run may
/// be active per local store; a second concurrent request fails fast.
struct SyncSession {
    key: PathBuf,
}

impl SyncSession {
    fn acquire(conn: &Connection) -> AppResult<Self> {
        let key = main_db_path(conn)?;
        let mut active = active_syncs().lock().map_err(|_| {
            AppError::internal("failed acquiring the sync session registry lock")
        })?;
        if !active.insert(key.clone()) {
            return Err(AppError::new(
                "ND_SYNC_IN_PROGRESS",
                "sync",
                "another sync run is already active for this store",
                serde_json::json!({ "store": key }),
            ));
        }
        Ok(Self { key })
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        if let Ok(mut active) = active_syncs().lock() {
            active.remove(&self.key);
        }
    }
}

/// Runs one sync cycle: local changes go up, server changes come down, then
/// the watermarks commit. A stale-usn rejection from the server restarts the
/// run once in full mode.
pub fn sync(
    conn: &Connection,
    remote: &dyn RemoteApi,
    mode: SyncMode,
    cancel: &CancelToken,
) -> AppResult<SyncOutcome> {
    let _session = SyncSession::acquire(conn)?;
    match run_sync(conn, remote, mode, cancel) {
        Err(err) if err.code == "ND_USN_CONFLICT" && mode == SyncMode::Step => {
            info!("server reported a stale usn; rerunning as a full sync");
            run_sync(conn, remote, SyncMode::Full, cancel)
        }
        other => other,
    }
}

fn run_sync(
    conn: &Connection,
    remote: &dyn RemoteApi,
    requested: SyncMode,
    cancel: &CancelToken,
) -> AppResult<SyncOutcome> {
    let tx = conn.unchecked_transaction().map_err(|e| {
        sync_error(
            "failed to begin sync transaction",
            serde_json::json!({ "error": e.to_string() }),
        )
    })?;

    let last_max_usn = store::get_last_max_usn(&tx)?;
    let mode = if last_max_usn == 0 {
        SyncMode::Full
    } else {
        requested
    };
    info!(?mode, last_max_usn, "starting sync run");

    let behind_books = sync_send::send_books(&tx, remote, last_max_usn, cancel)?;
    let behind_notes = sync_send::send_notes(&tx, remote, last_max_usn, cancel)?;
    let is_behind = behind_books || behind_notes;
    if is_behind {
        debug!("server usn clock is ahead of the last pulled watermark");
    }
    cancel.check()?;

    let mut after_usn = match mode {
        SyncMode::Step => last_max_usn,
        SyncMode::Full => 0,
    };
    let mut list = SyncList::default();
    let mut fragments_pulled = 0;
    let (mut server_time, mut server_max_usn) = (0, 0);

    loop {
        let frag = remote.get_sync_fragment(after_usn)?;
        fragments_pulled += 1;
        merge_fragment(&tx, &frag, mode, cancel)?;
        if mode == SyncMode::Full {
            list.absorb(&frag);
        }
        server_time = frag.server_current_time;
        server_max_usn = frag.server_max_usn;
        if frag.frag_max_usn >= frag.server_max_usn {
            break;
        }
        // A fragment that does not extend past the requested watermark cannot
        // be spliced onto the local state; a step run is rerun as full.
        if frag.frag_max_usn <= after_usn {
            return Err(AppError::new(
                "ND_USN_CONFLICT",
                "sync",
                "server fragment range cannot be spliced onto the local watermark",
                serde_json::json!({
                    "after_usn": after_usn,
                    "frag_max_usn": frag.frag_max_usn,
                    "server_max_usn": frag.server_max_usn
                }),
            ));
        }
        after_usn = frag.frag_max_usn;
    }

    if mode == SyncMode::Full {
        cancel.check()?;
        clean_local_notes(&tx, &list)?;
        clean_local_books(&tx, &list)?;
    }

    store::save_sync_state(&tx, server_time, server_max_usn)?;
    let last_max_usn = store::get_last_max_usn(&tx)?;
    let last_sync_at = store::get_last_sync_at(&tx)?;

    tx.commit().map_err(|e| {
        sync_error(
            "failed to commit sync transaction",
            serde_json::json!({ "error": e.to_string() }),
        )
    })?;

    info!(fragments_pulled, last_max_usn, "sync run committed");
    Ok(SyncOutcome {
        mode,
        is_behind,
        fragments_pulled,
        last_max_usn,
        last_sync_at,
    })
}

fn merge_fragment(
    conn: &Connection,
    frag: &SyncFragment,
    mode: SyncMode,
    cancel: &CancelToken,
) -> AppResult<()> {
    for book in &frag.books {
        cancel.check()?;
        sync_merge::merge_book_fragment(conn, book)?;
    }
    for note in &frag.notes {
        cancel.check()?;
        match mode {
            SyncMode::Step => sync_merge::step_merge_note(conn, note)?,
            SyncMode::Full => sync_merge::full_merge_note(conn, note)?,
        }
    }
    for uuid in &frag.expunged_books {
        cancel.check()?;
        sync_merge::expunge_book(conn, uuid)?;
    }
    for uuid in &frag.expunged_notes {
        cancel.check()?;
        sync_merge::expunge_note(conn, uuid)?;
    }
    Ok(())
}
