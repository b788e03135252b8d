#![allow(dead_code)]

use nd_core::app_error::{AppError, AppResult};
use nd_core::records::{Book, Note};
use nd_core::remote::{FragBook, FragNote, RemoteApi, RemoteBook, RemoteNote, SyncFragment};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub fn open_test_db() -> rusqlite::Connection {
    let root = tempfile::tempdir().expect("tempdir").keep();
    nd_core::db::open_db(&root.join("notedown.sqlite")).expect("open db")
}

pub fn book_row(uuid: &str, label: &str, usn: i64, dirty: bool, deleted: bool) -> Book {
    Book {
        uuid: uuid.to_string(),
        label: label.to_string(),
        usn,
        added_on: 1541108743,
        dirty,
        deleted,
    }
}

pub fn note_row(
    uuid: &str,
    book_uuid: &str,
    usn: i64,
    body: &str,
    dirty: bool,
    deleted: bool,
) -> Note {
    Note {
        uuid: uuid.to_string(),
        book_uuid: book_uuid.to_string(),
        usn,
        added_on: 1541232118,
        edited_on: 0,
        body: body.to_string(),
        public: false,
        dirty,
        deleted,
    }
}

pub fn frag_book(uuid: &str, label: &str, usn: i64) -> FragBook {
    FragBook {
        uuid: uuid.to_string(),
        label: label.to_string(),
        usn,
        added_on: 1541108743,
        deleted: false,
    }
}

pub fn frag_note(uuid: &str, book_uuid: &str, usn: i64, body: &str, edited_on: i64) -> FragNote {
    FragNote {
        uuid: uuid.to_string(),
        book_uuid: book_uuid.to_string(),
        usn,
        added_on: 1541232118,
        edited_on,
        body: body.to_string(),
        public: false,
        deleted: false,
    }
}

#[derive(Default)]
struct MockState {
    response_usn: i64,
    fragments: VecDeque<SyncFragment>,
    fail_once: HashMap<String, AppError>,
    created_books: Vec<String>,
    updated_books: Vec<String>,
    deleted_books: Vec<String>,
    created_notes: Vec<String>,
    updated_notes: Vec<String>,
    deleted_notes: Vec<String>,
    fragment_calls: Vec<i64>,
}

type FragmentHook = Box<dyn Fn(i64) + Send>;

/// Scripted stand-in for the notes server. Records every mutation it is
/// asked for and serves queued fragments; an exhausted queue answers with an
/// empty fragment that reports no further server changes.
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<MockState>,
    fragment_hook: Mutex<Option<FragmentHook>>,
}

impl MockRemote {
    pub fn new() -> Self {
        let remote = Self::default();
        remote.state.lock().unwrap().response_usn = 1;
        remote
    }

    pub fn set_response_usn(&self, usn: i64) {
        self.state.lock().unwrap().response_usn = usn;
    }

    pub fn push_fragment(&self, frag: SyncFragment) {
        self.state.lock().unwrap().fragments.push_back(frag);
    }

    pub fn fail_once(&self, op: &str, err: AppError) {
        self.state
            .lock()
            .unwrap()
            .fail_once
            .insert(op.to_string(), err);
    }

    pub fn set_fragment_hook(&self, hook: FragmentHook) {
        *self.fragment_hook.lock().unwrap() = Some(hook);
    }

    pub fn created_books(&self) -> Vec<String> {
        self.state.lock().unwrap().created_books.clone()
    }

    pub fn updated_books(&self) -> Vec<String> {
        self.state.lock().unwrap().updated_books.clone()
    }

    pub fn deleted_books(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_books.clone()
    }

    pub fn created_notes(&self) -> Vec<String> {
        self.state.lock().unwrap().created_notes.clone()
    }

    pub fn updated_notes(&self) -> Vec<String> {
        self.state.lock().unwrap().updated_notes.clone()
    }

    pub fn deleted_notes(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_notes.clone()
    }

    pub fn fragment_calls(&self) -> Vec<i64> {
        self.state.lock().unwrap().fragment_calls.clone()
    }

    fn take_failure(&self, op: &str) -> Option<AppError> {
        self.state.lock().unwrap().fail_once.remove(op)
    }
}

impl RemoteApi for MockRemote {
    fn create_book(&self, label: &str) -> AppResult<RemoteBook> {
        if let Some(err) = self.take_failure("create_book") {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        state.created_books.push(label.to_string());
        Ok(RemoteBook {
            uuid: format!("server-{}-uuid", label),
            usn: state.response_usn,
        })
    }

    fn update_book(&self, uuid: &str, _label: &str) -> AppResult<RemoteBook> {
        if let Some(err) = self.take_failure("update_book") {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        state.updated_books.push(uuid.to_string());
        Ok(RemoteBook {
            uuid: uuid.to_string(),
            usn: state.response_usn,
        })
    }

    fn delete_book(&self, uuid: &str) -> AppResult<RemoteBook> {
        if let Some(err) = self.take_failure("delete_book") {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        state.deleted_books.push(uuid.to_string());
        Ok(RemoteBook {
            uuid: uuid.to_string(),
            usn: state.response_usn,
        })
    }

    fn create_note(
        &self,
        _book_uuid: &str,
        body: &str,
        _added_on: i64,
        _public: bool,
    ) -> AppResult<RemoteNote> {
        if let Some(err) = self.take_failure("create_note") {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        state.created_notes.push(body.to_string());
        Ok(RemoteNote {
            uuid: format!("server-{}-uuid", body),
            usn: state.response_usn,
        })
    }

    fn update_note(
        &self,
        uuid: &str,
        _book_uuid: &str,
        _body: &str,
        _public: bool,
        _edited_on: i64,
    ) -> AppResult<RemoteNote> {
        if let Some(err) = self.take_failure("update_note") {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        state.updated_notes.push(uuid.to_string());
        Ok(RemoteNote {
            uuid: uuid.to_string(),
            usn: state.response_usn,
        })
    }

    fn delete_note(&self, uuid: &str) -> AppResult<RemoteNote> {
        if let Some(err) = self.take_failure("delete_note") {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        state.deleted_notes.push(uuid.to_string());
        Ok(RemoteNote {
            uuid: uuid.to_string(),
            usn: state.response_usn,
        })
    }

    fn get_sync_fragment(&self, after_usn: i64) -> AppResult<SyncFragment> {
        if let Some(hook) = self.fragment_hook.lock().unwrap().as_ref() {
            hook(after_usn);
        }
        if let Some(err) = self.take_failure("get_sync_fragment") {
            return Err(err);
        }
        let mut state = self.state.lock().unwrap();
        state.fragment_calls.push(after_usn);
        Ok(state.fragments.pop_front().unwrap_or(SyncFragment {
            frag_max_usn: after_usn,
            server_max_usn: after_usn,
            ..SyncFragment::default()
        }))
    }
}
