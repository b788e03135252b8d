use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A labeled collection of notes. `usn == 0` means the row has never been
/// acknowledged by the server; its uuid is a client-side placeholder until the
/// first successful upload replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub uuid: String,
    pub label: String,
    pub usn: i64,
    pub added_on: i64,
    pub dirty: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub uuid: String,
    pub book_uuid: String,
    pub usn: i64,
    pub added_on: i64,
    pub edited_on: i64,
    pub body: String,
    pub public: bool,
    pub dirty: bool,
    pub deleted: bool,
}

impl Book {
    pub fn new_local(label: &str, now: i64) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            label: label.to_string(),
            usn: 0,
            added_on: now,
            dirty: true,
            deleted: false,
        }
    }
}

impl Note {
    pub fn new_local(book_uuid: &str, body: &str, public: bool, now: i64) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            book_uuid: book_uuid.to_string(),
            usn: 0,
            added_on: now,
            edited_on: 0,
            body: body.to_string(),
            public,
            dirty: true,
            deleted: false,
        }
    }
}
