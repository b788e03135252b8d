use crate::app_error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One bounded batch of server-side changes, covering USNs
/// `(after_usn, frag_max_usn]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncFragment {
    pub frag_max_usn: i64,
    pub server_max_usn: i64,
    pub server_current_time: i64,
    #[serde(default)]
    pub books: Vec<FragBook>,
    #[serde(default)]
    pub notes: Vec<FragNote>,
    #[serde(default)]
    pub expunged_books: Vec<String>,
    #[serde(default)]
    pub expunged_notes: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragBook {
    pub uuid: String,
    pub usn: i64,
    pub label: String,
    pub added_on: i64,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FragNote {
    pub uuid: String,
    pub book_uuid: String,
    pub usn: i64,
    pub added_on: i64,
    pub edited_on: i64,
    pub body: String,
    pub public: bool,
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteBook {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub usn: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteNote {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub usn: i64,
}

/// The server operations the sync core consumes. The core never names HTTP;
/// tests drive it with a scripted in-memory implementation.
pub trait RemoteApi {
    fn create_book(&self, label: &str) -> AppResult<RemoteBook>;
    fn update_book(&self, uuid: &str, label: &str) -> AppResult<RemoteBook>;
    fn delete_book(&self, uuid: &str) -> AppResult<RemoteBook>;
    fn create_note(
        &self,
        book_uuid: &str,
        body: &str,
        added_on: i64,
        public: bool,
    ) -> AppResult<RemoteNote>;
    fn update_note(
        &self,
        uuid: &str,
        book_uuid: &str,
        body: &str,
        public: bool,
        edited_on: i64,
    ) -> AppResult<RemoteNote>;
    fn delete_note(&self, uuid: &str) -> AppResult<RemoteNote>;
    fn get_sync_fragment(&self, after_usn: i64) -> AppResult<SyncFragment>;
}

#[derive(Debug, Serialize)]
struct CreateBookPayload<'a> {
    label: &'a str,
}

#[derive(Debug, Serialize)]
struct UpdateBookPayload<'a> {
    label: &'a str,
}

#[derive(Debug, Serialize)]
struct CreateNotePayload<'a> {
    book_uuid: &'a str,
    body: &'a str,
    added_on: i64,
    public: bool,
}

#[derive(Debug, Serialize)]
struct UpdateNotePayload<'a> {
    book_uuid: &'a str,
    body: &'a str,
    public: bool,
    edited_on: i64,
}

#[derive(Debug, Deserialize)]
struct BookResp {
    book: RemoteBook,
}

#[derive(Debug, Deserialize)]
struct NoteResp {
    result: RemoteNote,
}

#[derive(Debug, Deserialize)]
struct FragmentResp {
    fragment: SyncFragment,
}

fn remote_error(message: &str, details: serde_json::Value) -> AppError {
    AppError::new("ND_TRANSPORT_FAILED", "remote", message, details).retryable()
}

/// HTTP client for the notes server. Holds the credential; endpoints mirror
/// the server's v1 surface.
pub struct HttpRemote {
    endpoint: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl HttpRemote {
    pub fn new(endpoint: &str, api_key: &str) -> AppResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                remote_error(
                    "failed building http client",
                    serde_json::json!({ "error": e.to_string() }),
                )
            })?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn check(&self, resp: reqwest::blocking::Response) -> AppResult<reqwest::blocking::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let url = resp.url().to_string();
        match status.as_u16() {
            401 | 403 => Err(AppError::new(
                "ND_AUTH_REJECTED",
                "remote",
                "server rejected the credential",
                serde_json::json!({ "status": status.as_u16(), "url": url }),
            )),
            409 => Err(AppError::new(
                "ND_USN_CONFLICT",
                "remote",
                "server reported a stale usn for this mutation",
                serde_json::json!({ "status": status.as_u16(), "url": url }),
            )),
            _ => Err(remote_error(
                "server returned an error status",
                serde_json::json!({ "status": status.as_u16(), "url": url }),
            )),
        }
    }

    fn send_json<P: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        builder: reqwest::blocking::RequestBuilder,
        payload: Option<&P>,
    ) -> AppResult<R> {
        let builder = builder.header("Authorization", &self.api_key);
        let builder = match payload {
            Some(p) => builder.json(p),
            None => builder,
        };
        let resp = builder.send().map_err(|e| {
            remote_error(
                "request to the notes server failed",
                serde_json::json!({ "error": e.to_string() }),
            )
        })?;
        let resp = self.check(resp)?;
        resp.json::<R>().map_err(|e| {
            remote_error(
                "failed decoding server response",
                serde_json::json!({ "error": e.to_string() }),
            )
        })
    }
}

impl RemoteApi for HttpRemote {
    fn create_book(&self, label: &str) -> AppResult<RemoteBook> {
        let resp: BookResp = self.send_json(
            self.client.post(self.url("/v1/books")),
            Some(&CreateBookPayload { label }),
        )?;
        Ok(resp.book)
    }

    fn update_book(&self, uuid: &str, label: &str) -> AppResult<RemoteBook> {
        let resp: BookResp = self.send_json(
            self.client.patch(self.url(&format!("/v1/books/{}", uuid))),
            Some(&UpdateBookPayload { label }),
        )?;
        Ok(resp.book)
    }

    fn delete_book(&self, uuid: &str) -> AppResult<RemoteBook> {
        let resp: BookResp = self.send_json::<(), _>(
            self.client.delete(self.url(&format!("/v1/books/{}", uuid))),
            None,
        )?;
        Ok(resp.book)
    }

    fn create_note(
        &self,
        book_uuid: &str,
        body: &str,
        added_on: i64,
        public: bool,
    ) -> AppResult<RemoteNote> {
        let resp: NoteResp = self.send_json(
            self.client.post(self.url("/v1/notes")),
            Some(&CreateNotePayload {
                book_uuid,
                body,
                added_on,
                public,
            }),
        )?;
        Ok(resp.result)
    }

    fn update_note(
        &self,
        uuid: &str,
        book_uuid: &str,
        body: &str,
        public: bool,
        edited_on: i64,
    ) -> AppResult<RemoteNote> {
        let resp: NoteResp = self.send_json(
            self.client.patch(self.url(&format!("/v1/notes/{}", uuid))),
            Some(&UpdateNotePayload {
                book_uuid,
                body,
                public,
                edited_on,
            }),
        )?;
        Ok(resp.result)
    }

    fn delete_note(&self, uuid: &str) -> AppResult<RemoteNote> {
        let resp: NoteResp = self.send_json::<(), _>(
            self.client.delete(self.url(&format!("/v1/notes/{}", uuid))),
            None,
        )?;
        Ok(resp.result)
    }

    fn get_sync_fragment(&self, after_usn: i64) -> AppResult<SyncFragment> {
        let resp: FragmentResp = self.send_json::<(), _>(
            self.client.get(self.url(&format!(
                "/v1/sync/fragment?after_usn={}",
                after_usn
            ))),
            None,
        )?;
        Ok(resp.fragment)
    }
}
