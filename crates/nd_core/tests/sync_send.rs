mod common;

use common::{book_row, note_row, open_test_db, MockRemote};
use nd_core::store;
use nd_core::sync::CancelToken;
use nd_core::sync_send::{send_books, send_notes};

#[test]
fn send_books_classifies_dirty_rows() {
    let conn = open_test_db();
    // Clean rows are ignored.
    store::insert_book(&conn, &book_row("b1-uuid", "b1-label", 1, false, false)).expect("b1");
    store::insert_book(&conn, &book_row("b2-uuid", "b2-label", 2, false, false)).expect("b2");
    // Never uploaded: created on the server.
    store::insert_book(&conn, &book_row("b3-uuid", "b3-label", 0, true, false)).expect("b3");
    store::insert_book(&conn, &book_row("b4-uuid", "b4-label", 0, true, false)).expect("b4");
    // Never uploaded and tombstoned: purged locally without a server call.
    store::insert_book(&conn, &book_row("b5-uuid", "b5-label", 0, true, true)).expect("b5");
    // Known to the server and tombstoned: deleted remotely.
    store::insert_book(&conn, &book_row("b6-uuid", "b6-label", 10, true, true)).expect("b6");
    // Known to the server with pending edits: updated remotely.
    store::insert_book(&conn, &book_row("b7-uuid", "b7-label", 11, true, false)).expect("b7");
    store::insert_book(&conn, &book_row("b8-uuid", "b8-label", 18, true, false)).expect("b8");

    // Notes hanging off the created books pick up the server-assigned uuid.
    store::insert_note(&conn, &note_row("n5-uuid", "b3-uuid", 10, "n5 body", false, false))
        .expect("n5");
    store::insert_note(&conn, &note_row("n6-uuid", "b3-uuid", 10, "n6 body", false, false))
        .expect("n6");
    store::insert_note(&conn, &note_row("n7-uuid", "b4-uuid", 10, "n7 body", false, false))
        .expect("n7");

    let remote = MockRemote::new();
    send_books(&conn, &remote, 0, &CancelToken::new()).expect("send");

    let mut created = remote.created_books();
    created.sort();
    assert_eq!(created, vec!["b3-label".to_string(), "b4-label".to_string()]);
    assert_eq!(
        remote.updated_books(),
        vec!["b7-uuid".to_string(), "b8-uuid".to_string()]
    );
    assert_eq!(remote.deleted_books(), vec!["b6-uuid".to_string()]);

    let books = store::list_all_books(&conn).expect("books");
    assert_eq!(books.len(), 6);
    assert!(books.iter().all(|b| !b.dirty));
    assert!(store::get_book(&conn, "server-b3-label-uuid")
        .expect("b3")
        .is_some());
    assert!(store::get_book(&conn, "server-b4-label-uuid")
        .expect("b4")
        .is_some());
    assert!(store::get_book(&conn, "b5-uuid").expect("b5").is_none());
    assert!(store::get_book(&conn, "b6-uuid").expect("b6").is_none());

    let n5 = store::get_note(&conn, "n5-uuid").expect("n5").expect("row");
    let n6 = store::get_note(&conn, "n6-uuid").expect("n6").expect("row");
    let n7 = store::get_note(&conn, "n7-uuid").expect("n7").expect("row");
    assert_eq!(n5.book_uuid, "server-b3-label-uuid");
    assert_eq!(n6.book_uuid, "server-b3-label-uuid");
    assert_eq!(n7.book_uuid, "server-b4-label-uuid");
}

#[test]
fn send_notes_classifies_dirty_rows() {
    let conn = open_test_db();
    store::insert_book(&conn, &book_row("b1-uuid", "b1-label", 1, false, false)).expect("b1");

    store::insert_note(&conn, &note_row("n1-uuid", "b1-uuid", 10, "n1-body", false, false))
        .expect("n1");
    store::insert_note(&conn, &note_row("n2-uuid", "b1-uuid", 0, "n2-body", true, false))
        .expect("n2");
    store::insert_note(&conn, &note_row("n3-uuid", "b1-uuid", 11, "n3-body", true, false))
        .expect("n3");
    store::insert_note(&conn, &note_row("n4-uuid", "b1-uuid", 0, "n4-body", true, true))
        .expect("n4");
    store::insert_note(&conn, &note_row("n5-uuid", "b1-uuid", 17, "n5-body", true, true))
        .expect("n5");
    store::insert_note(&conn, &note_row("n6-uuid", "b1-uuid", 0, "n6-body", true, false))
        .expect("n6");
    store::insert_note(&conn, &note_row("n7-uuid", "b1-uuid", 12, "n7-body", false, false))
        .expect("n7");
    store::insert_note(&conn, &note_row("n8-uuid", "b1-uuid", 17, "n8-body", true, false))
        .expect("n8");
    store::insert_note(&conn, &note_row("n9-uuid", "b1-uuid", 17, "n9-body", true, true))
        .expect("n9");
    store::insert_note(&conn, &note_row("n10-uuid", "b1-uuid", 0, "n10-body", true, false))
        .expect("n10");

    let remote = MockRemote::new();
    send_notes(&conn, &remote, 0, &CancelToken::new()).expect("send");

    let mut created = remote.created_notes();
    created.sort();
    assert_eq!(
        created,
        vec![
            "n10-body".to_string(),
            "n2-body".to_string(),
            "n6-body".to_string()
        ]
    );
    assert_eq!(
        remote.updated_notes(),
        vec!["n3-uuid".to_string(), "n8-uuid".to_string()]
    );
    assert_eq!(
        remote.deleted_notes(),
        vec!["n5-uuid".to_string(), "n9-uuid".to_string()]
    );

    let notes = store::list_all_notes(&conn).expect("notes");
    assert_eq!(notes.len(), 7);
    assert!(notes.iter().all(|n| !n.dirty));
    assert!(store::get_note(&conn, "server-n2-body-uuid")
        .expect("n2")
        .is_some());
    assert!(store::get_note(&conn, "server-n6-body-uuid")
        .expect("n6")
        .is_some());
    assert!(store::get_note(&conn, "server-n10-body-uuid")
        .expect("n10")
        .is_some());
    assert!(store::get_note(&conn, "n4-uuid").expect("n4").is_none());
    assert!(store::get_note(&conn, "n5-uuid").expect("n5").is_none());
    assert!(store::get_note(&conn, "n9-uuid").expect("n9").is_none());
}

#[test]
fn send_books_detects_server_clock_ahead() {
    // A response usn exactly one past the watermark means no unseen writes;
    // anything larger does.
    for (last_max_usn, expected) in [(10, false), (9, true)] {
        let conn = open_test_db();
        store::insert_book(&conn, &book_row("b1-uuid", "b1-label", 0, true, false)).expect("b1");

        let remote = MockRemote::new();
        remote.set_response_usn(11);
        let is_behind =
            send_books(&conn, &remote, last_max_usn, &CancelToken::new()).expect("send");
        assert_eq!(is_behind, expected, "last_max_usn={}", last_max_usn);
    }
}

#[test]
fn send_books_detects_server_clock_ahead_on_delete() {
    for (last_max_usn, expected) in [(10, false), (9, true)] {
        let conn = open_test_db();
        store::insert_book(&conn, &book_row("b1-uuid", "b1-label", 1, true, true)).expect("b1");

        let remote = MockRemote::new();
        remote.set_response_usn(11);
        let is_behind =
            send_books(&conn, &remote, last_max_usn, &CancelToken::new()).expect("send");
        assert_eq!(is_behind, expected, "last_max_usn={}", last_max_usn);
    }
}

#[test]
fn send_notes_detects_server_clock_ahead_on_update() {
    for (last_max_usn, expected) in [(10, false), (9, true)] {
        let conn = open_test_db();
        store::insert_book(&conn, &book_row("b1-uuid", "b1-label", 1, false, false)).expect("b1");
        store::insert_note(&conn, &note_row("n1-uuid", "b1-uuid", 8, "n1 body", true, false))
            .expect("n1");

        let remote = MockRemote::new();
        remote.set_response_usn(11);
        let is_behind =
            send_notes(&conn, &remote, last_max_usn, &CancelToken::new()).expect("send");
        assert_eq!(is_behind, expected, "last_max_usn={}", last_max_usn);
    }
}

#[test]
fn send_aborts_on_transport_failure_leaving_row_dirty() {
    let conn = open_test_db();
    store::insert_book(&conn, &book_row("b1-uuid", "b1-label", 11, true, false)).expect("b1");

    let remote = MockRemote::new();
    remote.fail_once(
        "update_book",
        nd_core::AppError::new(
            "ND_TRANSPORT_FAILED",
            "remote",
            "connection reset",
            serde_json::json!({}),
        )
        .retryable(),
    );

    let err = send_books(&conn, &remote, 0, &CancelToken::new()).expect_err("must abort");
    assert_eq!(err.code, "ND_TRANSPORT_FAILED");

    let b1 = store::get_book(&conn, "b1-uuid").expect("b1").expect("row");
    assert!(b1.dirty, "dirty flag survives for the retry");
}
