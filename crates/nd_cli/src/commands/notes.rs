use nd_core::app_error::AppResult;
use nd_core::db::open_db;
use nd_core::{notes, store};
use std::path::{Path, PathBuf};

pub fn db_path(data_dir: &str) -> PathBuf {
    Path::new(data_dir).join("notedown.sqlite")
}

pub fn run_init(data_dir: &str) -> AppResult<()> {
    open_db(&db_path(data_dir))?;
    println!("initialized notes store at {}", data_dir);
    Ok(())
}

pub fn run_add(data_dir: &str, book: &str, body: &str, now: i64) -> AppResult<()> {
    let conn = open_db(&db_path(data_dir))?;
    let note = notes::add_note(&conn, book, body, now)?;
    println!("added note {} to {}", note.uuid, book);
    Ok(())
}

pub fn run_books(data_dir: &str) -> AppResult<()> {
    let conn = open_db(&db_path(data_dir))?;
    for book in store::list_books(&conn)? {
        println!("{}", book.label);
    }
    Ok(())
}

pub fn run_notes(data_dir: &str, book: &str) -> AppResult<()> {
    let conn = open_db(&db_path(data_dir))?;
    let Some(book) = store::get_book_by_label(&conn, book)? else {
        println!("no such book: {}", book);
        return Ok(());
    };
    for note in store::list_book_notes(&conn, &book.uuid)? {
        println!(
            "{}",
            serde_json::to_string_pretty(&note).unwrap_or_else(|_| "{}".to_string())
        );
    }
    Ok(())
}

pub fn run_edit(data_dir: &str, note_uuid: &str, body: &str, now: i64) -> AppResult<()> {
    let conn = open_db(&db_path(data_dir))?;
    let note = notes::edit_note(&conn, note_uuid, body, now)?;
    println!("edited note {}", note.uuid);
    Ok(())
}

pub fn run_rm_note(data_dir: &str, note_uuid: &str) -> AppResult<()> {
    let conn = open_db(&db_path(data_dir))?;
    notes::remove_note(&conn, note_uuid)?;
    println!("removed note {}", note_uuid);
    Ok(())
}

pub fn run_rm_book(data_dir: &str, book: &str) -> AppResult<()> {
    let conn = open_db(&db_path(data_dir))?;
    notes::remove_book(&conn, book)?;
    println!("removed book {}", book);
    Ok(())
}
