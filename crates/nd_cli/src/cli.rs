use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nd_cli")]
#[command(about = "NoteDown CLI")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Initialize a local notes store.
    Init { data_dir: String },
    /// Add a note to a book, creating the book when needed.
    Add {
        data_dir: String,
        book: String,
        body: String,
    },
    /// List books.
    Books { data_dir: String },
    /// List the notes of a book.
    Notes { data_dir: String, book: String },
    /// Replace a note's body.
    Edit {
        data_dir: String,
        note_uuid: String,
        body: String,
    },
    /// Remove a note.
    RmNote { data_dir: String, note_uuid: String },
    /// Remove a book and its notes.
    RmBook { data_dir: String, book: String },
    /// Synchronize the local store with the server.
    Sync {
        data_dir: String,
        #[arg(long)]
        endpoint: String,
        /// Name of the environment variable holding the API key.
        #[arg(long, default_value = "NOTEDOWN_API_KEY")]
        api_key_env: String,
        /// Force a full re-anchoring sync.
        #[arg(long)]
        full: bool,
    },
}
