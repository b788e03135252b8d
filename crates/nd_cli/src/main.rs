mod cli;
mod commands {
    pub mod notes;
    pub mod sync;
}

use clap::Parser;
use cli::{Cli, Command};

fn now_s() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time before unix epoch");
    now.as_secs() as i64
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("ND_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Init { data_dir } => commands::notes::run_init(&data_dir),
        Command::Add {
            data_dir,
            book,
            body,
        } => commands::notes::run_add(&data_dir, &book, &body, now_s()),
        Command::Books { data_dir } => commands::notes::run_books(&data_dir),
        Command::Notes { data_dir, book } => commands::notes::run_notes(&data_dir, &book),
        Command::Edit {
            data_dir,
            note_uuid,
            body,
        } => commands::notes::run_edit(&data_dir, &note_uuid, &body, now_s()),
        Command::RmNote {
            data_dir,
            note_uuid,
        } => commands::notes::run_rm_note(&data_dir, &note_uuid),
        Command::RmBook { data_dir, book } => commands::notes::run_rm_book(&data_dir, &book),
        Command::Sync {
            data_dir,
            endpoint,
            api_key_env,
            full,
        } => commands::sync::run_sync(&data_dir, &endpoint, &api_key_env, full),
    };

    if let Err(err) = result {
        eprintln!("{}: {}", err.code, err.message);
        std::process::exit(1);
    }
}
