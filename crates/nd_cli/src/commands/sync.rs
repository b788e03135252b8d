use crate::commands::notes::db_path;
use nd_core::app_error::{AppError, AppResult};
use nd_core::db::open_db;
use nd_core::remote::HttpRemote;
use nd_core::sync::{sync, CancelToken, SyncMode};

pub fn run_sync(data_dir: &str, endpoint: &str, api_key_env: &str, full: bool) -> AppResult<()> {
    let api_key = std::env::var(api_key_env).map_err(|_| {
        AppError::new(
            "ND_CREDENTIAL_MISSING",
            "remote",
            "api key environment variable is not set",
            serde_json::json!({ "env": api_key_env }),
        )
    })?;

    let conn = open_db(&db_path(data_dir))?;
    let remote = HttpRemote::new(endpoint, &api_key)?;
    let mode = if full { SyncMode::Full } else { SyncMode::Step };

    let outcome = sync(&conn, &remote, mode, &CancelToken::new())?;
    println!(
        "{}",
        serde_json::to_string_pretty(&outcome).unwrap_or_else(|_| "{}".to_string())
    );
    Ok(())
}
