//! Shared SQLite connection opening for the Sigil stores.
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Opens a store connection with the WAL pragmas applied. Every store
/// operation opens its own connection; no handle is held across awaits.
pub(crate) fn open_store_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store directory {}", parent.display()))?;
        }
    }
    let connection = Connection::open(path)
        .with_context(|| format!("failed to open sigil store {}", path.display()))?;
    connection.busy_timeout(Duration::from_secs(5))?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        "#,
    )?;
    Ok(connection)
}
