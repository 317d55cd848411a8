//! Authorization directory: which principals may drive the flow.
//!
//! The engine rechecks `is_admin` on every inbound event, so this store
//! fails closed: any storage error is logged and answered as not-admin.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sigil_core::current_unix_timestamp;

use crate::store_connection::open_store_connection;

#[derive(Debug, Clone, PartialEq, Eq)]
/// One row of the admin directory.
pub struct AdminRecord {
    pub principal_id: i64,
    pub display_name: Option<String>,
    pub added_by: i64,
    pub added_at: i64,
}

#[derive(Debug, Clone)]
/// Durable mapping from principal identity to admin record, with one
/// permanently privileged root principal.
pub struct AdminDirectory {
    db_path: PathBuf,
    root_principal: i64,
}

impl AdminDirectory {
    /// Opens the directory, creating the schema and the root principal's
    /// record when absent. The root principal is recorded as added by itself.
    pub fn open(db_path: impl AsRef<Path>, root_principal: i64) -> Result<Self> {
        let directory = Self {
            db_path: db_path.as_ref().to_path_buf(),
            root_principal,
        };
        let connection = open_store_connection(&directory.db_path)?;
        initialize_admin_schema(&connection)?;
        connection
            .execute(
                r#"
                INSERT OR IGNORE INTO admins (principal_id, display_name, added_by, added_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![root_principal, "Root Admin", root_principal, now_unix()],
            )
            .context("failed to bootstrap root admin record")?;
        Ok(directory)
    }

    pub fn root_principal(&self) -> i64 {
        self.root_principal
    }

    /// Access check for every engine entry point. Never fails visibly:
    /// storage errors are logged and treated as not-admin.
    pub fn is_admin(&self, principal_id: i64) -> bool {
        match self.lookup_admin(principal_id) {
            Ok(present) => present,
            Err(error) => {
                tracing::warn!("admin lookup failed for principal {principal_id}: {error:#}");
                false
            }
        }
    }

    /// Idempotent upsert: re-adding an existing principal overwrites its
    /// display name and added-by attribution.
    pub fn add_admin(&self, principal_id: i64, display_name: Option<&str>, added_by: i64) -> bool {
        match self.upsert_admin(principal_id, display_name, added_by) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("failed to add admin {principal_id}: {error:#}");
                false
            }
        }
    }

    /// Removes an admin. No-op returning false when the id is the root
    /// principal or is not present.
    pub fn remove_admin(&self, principal_id: i64) -> bool {
        match self.delete_admin(principal_id) {
            Ok(removed) => removed,
            Err(error) => {
                tracing::warn!("failed to remove admin {principal_id}: {error:#}");
                false
            }
        }
    }

    /// All admin records ordered by added_at ascending.
    pub fn list_admins(&self) -> Vec<AdminRecord> {
        match self.query_admins(false) {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!("failed to list admins: {error:#}");
                Vec::new()
            }
        }
    }

    /// Admins eligible for removal: everyone except the root principal.
    pub fn removable_admins(&self) -> Vec<AdminRecord> {
        match self.query_admins(true) {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!("failed to list removable admins: {error:#}");
                Vec::new()
            }
        }
    }

    fn lookup_admin(&self, principal_id: i64) -> Result<bool> {
        let connection = open_store_connection(&self.db_path)?;
        let found = connection
            .query_row(
                "SELECT principal_id FROM admins WHERE principal_id = ?1",
                params![principal_id],
                |_| Ok(()),
            )
            .optional()
            .context("failed to query admin record")?;
        Ok(found.is_some())
    }

    fn upsert_admin(
        &self,
        principal_id: i64,
        display_name: Option<&str>,
        added_by: i64,
    ) -> Result<()> {
        let connection = open_store_connection(&self.db_path)?;
        connection
            .execute(
                r#"
                INSERT OR REPLACE INTO admins (principal_id, display_name, added_by, added_at)
                VALUES (?1, ?2, ?3, ?4)
                "#,
                params![principal_id, display_name, added_by, now_unix()],
            )
            .context("failed to upsert admin record")?;
        Ok(())
    }

    fn delete_admin(&self, principal_id: i64) -> Result<bool> {
        let connection = open_store_connection(&self.db_path)?;
        let removed = connection
            .execute(
                "DELETE FROM admins WHERE principal_id = ?1 AND principal_id != ?2",
                params![principal_id, self.root_principal],
            )
            .context("failed to delete admin record")?;
        Ok(removed > 0)
    }

    fn query_admins(&self, exclude_root: bool) -> Result<Vec<AdminRecord>> {
        let connection = open_store_connection(&self.db_path)?;
        let mut statement = if exclude_root {
            connection.prepare(
                r#"
                SELECT principal_id, display_name, added_by, added_at
                FROM admins WHERE principal_id != ?1
                ORDER BY added_at ASC, principal_id ASC
                "#,
            )?
        } else {
            connection.prepare(
                r#"
                SELECT principal_id, display_name, added_by, added_at
                FROM admins
                ORDER BY added_at ASC, principal_id ASC
                "#,
            )?
        };
        let mut rows = if exclude_root {
            statement.query(params![self.root_principal])?
        } else {
            statement.query([])?
        };
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(AdminRecord {
                principal_id: row.get(0)?,
                display_name: row.get(1)?,
                added_by: row.get(2)?,
                added_at: row.get(3)?,
            });
        }
        Ok(records)
    }
}

fn initialize_admin_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS admins (
                principal_id INTEGER PRIMARY KEY,
                display_name TEXT NULL,
                added_by INTEGER NOT NULL,
                added_at INTEGER NOT NULL
            );
            "#,
        )
        .context("failed to initialize admins schema")?;
    Ok(())
}

fn now_unix() -> i64 {
    i64::try_from(current_unix_timestamp()).unwrap_or(i64::MAX)
}
