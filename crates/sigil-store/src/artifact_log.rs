//! Append-only log of minted session artifacts.
//!
//! Records are written once on a successful flow and never mutated. The
//! creator reference is soft: artifact rows survive the removal of the
//! admin that produced them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use sigil_core::current_unix_timestamp;

use crate::store_connection::open_store_connection;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Full artifact row, including the secret payload.
pub struct ArtifactRecord {
    pub artifact_id: i64,
    pub artifact_payload: String,
    pub phone_number: String,
    pub account_label: Option<String>,
    pub created_by: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Listing row without the payload, as rendered back to operators.
pub struct ArtifactListing {
    pub phone_number: String,
    pub account_label: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
/// Durable append-only artifact store keyed by creator.
pub struct ArtifactLog {
    db_path: PathBuf,
}

impl ArtifactLog {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let log = Self {
            db_path: db_path.as_ref().to_path_buf(),
        };
        let connection = open_store_connection(&log.db_path)?;
        initialize_artifact_schema(&connection)?;
        Ok(log)
    }

    /// Appends one artifact record. Fire-and-forget: storage failure is
    /// logged and reported as false so the caller can surface a save
    /// failure without losing the already-produced artifact.
    pub fn save(
        &self,
        artifact_payload: &str,
        phone_number: &str,
        account_label: Option<&str>,
        created_by: i64,
    ) -> bool {
        match self.insert_artifact(artifact_payload, phone_number, account_label, created_by) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!("failed to save artifact for {phone_number}: {error:#}");
                false
            }
        }
    }

    /// Listings for one creator, newest first.
    pub fn list_by_creator(&self, created_by: i64) -> Vec<ArtifactListing> {
        match self.query_listings(Some(created_by)) {
            Ok(listings) => listings,
            Err(error) => {
                tracing::warn!("failed to list artifacts for {created_by}: {error:#}");
                Vec::new()
            }
        }
    }

    /// Listings across all creators, newest first.
    pub fn list_all(&self) -> Vec<ArtifactListing> {
        match self.query_listings(None) {
            Ok(listings) => listings,
            Err(error) => {
                tracing::warn!("failed to list artifacts: {error:#}");
                Vec::new()
            }
        }
    }

    /// Full records (payload included) for one creator, newest first.
    pub fn records_by_creator(&self, created_by: i64) -> Result<Vec<ArtifactRecord>> {
        let connection = open_store_connection(&self.db_path)?;
        let mut statement = connection.prepare(
            r#"
            SELECT id, artifact_payload, phone_number, account_label, created_by, created_at
            FROM artifacts WHERE created_by = ?1
            ORDER BY created_at DESC, id DESC
            "#,
        )?;
        let mut rows = statement.query(params![created_by])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(ArtifactRecord {
                artifact_id: row.get(0)?,
                artifact_payload: row.get(1)?,
                phone_number: row.get(2)?,
                account_label: row.get(3)?,
                created_by: row.get(4)?,
                created_at: row.get(5)?,
            });
        }
        Ok(records)
    }

    fn insert_artifact(
        &self,
        artifact_payload: &str,
        phone_number: &str,
        account_label: Option<&str>,
        created_by: i64,
    ) -> Result<()> {
        let connection = open_store_connection(&self.db_path)?;
        let created_at = i64::try_from(current_unix_timestamp()).unwrap_or(i64::MAX);
        connection
            .execute(
                r#"
                INSERT INTO artifacts (artifact_payload, phone_number, account_label, created_by, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![artifact_payload, phone_number, account_label, created_by, created_at],
            )
            .context("failed to insert artifact record")?;
        Ok(())
    }

    fn query_listings(&self, created_by: Option<i64>) -> Result<Vec<ArtifactListing>> {
        let connection = open_store_connection(&self.db_path)?;
        let mut statement = if created_by.is_some() {
            connection.prepare(
                r#"
                SELECT phone_number, account_label, created_at
                FROM artifacts WHERE created_by = ?1
                ORDER BY created_at DESC, id DESC
                "#,
            )?
        } else {
            connection.prepare(
                r#"
                SELECT phone_number, account_label, created_at
                FROM artifacts
                ORDER BY created_at DESC, id DESC
                "#,
            )?
        };
        let mut rows = match created_by {
            Some(creator) => statement.query(params![creator])?,
            None => statement.query([])?,
        };
        let mut listings = Vec::new();
        while let Some(row) = rows.next()? {
            listings.push(ArtifactListing {
                phone_number: row.get(0)?,
                account_label: row.get(1)?,
                created_at: row.get(2)?,
            });
        }
        Ok(listings)
    }
}

fn initialize_artifact_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                artifact_payload TEXT NOT NULL,
                phone_number TEXT NOT NULL,
                account_label TEXT NULL,
                created_by INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_artifacts_created_by
                ON artifacts(created_by);
            "#,
        )
        .context("failed to initialize artifacts schema")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ArtifactLog;

    fn open_log(dir: &tempfile::TempDir) -> ArtifactLog {
        ArtifactLog::open(dir.path().join("sigil.db")).expect("open artifact log")
    }

    #[test]
    fn unit_save_round_trips_payload_byte_identical() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let log = open_log(&tempdir);

        let payload = "1BQANOTEuMTA4LjU2LjE1OQG7cv==secret";
        assert!(log.save(payload, "+15551234567", Some("Ada L"), 42));

        let records = log.records_by_creator(42).expect("records");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].artifact_payload, payload);
        assert_eq!(records[0].phone_number, "+15551234567");
        assert_eq!(records[0].account_label.as_deref(), Some("Ada L"));
    }

    #[test]
    fn functional_list_by_creator_filters_and_orders_newest_first() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let log = open_log(&tempdir);

        assert!(log.save("payload-a", "+100", None, 42));
        assert!(log.save("payload-b", "+200", Some("Second"), 42));
        assert!(log.save("payload-c", "+300", None, 99));

        let mine = log.list_by_creator(42);
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].phone_number, "+200");
        assert_eq!(mine[1].phone_number, "+100");

        let all = log.list_all();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].phone_number, "+300");
    }

    #[test]
    fn unit_list_by_creator_is_empty_for_unknown_creator() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let log = open_log(&tempdir);
        assert!(log.list_by_creator(7).is_empty());
    }
}
