//! Durable stores backing the Sigil conversation engine.
//!
//! Two SQLite-backed stores share one database file: the admin directory
//! (who may drive the flow and who may manage admins) and the append-only
//! artifact log of minted session artifacts. Read/write operations open a
//! short-lived connection each; SQLite's busy timeout serializes writers.

pub mod admin_directory;
pub mod artifact_log;
mod store_connection;

pub use admin_directory::{AdminDirectory, AdminRecord};
pub use artifact_log::{ArtifactListing, ArtifactLog, ArtifactRecord};
