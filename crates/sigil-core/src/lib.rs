//! Foundational low-level utilities shared across Sigil crates.
//!
//! Provides time helpers used by the stores for record timestamps and by the
//! relay and listings for human-readable rendering.

pub mod time_utils;

pub use time_utils::{current_unix_timestamp, current_unix_timestamp_ms, format_unix_timestamp};
