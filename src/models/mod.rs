//! Data models for inbox and conversation entities

mod conversation;
mod event;
mod message;

pub use conversation::*;
pub use event::*;
pub use message::*;

use chrono::{DateTime, Utc};

/// Parse a backend timestamp.
///
/// The backend mostly sends RFC 3339, but some rows arrive without a zone
/// suffix; those are taken as UTC. Anything unparseable is `None`, which
/// orders as epoch 0.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}
