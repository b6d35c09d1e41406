//! Conversation-level models for the inbox list

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation identifier exactly as the backend sends it.
///
/// The backend is inconsistent about whether ids are JSON numbers or strings,
/// so both shapes are accepted and preserved for outgoing payloads. Equality
/// is on the wire value; `From<&str>` normalizes digit strings to the numeric
/// form so CLI arguments match server-sent numeric ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConversationId {
    Num(i64),
    Text(String),
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationId::Num(n) => write!(f, "{}", n),
            ConversationId::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        match s.parse::<i64>() {
            Ok(n) => ConversationId::Num(n),
            Err(_) => ConversationId::Text(s.to_string()),
        }
    }
}

impl From<i64> for ConversationId {
    fn from(n: i64) -> Self {
        ConversationId::Num(n)
    }
}

/// One row of the inbox list, normalized from the tolerant wire payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    /// Contact display name (first non-empty of several backend fields).
    pub display_name: String,
    /// WhatsApp number, empty when the backend omits it.
    pub phone: String,
    /// Preview of the most recent message.
    pub last_message: Option<String>,
    /// Timestamp of the most recent message; `None` sorts last.
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: u32,
    pub department_id: Option<String>,
    pub department_name: Option<String>,
    pub is_ai_enabled: bool,
    /// Agent currently assigned, if any. Patched in place by assignment events.
    pub assigned_agent: Option<String>,
}

impl ConversationSummary {
    /// Millisecond timestamp for ordering; missing timestamps compare as 0.
    pub fn last_message_millis(&self) -> i64 {
        self.last_message_at
            .map(|t| t.timestamp_millis())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_accepts_number_and_string() {
        let n: ConversationId = serde_json::from_str("7").unwrap();
        let s: ConversationId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(n, ConversationId::Num(7));
        assert_eq!(s, ConversationId::Text("abc".into()));
    }

    #[test]
    fn test_id_round_trips_wire_shape() {
        let n = ConversationId::Num(7);
        assert_eq!(serde_json::to_string(&n).unwrap(), "7");
        let s = ConversationId::Text("abc".into());
        assert_eq!(serde_json::to_string(&s).unwrap(), "\"abc\"");
    }

    #[test]
    fn test_id_from_str_matches_numeric_wire_id() {
        // "42" typed on the CLI must equal the backend's numeric 42.
        assert_eq!(ConversationId::from("42"), ConversationId::Num(42));
        assert_eq!(
            ConversationId::from("conv-42"),
            ConversationId::Text("conv-42".into())
        );
    }

    #[test]
    fn test_missing_timestamp_sorts_as_epoch() {
        let c = ConversationSummary {
            id: ConversationId::Num(1),
            display_name: "x".into(),
            phone: String::new(),
            last_message: None,
            last_message_at: None,
            unread_count: 0,
            department_id: None,
            department_name: None,
            is_ai_enabled: false,
            assigned_agent: None,
        };
        assert_eq!(c.last_message_millis(), 0);
    }

    #[test]
    fn test_summary_serde_carries_timestamp() {
        let at = DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let summary = ConversationSummary {
            id: ConversationId::Num(7),
            display_name: "Dana".into(),
            phone: "+4917612345678".into(),
            last_message: Some("see you then".into()),
            last_message_at: Some(at),
            unread_count: 2,
            department_id: Some("d2".into()),
            department_name: None,
            is_ai_enabled: true,
            assigned_agent: None,
        };

        let json = serde_json::to_string(&summary).unwrap();
        let back: ConversationSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, summary.id);
        assert_eq!(back.last_message_at, Some(at));
        assert_eq!(back.unread_count, 2);
    }
}
