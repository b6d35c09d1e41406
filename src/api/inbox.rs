//! Inbox listing
//!
//! The backend has shipped several shapes for this payload over time; the
//! normalizer accepts all of them and maps rows onto [`ConversationSummary`].

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::{parse_timestamp, ConversationId, ConversationSummary};
use crate::session::SessionContext;

use super::client::ApiClient;

/// Page size for the inbox fetch; only the first page is ever reconciled.
pub const INBOX_PAGE_LIMIT: &str = "50";

/// Fetch the first page of the inbox for the session's tenant and department.
pub async fn fetch_inbox(
    client: &ApiClient,
    session: &SessionContext,
) -> Result<Vec<ConversationSummary>> {
    let resp = client
        .get(
            "/inbox",
            &[
                ("tenant_id", session.tenant_id.as_str()),
                ("department_id", session.department_id.as_str()),
                ("limit", INBOX_PAGE_LIMIT),
                ("offset", "0"),
            ],
        )
        .await?;
    let payload: Value = resp.json().await?;
    Ok(normalize_inbox(payload))
}

/// Map the raw payload to summaries, skipping rows that cannot be decoded.
pub(crate) fn normalize_inbox(payload: Value) -> Vec<ConversationSummary> {
    extract_rows(payload)
        .into_iter()
        .filter_map(summary_from_row)
        .collect()
}

/// The list arrives either as a bare array or wrapped under one of
/// `items`, `data`, `results`.
fn extract_rows(payload: Value) -> Vec<Value> {
    if let Value::Array(rows) = payload {
        return rows;
    }
    if let Value::Object(mut map) = payload {
        for key in ["items", "data", "results"] {
            if let Some(Value::Array(rows)) = map.remove(key) {
                return rows;
            }
        }
    }
    Vec::new()
}

/// An id that may arrive as a JSON number or string (department ids do both).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Num(i64),
    Text(String),
}

impl fmt::Display for RawId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawId::Num(n) => write!(f, "{}", n),
            RawId::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DepartmentRef {
    id: Option<RawId>,
    name: Option<String>,
}

/// One raw inbox row. Every field is optional; the backend fills different
/// subsets depending on the conversation's origin.
#[derive(Debug, Deserialize)]
struct InboxRow {
    conversation_id: Option<ConversationId>,
    id: Option<ConversationId>,
    user_name: Option<String>,
    name: Option<String>,
    customer_name: Option<String>,
    sender: Option<String>,
    patient_whatsapp_number: Option<String>,
    phone_number: Option<String>,
    message: Option<String>,
    timestamp: Option<String>,
    updated_at: Option<String>,
    created_at: Option<String>,
    unread_count: Option<u32>,
    department: Option<DepartmentRef>,
    is_ai_enabled: Option<bool>,
    assigned_agent: Option<String>,
}

fn summary_from_row(raw: Value) -> Option<ConversationSummary> {
    let row: InboxRow = match serde_json::from_value(raw) {
        Ok(row) => row,
        Err(e) => {
            tracing::warn!("Skipping malformed inbox row: {}", e);
            return None;
        }
    };

    // A row without any id cannot be selected or patched by events.
    let id = match row.conversation_id.or(row.id) {
        Some(id) => id,
        None => {
            tracing::warn!("Skipping inbox row without conversation id");
            return None;
        }
    };

    let phone = row
        .patient_whatsapp_number
        .clone()
        .or_else(|| row.phone_number.clone())
        .unwrap_or_default();

    let display_name = row
        .user_name
        .or(row.name)
        .or(row.customer_name)
        .or(row.sender)
        .or(row.patient_whatsapp_number)
        .or(row.phone_number)
        .unwrap_or_else(|| "Unknown".to_string());

    let last_message_at = row
        .timestamp
        .or(row.updated_at)
        .or(row.created_at)
        .and_then(|s| parse_timestamp(&s));

    Some(ConversationSummary {
        id,
        display_name,
        phone,
        last_message: row.message,
        last_message_at,
        unread_count: row.unread_count.unwrap_or(0),
        department_id: row
            .department
            .as_ref()
            .and_then(|d| d.id.as_ref())
            .map(|id| id.to_string()),
        department_name: row.department.and_then(|d| d.name),
        is_ai_enabled: row.is_ai_enabled.unwrap_or(false),
        assigned_agent: row.assigned_agent.filter(|s| !s.is_empty()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_rows_bare_array() {
        let rows = extract_rows(serde_json::json!([{"id": 1}, {"id": 2}]));
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_extract_rows_wrapper_keys() {
        for key in ["items", "data", "results"] {
            let rows = extract_rows(serde_json::json!({ key: [{"id": 1}] }));
            assert_eq!(rows.len(), 1, "wrapper key {}", key);
        }
    }

    #[test]
    fn test_extract_rows_unexpected_shape() {
        assert!(extract_rows(serde_json::json!({"count": 3})).is_empty());
        assert!(extract_rows(serde_json::json!("nope")).is_empty());
    }

    #[test]
    fn test_row_mapping_full() {
        let items = normalize_inbox(serde_json::json!([{
            "conversation_id": 7,
            "user_name": "Ada",
            "patient_whatsapp_number": "+491700000000",
            "message": "see you tomorrow",
            "timestamp": "2024-03-01T10:00:00Z",
            "unread_count": 3,
            "department": {"id": 2, "name": "Support"},
            "is_ai_enabled": true,
            "assigned_agent": "bob"
        }]));
        assert_eq!(items.len(), 1);
        let c = &items[0];
        assert_eq!(c.id, ConversationId::Num(7));
        assert_eq!(c.display_name, "Ada");
        assert_eq!(c.phone, "+491700000000");
        assert_eq!(c.last_message.as_deref(), Some("see you tomorrow"));
        assert!(c.last_message_at.is_some());
        assert_eq!(c.unread_count, 3);
        assert_eq!(c.department_id.as_deref(), Some("2"));
        assert_eq!(c.department_name.as_deref(), Some("Support"));
        assert!(c.is_ai_enabled);
        assert_eq!(c.assigned_agent.as_deref(), Some("bob"));
    }

    #[test]
    fn test_row_display_name_fallbacks() {
        let items = normalize_inbox(serde_json::json!([
            {"id": 1, "name": "List Name"},
            {"id": 2, "customer_name": "Customer"},
            {"id": 3, "sender": "Sender"},
            {"id": 4, "phone_number": "+49123"},
            {"id": 5}
        ]));
        let names: Vec<&str> = items.iter().map(|c| c.display_name.as_str()).collect();
        assert_eq!(names, ["List Name", "Customer", "Sender", "+49123", "Unknown"]);
    }

    #[test]
    fn test_row_id_prefers_conversation_id() {
        let items = normalize_inbox(serde_json::json!([
            {"conversation_id": "a", "id": "b"}
        ]));
        assert_eq!(items[0].id, ConversationId::Text("a".into()));
    }

    #[test]
    fn test_row_timestamp_fallback_chain() {
        let items = normalize_inbox(serde_json::json!([
            {"id": 1, "updated_at": "2024-03-01T10:00:00Z"},
            {"id": 2, "created_at": "2024-03-01T11:00:00Z"},
            {"id": 3}
        ]));
        assert!(items[0].last_message_at.is_some());
        assert!(items[1].last_message_at.is_some());
        assert!(items[2].last_message_at.is_none());
    }

    #[test]
    fn test_rows_without_id_or_malformed_are_skipped() {
        let items = normalize_inbox(serde_json::json!([
            {"name": "no id"},
            {"id": 1, "unread_count": "not-a-number"},
            {"id": 2}
        ]));
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, ConversationId::Num(2));
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let items = normalize_inbox(serde_json::json!([{"id": 9}]));
        let c = &items[0];
        assert_eq!(c.unread_count, 0);
        assert!(!c.is_ai_enabled);
        assert!(c.last_message.is_none());
        assert!(c.assigned_agent.is_none());
        assert_eq!(c.phone, "");
    }
}
