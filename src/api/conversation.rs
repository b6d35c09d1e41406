//! Conversation history fetch and membership operations

use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;
use crate::models::{parse_timestamp, Attachment, ConversationId, DeliveryState, Message, MessageId, SenderRole};
use crate::session::SessionContext;

use super::client::ApiClient;

/// Full conversation payload, normalized.
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    pub messages: Vec<Message>,
    /// Server ids present in the payload; seeds the per-conversation dedupe
    /// set so pushed copies of these messages are dropped.
    pub seen_ids: Vec<MessageId>,
    /// AI flag from the conversation envelope, when the backend includes it.
    pub is_ai_enabled: Option<bool>,
}

/// Fetch the full message log for one conversation.
pub async fn fetch_conversation(
    client: &ApiClient,
    id: &ConversationId,
) -> Result<ConversationHistory> {
    let resp = client
        .get(&format!("/conversations/{}", id), &[])
        .await?;
    let payload: Value = resp.json().await?;
    Ok(normalize_conversation(payload))
}

/// Flip the AI autoresponder for one conversation.
pub async fn toggle_ai(client: &ApiClient, id: &ConversationId, enabled: bool) -> Result<()> {
    let body = serde_json::json!({ "is_ai_enabled": enabled });
    client
        .put(&format!("/conversations/{}/ai-toggle", id), &body)
        .await?;
    Ok(())
}

/// Register the agent as active in the conversation.
pub async fn join_conversation(
    client: &ApiClient,
    session: &SessionContext,
    id: &ConversationId,
) -> Result<()> {
    let body = serde_json::json!({ "agent_id": session.user_id });
    client
        .post(&format!("/conversations/{}/join", id), &body)
        .await?;
    Ok(())
}

/// Remove the agent from the conversation.
pub async fn leave_conversation(
    client: &ApiClient,
    session: &SessionContext,
    id: &ConversationId,
) -> Result<()> {
    let body = serde_json::json!({ "agent_id": session.user_id });
    client
        .post(&format!("/conversations/{}/leave", id), &body)
        .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RawAttachment {
    name: Option<String>,
    size: Option<u64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    mime_type: Option<String>,
}

/// One raw message row. Text and time each have a chain of legacy field
/// names; the first present one wins.
#[derive(Debug, Deserialize)]
struct RawMessage {
    id: Option<MessageId>,
    content: Option<String>,
    text: Option<String>,
    message: Option<String>,
    body: Option<String>,
    created_at: Option<String>,
    timestamp: Option<String>,
    time: Option<String>,
    updated_at: Option<String>,
    sender_type: Option<String>,
    sender: Option<String>,
    #[serde(default)]
    attachments: Vec<RawAttachment>,
}

pub(crate) fn normalize_conversation(payload: Value) -> ConversationHistory {
    let is_ai_enabled = payload
        .get("conversation")
        .and_then(|c| c.get("is_ai_enabled"))
        .and_then(Value::as_bool);

    let rows = match payload {
        Value::Array(rows) => rows,
        Value::Object(mut map) => match map.remove("messages") {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut messages = Vec::with_capacity(rows.len());
    let mut seen_ids = Vec::new();
    for (idx, raw) in rows.into_iter().enumerate() {
        let row: RawMessage = match serde_json::from_value(raw) {
            Ok(row) => row,
            Err(e) => {
                tracing::warn!("Skipping malformed message row: {}", e);
                continue;
            }
        };
        if let Some(id) = &row.id {
            seen_ids.push(id.clone());
        }
        messages.push(message_from_row(row, idx));
    }

    ConversationHistory {
        messages,
        seen_ids,
        is_ai_enabled,
    }
}

fn message_from_row(row: RawMessage, idx: usize) -> Message {
    let text = row
        .content
        .or(row.text)
        .or(row.message)
        .or(row.body)
        .unwrap_or_default();

    let timestamp = row
        .created_at
        .or(row.timestamp)
        .or(row.time)
        .or(row.updated_at)
        .and_then(|s| parse_timestamp(&s));

    // Older rows carry the role in a legacy `sender` field instead.
    let sender_type = row.sender_type.or_else(|| {
        row.sender.map(|s| {
            if s == "agent" {
                "agent".to_string()
            } else {
                "patient".to_string()
            }
        })
    });
    let sender = SenderRole::from_wire(sender_type.as_deref());

    let attachments = row
        .attachments
        .into_iter()
        .map(|a| Attachment {
            name: a.name.unwrap_or_else(|| "attachment".to_string()),
            size: a.size.unwrap_or(0),
            mime_type: a
                .kind
                .or(a.mime_type)
                .unwrap_or_else(|| "application/octet-stream".to_string()),
        })
        .collect();

    Message {
        // Rows without a server id get a positional one; they are display
        // entries only and never enter the dedupe set.
        id: row
            .id
            .unwrap_or_else(|| MessageId::Text(format!("row-{}", idx))),
        text,
        timestamp,
        sender,
        delivery: DeliveryState::Delivered,
        attachments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_bare_array() {
        let history = normalize_conversation(serde_json::json!([
            {"id": 1, "content": "hi", "sender_type": "patient", "created_at": "2024-03-01T10:00:00Z"},
            {"id": 2, "content": "hello", "sender_type": "agent"}
        ]));
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.seen_ids, vec![MessageId::Num(1), MessageId::Num(2)]);
        assert!(history.is_ai_enabled.is_none());
        assert_eq!(history.messages[0].sender, SenderRole::Patient);
        assert!(history.messages[1].is_outbound());
    }

    #[test]
    fn test_normalize_envelope_with_ai_flag() {
        let history = normalize_conversation(serde_json::json!({
            "conversation": {"is_ai_enabled": true},
            "messages": [{"id": "m1", "text": "hey"}]
        }));
        assert_eq!(history.is_ai_enabled, Some(true));
        assert_eq!(history.messages.len(), 1);
        assert_eq!(history.messages[0].text, "hey");
    }

    #[test]
    fn test_text_fallback_chain() {
        let history = normalize_conversation(serde_json::json!([
            {"id": 1, "text": "from-text"},
            {"id": 2, "message": "from-message"},
            {"id": 3, "body": "from-body"},
            {"id": 4}
        ]));
        let texts: Vec<&str> = history.messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["from-text", "from-message", "from-body", ""]);
    }

    #[test]
    fn test_legacy_sender_field() {
        let history = normalize_conversation(serde_json::json!([
            {"id": 1, "sender": "agent"},
            {"id": 2, "sender": "customer"},
            {"id": 3}
        ]));
        assert_eq!(history.messages[0].sender, SenderRole::Agent);
        assert_eq!(history.messages[1].sender, SenderRole::Patient);
        assert_eq!(history.messages[2].sender, SenderRole::Patient);
    }

    #[test]
    fn test_rows_without_id_do_not_seed_dedupe() {
        let history = normalize_conversation(serde_json::json!([
            {"content": "no id"},
            {"id": 5, "content": "with id"}
        ]));
        assert_eq!(history.messages.len(), 2);
        assert_eq!(history.seen_ids, vec![MessageId::Num(5)]);
        assert_eq!(history.messages[0].id, MessageId::Text("row-0".into()));
    }

    #[test]
    fn test_attachment_mapping() {
        let history = normalize_conversation(serde_json::json!([
            {"id": 1, "content": "doc", "attachments": [
                {"name": "report.pdf", "size": 1024, "type": "application/pdf"}
            ]}
        ]));
        let a = &history.messages[0].attachments[0];
        assert_eq!(a.name, "report.pdf");
        assert_eq!(a.size, 1024);
        assert_eq!(a.mime_type, "application/pdf");
    }

    #[test]
    fn test_unexpected_payload_is_empty_history() {
        let history = normalize_conversation(serde_json::json!({"detail": "not found"}));
        assert!(history.messages.is_empty());
        assert!(history.seen_ids.is_empty());
    }
}
