//! Wire events pushed over the inbox and conversation WebSocket channels

use std::fmt;

use serde::Deserialize;

use super::{ConversationId, MessageId};

/// An agent or user id inside an event payload (numeric or string).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ActorId {
    Num(i64),
    Text(String),
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorId::Num(n) => write!(f, "{}", n),
            ActorId::Text(s) => f.write_str(s),
        }
    }
}

/// Server-pushed event, tagged by `type`.
///
/// Only the fields the client acts on are modeled; serde ignores the rest.
/// An unrecognized `type` decodes to [`InboundEvent::Unknown`] so consumers
/// can skip it without treating the frame as malformed. A frame that fails
/// to decode entirely (bad JSON, missing required id) is dropped and logged
/// by the channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    /// A brand-new conversation exists; the list must be refetched.
    #[serde(rename = "conversation_created")]
    ConversationCreated,

    /// Partial update for one inbox row.
    #[serde(rename = "inbox_updated")]
    InboxUpdated {
        conversation_id: ConversationId,
        #[serde(default)]
        last_message: Option<String>,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        unread_count: Option<u32>,
    },

    /// Assignment change for one inbox row.
    #[serde(rename = "inbox_assignment")]
    InboxAssignment {
        conversation_id: ConversationId,
        #[serde(default)]
        assigned_agent: Option<String>,
    },

    /// New message in the active conversation.
    #[serde(rename = "message")]
    Message {
        /// Absent on some backend paths; dedupe only applies when present.
        #[serde(default)]
        message_id: Option<MessageId>,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        sender_type: Option<String>,
    },

    #[serde(rename = "agent_joined")]
    AgentJoined {
        #[serde(default)]
        user_id: Option<ActorId>,
    },

    #[serde(rename = "agent_left")]
    AgentLeft {
        #[serde(default)]
        user_id: Option<ActorId>,
    },

    #[serde(rename = "conversation_assigned")]
    ConversationAssigned {
        #[serde(default)]
        agent_id: Option<ActorId>,
        #[serde(default)]
        agent_name: Option<String>,
    },

    #[serde(rename = "conversation_unassigned")]
    ConversationUnassigned,

    /// Any event type this client does not handle.
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_inbox_updated() {
        let ev: InboundEvent = serde_json::from_str(
            r#"{"type":"inbox_updated","conversation_id":5,"last_message":"hi","timestamp":"2024-03-01T10:00:00Z","unread_count":2}"#,
        )
        .unwrap();
        match ev {
            InboundEvent::InboxUpdated {
                conversation_id,
                last_message,
                unread_count,
                ..
            } => {
                assert_eq!(conversation_id, ConversationId::Num(5));
                assert_eq!(last_message.as_deref(), Some("hi"));
                assert_eq!(unread_count, Some(2));
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_decode_inbox_updated_partial_fields() {
        let ev: InboundEvent =
            serde_json::from_str(r#"{"type":"inbox_updated","conversation_id":"c9"}"#).unwrap();
        match ev {
            InboundEvent::InboxUpdated {
                last_message,
                timestamp,
                unread_count,
                ..
            } => {
                assert!(last_message.is_none());
                assert!(timestamp.is_none());
                assert!(unread_count.is_none());
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_inbox_updated_without_id_is_malformed() {
        let res: Result<InboundEvent, _> =
            serde_json::from_str(r#"{"type":"inbox_updated","last_message":"hi"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_decode_message_event() {
        let ev: InboundEvent = serde_json::from_str(
            r#"{"type":"message","message_id":"m1","content":"hello","timestamp":"2024-03-01T10:00:00Z","sender_type":"bot"}"#,
        )
        .unwrap();
        match ev {
            InboundEvent::Message {
                message_id,
                content,
                sender_type,
                ..
            } => {
                assert_eq!(message_id, Some(MessageId::Text("m1".into())));
                assert_eq!(content.as_deref(), Some("hello"));
                assert_eq!(sender_type.as_deref(), Some("bot"));
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn test_decode_conversation_created() {
        let ev: InboundEvent =
            serde_json::from_str(r#"{"type":"conversation_created"}"#).unwrap();
        assert!(matches!(ev, InboundEvent::ConversationCreated));
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let ev: InboundEvent =
            serde_json::from_str(r#"{"type":"typing_indicator","user":"x"}"#).unwrap();
        assert!(matches!(ev, InboundEvent::Unknown));
    }

    #[test]
    fn test_actor_id_shapes() {
        let ev: InboundEvent =
            serde_json::from_str(r#"{"type":"agent_joined","user_id":12}"#).unwrap();
        match ev {
            InboundEvent::AgentJoined { user_id } => {
                assert_eq!(user_id.unwrap().to_string(), "12");
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }
}
