//! Message-level models for the conversation log

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message identifier as the backend sends it (numeric or string).
///
/// Optimistic sends use a client-generated `temp-` id until the server copy
/// arrives; synthetic system messages use a `sys-` id. Neither ever collides
/// with a server id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageId {
    Num(i64),
    Text(String),
}

impl MessageId {
    /// Fresh id for an optimistic (not yet confirmed) message.
    pub fn temp() -> Self {
        MessageId::Text(format!("temp-{}", uuid::Uuid::new_v4()))
    }

    /// Fresh id for a locally synthesized system message.
    pub fn system() -> Self {
        MessageId::Text(format!("sys-{}", uuid::Uuid::new_v4()))
    }

    pub fn is_temp(&self) -> bool {
        matches!(self, MessageId::Text(s) if s.starts_with("temp-"))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageId::Num(n) => write!(f, "{}", n),
            MessageId::Text(s) => f.write_str(s),
        }
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Patient,
    Agent,
    Bot,
    /// Locally synthesized notices (joins, assignments, AI toggles).
    System,
}

impl SenderRole {
    /// Normalize the backend's `sender_type` string.
    ///
    /// `"bot"` maps to Bot, `"agent"` and `"admin"` both map to Agent, and
    /// anything else (including absent) is the patient side.
    pub fn from_wire(sender_type: Option<&str>) -> Self {
        match sender_type {
            Some("bot") => SenderRole::Bot,
            Some("agent") | Some("admin") => SenderRole::Agent,
            _ => SenderRole::Patient,
        }
    }

    /// Whether messages from this role render on the agent's side.
    pub fn is_outbound(self) -> bool {
        matches!(self, SenderRole::Agent | SenderRole::Bot)
    }
}

/// Delivery state of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryState {
    /// Confirmed by the server (fetched or pushed).
    Delivered,
    /// Optimistic entry awaiting reconciliation.
    Pending,
    /// The send call failed; the entry is kept so the agent can see it.
    Failed,
}

/// File attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

/// One entry in a conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub sender: SenderRole,
    pub delivery: DeliveryState,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Optimistic agent-authored text message with a temp id.
    pub fn outgoing(text: String) -> Self {
        Self {
            id: MessageId::temp(),
            text,
            timestamp: Some(Utc::now()),
            sender: SenderRole::Agent,
            delivery: DeliveryState::Pending,
            attachments: Vec::new(),
        }
    }

    /// Optimistic agent-authored attachment message with a temp id.
    pub fn outgoing_attachment(text: String, attachment: Attachment) -> Self {
        Self {
            id: MessageId::temp(),
            text,
            timestamp: Some(Utc::now()),
            sender: SenderRole::Agent,
            delivery: DeliveryState::Pending,
            attachments: vec![attachment],
        }
    }

    /// Locally synthesized system notice.
    pub fn system(text: String) -> Self {
        Self {
            id: MessageId::system(),
            text,
            timestamp: Some(Utc::now()),
            sender: SenderRole::System,
            delivery: DeliveryState::Delivered,
            attachments: Vec::new(),
        }
    }

    pub fn is_outbound(&self) -> bool {
        self.sender.is_outbound()
    }
}
