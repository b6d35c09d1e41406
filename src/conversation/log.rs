//! Pure per-conversation log state
//!
//! Append-only between fetches: a fetch replaces the log wholesale,
//! everything else appends to the tail. Dedupe for pushed messages is a
//! capped seen-id set, seeded from each fetch.

use std::collections::{HashSet, VecDeque};

use crate::api::ConversationHistory;
use crate::models::{
    parse_timestamp, DeliveryState, InboundEvent, Message, MessageId, SenderRole,
};

/// Cap on remembered server ids per conversation. Past this, the oldest ids
/// are forgotten and a very late redelivery could surface twice.
const SEEN_CAP: usize = 4096;

/// Insertion-ordered id set with eviction at [`SEEN_CAP`].
#[derive(Debug, Default)]
struct SeenIds {
    set: HashSet<MessageId>,
    order: VecDeque<MessageId>,
}

impl SeenIds {
    /// Insert an id, returning false when it was already present.
    fn insert(&mut self, id: MessageId) -> bool {
        if !self.set.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        while self.order.len() > SEEN_CAP {
            if let Some(evicted) = self.order.pop_front() {
                self.set.remove(&evicted);
            }
        }
        true
    }
}

/// What the driver must do after an event is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogAction {
    /// Duplicate or irrelevant; nothing changed.
    None,
    /// The tail changed; publish and nudge the scroll position.
    Appended,
    /// The tail changed and server-side conversation state may have too;
    /// publish, nudge, and refetch the full log.
    Refetch,
}

/// One conversation's message log plus its AI flag.
#[derive(Debug, Default)]
pub struct ConversationLog {
    messages: Vec<Message>,
    seen: SeenIds,
    is_ai_enabled: bool,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_ai_enabled(&self) -> bool {
        self.is_ai_enabled
    }

    pub fn set_ai_enabled(&mut self, enabled: bool) {
        self.is_ai_enabled = enabled;
    }

    /// Replace the log with a fetch result.
    ///
    /// Failed sends are carried over to the tail so the agent can still see
    /// and discard them; pending sends are dropped because the fetch is the
    /// authoritative answer to whether they arrived.
    pub fn seed_from_history(&mut self, history: ConversationHistory) {
        let failed: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.delivery == DeliveryState::Failed)
            .cloned()
            .collect();
        self.messages = history.messages;
        self.messages.extend(failed);
        for id in history.seen_ids {
            self.seen.insert(id);
        }
        if let Some(enabled) = history.is_ai_enabled {
            self.is_ai_enabled = enabled;
        }
    }

    /// Append an optimistic outgoing message.
    pub fn append_optimistic(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a locally synthesized system notice.
    pub fn append_system(&mut self, text: String) {
        self.messages.push(Message::system(text));
    }

    /// Mark an optimistic entry failed after its send call errored.
    pub fn mark_failed(&mut self, id: &MessageId) {
        if let Some(m) = self.messages.iter_mut().find(|m| &m.id == id) {
            m.delivery = DeliveryState::Failed;
        }
    }

    /// Drop failed entries the agent no longer wants to see.
    pub fn discard_failed(&mut self) {
        self.messages.retain(|m| m.delivery != DeliveryState::Failed);
    }

    /// Apply one event from this conversation's channel.
    pub fn apply_inbound(&mut self, event: &InboundEvent) -> LogAction {
        match event {
            InboundEvent::Message {
                message_id,
                content,
                timestamp,
                sender_type,
            } => {
                if let Some(id) = message_id {
                    if !self.seen.insert(id.clone()) {
                        // Redelivery, or our own send echoed back after the
                        // reconciling fetch already picked it up.
                        return LogAction::None;
                    }
                }
                let id = message_id.clone().unwrap_or_else(|| {
                    MessageId::Text(format!("recv-{}", uuid::Uuid::new_v4()))
                });
                self.messages.push(Message {
                    id,
                    text: content.clone().unwrap_or_default(),
                    timestamp: timestamp.as_deref().and_then(parse_timestamp),
                    sender: SenderRole::from_wire(sender_type.as_deref()),
                    delivery: DeliveryState::Delivered,
                    attachments: Vec::new(),
                });
                LogAction::Appended
            }

            InboundEvent::AgentJoined { user_id } => {
                self.append_system(match user_id {
                    Some(id) => format!("Agent {} joined", id),
                    None => "Agent joined".into(),
                });
                LogAction::Refetch
            }
            InboundEvent::AgentLeft { user_id } => {
                self.append_system(match user_id {
                    Some(id) => format!("Agent {} left", id),
                    None => "Agent left".into(),
                });
                LogAction::Refetch
            }
            InboundEvent::ConversationAssigned {
                agent_id,
                agent_name,
            } => {
                let who = agent_name
                    .clone()
                    .filter(|s| !s.is_empty())
                    .or_else(|| agent_id.as_ref().map(|id| id.to_string()));
                self.append_system(match who {
                    Some(who) => format!("Conversation assigned to {}", who),
                    None => "Conversation assigned".into(),
                });
                LogAction::Refetch
            }
            InboundEvent::ConversationUnassigned => {
                self.append_system("Conversation unassigned".into());
                LogAction::Refetch
            }

            // Inbox-level events do not arrive on a conversation channel,
            // and unknown types are ignored.
            _ => LogAction::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActorId;

    fn pushed(id: Option<i64>, text: &str) -> InboundEvent {
        InboundEvent::Message {
            message_id: id.map(MessageId::Num),
            content: Some(text.into()),
            timestamp: Some("2024-03-01T10:00:00Z".into()),
            sender_type: Some("patient".into()),
        }
    }

    fn history(messages: Vec<Message>, seen: Vec<i64>) -> ConversationHistory {
        ConversationHistory {
            messages,
            seen_ids: seen.into_iter().map(MessageId::Num).collect(),
            is_ai_enabled: None,
        }
    }

    #[test]
    fn test_pushed_message_appends_once() {
        let mut log = ConversationLog::new();
        assert_eq!(log.apply_inbound(&pushed(Some(1), "hi")), LogAction::Appended);
        assert_eq!(log.apply_inbound(&pushed(Some(1), "hi")), LogAction::None);
        assert_eq!(log.messages().len(), 1);
        assert_eq!(log.messages()[0].text, "hi");
        assert_eq!(log.messages()[0].sender, SenderRole::Patient);
    }

    #[test]
    fn test_pushed_message_without_id_always_appends() {
        let mut log = ConversationLog::new();
        assert_eq!(log.apply_inbound(&pushed(None, "a")), LogAction::Appended);
        assert_eq!(log.apply_inbound(&pushed(None, "a")), LogAction::Appended);
        assert_eq!(log.messages().len(), 2);
        assert_ne!(log.messages()[0].id, log.messages()[1].id);
    }

    #[test]
    fn test_seed_marks_fetched_ids_seen() {
        let mut log = ConversationLog::new();
        log.seed_from_history(history(vec![], vec![7]));
        assert_eq!(log.apply_inbound(&pushed(Some(7), "echo")), LogAction::None);
        assert!(log.messages().is_empty());
    }

    #[test]
    fn test_seed_preserves_failed_and_drops_pending() {
        let mut log = ConversationLog::new();
        let failed = Message::outgoing("never made it".into());
        let failed_id = failed.id.clone();
        log.append_optimistic(failed);
        log.mark_failed(&failed_id);
        log.append_optimistic(Message::outgoing("in flight".into()));

        let mut server = Message::outgoing("made it".into());
        server.id = MessageId::Num(1);
        server.delivery = DeliveryState::Delivered;
        log.seed_from_history(history(vec![server], vec![1]));

        let texts: Vec<&str> = log.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["made it", "never made it"]);
        assert_eq!(log.messages()[1].delivery, DeliveryState::Failed);
    }

    #[test]
    fn test_discard_failed_removes_only_failed() {
        let mut log = ConversationLog::new();
        let bad = Message::outgoing("bad".into());
        let bad_id = bad.id.clone();
        log.append_optimistic(bad);
        log.mark_failed(&bad_id);
        log.append_optimistic(Message::outgoing("good".into()));

        log.discard_failed();
        let texts: Vec<&str> = log.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["good"]);
    }

    #[test]
    fn test_agent_joined_appends_notice_and_requests_refetch() {
        let mut log = ConversationLog::new();
        let action = log.apply_inbound(&InboundEvent::AgentJoined {
            user_id: Some(ActorId::Num(42)),
        });
        assert_eq!(action, LogAction::Refetch);
        assert_eq!(log.messages()[0].text, "Agent 42 joined");
        assert_eq!(log.messages()[0].sender, SenderRole::System);
    }

    #[test]
    fn test_assignment_prefers_agent_name_over_id() {
        let mut log = ConversationLog::new();
        log.apply_inbound(&InboundEvent::ConversationAssigned {
            agent_id: Some(ActorId::Num(7)),
            agent_name: Some("Alice".into()),
        });
        log.apply_inbound(&InboundEvent::ConversationAssigned {
            agent_id: Some(ActorId::Num(7)),
            agent_name: None,
        });
        log.apply_inbound(&InboundEvent::ConversationUnassigned);

        let texts: Vec<&str> = log.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            texts,
            [
                "Conversation assigned to Alice",
                "Conversation assigned to 7",
                "Conversation unassigned",
            ]
        );
    }

    #[test]
    fn test_ai_flag_follows_history_when_present() {
        let mut log = ConversationLog::new();
        log.set_ai_enabled(true);

        log.seed_from_history(history(vec![], vec![]));
        assert!(log.is_ai_enabled());

        let mut h = history(vec![], vec![]);
        h.is_ai_enabled = Some(false);
        log.seed_from_history(h);
        assert!(!log.is_ai_enabled());
    }

    #[test]
    fn test_inbox_level_and_unknown_events_ignored() {
        let mut log = ConversationLog::new();
        assert_eq!(
            log.apply_inbound(&InboundEvent::ConversationCreated),
            LogAction::None
        );
        assert_eq!(log.apply_inbound(&InboundEvent::Unknown), LogAction::None);
        assert!(log.messages().is_empty());
    }

    #[test]
    fn test_seen_cap_evicts_oldest_ids() {
        let mut log = ConversationLog::new();
        for i in 0..=(SEEN_CAP as i64) {
            log.apply_inbound(&pushed(Some(i), "m"));
        }
        // Id 0 was evicted when the cap overflowed, so its redelivery lands.
        assert_eq!(log.apply_inbound(&pushed(Some(0), "again")), LogAction::Appended);
        // The newest id is still remembered.
        assert_eq!(
            log.apply_inbound(&pushed(Some(SEEN_CAP as i64), "again")),
            LogAction::None
        );
    }
}
