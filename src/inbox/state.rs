//! Pure inbox list state: merge, patch, sort
//!
//! No I/O and no timers here; the reconciler drives this from fetch results
//! and channel events and publishes a snapshot after every change.

use std::cmp::Reverse;

use crate::models::{parse_timestamp, ConversationSummary, InboundEvent};

/// What the driver must do after an event is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxAction {
    /// Nothing further; the list (possibly unchanged) is current.
    None,
    /// The event referenced state this page does not have; refetch the list.
    Refetch,
}

/// The reconciled inbox list.
#[derive(Debug, Default)]
pub struct InboxState {
    items: Vec<ConversationSummary>,
}

impl InboxState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[ConversationSummary] {
        &self.items
    }

    /// Replace the whole list with a fetch result and apply the standard
    /// order. A fetch is authoritative: whatever was here before is gone.
    pub fn replace_all(&mut self, items: Vec<ConversationSummary>) {
        self.items = items;
        self.sort();
    }

    /// Apply one channel event to the list.
    pub fn apply(&mut self, event: &InboundEvent) -> InboxAction {
        match event {
            InboundEvent::ConversationCreated => InboxAction::Refetch,

            InboundEvent::InboxUpdated {
                conversation_id,
                last_message,
                timestamp,
                unread_count,
            } => {
                let Some(existing) = self.items.iter_mut().find(|c| &c.id == conversation_id)
                else {
                    // An update for a conversation outside the loaded page.
                    return InboxAction::Refetch;
                };

                // Last write wins on the event timestamp; a missing or
                // unparseable timestamp on either side compares as epoch 0,
                // and ties apply.
                let incoming = timestamp
                    .as_deref()
                    .and_then(parse_timestamp)
                    .map(|t| t.timestamp_millis())
                    .unwrap_or(0);
                if incoming >= existing.last_message_millis() {
                    if last_message.is_some() {
                        existing.last_message = last_message.clone();
                    }
                    if let Some(ts) = timestamp.as_deref().and_then(parse_timestamp) {
                        existing.last_message_at = Some(ts);
                    }
                    if let Some(n) = unread_count {
                        existing.unread_count = *n;
                    }
                    self.sort();
                }
                InboxAction::None
            }

            InboundEvent::InboxAssignment {
                conversation_id,
                assigned_agent,
            } => {
                if let Some(existing) = self.items.iter_mut().find(|c| &c.id == conversation_id) {
                    existing.assigned_agent =
                        assigned_agent.clone().filter(|s| !s.is_empty());
                }
                // In-place patch only; assignment never reorders the list.
                InboxAction::None
            }

            // Chat-level and unknown events are not this component's business.
            _ => InboxAction::None,
        }
    }

    /// Descending by last message time; rows without a timestamp sink to the
    /// bottom. Stable, so equal keys keep their relative order.
    fn sort(&mut self) {
        self.items.sort_by_key(|c| Reverse(c.last_message_millis()));
    }
}
