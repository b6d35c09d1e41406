//! Session identity shared by every API call and channel URL.
//!
//! The web console keeps these identifiers in browser session storage; here
//! the hosting application resolves them once (from config or its own auth
//! layer) and passes the value in at construction time.

use crate::models::ConversationId;

/// Identity of the signed-in agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Tenant the agent belongs to.
    pub tenant_id: String,
    /// Department scope for the inbox.
    pub department_id: String,
    /// Agent user id, sent on joins and outgoing messages.
    pub user_id: String,
}

impl SessionContext {
    pub fn new(tenant_id: String, department_id: String, user_id: String) -> Self {
        Self {
            tenant_id,
            department_id,
            user_id,
        }
    }

    /// Department-scoped inbox channel URL.
    pub fn department_inbox_ws_url(&self, ws_base: &str) -> String {
        format!(
            "{}/inbox/ws?tenant_id={}&department_id={}",
            ws_base, self.tenant_id, self.department_id
        )
    }

    /// Tenant-wide inbox channel URL (no department filter).
    pub fn tenant_inbox_ws_url(&self, ws_base: &str) -> String {
        format!("{}/inbox/ws?tenant_id={}", ws_base, self.tenant_id)
    }

    /// Per-conversation channel URL.
    pub fn conversation_ws_url(&self, ws_base: &str, id: &ConversationId) -> String {
        format!("{}/chat/{}/ws", ws_base, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionContext {
        SessionContext::new("t1".into(), "d2".into(), "u3".into())
    }

    #[test]
    fn test_department_inbox_url() {
        let url = session().department_inbox_ws_url("wss://crm.example.com");
        assert_eq!(url, "wss://crm.example.com/inbox/ws?tenant_id=t1&department_id=d2");
    }

    #[test]
    fn test_tenant_inbox_url_has_no_department() {
        let url = session().tenant_inbox_ws_url("ws://localhost:8000");
        assert_eq!(url, "ws://localhost:8000/inbox/ws?tenant_id=t1");
    }

    #[test]
    fn test_conversation_url_uses_id() {
        let id = ConversationId::from("42");
        let url = session().conversation_ws_url("wss://crm.example.com", &id);
        assert_eq!(url, "wss://crm.example.com/chat/42/ws");
    }
}
