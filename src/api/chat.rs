//! Outgoing message and attachment sends

use reqwest::multipart::{Form, Part};

use crate::error::Result;
use crate::models::{Attachment, ConversationId};
use crate::session::SessionContext;

use super::client::ApiClient;

/// Outgoing attachment payload.
///
/// File selection and validation stay with the host application; by the time
/// an upload reaches the client the bytes are already in memory.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// Optional caption typed by the agent.
    pub caption: Option<String>,
}

impl AttachmentUpload {
    /// Text for the optimistic log entry: the caption, else `Sent <name>`.
    pub fn display_text(&self) -> String {
        match self.caption.as_deref() {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => format!("Sent {}", self.file_name),
        }
    }

    /// Attachment metadata for the optimistic log entry.
    pub fn as_attachment(&self) -> Attachment {
        Attachment {
            name: self.file_name.clone(),
            size: self.bytes.len() as u64,
            mime_type: self.mime_type.clone(),
        }
    }
}

/// Send a text message authored by the signed-in agent.
pub async fn send_message(
    client: &ApiClient,
    session: &SessionContext,
    conversation_id: &ConversationId,
    text: &str,
) -> Result<()> {
    let body = serde_json::json!({
        "conversation_id": conversation_id,
        "department_id": session.department_id,
        "sender_type": "agent",
        "sender_user_id": session.user_id,
        "tenant_id": session.tenant_id,
        "text": text,
    });
    client.post("/chat/send-message", &body).await?;
    Ok(())
}

/// Send an attachment as a multipart form.
pub async fn send_attachment(
    client: &ApiClient,
    session: &SessionContext,
    conversation_id: &ConversationId,
    upload: &AttachmentUpload,
) -> Result<()> {
    let part = Part::bytes(upload.bytes.clone())
        .file_name(upload.file_name.clone())
        .mime_str(&upload.mime_type)?;

    let form = Form::new()
        .part("file", part)
        .text("conversation_id", conversation_id.to_string())
        .text("tenant_id", session.tenant_id.clone())
        .text("department_id", session.department_id.clone())
        .text("caption", upload.caption.clone().unwrap_or_default())
        .text("sender_user_id", session.user_id.clone())
        .text("sender_type", "agent");

    client.post_multipart("/chat/send-attachment", form).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(caption: Option<&str>) -> AttachmentUpload {
        AttachmentUpload {
            file_name: "scan.pdf".into(),
            mime_type: "application/pdf".into(),
            bytes: vec![0u8; 16],
            caption: caption.map(String::from),
        }
    }

    #[test]
    fn test_display_text_prefers_caption() {
        assert_eq!(upload(Some("here you go")).display_text(), "here you go");
    }

    #[test]
    fn test_display_text_falls_back_to_file_name() {
        assert_eq!(upload(None).display_text(), "Sent scan.pdf");
        assert_eq!(upload(Some("")).display_text(), "Sent scan.pdf");
    }

    #[test]
    fn test_as_attachment_carries_metadata() {
        let a = upload(None).as_attachment();
        assert_eq!(a.name, "scan.pdf");
        assert_eq!(a.size, 16);
        assert_eq!(a.mime_type, "application/pdf");
    }
}
