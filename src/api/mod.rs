//! HTTP API for the Wadesk CRM backend
//!
//! Thin data-returning operations over [`client::ApiClient`]. Presentation
//! (and error display) stays with the caller.

pub mod chat;
pub mod client;
pub mod conversation;
pub mod inbox;

pub use chat::{send_attachment, send_message, AttachmentUpload};
pub use client::ApiClient;
pub use conversation::{
    fetch_conversation, join_conversation, leave_conversation, toggle_ai, ConversationHistory,
};
pub use inbox::fetch_inbox;
