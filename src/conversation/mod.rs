//! Active-conversation state
//!
//! [`ConversationLog`] is the pure append/dedupe core; [`ConversationStore`]
//! drives it: channel lifecycle, join/leave, optimistic sends, and the
//! AI toggle.

mod log;
mod store;

pub use log::{ConversationLog, LogAction};
pub use store::{ConversationSnapshot, ConversationStore};
