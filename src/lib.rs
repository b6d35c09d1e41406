//! Client library for the Wadesk CRM realtime chat.
//!
//! The pieces map onto how a host UI consumes them:
//!
//! - [`realtime::ConnectionSupervisor`] gates all connectivity on the
//!   host's visibility, focus, and route.
//! - [`realtime::SocketChannel`] keeps one WebSocket alive, with heartbeat
//!   and reconnect backoff.
//! - [`inbox::InboxReconciler`] maintains the conversation list from push
//!   events, polling only while no channel is open.
//! - [`conversation::ConversationStore`] drives the open conversation:
//!   log, optimistic sends, join/leave, AI toggle.
//!
//! State flows out through `tokio::sync::watch` snapshots; the host renders
//! those and feeds its UI signals back into the supervisor.

pub mod api;
pub mod config;
pub mod conversation;
pub mod error;
pub mod inbox;
pub mod models;
pub mod realtime;
pub mod session;

pub use error::{ClientError, Result};
pub use session::SessionContext;
