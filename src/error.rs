//! Error types for the wadesk client library

use thiserror::Error;

/// Errors surfaced by the inbox and conversation components.
///
/// Background drivers mostly recover on their own (a failed fetch keeps the
/// previous state and reports through the snapshot; channel trouble feeds the
/// reconnect loop without surfacing here), so these are returned mainly by
/// the operations the host invokes directly: sends, toggles, joins.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration is missing or malformed.
    #[error("config error: {0}")]
    Config(String),

    /// HTTP request failed before a response arrived, or the body could not
    /// be read/decoded.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status} for {url}: {body}")]
    Status {
        status: u16,
        url: String,
        body: String,
    },

    /// A send or toggle was invoked with no conversation selected.
    #[error("no active conversation")]
    NoActiveConversation,
}

pub type Result<T> = std::result::Result<T, ClientError>;
