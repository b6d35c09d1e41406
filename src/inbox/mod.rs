//! Inbox list reconciliation
//!
//! [`InboxState`] is the pure merge/patch/sort core; [`InboxReconciler`]
//! drives it from the push channels with a polling fallback and publishes
//! [`InboxSnapshot`]s.

mod reconciler;
mod state;

pub use reconciler::{InboxReconciler, InboxSnapshot};
pub use state::{InboxAction, InboxState};
