//! Inbox reconciliation driver
//!
//! Owns the inbox state, the two push channels that feed it, and the polling
//! fallback that covers the gaps between them.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant};

use crate::api::{self, ApiClient};
use crate::error::Result;
use crate::models::ConversationSummary;
use crate::realtime::{ChannelEvent, ChannelHandle, ConnectionSupervisor, SocketChannel};
use crate::session::SessionContext;

use super::state::{InboxAction, InboxState};

/// Polling cadence while no inbox channel is open.
const POLL_PERIOD: Duration = Duration::from_millis(5_000);

/// Inbox list snapshot published to the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct InboxSnapshot {
    pub items: Vec<ConversationSummary>,
    /// True while at least one inbox channel is open; false while the
    /// reconciler is covering with polls.
    pub live: bool,
    /// Last fetch error, kept alongside the previous good list.
    pub last_error: Option<String>,
}

/// Handle to the running reconciler.
///
/// Subscribes to both the department-scoped and the tenant-wide inbox
/// channel; their events funnel into one loop so duplicates collapse
/// against the same state.
pub struct InboxReconciler {
    snapshot_rx: watch::Receiver<InboxSnapshot>,
    shutdown_tx: watch::Sender<bool>,
    dept_channel: ChannelHandle,
    tenant_channel: ChannelHandle,
}

impl InboxReconciler {
    /// Open the inbox channels and spawn the merge/poll loop.
    pub fn spawn(
        api: Arc<ApiClient>,
        session: SessionContext,
        supervisor: &ConnectionSupervisor,
        ws_base: &str,
    ) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let dept_channel = SocketChannel::open(
            session.department_inbox_ws_url(ws_base),
            supervisor,
            events_tx.clone(),
        )?;
        let tenant_channel = SocketChannel::open(
            session.tenant_inbox_ws_url(ws_base),
            supervisor,
            events_tx,
        )?;

        let (snapshot_tx, snapshot_rx) = watch::channel(InboxSnapshot::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run_reconciler(
            api,
            session,
            supervisor.watch(),
            events_rx,
            snapshot_tx,
            shutdown_rx,
        ));

        Ok(Self {
            snapshot_rx,
            shutdown_tx,
            dept_channel,
            tenant_channel,
        })
    }

    /// Watch list snapshots; the receiver wakes on every published change.
    pub fn snapshots(&self) -> watch::Receiver<InboxSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Stop the loop and both channels. Idempotent; dropping the handle
    /// does the same.
    pub fn dispose(&self) {
        let _ = self.shutdown_tx.send(true);
        self.dept_channel.dispose();
        self.tenant_channel.dispose();
    }
}

async fn run_reconciler(
    api: Arc<ApiClient>,
    session: SessionContext,
    mut allowed: watch::Receiver<bool>,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
    snapshots: watch::Sender<InboxSnapshot>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut state = InboxState::new();
    let mut open_channels: usize = 0;
    let mut last_error: Option<String> = None;

    let mut poll = time::interval_at(Instant::now() + POLL_PERIOD, POLL_PERIOD);
    poll.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    let mut was_polling = false;

    // Initial fetch as soon as connectivity permits; until then the list
    // stays empty and the gate arm below catches up.
    if *allowed.borrow() {
        refetch(&api, &session, &mut state, &mut last_error).await;
        publish(&snapshots, &state, open_channels, &last_error);
    }

    loop {
        if *shutdown.borrow() {
            break;
        }

        let polling = open_channels == 0 && *allowed.borrow();
        if polling && !was_polling {
            // Fresh timer on each entry into polling mode, so the first
            // poll lands a full period after the channels dropped.
            poll = time::interval_at(Instant::now() + POLL_PERIOD, POLL_PERIOD);
            poll.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        }
        was_polling = polling;

        tokio::select! {
            event = events.recv() => {
                match event {
                    // Both channel tasks are gone; nothing can feed us.
                    None => break,
                    Some(ChannelEvent::Opened) => {
                        open_channels += 1;
                        tracing::info!(open_channels, "Inbox channel open; polling paused");
                        publish(&snapshots, &state, open_channels, &last_error);
                    }
                    Some(ChannelEvent::Closed) => {
                        open_channels = open_channels.saturating_sub(1);
                        tracing::info!(open_channels, "Inbox channel closed");
                        publish(&snapshots, &state, open_channels, &last_error);
                    }
                    Some(ChannelEvent::Event(event)) => {
                        if state.apply(&event) == InboxAction::Refetch {
                            refetch(&api, &session, &mut state, &mut last_error).await;
                        }
                        publish(&snapshots, &state, open_channels, &last_error);
                    }
                }
            }
            _ = poll.tick(), if polling => {
                tracing::debug!("Polling inbox; no live channel");
                refetch(&api, &session, &mut state, &mut last_error).await;
                publish(&snapshots, &state, open_channels, &last_error);
            }
            res = allowed.changed() => {
                if res.is_err() {
                    break;
                }
                if *allowed.borrow() {
                    // Gate reopened: fetch now instead of waiting out a
                    // poll period.
                    refetch(&api, &session, &mut state, &mut last_error).await;
                    publish(&snapshots, &state, open_channels, &last_error);
                }
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Inbox reconciler stopped");
}

/// Fetch the list; on failure keep the previous good list and record the
/// error for the snapshot.
async fn refetch(
    api: &ApiClient,
    session: &SessionContext,
    state: &mut InboxState,
    last_error: &mut Option<String>,
) {
    match api::fetch_inbox(api, session).await {
        Ok(items) => {
            state.replace_all(items);
            *last_error = None;
        }
        Err(err) => {
            tracing::warn!("Inbox fetch failed: {}", err);
            *last_error = Some(err.to_string());
        }
    }
}

fn publish(
    snapshots: &watch::Sender<InboxSnapshot>,
    state: &InboxState,
    open_channels: usize,
    last_error: &Option<String>,
) {
    let _ = snapshots.send(InboxSnapshot {
        items: state.items().to_vec(),
        live: open_channels > 0,
        last_error: last_error.clone(),
    });
}
