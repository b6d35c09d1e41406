//! Conversation store driver
//!
//! One store serves whichever conversation the host currently shows. It
//! keeps a log cache across switches, owns the per-conversation channel,
//! runs the join/leave choreography, and reconciles optimistic sends
//! against the server with a delayed refetch.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::api::{self, ApiClient, AttachmentUpload};
use crate::error::{ClientError, Result};
use crate::models::{ConversationId, Message, MessageId};
use crate::realtime::{ChannelEvent, ChannelHandle, ConnectionSupervisor, SocketChannel};
use crate::session::SessionContext;

use super::log::{ConversationLog, LogAction};

/// Scroll nudges coalesce over this window so a burst of appends lands as
/// one jump after rendering catches up.
const NUDGE_DEBOUNCE: Duration = Duration::from_millis(100);
/// Delay before the post-send refetch that swaps the optimistic entry for
/// the server copy.
const SEND_RECONCILE_DELAY: Duration = Duration::from_millis(400);

/// State of the active conversation, published after every visible change.
#[derive(Debug, Clone, Default)]
pub struct ConversationSnapshot {
    pub conversation_id: Option<ConversationId>,
    pub messages: Vec<Message>,
    pub is_ai_enabled: bool,
    /// Last fetch error for this conversation; the previous messages are
    /// kept alongside it.
    pub last_error: Option<String>,
}

/// Cancel-previous scheduler for delayed one-shot side effects.
#[derive(Debug, Default)]
struct Debounce {
    pending: Option<JoinHandle<()>>,
}

impl Debounce {
    /// Run `effect` after `delay`, dropping any schedule that has not fired
    /// yet.
    fn schedule<F>(&mut self, delay: Duration, effect: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        self.pending = Some(tokio::spawn(async move {
            time::sleep(delay).await;
            effect.await;
        }));
    }

    fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

struct StoreState {
    active: Option<ConversationId>,
    cache: HashMap<ConversationId, ConversationLog>,
    /// Conversation we have POSTed a join for and not yet left.
    joined: Option<ConversationId>,
    channel: Option<ChannelHandle>,
    nudge: Debounce,
    reconcile: Debounce,
}

struct Inner {
    api: Arc<ApiClient>,
    session: SessionContext,
    ws_base: String,
    supervisor: Arc<ConnectionSupervisor>,
    state: Mutex<StoreState>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
    nudge_tx: watch::Sender<u64>,
}

impl Inner {
    // The lock is only ever held for short synchronous sections, never
    // across an await; a poisoned guard is still usable.
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Driver for the currently open conversation.
///
/// Cheap to clone; clones share the same state and channels. Background
/// tasks hold only weak references, so dropping the last clone tears the
/// channel down.
#[derive(Clone)]
pub struct ConversationStore {
    inner: Arc<Inner>,
}

impl ConversationStore {
    pub fn new(
        api: Arc<ApiClient>,
        session: SessionContext,
        supervisor: Arc<ConnectionSupervisor>,
        ws_base: String,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(ConversationSnapshot::default());
        let (nudge_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                api,
                session,
                ws_base,
                supervisor,
                state: Mutex::new(StoreState {
                    active: None,
                    cache: HashMap::new(),
                    joined: None,
                    channel: None,
                    nudge: Debounce::default(),
                    reconcile: Debounce::default(),
                }),
                snapshot_tx,
                nudge_tx,
            }),
        }
    }

    /// Watch snapshots of the active conversation.
    pub fn snapshots(&self) -> watch::Receiver<ConversationSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Watch the scroll nudge counter. Each increment means "the visible
    /// tail changed, follow it"; increments are debounced.
    pub fn scroll_nudges(&self) -> watch::Receiver<u64> {
        self.inner.nudge_tx.subscribe()
    }

    /// Make `id` the active conversation: leave the previous one, move its
    /// channel over, join, and fetch the full log.
    ///
    /// The cached log (if any) is published immediately so the switch
    /// renders without waiting on the fetch.
    pub async fn switch_to(&self, id: ConversationId) -> Result<()> {
        let inner = &self.inner;

        let (old_channel, old_joined) = {
            let mut state = inner.state();
            state.reconcile.cancel();
            (state.channel.take(), state.joined.take())
        };
        if let Some(old_id) = old_joined {
            if let Err(err) = api::leave_conversation(&inner.api, &inner.session, &old_id).await {
                tracing::warn!(conversation = %old_id, "Leave failed: {}", err);
            }
        }
        if let Some(channel) = old_channel {
            channel.dispose();
        }

        {
            let mut state = inner.state();
            state.cache.entry(id.clone()).or_default();
            state.active = Some(id.clone());
        }
        publish_active(inner, None);
        schedule_nudge(inner);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let url = inner.session.conversation_ws_url(&inner.ws_base, &id);
        let channel = SocketChannel::open(url, &inner.supervisor, events_tx)?;
        inner.state().channel = Some(channel);
        tokio::spawn(drain_channel(Arc::downgrade(inner), id.clone(), events_rx));

        // Join so the backend routes agent presence our way. Not fatal if
        // it fails; the fetch and the channel still work.
        match api::join_conversation(&inner.api, &inner.session, &id).await {
            Ok(()) => inner.state().joined = Some(id.clone()),
            Err(err) => tracing::warn!(conversation = %id, "Join failed: {}", err),
        }

        load_full(inner, &id).await;
        Ok(())
    }

    /// Send a text message.
    ///
    /// The message appears immediately as pending; on success a delayed
    /// refetch swaps in the server copy, on failure it is marked failed and
    /// kept visible, and the error is returned.
    pub async fn send_text(&self, text: &str) -> Result<()> {
        let inner = &self.inner;
        let (id, temp_id) = append_outgoing(inner, Message::outgoing(text.to_string()))?;

        match api::send_message(&inner.api, &inner.session, &id, text).await {
            Ok(()) => {
                schedule_reconcile(inner, id);
                Ok(())
            }
            Err(err) => {
                mark_send_failed(inner, &id, &temp_id);
                Err(err)
            }
        }
    }

    /// Send a file with an optional caption.
    pub async fn send_attachment(&self, upload: AttachmentUpload) -> Result<()> {
        let inner = &self.inner;
        let message = Message::outgoing_attachment(upload.display_text(), upload.as_attachment());
        let (id, temp_id) = append_outgoing(inner, message)?;

        match api::send_attachment(&inner.api, &inner.session, &id, &upload).await {
            Ok(()) => {
                schedule_reconcile(inner, id);
                Ok(())
            }
            Err(err) => {
                mark_send_failed(inner, &id, &temp_id);
                Err(err)
            }
        }
    }

    /// Flip the AI assistant for the active conversation. The local flag
    /// and the notice in the log change only after the server accepts.
    pub async fn set_ai_enabled(&self, enabled: bool) -> Result<()> {
        let inner = &self.inner;
        let id = inner
            .state()
            .active
            .clone()
            .ok_or(ClientError::NoActiveConversation)?;

        api::toggle_ai(&inner.api, &id, enabled).await?;

        {
            let mut state = inner.state();
            if let Some(log) = state.cache.get_mut(&id) {
                log.set_ai_enabled(enabled);
                log.append_system(format!(
                    "AI {} for this conversation",
                    if enabled { "enabled" } else { "disabled" }
                ));
            }
        }
        publish_active(inner, None);
        schedule_nudge(inner);
        Ok(())
    }

    /// Drop failed sends from the active log.
    pub fn discard_failed(&self) {
        let inner = &self.inner;
        {
            let mut state = inner.state();
            let Some(id) = state.active.clone() else {
                return;
            };
            if let Some(log) = state.cache.get_mut(&id) {
                log.discard_failed();
            }
        }
        publish_active(inner, None);
    }

    /// Refetch the active conversation now.
    pub async fn refresh(&self) {
        let id = self.inner.state().active.clone();
        if let Some(id) = id {
            load_full(&self.inner, &id).await;
        }
    }

    /// Leave the joined conversation and stop the channel and any pending
    /// delayed work. The log cache survives; a later `switch_to` reuses it.
    pub async fn close(&self) {
        let inner = &self.inner;
        let (channel, joined) = {
            let mut state = inner.state();
            state.active = None;
            state.nudge.cancel();
            state.reconcile.cancel();
            (state.channel.take(), state.joined.take())
        };
        if let Some(joined) = joined {
            if let Err(err) = api::leave_conversation(&inner.api, &inner.session, &joined).await {
                tracing::warn!(conversation = %joined, "Leave failed: {}", err);
            }
        }
        if let Some(channel) = channel {
            channel.dispose();
        }
        publish_active(inner, None);
    }
}

/// Append an optimistic message to the active log and publish.
fn append_outgoing(
    inner: &Arc<Inner>,
    message: Message,
) -> Result<(ConversationId, MessageId)> {
    let temp_id = message.id.clone();
    let id = {
        let mut state = inner.state();
        let Some(id) = state.active.clone() else {
            return Err(ClientError::NoActiveConversation);
        };
        state
            .cache
            .entry(id.clone())
            .or_default()
            .append_optimistic(message);
        id
    };
    publish_active(inner, None);
    schedule_nudge(inner);
    Ok((id, temp_id))
}

fn mark_send_failed(inner: &Arc<Inner>, id: &ConversationId, temp_id: &MessageId) {
    {
        let mut state = inner.state();
        if let Some(log) = state.cache.get_mut(id) {
            log.mark_failed(temp_id);
        }
    }
    publish_active(inner, None);
}

/// Publish the active conversation's current log.
fn publish_active(inner: &Inner, last_error: Option<String>) {
    let snapshot = {
        let state = inner.state();
        match &state.active {
            Some(id) => {
                let log = state.cache.get(id);
                ConversationSnapshot {
                    conversation_id: Some(id.clone()),
                    messages: log.map(|l| l.messages().to_vec()).unwrap_or_default(),
                    is_ai_enabled: log.map(|l| l.is_ai_enabled()).unwrap_or(false),
                    last_error,
                }
            }
            None => ConversationSnapshot {
                last_error,
                ..ConversationSnapshot::default()
            },
        }
    };
    // send_replace stores the value even while no receiver exists; a host
    // that subscribes after the first mutations still reads the current log.
    inner.snapshot_tx.send_replace(snapshot);
}

fn schedule_nudge(inner: &Arc<Inner>) {
    let weak = Arc::downgrade(inner);
    inner.state().nudge.schedule(NUDGE_DEBOUNCE, async move {
        if let Some(inner) = weak.upgrade() {
            inner.nudge_tx.send_modify(|n| *n += 1);
        }
    });
}

/// Schedule the post-send refetch. Single slot: a newer send supersedes an
/// unfired one, so a burst of sends reconciles once.
fn schedule_reconcile(inner: &Arc<Inner>, id: ConversationId) {
    let weak = Arc::downgrade(inner);
    inner
        .state()
        .reconcile
        .schedule(SEND_RECONCILE_DELAY, async move {
            if let Some(inner) = weak.upgrade() {
                load_full(&inner, &id).await;
            }
        });
}

/// Fetch the full log for `id` and seed the cached state from it.
///
/// Skipped while connectivity is gated. On failure the cached log stays and
/// the error lands in the snapshot.
async fn load_full(inner: &Arc<Inner>, id: &ConversationId) {
    if !inner.supervisor.connectivity_allowed() {
        tracing::debug!(conversation = %id, "Skipping fetch; connectivity gated");
        return;
    }
    match api::fetch_conversation(&inner.api, id).await {
        Ok(history) => {
            let is_active = {
                let mut state = inner.state();
                state
                    .cache
                    .entry(id.clone())
                    .or_default()
                    .seed_from_history(history);
                state.active.as_ref() == Some(id)
            };
            if is_active {
                publish_active(inner, None);
                schedule_nudge(inner);
            }
        }
        Err(err) => {
            tracing::warn!(conversation = %id, "Conversation fetch failed: {}", err);
            if inner.state().active.as_ref() == Some(id) {
                publish_active(inner, Some(err.to_string()));
            }
        }
    }
}

/// Apply one conversation channel's events to its cached log. Events keep
/// landing in the cache even after the host switches away; publishing and
/// refetching happen only while the conversation is the active one.
async fn drain_channel(
    inner: Weak<Inner>,
    id: ConversationId,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        match event {
            ChannelEvent::Opened => {
                tracing::debug!(conversation = %id, "Conversation channel open");
            }
            ChannelEvent::Closed => {
                tracing::debug!(conversation = %id, "Conversation channel closed");
            }
            ChannelEvent::Event(event) => {
                let (action, is_active) = {
                    let mut state = inner.state();
                    let action = state
                        .cache
                        .entry(id.clone())
                        .or_default()
                        .apply_inbound(&event);
                    (action, state.active.as_ref() == Some(&id))
                };
                if !is_active || action == LogAction::None {
                    continue;
                }
                publish_active(&inner, None);
                schedule_nudge(&inner);
                if action == LogAction::Refetch {
                    load_full(&inner, &id).await;
                }
            }
        }
    }
}
