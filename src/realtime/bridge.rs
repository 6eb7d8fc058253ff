//! Realtime invalidation bridge.
//!
//! State machine:
//! `Disconnected -> Connecting -> Connected`, with `Error` on a rejected
//! or dropped channel, after which the bridge settles back to
//! `Disconnected`. It never reconnects on its own; callers re-run
//! `connect` (e.g. on the next login or screen mount).

use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{
    ChangeEvent, ChangeKind, ChangeListener, ChannelMessage, ChannelSpec, ConnectionState,
    QueryCache, RealtimeError, RealtimeTransport, WatchedTable,
};
use crate::notify::{Notice, Notifier};

/// State shared with the message pump.
struct Shared {
    state: RwLock<ConnectionState>,
    cache: Arc<QueryCache>,
    notifier: Arc<dyn Notifier>,
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
    state_tx: broadcast::Sender<ConnectionState>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *self
            .state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
        let _ = self.state_tx.send(state);
    }

    fn state(&self) -> ConnectionState {
        *self
            .state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fail(&self, reason: &str) {
        tracing::error!("Realtime channel error: {}", reason);
        self.set_state(ConnectionState::Error);
        self.set_state(ConnectionState::Disconnected);
    }

    fn route(&self, user_id: Uuid, event: &ChangeEvent) {
        tracing::debug!(
            "Realtime {:?} on {}",
            event.kind,
            event.table.table_name()
        );

        for key in event.table.invalidated_queries(user_id) {
            self.cache.invalidate(&key);
        }

        if event.table == WatchedTable::DietAccess && event.kind == ChangeKind::Insert {
            self.notifier
                .notify(Notice::success("New diet unlocked!").with_description("Refreshing..."));
        }

        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in listeners {
            listener.on_change(user_id, event);
        }
    }

    async fn pump(self: Arc<Self>, user_id: Uuid, mut rx: mpsc::Receiver<ChannelMessage>) {
        while let Some(message) = rx.recv().await {
            match message {
                ChannelMessage::Subscribed => {
                    tracing::info!("Realtime subscription active for user {}", user_id);
                    self.set_state(ConnectionState::Connected);
                }
                ChannelMessage::Change(event) => self.route(user_id, &event),
                ChannelMessage::Error(reason) => {
                    self.fail(&reason);
                    return;
                }
                ChannelMessage::Closed => break,
            }
        }

        tracing::info!("Realtime channel closed for user {}", user_id);
        self.set_state(ConnectionState::Disconnected);
    }
}

struct Active {
    user_id: Uuid,
    pump: JoinHandle<()>,
}

/// Routes remote row changes for the signed-in user to cache invalidations.
pub struct RealtimeBridge<T> {
    transport: Arc<T>,
    shared: Arc<Shared>,
    active: Mutex<Option<Active>>,
}

impl<T: RealtimeTransport> RealtimeBridge<T> {
    pub fn new(transport: Arc<T>, cache: Arc<QueryCache>, notifier: Arc<dyn Notifier>) -> Self {
        let (state_tx, _) = broadcast::channel(16);

        Self {
            transport,
            shared: Arc::new(Shared {
                state: RwLock::new(ConnectionState::Disconnected),
                cache,
                notifier,
                listeners: RwLock::new(Vec::new()),
                state_tx,
            }),
            active: Mutex::new(None),
        }
    }

    /// Register a listener for routed changes.
    pub fn add_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Subscribe to state transitions.
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.shared.cache
    }

    fn active(&self) -> std::sync::MutexGuard<'_, Option<Active>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// User whose channel is open (or opening). A channel that ended on
    /// error or close no longer counts.
    pub fn user_id(&self) -> Option<Uuid> {
        self.active()
            .as_ref()
            .filter(|active| !active.pump.is_finished())
            .map(|active| active.user_id)
    }

    /// Open the user's channel, replacing any channel for another user.
    pub async fn connect(&self, user_id: Uuid) -> Result<(), RealtimeError> {
        let already_open = self
            .active()
            .as_ref()
            .map(|active| active.user_id == user_id && !active.pump.is_finished())
            .unwrap_or(false);
        if already_open {
            return Ok(());
        }
        self.disconnect();

        tracing::info!("Setting up realtime subscriptions for user {}", user_id);
        self.shared.set_state(ConnectionState::Connecting);

        let rx = match self.transport.subscribe(ChannelSpec::for_user(user_id)).await {
            Ok(rx) => rx,
            Err(e) => {
                self.shared.fail(&e.to_string());
                return Err(e);
            }
        };

        let pump = tokio::spawn(Arc::clone(&self.shared).pump(user_id, rx));
        *self.active() = Some(Active { user_id, pump });
        Ok(())
    }

    /// Release the subscription and return to `Disconnected`.
    pub fn disconnect(&self) {
        if let Some(active) = self.active().take() {
            tracing::info!("Cleaning up realtime subscriptions for user {}", active.user_id);
            active.pump.abort();
        }
        if self.shared.state() != ConnectionState::Disconnected {
            self.shared.set_state(ConnectionState::Disconnected);
        }
    }
}

impl<T> Drop for RealtimeBridge<T> {
    fn drop(&mut self) {
        if let Some(active) = self
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            active.pump.abort();
        }
    }
}
