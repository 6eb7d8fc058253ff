//! Realtime invalidation.
//!
//! Subscribes to row changes for the signed-in user and turns them into
//! cache invalidations:
//! - `RealtimeBridge` owns the connection state machine and routes events
//! - `QueryCache` holds the cached reads being invalidated
//! - `PhoenixTransport` speaks the hosted database's websocket protocol
//!
//! The bridge never mutates data; it only tells readers to re-read.

pub mod bridge;
pub mod cache;
pub mod memory;
pub mod phoenix;

use serde_json::Value;
use std::future::Future;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

// Re-exports for convenience
pub use bridge::RealtimeBridge;
pub use cache::{QueryCache, QueryKey};
pub use memory::MemoryTransport;
pub use phoenix::PhoenixTransport;

/// Realtime errors
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection closed")]
    Closed,
}

/// Connection lifecycle of the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No subscription active
    Disconnected,
    /// Subscription requested, not yet acknowledged
    Connecting,
    /// Subscription acknowledged, events flowing
    Connected,
    /// Subscription rejected or dropped; settles to `Disconnected`
    Error,
}

/// Tables whose rows for the current user are watched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchedTable {
    DietAccess,
    ActivePlans,
    Profiles,
    Roles,
    Progress,
}

impl WatchedTable {
    pub const ALL: [WatchedTable; 5] = [
        WatchedTable::DietAccess,
        WatchedTable::ActivePlans,
        WatchedTable::Profiles,
        WatchedTable::Roles,
        WatchedTable::Progress,
    ];

    /// Table name in the public schema.
    pub fn table_name(&self) -> &'static str {
        match self {
            WatchedTable::DietAccess => "user_diet_access",
            WatchedTable::ActivePlans => "user_active_plans",
            WatchedTable::Profiles => "profiles",
            WatchedTable::Roles => "user_roles",
            WatchedTable::Progress => "user_progress",
        }
    }

    pub fn from_table_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|table| table.table_name() == name)
    }

    /// Column holding the owning user's id.
    pub fn user_column(&self) -> &'static str {
        match self {
            // Profiles are keyed by the user id itself
            WatchedTable::Profiles => "id",
            _ => "user_id",
        }
    }

    /// Row filter selecting the user's rows.
    pub fn filter(&self, user_id: Uuid) -> String {
        format!("{}=eq.{}", self.user_column(), user_id)
    }

    /// Cache prefixes to drop when a row of this table changes.
    pub fn invalidated_queries(&self, user_id: Uuid) -> Vec<QueryKey> {
        match self {
            WatchedTable::DietAccess => vec![
                QueryKey::new("diet-access"),
                QueryKey::new("user-diets"),
                QueryKey::new("active-plan-access").with(user_id),
            ],
            WatchedTable::ActivePlans => vec![
                QueryKey::new("active-plan"),
                QueryKey::new("active-plan-access"),
                QueryKey::new("all-active-plans"),
            ],
            WatchedTable::Profiles => vec![QueryKey::new("profile")],
            WatchedTable::Roles => vec![QueryKey::new("user-roles")],
            WatchedTable::Progress => vec![QueryKey::new("user-progress")],
        }
    }
}

/// Row operation reported by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// A change to one of the watched rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub table: WatchedTable,
    pub kind: ChangeKind,
    /// New row (old row for deletes)
    pub row: Value,
}

/// Subscription request for one user's channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    pub user_id: Uuid,
    pub tables: Vec<WatchedTable>,
}

impl ChannelSpec {
    /// Channel watching every table for the user.
    pub fn for_user(user_id: Uuid) -> Self {
        Self {
            user_id,
            tables: WatchedTable::ALL.to_vec(),
        }
    }

    pub fn channel_name(&self) -> String {
        format!("user-data-{}", self.user_id)
    }
}

/// Message delivered by a transport to the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// Subscription acknowledged
    Subscribed,
    Change(ChangeEvent),
    /// Subscription rejected or channel failed
    Error(String),
    /// Remote side closed the channel
    Closed,
}

/// Source of channel messages.
///
/// Dropping the returned receiver releases the subscription.
pub trait RealtimeTransport: Send + Sync + 'static {
    fn subscribe(
        &self,
        spec: ChannelSpec,
    ) -> impl Future<Output = Result<mpsc::Receiver<ChannelMessage>, RealtimeError>> + Send;
}

/// Receives every change routed by the bridge.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, user_id: Uuid, event: &ChangeEvent);
}
