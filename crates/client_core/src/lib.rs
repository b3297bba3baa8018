//! Client-side state layer: cache-first reads, session lifecycle,
//! connectivity-aware recovery and paged access to the event service.

use shared::domain::{EventId, UserProfile};
use tokio::sync::broadcast;

pub mod app;
pub mod backend;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod event_store;
pub mod grid;
pub mod http_backend;
pub mod session_persistence;
pub mod session_store;

pub use app::AppStore;
pub use backend::{EventBackend, MissingEventBackend};
pub use cache::{CacheLayer, CachePolicy};
pub use config::{load_settings, ClientSettings};
pub use connectivity::{
    connectivity_channel, spawn_connectivity_probe, ConnectivityHandler, ConnectivityMonitor,
    ConnectivityReporter, ConnectivitySignal, ConnectivityTracker, ConnectivityTransition,
};
pub use error::{BackendError, ClientError};
pub use event_store::{EventStore, RefreshOrdering, RefreshOutcome};
pub use grid::{EventGridSource, GridParams, SelectionOutcome};
pub use http_backend::HttpEventBackend;
pub use session_persistence::{Clock, PersistentSessionStore, SystemClock, SESSION_STORAGE_KEY};
pub use session_store::SessionStore;

const EVENT_BUS_CAPACITY: usize = 1024;

/// State-change notifications for the presentation layer. Each atomic
/// mutation of a store produces exactly one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    EventsReplaced {
        count: usize,
    },
    SelectionChanged(Option<EventId>),
    SubscriptionApplied {
        event_id: EventId,
        merged: bool,
    },
    SessionChanged(Option<UserProfile>),
    ConnectivityChanged {
        offline: bool,
    },
    GridSizeChanged(u64),
    GridInvalidated,
    FormChanged(Option<EventId>),
    NavigationChanged {
        location: String,
    },
    /// Every store has been reset; the presentation layer should remount.
    TeardownRequested,
}

pub fn event_bus() -> broadcast::Sender<ClientEvent> {
    let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
    events
}

#[cfg(test)]
mod test_support;
