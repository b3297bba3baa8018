use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::domain::{Event, Subscriber};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{backend::EventBackend, cache::CacheLayer, error::ClientError, ClientEvent};

pub const EVENTS_CACHE_KEY: &str = "events";

/// How overlapping `refresh()` calls resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshOrdering {
    /// Whichever response arrives last is applied, regardless of issue order.
    #[default]
    LastResolvedWins,
    /// Responses to anything but the most recently issued refresh are dropped.
    LatestIssuedWins,
}

impl FromStr for RefreshOrdering {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "last_resolved_wins" => Ok(Self::LastResolvedWins),
            "latest_issued_wins" => Ok(Self::LatestIssuedWins),
            other => Err(format!("unknown refresh ordering '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied { count: usize },
    Discarded,
}

#[derive(Default)]
struct EventStoreState {
    events: Vec<Event>,
    selected: Option<Event>,
}

/// Observable collection of events plus the single selected event.
pub struct EventStore {
    backend: Arc<dyn EventBackend>,
    cache: Arc<CacheLayer>,
    ordering: RefreshOrdering,
    refresh_seq: AtomicU64,
    inner: RwLock<EventStoreState>,
    events: broadcast::Sender<ClientEvent>,
}

impl EventStore {
    pub fn new(
        backend: Arc<dyn EventBackend>,
        cache: Arc<CacheLayer>,
        ordering: RefreshOrdering,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        Self {
            backend,
            cache,
            ordering,
            refresh_seq: AtomicU64::new(0),
            inner: RwLock::new(EventStoreState::default()),
            events,
        }
    }

    pub async fn events(&self) -> Vec<Event> {
        self.inner.read().await.events.clone()
    }

    pub async fn selected(&self) -> Option<Event> {
        self.inner.read().await.selected.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Fetches the whole collection through the cache and replaces the local
    /// list in one step. Fetch failures degrade to cached data or an empty list.
    pub async fn refresh(&self) -> RefreshOutcome {
        let seq = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let backend = Arc::clone(&self.backend);
        let fetched = self
            .cache
            .cache_or_fetch(
                || async move { backend.find_all_events().await },
                EVENTS_CACHE_KEY,
                Vec::new(),
            )
            .await;
        self.replace(seq, fetched).await
    }

    /// Like `refresh`, but goes to the service even when the collection is
    /// cached. Used after login and on reconnect.
    pub async fn revalidate(&self) -> RefreshOutcome {
        let seq = self.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let backend = Arc::clone(&self.backend);
        let fetched = self
            .cache
            .revalidate(
                || async move { backend.find_all_events().await },
                EVENTS_CACHE_KEY,
                Vec::new(),
            )
            .await;
        self.replace(seq, fetched).await
    }

    async fn replace(&self, seq: u64, fetched: Vec<Event>) -> RefreshOutcome {
        let mut guard = self.inner.write().await;
        if self.ordering == RefreshOrdering::LatestIssuedWins
            && seq != self.refresh_seq.load(Ordering::SeqCst)
        {
            debug!(seq, "discarding superseded refresh response");
            return RefreshOutcome::Discarded;
        }

        let count = fetched.len();
        guard.events = fetched;
        drop(guard);

        debug!(seq, count, "event collection replaced");
        let _ = self.events.send(ClientEvent::EventsReplaced { count });
        RefreshOutcome::Applied { count }
    }

    pub async fn select(&self, event: Event) {
        let id = event.id;
        self.inner.write().await.selected = Some(event);
        let _ = self.events.send(ClientEvent::SelectionChanged(id));
    }

    pub async fn clear_selection(&self) {
        let previous = self.inner.write().await.selected.take();
        if previous.is_some() {
            let _ = self.events.send(ClientEvent::SelectionChanged(None));
        }
    }

    /// Submits a subscription, then re-reads the referenced event and swaps it
    /// into the list in place. The selection is cleared once the submit
    /// succeeds; remote errors are returned to the caller.
    pub async fn apply_subscription(&self, request: Subscriber) -> Result<Subscriber, ClientError> {
        let event_id = request.event.id.ok_or(ClientError::MissingEventId)?;
        let saved = self.backend.subscribe_to(&request).await?;
        info!(event_id = event_id.0, "subscription stored");

        let refreshed = match self.backend.get_event(event_id).await {
            Ok(refreshed) => refreshed,
            Err(err) => {
                self.clear_selection().await;
                return Err(err.into());
            }
        };

        let mut guard = self.inner.write().await;
        let merged = match refreshed {
            Some(updated) => match guard.events.iter_mut().find(|e| e.same_entity(&updated)) {
                Some(slot) => {
                    *slot = updated;
                    true
                }
                None => false,
            },
            None => {
                warn!(event_id = event_id.0, "subscribed event no longer exists");
                false
            }
        };
        guard.selected = None;
        drop(guard);

        let _ = self
            .events
            .send(ClientEvent::SubscriptionApplied { event_id, merged });
        Ok(saved)
    }

    /// Restores the initial empty state.
    pub async fn reset(&self) {
        {
            let mut guard = self.inner.write().await;
            *guard = EventStoreState::default();
        }
        self.cache.invalidate(EVENTS_CACHE_KEY).await;
        let _ = self.events.send(ClientEvent::EventsReplaced { count: 0 });
    }
}

#[cfg(test)]
#[path = "tests/event_store_tests.rs"]
mod tests;
