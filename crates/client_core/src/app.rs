use std::sync::Arc;

use storage::{KeyValueStore, Storage};
use tokio::{
    sync::{broadcast, Mutex, RwLock},
    task::JoinHandle,
};
use tracing::info;

use crate::{
    backend::EventBackend,
    cache::CacheLayer,
    config::ClientSettings,
    connectivity::{connectivity_channel, spawn_connectivity_probe, ConnectivitySignal},
    error::ClientError,
    event_bus,
    event_store::EventStore,
    grid::EventGridSource,
    http_backend::HttpEventBackend,
    session_persistence::{Clock, PersistentSessionStore, SystemClock},
    session_store::SessionStore,
    ClientEvent,
};

/// Where the router currently is, as reported by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterLocation {
    pub route_path: Option<String>,
    pub route_title: Option<String>,
    pub pathname: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Default)]
struct NavigationState {
    location: String,
    current_view_title: String,
}

/// Composition root: owns every store for the lifetime of the client.
pub struct AppStore {
    application_name: String,
    backend: Arc<dyn EventBackend>,
    cache: Arc<CacheLayer>,
    event_store: Arc<EventStore>,
    session_store: Arc<SessionStore>,
    navigation: RwLock<NavigationState>,
    probe: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<ClientEvent>,
}

impl AppStore {
    pub async fn new(
        settings: &ClientSettings,
        backend: Arc<dyn EventBackend>,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        connectivity: Option<ConnectivitySignal>,
    ) -> Result<Arc<Self>, ClientError> {
        let events = event_bus();
        let cache = Arc::new(CacheLayer::new(settings.cache_policy, settings.cache_ttl()));
        let event_store = Arc::new(EventStore::new(
            Arc::clone(&backend),
            Arc::clone(&cache),
            settings.refresh_ordering,
            events.clone(),
        ));
        let persistence = PersistentSessionStore::new(storage, settings.session_validity(), clock);
        let session_store = SessionStore::init(
            Arc::clone(&backend),
            persistence,
            Arc::clone(&event_store),
            Arc::clone(&cache),
            events.clone(),
            connectivity,
        )
        .await?;

        event_store.refresh().await;

        Ok(Arc::new(Self {
            application_name: settings.application_name.clone(),
            backend,
            cache,
            event_store,
            session_store,
            navigation: RwLock::new(NavigationState::default()),
            probe: Mutex::new(None),
            events,
        }))
    }

    /// Wires the HTTP backend, sqlite session storage and, when configured,
    /// a polling connectivity probe.
    pub async fn from_settings(settings: &ClientSettings) -> Result<Arc<Self>, ClientError> {
        let backend: Arc<dyn EventBackend> = Arc::new(HttpEventBackend::new(&settings.server_url)?);
        let storage = Arc::new(Storage::new(&settings.session_database_url).await?);

        let (connectivity, probe) = match settings.connectivity_probe_interval() {
            Some(interval) => {
                let initial_offline = backend
                    .health_check()
                    .await
                    .is_err_and(|err| err.is_transport());
                let (reporter, signal) = connectivity_channel(initial_offline);
                let probe = spawn_connectivity_probe(Arc::clone(&backend), reporter, interval);
                (Some(signal), Some(probe))
            }
            None => (None, None),
        };

        let clock = Arc::new(SystemClock);
        let store = Self::new(settings, backend, storage, clock, connectivity).await?;
        *store.probe.lock().await = probe;
        info!(server_url = %settings.server_url, "client state initialised");
        Ok(store)
    }

    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    pub fn event_store(&self) -> &Arc<EventStore> {
        &self.event_store
    }

    pub fn session_store(&self) -> &Arc<SessionStore> {
        &self.session_store
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    /// A fresh data source for a paged grid view; each mounted view owns one.
    pub fn grid_source(&self) -> EventGridSource {
        EventGridSource::new(Arc::clone(&self.backend), self.events.clone())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn location(&self) -> String {
        self.navigation.read().await.location.clone()
    }

    pub async fn current_view_title(&self) -> String {
        self.navigation.read().await.current_view_title.clone()
    }

    /// Records the location relative to the base path, e.g. "hello" when
    /// viewing "/hello".
    pub async fn set_location(&self, location: RouterLocation) {
        let path = match &location.route_path {
            Some(route_path) => route_path.clone(),
            None => location
                .pathname
                .strip_prefix(location.base_url.as_str())
                .unwrap_or(&location.pathname)
                .to_string(),
        };
        {
            let mut nav = self.navigation.write().await;
            nav.location = path.clone();
            nav.current_view_title = location.route_title.unwrap_or_default();
        }
        let _ = self
            .events
            .send(ClientEvent::NavigationChanged { location: path });
    }

    pub async fn shutdown(&self) {
        if let Some(probe) = self.probe.lock().await.take() {
            probe.abort();
        }
    }
}

impl Drop for AppStore {
    fn drop(&mut self) {
        if let Some(probe) = self.probe.get_mut().take() {
            probe.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
