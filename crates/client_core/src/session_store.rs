use std::sync::{Arc, Weak};

use async_trait::async_trait;
use shared::{
    domain::{Session, UserProfile},
    protocol::LoginResult,
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use crate::{
    backend::EventBackend,
    cache::CacheLayer,
    connectivity::{
        ConnectivityHandler, ConnectivityMonitor, ConnectivitySignal, ConnectivityTransition,
    },
    error::ClientError,
    event_store::EventStore,
    session_persistence::PersistentSessionStore,
    ClientEvent,
};

#[derive(Default)]
struct SessionState {
    session: Option<Session>,
    offline: bool,
}

/// Authentication and connectivity state. Drives collection refreshes on
/// login and on reconnect.
pub struct SessionStore {
    backend: Arc<dyn EventBackend>,
    persistence: PersistentSessionStore,
    event_store: Arc<EventStore>,
    cache: Arc<CacheLayer>,
    inner: RwLock<SessionState>,
    monitor: Mutex<Option<ConnectivityMonitor>>,
    events: broadcast::Sender<ClientEvent>,
}

impl SessionStore {
    /// Restores any still-valid persisted session and starts watching the
    /// connectivity signal, if there is one.
    pub async fn init(
        backend: Arc<dyn EventBackend>,
        persistence: PersistentSessionStore,
        event_store: Arc<EventStore>,
        cache: Arc<CacheLayer>,
        events: broadcast::Sender<ClientEvent>,
        connectivity: Option<ConnectivitySignal>,
    ) -> Result<Arc<Self>, ClientError> {
        let session = persistence.load().await?;
        if let Some(session) = &session {
            info!(user = %session.user.name, "restored persisted session");
        }

        let store = Arc::new(Self {
            backend,
            persistence,
            event_store,
            cache,
            inner: RwLock::new(SessionState {
                session,
                offline: false,
            }),
            monitor: Mutex::new(None),
            events,
        });

        let handler = Arc::new(SessionConnectivityHandler {
            store: Arc::downgrade(&store),
        });
        let monitor = ConnectivityMonitor::attach(connectivity, handler);
        store.inner.write().await.offline = monitor.offline();
        *store.monitor.lock().await = Some(monitor);

        Ok(store)
    }

    pub async fn session(&self) -> Option<Session> {
        self.inner.read().await.session.clone()
    }

    pub async fn user(&self) -> Option<UserProfile> {
        self.inner
            .read()
            .await
            .session
            .as_ref()
            .map(|session| session.user.clone())
    }

    pub async fn logged_in(&self) -> bool {
        self.inner.read().await.session.is_some()
    }

    pub async fn offline(&self) -> bool {
        self.inner.read().await.offline
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Waits for the connectivity signal to close and all of its transitions
    /// to be handled.
    pub async fn connectivity_closed(&self) {
        let monitor = self.monitor.lock().await.take();
        if let Some(monitor) = monitor {
            monitor.join().await;
        }
    }

    /// Rejected credentials and unreachable servers come back as a failed
    /// `LoginResult`; the session is left untouched in that case.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResult, ClientError> {
        let result = match self.backend.login(username, password).await {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "login request failed");
                return Ok(LoginResult::failure("Login failed", err.to_string()));
            }
        };
        if result.error {
            info!(username, "login rejected");
            return Ok(result);
        }

        let user = self.backend.current_user().await?;
        let session = Session::new(self.persistence.now(), user);
        self.persistence.save(&session).await?;

        let profile = session.user.clone();
        self.inner.write().await.session = Some(session);
        info!(user = %profile.name, "logged in");
        let _ = self.events.send(ClientEvent::SessionChanged(Some(profile)));

        self.event_store.revalidate().await;
        Ok(result)
    }

    /// Ends the session and resets every store to its initial state. Local
    /// teardown happens even when the remote logout fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let remote = self.backend.logout().await;
        if let Err(err) = &remote {
            warn!(error = %err, "remote logout failed; tearing down local state anyway");
        }
        let persisted = self.persistence.clear().await;

        let had_session = self.inner.write().await.session.take().is_some();
        if had_session {
            let _ = self.events.send(ClientEvent::SessionChanged(None));
        }
        self.cache.clear().await;
        self.event_store.reset().await;
        let _ = self.events.send(ClientEvent::TeardownRequested);
        info!("logged out");

        persisted?;
        remote?;
        Ok(())
    }

    async fn handle_transition(&self, transition: ConnectivityTransition) {
        self.inner.write().await.offline = transition.next_offline;
        let _ = self.events.send(ClientEvent::ConnectivityChanged {
            offline: transition.next_offline,
        });
        if transition.is_reconnect() {
            info!("back online; refreshing events");
            self.event_store.revalidate().await;
        }
    }
}

struct SessionConnectivityHandler {
    store: Weak<SessionStore>,
}

#[async_trait]
impl ConnectivityHandler for SessionConnectivityHandler {
    async fn on_transition(&self, transition: ConnectivityTransition) {
        if let Some(store) = self.store.upgrade() {
            store.handle_transition(transition).await;
        }
    }
}

#[cfg(test)]
#[path = "tests/session_store_tests.rs"]
mod tests;
