use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use shared::{
    domain::{Event, EventId, SortOrder, Subscriber, UserProfile},
    error::ErrorCode,
    protocol::LoginResult,
};
use storage::KeyValueStore;
use tokio::sync::{oneshot, Mutex};

use crate::{backend::EventBackend, error::BackendError, session_persistence::Clock};

pub fn event(id: i64, name: &str) -> Event {
    Event {
        id: Some(EventId(id)),
        name: name.to_string(),
        description: format!("{name} description"),
        location: "Kitchen".into(),
        max_attendees: Some(10),
        nb_attendees: Some(0),
        ..Event::default()
    }
}

pub fn profile(name: &str) -> UserProfile {
    UserProfile {
        name: name.to_string(),
        authorities: vec!["ROLE_USER".into()],
    }
}

/// A `find_all_events` response, optionally held back until the gate opens.
pub struct ScriptedFetch {
    pub gate: Option<oneshot::Receiver<()>>,
    pub result: Result<Vec<Event>, BackendError>,
}

impl ScriptedFetch {
    pub fn ok(events: Vec<Event>) -> Self {
        Self {
            gate: None,
            result: Ok(events),
        }
    }

    pub fn failing() -> Self {
        Self {
            gate: None,
            result: Err(BackendError::Transport("connection refused".into())),
        }
    }

    pub fn gated(events: Vec<Event>) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                gate: Some(rx),
                result: Ok(events),
            },
            tx,
        )
    }
}

/// In-memory event service with scripted responses and call counters.
#[derive(Default)]
pub struct TestEventBackend {
    pub find_all_script: Mutex<VecDeque<ScriptedFetch>>,
    /// Served when the script is exhausted.
    pub find_all_default: Mutex<Vec<Event>>,
    pub find_all_calls: AtomicUsize,
    pub stored: Mutex<HashMap<EventId, Event>>,
    pub list_calls: Mutex<Vec<(u64, u32, Vec<SortOrder>)>>,
    pub get_calls: AtomicUsize,
    pub get_unreachable: Mutex<bool>,
    pub count: Mutex<u64>,
    pub subscriptions: Mutex<Vec<Subscriber>>,
    pub fail_subscribe_with: Mutex<Option<String>>,
    pub fail_update_with: Mutex<Option<String>>,
    pub login_result: Mutex<Option<LoginResult>>,
    pub login_unreachable: Mutex<bool>,
    pub logout_calls: AtomicUsize,
    pub fail_logout: Mutex<bool>,
    pub user: Mutex<Option<UserProfile>>,
    pub next_id: AtomicUsize,
}

impl TestEventBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicUsize::new(1000),
            ..Self::default()
        })
    }

    pub async fn script(&self, fetch: ScriptedFetch) {
        self.find_all_script.lock().await.push_back(fetch);
    }

    pub async fn store_event(&self, event: Event) {
        let id = event.id.expect("stored events need an id");
        self.stored.lock().await.insert(id, event);
    }

    pub fn find_all_calls(&self) -> usize {
        self.find_all_calls.load(Ordering::SeqCst)
    }

    pub fn logout_calls(&self) -> usize {
        self.logout_calls.load(Ordering::SeqCst)
    }

    pub async fn wait_for_find_all_calls(&self, expected: usize) {
        while self.find_all_calls() < expected {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl EventBackend for TestEventBackend {
    async fn find_all_events(&self) -> Result<Vec<Event>, BackendError> {
        let scripted = self.find_all_script.lock().await.pop_front();
        self.find_all_calls.fetch_add(1, Ordering::SeqCst);
        match scripted {
            Some(ScriptedFetch { gate, result }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                result
            }
            None => Ok(self.find_all_default.lock().await.clone()),
        }
    }

    async fn list_events(
        &self,
        offset: u64,
        limit: u32,
        sort_orders: &[SortOrder],
    ) -> Result<Vec<Event>, BackendError> {
        self.list_calls
            .lock()
            .await
            .push((offset, limit, sort_orders.to_vec()));
        let stored = self.stored.lock().await;
        let mut events: Vec<Event> = stored.values().cloned().collect();
        events.sort_by_key(|event| event.id.map(|id| id.0));
        Ok(events
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_events(&self) -> Result<u64, BackendError> {
        Ok(*self.count.lock().await)
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>, BackendError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if *self.get_unreachable.lock().await {
            return Err(BackendError::Transport("connection refused".into()));
        }
        Ok(self.stored.lock().await.get(&id).cloned())
    }

    async fn update_event(&self, event: &Event) -> Result<Event, BackendError> {
        if let Some(message) = self.fail_update_with.lock().await.clone() {
            return Err(BackendError::endpoint(ErrorCode::Validation, message));
        }
        let mut saved = event.clone();
        if saved.id.is_none() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
            saved.id = Some(EventId(id));
        }
        self.store_event(saved.clone()).await;
        Ok(saved)
    }

    async fn subscribe_to(&self, subscriber: &Subscriber) -> Result<Subscriber, BackendError> {
        if let Some(message) = self.fail_subscribe_with.lock().await.clone() {
            return Err(BackendError::endpoint(ErrorCode::Validation, message));
        }
        self.subscriptions.lock().await.push(subscriber.clone());
        Ok(subscriber.clone())
    }

    async fn login(&self, _username: &str, _password: &str) -> Result<LoginResult, BackendError> {
        if *self.login_unreachable.lock().await {
            return Err(BackendError::Transport("connection refused".into()));
        }
        Ok(self
            .login_result
            .lock()
            .await
            .clone()
            .unwrap_or_else(|| LoginResult::success(None, Some("/".into()))))
    }

    async fn logout(&self) -> Result<(), BackendError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_logout.lock().await {
            return Err(BackendError::Transport("connection refused".into()));
        }
        Ok(())
    }

    async fn current_user(&self) -> Result<UserProfile, BackendError> {
        self.user
            .lock()
            .await
            .clone()
            .ok_or_else(|| BackendError::endpoint(ErrorCode::Unauthorized, "not logged in"))
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

pub fn fixed_now() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_760_000_000_000).expect("valid timestamp")
}

pub fn thirty_days() -> Duration {
    Duration::days(30)
}

pub async fn memory_storage() -> Arc<dyn KeyValueStore> {
    Arc::new(
        storage::Storage::new("sqlite::memory:")
            .await
            .expect("in-memory storage"),
    )
}
