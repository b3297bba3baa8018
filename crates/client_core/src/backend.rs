use async_trait::async_trait;
use shared::{
    domain::{Event, EventId, SortOrder, Subscriber, UserProfile},
    protocol::LoginResult,
};

use crate::error::BackendError;

/// Operations the state layer requires from the remote event service.
#[async_trait]
pub trait EventBackend: Send + Sync {
    async fn find_all_events(&self) -> Result<Vec<Event>, BackendError>;
    async fn list_events(
        &self,
        offset: u64,
        limit: u32,
        sort_orders: &[SortOrder],
    ) -> Result<Vec<Event>, BackendError>;
    async fn count_events(&self) -> Result<u64, BackendError>;
    async fn get_event(&self, id: EventId) -> Result<Option<Event>, BackendError>;
    /// Creates the event when it has no id, updates it otherwise.
    async fn update_event(&self, event: &Event) -> Result<Event, BackendError>;
    async fn subscribe_to(&self, subscriber: &Subscriber) -> Result<Subscriber, BackendError>;
    /// Rejected credentials are an `Ok` result with `error` set.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, BackendError>;
    async fn logout(&self) -> Result<(), BackendError>;
    async fn current_user(&self) -> Result<UserProfile, BackendError>;
    async fn health_check(&self) -> Result<(), BackendError>;
}

pub struct MissingEventBackend;

fn unavailable() -> BackendError {
    BackendError::Transport("event backend unavailable".into())
}

#[async_trait]
impl EventBackend for MissingEventBackend {
    async fn find_all_events(&self) -> Result<Vec<Event>, BackendError> {
        Err(unavailable())
    }

    async fn list_events(
        &self,
        _offset: u64,
        _limit: u32,
        _sort_orders: &[SortOrder],
    ) -> Result<Vec<Event>, BackendError> {
        Err(unavailable())
    }

    async fn count_events(&self) -> Result<u64, BackendError> {
        Err(unavailable())
    }

    async fn get_event(&self, _id: EventId) -> Result<Option<Event>, BackendError> {
        Err(unavailable())
    }

    async fn update_event(&self, _event: &Event) -> Result<Event, BackendError> {
        Err(unavailable())
    }

    async fn subscribe_to(&self, _subscriber: &Subscriber) -> Result<Subscriber, BackendError> {
        Err(unavailable())
    }

    async fn login(&self, _username: &str, _password: &str) -> Result<LoginResult, BackendError> {
        Err(unavailable())
    }

    async fn logout(&self) -> Result<(), BackendError> {
        Err(unavailable())
    }

    async fn current_user(&self) -> Result<UserProfile, BackendError> {
        Err(unavailable())
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Err(unavailable())
    }
}
