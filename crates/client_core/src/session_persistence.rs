use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use shared::domain::Session;
use storage::KeyValueStore;
use tracing::{debug, warn};

pub const SESSION_STORAGE_KEY: &str = "session";
pub const DEFAULT_SESSION_VALIDITY_DAYS: i64 = 30;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The single durable session record, with expiry enforced on load.
pub struct PersistentSessionStore {
    storage: Arc<dyn KeyValueStore>,
    validity: Duration,
    clock: Arc<dyn Clock>,
}

impl PersistentSessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, validity: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            validity,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the stored session if it is still inside the validity window.
    /// Expired or unreadable records are removed and reported as absent.
    pub async fn load(&self) -> Result<Option<Session>> {
        let Some(raw) = self.storage.get(SESSION_STORAGE_KEY).await? else {
            return Ok(None);
        };

        let session = match serde_json::from_str::<Session>(&raw) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "persisted session is unreadable; purging");
                self.clear().await?;
                return Ok(None);
            }
        };

        let oldest_valid = self.clock.now() - self.validity;
        if session.created_at < oldest_valid {
            debug!(created_at = %session.created_at, "persisted session expired; purging");
            self.clear().await?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    pub async fn save(&self, session: &Session) -> Result<()> {
        let raw = serde_json::to_string(session).context("failed to encode session")?;
        self.storage.put(SESSION_STORAGE_KEY, &raw).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.storage.remove(SESSION_STORAGE_KEY).await
    }
}

#[cfg(test)]
#[path = "tests/session_persistence_tests.rs"]
mod tests;
