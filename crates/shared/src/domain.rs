use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);
    };
}

id_newtype!(EventId);
id_newtype!(SubscriberId);

/// An event listing as served by the event endpoint.
///
/// `id` stays `None` until the server has persisted the entity; an entity
/// without an id is created by `update`, one with an id is overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EventId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub event_date: Option<NaiveDateTime>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub max_attendees: Option<i32>,
    #[serde(default)]
    pub nb_attendees: Option<i32>,
}

impl Event {
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    /// Identity comparison used when merging server updates into a local list.
    pub fn same_entity(&self, other: &Event) -> bool {
        matches!((self.id, other.id), (Some(a), Some(b)) if a == b)
    }
}

/// A subscription request. Embeds the selected event by value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SubscriberId>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub event: Event,
}

impl Subscriber {
    pub fn for_event(event: Event) -> Self {
        Self {
            event,
            ..Self::default()
        }
    }
}

/// Profile of the authenticated user, fetched once at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    #[serde(default)]
    pub authorities: Vec<String>,
}

/// Locally held proof of authentication. Persisted as JSON with `createdAt`
/// in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    pub user: UserProfile,
}

impl Session {
    pub fn new(created_at: DateTime<Utc>, user: UserProfile) -> Self {
        // Millisecond precision matches what survives a round trip through storage.
        let created_at = DateTime::from_timestamp_millis(created_at.timestamp_millis())
            .unwrap_or(created_at);
        Self { created_at, user }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOrder {
    pub path: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Desc,
        }
    }
}
