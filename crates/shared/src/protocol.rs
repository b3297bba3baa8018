use serde::{Deserialize, Serialize};

use crate::domain::{Event, EventId, SortOrder, Subscriber};

pub const EVENT_ENDPOINT: &str = "EventEndpoint";
pub const SUBSCRIBER_ENDPOINT: &str = "SubscriberEndpoint";
pub const USER_INFO_ENDPOINT: &str = "UserInfoEndpoint";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsRequest {
    pub offset: u64,
    pub limit: u32,
    #[serde(default)]
    pub sort_order: Vec<SortOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEventRequest {
    pub id: EventId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateEventRequest {
    pub entity: Event,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub entity: Subscriber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// Error body returned by endpoints on a non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}

/// Outcome of a login attempt, returned to the caller for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_url: Option<String>,
}

impl LoginResult {
    pub fn success(redirect_url: Option<String>, default_url: Option<String>) -> Self {
        Self {
            error: false,
            redirect_url,
            default_url,
            ..Self::default()
        }
    }

    pub fn failure(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: true,
            error_title: Some(title.into()),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn incorrect_credentials() -> Self {
        Self::failure(
            "Incorrect username or password.",
            "Check that you have entered the correct username and password and try again.",
        )
    }

    /// Where to go after a successful login: the server-saved url wins over the
    /// url the client router redirected from, which wins over the server default.
    pub fn landing_url(&self, return_url: Option<&str>) -> String {
        self.redirect_url
            .as_deref()
            .or(return_url)
            .or(self.default_url.as_deref())
            .unwrap_or("/")
            .to_string()
    }
}
